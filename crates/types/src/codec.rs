// Path: crates/types/src/codec.rs

//! The canonical, deterministic binary codec for consensus state.
//!
//! Thin wrappers around `parity-scale-codec` (SCALE). Every record written to a
//! chain table and every persisted chain configuration goes through here, so two
//! nodes holding the same state hold the same bytes.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical SCALE bytes.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from canonical SCALE bytes.
///
/// Trailing bytes are an error: a record that does not decode exactly is treated
/// as corrupt rather than silently truncated.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}
