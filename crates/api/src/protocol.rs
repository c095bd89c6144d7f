// Path: crates/api/src/protocol.rs

use crate::ServiceError;
use poc_types::app::{ChainId, TxType};

/// The shared transaction-type registry.
pub trait ProtocolRegistry: Send + Sync {
    /// The protocol version currently active on `chain_id`.
    fn current_protocol_version(&self, chain_id: ChainId) -> Result<u16, ServiceError>;

    /// Binds `tx_types` for `chain_id` under protocol `version`.
    fn register_tx_types(
        &self,
        chain_id: ChainId,
        version: u16,
        tx_types: &[TxType],
    ) -> Result<(), ServiceError>;

    /// Removes every binding of `chain_id`.
    fn unregister_chain(&self, chain_id: ChainId) -> Result<(), ServiceError>;
}
