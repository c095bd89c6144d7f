// Path: crates/api/src/chain.rs

use crate::ServiceError;
use async_trait::async_trait;
use poc_types::app::{BlockHeaderSummary, ChainId};

/// Source of block headers for each hosted chain.
#[async_trait]
pub trait BlockHeaderService: Send + Sync {
    /// The height of the latest known block on `chain_id`.
    async fn latest_height(&self, chain_id: ChainId) -> Result<u64, ServiceError>;

    /// Up to `count` most recent headers, ascending by height.
    async fn load_headers(
        &self,
        chain_id: ChainId,
        count: usize,
    ) -> Result<Vec<BlockHeaderSummary>, ServiceError>;

    /// Headers with a height strictly greater than `height`, ascending.
    async fn headers_after(
        &self,
        chain_id: ChainId,
        height: u64,
    ) -> Result<Vec<BlockHeaderSummary>, ServiceError>;
}
