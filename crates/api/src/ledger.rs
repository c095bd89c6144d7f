// Path: crates/api/src/ledger.rs

use crate::ServiceError;
use async_trait::async_trait;
use poc_types::app::{Address, Amount, ChainId};

/// Balance lookups used to validate stake-locking transactions.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// The spendable balance of `address` in `assets_id` on `chain_id`.
    async fn available_balance(
        &self,
        chain_id: ChainId,
        assets_id: u32,
        address: &Address,
    ) -> Result<Amount, ServiceError>;
}
