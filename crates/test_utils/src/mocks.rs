//! In-memory stand-ins for the collaborators of the consensus core.

use async_trait::async_trait;
use parking_lot::Mutex;
use poc_api::chain::BlockHeaderService;
use poc_api::ledger::LedgerService;
use poc_api::protocol::ProtocolRegistry;
use poc_api::storage::{Entry, StorageError, TableStore};
use poc_api::time::Clock;
use poc_api::ServiceError;
use poc_types::app::{Address, Amount, BlockHeaderSummary, ChainId, TxType};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: u64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Balances keyed by address. Unknown addresses hold nothing.
#[derive(Debug, Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<Address, Amount>>,
    unavailable: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: Address, amount: Amount) {
        self.balances.lock().insert(address, amount);
    }

    /// Makes every lookup fail, as if the ledger were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerService for MockLedger {
    async fn available_balance(
        &self,
        _chain_id: ChainId,
        _assets_id: u32,
        address: &Address,
    ) -> Result<Amount, ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::new("ledger", "unavailable"));
        }
        Ok(self.balances.lock().get(address).copied().unwrap_or(0))
    }
}

/// Records transaction-type bindings per chain.
#[derive(Debug)]
pub struct MockProtocolRegistry {
    version: u16,
    bindings: Mutex<HashMap<ChainId, (u16, Vec<TxType>)>>,
}

impl MockProtocolRegistry {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// The version and types bound for `chain_id`, if any.
    pub fn bindings(&self, chain_id: ChainId) -> Option<(u16, Vec<TxType>)> {
        self.bindings.lock().get(&chain_id).cloned()
    }
}

impl ProtocolRegistry for MockProtocolRegistry {
    fn current_protocol_version(&self, _chain_id: ChainId) -> Result<u16, ServiceError> {
        Ok(self.version)
    }

    fn register_tx_types(
        &self,
        chain_id: ChainId,
        version: u16,
        tx_types: &[TxType],
    ) -> Result<(), ServiceError> {
        self.bindings
            .lock()
            .insert(chain_id, (version, tx_types.to_vec()));
        Ok(())
    }

    fn unregister_chain(&self, chain_id: ChainId) -> Result<(), ServiceError> {
        self.bindings.lock().remove(&chain_id);
        Ok(())
    }
}

/// A block header source fed by the test.
///
/// `hold()` makes the next `headers_after` call park until `release()`, which
/// lets a test stop a chain while one of its ticks is in flight.
#[derive(Debug)]
pub struct MockHeaderService {
    headers: Mutex<HashMap<ChainId, Vec<BlockHeaderSummary>>>,
    held: watch::Sender<bool>,
    entered: Notify,
    polls: AtomicUsize,
}

impl Default for MockHeaderService {
    fn default() -> Self {
        Self {
            headers: Mutex::new(HashMap::new()),
            held: watch::channel(false).0,
            entered: Notify::new(),
            polls: AtomicUsize::new(0),
        }
    }
}

impl MockHeaderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chain_id: ChainId, header: BlockHeaderSummary) {
        self.headers.lock().entry(chain_id).or_default().push(header);
    }

    /// Number of `headers_after` calls so far, i.e. scheduler ticks that polled.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Resolves once a poll is parked on `hold()`.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    fn snapshot(&self, chain_id: ChainId) -> Vec<BlockHeaderSummary> {
        self.headers
            .lock()
            .get(&chain_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BlockHeaderService for MockHeaderService {
    async fn latest_height(&self, chain_id: ChainId) -> Result<u64, ServiceError> {
        Ok(self
            .snapshot(chain_id)
            .last()
            .map(|h| h.height)
            .unwrap_or(0))
    }

    async fn load_headers(
        &self,
        chain_id: ChainId,
        count: usize,
    ) -> Result<Vec<BlockHeaderSummary>, ServiceError> {
        let all = self.snapshot(chain_id);
        let skip = all.len().saturating_sub(count);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn headers_after(
        &self,
        chain_id: ChainId,
        height: u64,
    ) -> Result<Vec<BlockHeaderSummary>, ServiceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if *self.held.borrow() {
            self.entered.notify_one();
            let mut rx = self.held.subscribe();
            let _ = rx.wait_for(|held| !*held).await;
        }
        Ok(self
            .snapshot(chain_id)
            .into_iter()
            .filter(|h| h.height > height)
            .collect())
    }
}

/// Wraps a store and fails scans of selected tables.
pub struct FaultyStore {
    inner: Arc<dyn TableStore>,
    failing_scans: Mutex<HashSet<String>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn TableStore>) -> Self {
        Self {
            inner,
            failing_scans: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_scan(&self, table: &str) {
        self.failing_scans.lock().insert(table.to_string());
    }

    pub fn heal(&self) {
        self.failing_scans.lock().clear();
    }
}

impl TableStore for FaultyStore {
    fn create_table(&self, table: &str) -> Result<(), StorageError> {
        self.inner.create_table(table)
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        self.inner.drop_table(table)
    }

    fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        self.inner.table_exists(table)
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(table, key)
    }

    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.inner.put(table, key, value)
    }

    fn put_batch(&self, table: &str, entries: &[Entry]) -> Result<(), StorageError> {
        self.inner.put_batch(table, entries)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), StorageError> {
        self.inner.delete(table, key)
    }

    fn scan(&self, table: &str) -> Result<Vec<Entry>, StorageError> {
        if self.failing_scans.lock().contains(table) {
            return Err(StorageError::Backend(format!("injected scan failure on {}", table)));
        }
        self.inner.scan(table)
    }
}
