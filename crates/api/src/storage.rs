// Path: crates/api/src/storage.rs

//! API for a durable, table-scoped key-value store.

pub use poc_types::error::StorageError;

/// A key and its stored bytes, as returned by a scan.
pub type Entry = (Vec<u8>, Vec<u8>);

/// The minimal storage contract of the consensus core.
///
/// Tables are created explicitly per chain and addressed by name. Scans return
/// entries in ascending key order.
pub trait TableStore: Send + Sync {
    /// Creates `table`. Returns [`StorageError::TableExists`] if it already exists.
    fn create_table(&self, table: &str) -> Result<(), StorageError>;

    /// Drops `table` and every entry in it. Dropping an absent table is a no-op.
    fn drop_table(&self, table: &str) -> Result<(), StorageError>;

    /// Returns true if `table` exists.
    fn table_exists(&self, table: &str) -> Result<bool, StorageError>;

    /// Reads one value.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes one value, replacing any previous value.
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Writes several values to the same table in one atomic step: either every
    /// entry is visible afterwards or none is. Each store provides its own.
    fn put_batch(&self, table: &str, entries: &[Entry]) -> Result<(), StorageError>;

    /// Deletes one value. Deleting an absent key is a no-op.
    fn delete(&self, table: &str, key: &[u8]) -> Result<(), StorageError>;

    /// Returns every entry of `table` in ascending key order.
    fn scan(&self, table: &str) -> Result<Vec<Entry>, StorageError>;
}

/// Creates `table`, treating an existing table as success.
///
/// Returns `true` if the table was created by this call.
pub fn ensure_table<S: TableStore + ?Sized>(store: &S, table: &str) -> Result<bool, StorageError> {
    match store.create_table(table) {
        Ok(()) => Ok(true),
        Err(StorageError::TableExists(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
