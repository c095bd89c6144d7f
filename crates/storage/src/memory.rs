// Path: crates/storage/src/memory.rs

use parking_lot::RwLock;
use poc_api::storage::{Entry, StorageError, TableStore};
use std::collections::{BTreeMap, HashMap};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-process `TableStore`. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryTableStore {
    fn create_table(&self, table: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(StorageError::TableExists(table.to_string()));
        }
        tables.insert(table.to_string(), Table::new());
        Ok(())
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        self.tables.write().remove(table);
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().contains_key(table))
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::TableMissing(table.to_string()))?;
        Ok(t.get(key).cloned())
    }

    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.put_batch(table, &[(key.to_vec(), value.to_vec())])
    }

    fn put_batch(&self, table: &str, entries: &[Entry]) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableMissing(table.to_string()))?;
        for (k, v) in entries {
            t.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableMissing(table.to_string()))?;
        t.remove(key);
        Ok(())
    }

    fn scan(&self, table: &str) -> Result<Vec<Entry>, StorageError> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::TableMissing(table.to_string()))?;
        Ok(t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poc_api::storage::ensure_table;

    #[test]
    fn create_is_explicit_and_ensure_is_idempotent() {
        let store = MemoryTableStore::new();
        assert!(matches!(
            store.put("t", b"k", b"v"),
            Err(StorageError::TableMissing(_))
        ));
        store.create_table("t").unwrap();
        assert!(matches!(
            store.create_table("t"),
            Err(StorageError::TableExists(_))
        ));
        assert!(!ensure_table(&store, "t").unwrap());
        assert!(ensure_table(&store, "u").unwrap());
    }

    #[test]
    fn scan_is_key_ordered() {
        let store = MemoryTableStore::new();
        store.create_table("t").unwrap();
        store.put("t", b"b", b"2").unwrap();
        store.put("t", b"a", b"1").unwrap();
        store.put("t", b"c", b"3").unwrap();
        store.delete("t", b"c").unwrap();
        let keys: Vec<Vec<u8>> = store.scan("t").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);

        store.drop_table("t").unwrap();
        assert!(!store.table_exists("t").unwrap());
    }

    #[test]
    fn batch_lands_whole_or_not_at_all() {
        let store = MemoryTableStore::new();
        let batch = vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
        ];
        assert!(matches!(
            store.put_batch("t", &batch),
            Err(StorageError::TableMissing(_))
        ));
        assert!(!store.table_exists("t").unwrap());

        store.create_table("t").unwrap();
        store.put_batch("t", &batch).unwrap();
        assert_eq!(store.scan("t").unwrap(), batch);
    }
}
