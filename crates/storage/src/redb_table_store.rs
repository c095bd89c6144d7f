// Path: crates/storage/src/redb_table_store.rs
use poc_api::storage::{Entry, StorageError, TableStore};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::path::Path;
use std::sync::Arc;

/// Catalog of created tables. redb creates tables lazily on first write, so
/// explicit creation is tracked here.
const CATALOG: TableDefinition<&str, u64> = TableDefinition::new("__catalog__");

fn data_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

fn backend<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// A `TableStore` keeping every chain table in a single redb database file.
#[derive(Clone)]
pub struct RedbTableStore {
    db: Arc<Database>,
}

impl RedbTableStore {
    /// Opens (or creates) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;

        // Ensure the catalog exists
        {
            let w = db.begin_write().map_err(backend)?;
            w.open_table(CATALOG).map_err(backend)?;
            w.commit().map_err(backend)?;
        }
        tracing::debug!(target: "storage", path = %path.as_ref().display(), "opened redb table store");
        Ok(Self { db: Arc::new(db) })
    }

    fn ensure_cataloged(&self, table: &str) -> Result<(), StorageError> {
        if self.table_exists(table)? {
            Ok(())
        } else {
            Err(StorageError::TableMissing(table.to_string()))
        }
    }
}

impl TableStore for RedbTableStore {
    fn create_table(&self, table: &str) -> Result<(), StorageError> {
        let created = (|| -> Result<bool, redb::Error> {
            let w = self.db.begin_write()?;
            let existed = {
                let mut catalog = w.open_table(CATALOG)?;
                let existed = catalog.get(table)?.is_some();
                if !existed {
                    catalog.insert(table, 1u64)?;
                }
                existed
            };
            if existed {
                w.abort()?;
                return Ok(false);
            }
            w.open_table(data_table(table))?;
            w.commit()?;
            Ok(true)
        })()
        .map_err(backend)?;

        if created {
            Ok(())
        } else {
            Err(StorageError::TableExists(table.to_string()))
        }
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        (|| -> Result<(), redb::Error> {
            let w = self.db.begin_write()?;
            {
                let mut catalog = w.open_table(CATALOG)?;
                catalog.remove(table)?;
            }
            w.delete_table(data_table(table))?;
            w.commit()?;
            Ok(())
        })()
        .map_err(backend)
    }

    fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let catalog = r.open_table(CATALOG).map_err(backend)?;
        let exists = catalog.get(table).map_err(backend)?.is_some();
        Ok(exists)
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.ensure_cataloged(table)?;
        let r = self.db.begin_read().map_err(backend)?;
        let t = match r.open_table(data_table(table)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(StorageError::TableMissing(table.to_string()))
            }
            Err(e) => return Err(backend(e)),
        };
        let value = t.get(key).map_err(backend)?.map(|g| g.value().to_vec());
        Ok(value)
    }

    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.put_batch(table, &[(key.to_vec(), value.to_vec())])
    }

    fn put_batch(&self, table: &str, entries: &[Entry]) -> Result<(), StorageError> {
        self.ensure_cataloged(table)?;
        (|| -> Result<(), redb::Error> {
            let w = self.db.begin_write()?;
            {
                let mut t = w.open_table(data_table(table))?;
                for (k, v) in entries {
                    t.insert(k.as_slice(), v.as_slice())?;
                }
            }
            w.commit()?;
            Ok(())
        })()
        .map_err(backend)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), StorageError> {
        self.ensure_cataloged(table)?;
        (|| -> Result<(), redb::Error> {
            let w = self.db.begin_write()?;
            {
                let mut t = w.open_table(data_table(table))?;
                t.remove(key)?;
            }
            w.commit()?;
            Ok(())
        })()
        .map_err(backend)
    }

    fn scan(&self, table: &str) -> Result<Vec<Entry>, StorageError> {
        self.ensure_cataloged(table)?;
        let r = self.db.begin_read().map_err(backend)?;
        let t = match r.open_table(data_table(table)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(StorageError::TableMissing(table.to_string()))
            }
            Err(e) => return Err(backend(e)),
        };
        let mut out = Vec::new();
        for item in t.iter().map_err(backend)? {
            let (k, v) = item.map_err(backend)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }
}
