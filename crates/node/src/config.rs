// Path: crates/node/src/config.rs

//! Node configuration file.

use anyhow::Context;
use poc_storage::RedbTableStore;
use poc_types::config::ConsensusConfig;
use poc_types::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_header_tail_len() -> usize {
    64
}

/// Top-level node configuration, read from TOML.
///
/// ```toml
/// data_dir = "/var/lib/poc"
/// header_tail_len = 128
///
/// [consensus]
/// chain_id = 1
/// packing_interval_ms = 10000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Directory holding the consensus database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Number of recent block headers each chain keeps in memory.
    #[serde(default = "default_header_tail_len")]
    pub header_tail_len: usize,
    /// Defaults used to synthesize the first chain on a fresh node.
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            header_tail_len: default_header_tail_len(),
            consensus: ConsensusConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read node config {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid node config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: NodeConfig = toml::from_str(raw)?;
        config.consensus.validate()?;
        if config.header_tail_len < 2 {
            anyhow::bail!("'header_tail_len' must be at least 2");
        }
        Ok(config)
    }

    /// Path of the consensus database inside `data_dir`.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("consensus.redb")
    }

    /// Opens (or creates) the persistent table store.
    pub fn open_store(&self) -> Result<RedbTableStore, StorageError> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Backend(format!("create {}: {}", self.data_dir.display(), e)))?;
        RedbTableStore::open(self.store_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poc_api::storage::TableStore;

    #[test]
    fn missing_fields_use_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
            header_tail_len = 16

            [consensus]
            chain_id = 9
            deposit_min = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.header_tail_len, 16);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.consensus.chain_id, 9);
        assert_eq!(config.consensus.deposit_min, 10);
        assert_eq!(
            config.consensus.packing_interval_ms,
            ConsensusConfig::default().packing_interval_ms
        );
    }

    #[test]
    fn invalid_consensus_section_is_rejected() {
        let err = NodeConfig::from_toml_str("[consensus]\npacking_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("packing_interval"));
    }

    #[test]
    fn load_reads_file_and_opens_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", dir.path().join("db").display().to_string()),
        )
        .unwrap();
        let config = NodeConfig::load(&path).unwrap();
        let store = config.open_store().unwrap();
        store.create_table("t").unwrap();
        assert!(store.table_exists("t").unwrap());

        assert!(NodeConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
