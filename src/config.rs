//! Runtime settings for opening a store.

use crate::engine::SalesEngine;
use crate::store::FlatFileStore;
use std::path::PathBuf;

/// Data directory used when none is given.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Products at or below this quantity are reported as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Rows kept per ranking in a sales report.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub low_stock_threshold: u32,
    pub top_n: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl StoreConfig {
    /// Default settings on `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn store(&self) -> FlatFileStore {
        FlatFileStore::new(&self.data_dir)
    }

    /// Opens an engine over the flat files in the data directory.
    pub fn open(&self) -> SalesEngine<FlatFileStore> {
        SalesEngine::new(self.store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.low_stock_threshold, 5);
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_new_keeps_other_defaults() {
        let config = StoreConfig::new("/tmp/shop");
        assert_eq!(config.store().root(), std::path::Path::new("/tmp/shop"));
        assert_eq!(config.top_n, DEFAULT_TOP_N);
    }
}
