//! Proof index configuration.
//!
//! Provides [`IndexConfig`] with defaults for the data directory and logging.
//! Loading it from a file is left to the embedding node.

use std::path::PathBuf;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Configuration for a proof index instance.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Skip storing per-block proofs. The accumulator, state snapshots and
    /// undo records are still maintained.
    pub pruned: bool,
    /// Log level filter string (e.g. "info", "debug", "thicket_index=trace").
    pub log_level: String,
    /// Log output format: "text" or "json".
    pub log_format: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("thicket");

        Self {
            data_dir,
            pruned: false,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl IndexConfig {
    /// Path to the RocksDB index directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("indexes")
    }

    /// Install a global tracing subscriber for this configuration.
    ///
    /// `RUST_LOG` takes precedence over [`log_level`](Self::log_level). Does
    /// nothing if a subscriber is already installed.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let result = if self.log_format == "json" {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init()
        };
        if result.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_pruned() {
        assert!(!IndexConfig::default().pruned);
    }

    #[test]
    fn default_log_level_is_info() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_format, "text");
    }

    #[test]
    fn default_data_dir_ends_with_thicket() {
        let cfg = IndexConfig::default();
        assert!(
            cfg.data_dir.ends_with("thicket"),
            "data_dir should end with 'thicket': {:?}",
            cfg.data_dir
        );
    }

    #[test]
    fn db_path_appends_indexes() {
        let cfg = IndexConfig {
            data_dir: PathBuf::from("/tmp/thicket-test"),
            ..IndexConfig::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/thicket-test/indexes"));
    }

    #[test]
    fn init_logging_twice_is_harmless() {
        let cfg = IndexConfig::default();
        cfg.init_logging();
        cfg.init_logging();
    }
}
