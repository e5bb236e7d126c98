//! Storage module for persisting crawl artifacts
//!
//! Nothing here is read back by the crawl itself. This module writes:
//! - One zstd-compressed JSON checkpoint per processed page under `data/crawl/`
//! - The provider aggregate for the whole job under `data/`

mod checkpoint;

pub use checkpoint::{read_compressed_json, write_compressed_json, CheckpointStore, StepCheckpoint};

use thiserror::Error;

/// Errors that can occur while writing or reading artifacts
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
