use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OutputConfig;
use crate::crawler::FetchResult;
use crate::model::{CareResource, ResourceProvider};
use crate::storage::{StorageError, StorageResult};
use crate::url::sanitize_filename;

const ZSTD_LEVEL: i32 = 3;
const CHECKPOINT_EXTENSION: &str = "json.zst";

/// Snapshot of one page-processing step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCheckpoint {
    /// URL as requested by the processor
    pub url: String,
    pub depth: u32,
    pub session_id: String,
    pub fetch: FetchResult,
    pub provider: Option<ResourceProvider>,
    pub candidates: Vec<CareResource>,
    pub ranked_links: Vec<String>,
    pub written_at: DateTime<Utc>,
}

/// Writes step checkpoints and the provider aggregate under a data directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoint_dir: PathBuf,
    provider_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(data_dir: impl Into<PathBuf>, checkpoint_dir: &str, provider_file: &str) -> Self {
        let data_dir = data_dir.into();
        Self {
            checkpoint_dir: data_dir.join(checkpoint_dir),
            provider_path: data_dir.join(provider_file),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.data_dir, &config.checkpoint_dir, &config.provider_file)
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn provider_path(&self) -> &Path {
        &self.provider_path
    }

    /// Path of the checkpoint file for `url`
    pub fn checkpoint_path(&self, url: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.{}", sanitize_filename(url), CHECKPOINT_EXTENSION))
    }

    /// Writes one step checkpoint, replacing any earlier file for the same URL
    pub fn write_step(&self, step: &StepCheckpoint) -> StorageResult<PathBuf> {
        let path = self.checkpoint_path(&step.url);
        write_compressed_json(&path, step)?;
        debug!(url = %step.url, path = %path.display(), "Wrote step checkpoint");
        Ok(path)
    }

    pub fn read_step(&self, url: &str) -> StorageResult<StepCheckpoint> {
        read_compressed_json(&self.checkpoint_path(url))
    }

    /// Writes every provider collected in the job as one blob
    pub fn write_providers(&self, providers: &[ResourceProvider]) -> StorageResult<PathBuf> {
        write_compressed_json(&self.provider_path, providers)?;
        debug!(
            count = providers.len(),
            path = %self.provider_path.display(),
            "Wrote provider aggregate"
        );
        Ok(self.provider_path.clone())
    }

    pub fn read_providers(&self) -> StorageResult<Vec<ResourceProvider>> {
        read_compressed_json(&self.provider_path)
    }
}

/// Serializes `value` as JSON into a zstd-compressed file, creating parent directories
pub fn write_compressed_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)
        .map_err(|e| StorageError::io(path, e))?;

    serde_json::to_writer(&mut encoder, value)?;

    let mut writer = encoder.finish().map_err(|e| StorageError::io(path, e))?;
    writer.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Reads a file written by [`write_compressed_json`]
pub fn read_compressed_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(decoder))?)
}
