use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::session::domain::media_ports::{CaptureStore, FrameEncoder, StoreError};
use crate::shared::config::StorageConfig;
use crate::shared::constants::CAPTURE_EXTENSION;
use crate::shared::frame::Frame;

/// Saves captures as `{prefix}{unix_seconds}.jpg` under a directory and
/// returns `{base_url}/{filename}`.
pub struct FileCaptureStore {
    dir: PathBuf,
    prefix: String,
    base_url: String,
    encoder: Box<dyn FrameEncoder>,
}

impl FileCaptureStore {
    pub fn new(config: &StorageConfig, encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            dir: config.image_dir.clone(),
            prefix: config.image_prefix.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            encoder,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free file name for a capture taken at `seconds`.
    fn file_name(&self, seconds: u64) -> String {
        let base = format!("{}{seconds}", self.prefix);
        let mut name = format!("{base}.{CAPTURE_EXTENSION}");
        let mut n = 1;
        while self.dir.join(&name).exists() {
            name = format!("{base}_{n}.{CAPTURE_EXTENSION}");
            n += 1;
        }
        name
    }
}

impl CaptureStore for FileCaptureStore {
    fn save(&mut self, crop: &Frame) -> Result<String, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDir {
            path: self.dir.clone(),
            source: e,
        })?;

        let jpeg = self.encoder.encode(crop)?;
        let seconds = crop
            .captured_at()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let name = self.file_name(seconds);
        let path = self.dir.join(&name);
        std::fs::write(&path, &jpeg).map_err(|e| StoreError::Write { path, source: e })?;

        Ok(format!("{}/{name}", self.base_url))
    }
}
