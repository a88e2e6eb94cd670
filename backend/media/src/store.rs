//! Audio artifact storage.
//!
//! Generated and uploaded audio lands in one flat directory under a unique
//! random filename; the public URL is what gets handed to the telephony
//! provider in `<Play>` directives, so it must resolve through the
//! gateway's `/media` route.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use outdial_core::OutdialError;

/// A stored audio artifact and where the provider can fetch it.
#[derive(Debug, Clone)]
pub struct StoredAudio {
    pub file_name: String,
    pub public_url: String,
}

/// Flat-directory audio store.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    /// Base under which the gateway serves the directory, e.g.
    /// `https://example.com/media`.
    public_base: String,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base: public_base.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn init(&self) -> Result<(), OutdialError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OutdialError::Storage(format!("creating {}: {e}", self.dir.display())))?;
        info!(dir = %self.dir.display(), "Audio store ready");
        Ok(())
    }

    /// Persist audio bytes under a fresh random name.
    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<StoredAudio, OutdialError> {
        let file_name = format!("{}.{}", Uuid::new_v4().simple(), extension.trim_start_matches('.'));
        let path = self.dir.join(&file_name);
        fs::write(&path, bytes)
            .await
            .map_err(|e| OutdialError::Storage(format!("writing {}: {e}", path.display())))?;
        debug!(file = %file_name, bytes = bytes.len(), "Stored audio artifact");
        Ok(StoredAudio {
            public_url: format!("{}/{}", self.public_base.trim_end_matches('/'), file_name),
            file_name,
        })
    }

    /// Read a stored artifact back. Rejects path traversal.
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, OutdialError> {
        if file_name.contains("..") || file_name.contains('/') || file_name.contains('\\') {
            return Err(OutdialError::Storage(format!(
                "invalid media filename: {file_name:?}"
            )));
        }
        let path = self.dir.join(file_name);
        fs::read(&path)
            .await
            .map_err(|e| OutdialError::Storage(format!("reading {}: {e}", path.display())))
    }
}

/// Content type for a stored audio filename, by extension.
pub fn audio_mime_type(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}
