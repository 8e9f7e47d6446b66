//! Verification key loading

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use zkauth_common::{Error, Result};

/// Source of circuit verification keys
#[async_trait]
pub trait KeyLoader: Send + Sync {
    /// Raw verification key for `circuit_id`
    async fn load(&self, circuit_id: &str) -> Result<Vec<u8>>;
}

/// Loads `<dir>/<circuit_id>/verification_key.json`
pub struct FsKeyLoader {
    dir: PathBuf,
}

impl FsKeyLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, circuit_id: &str) -> PathBuf {
        self.dir.join(circuit_id).join("verification_key.json")
    }
}

#[async_trait]
impl KeyLoader for FsKeyLoader {
    async fn load(&self, circuit_id: &str) -> Result<Vec<u8>> {
        // circuit ids come from untrusted tokens
        if circuit_id.is_empty() || !circuit_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::KeyNotFound(circuit_id.to_string()));
        }

        let path = self.key_path(circuit_id);
        debug!("Loading verification key from {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::KeyNotFound(circuit_id.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
