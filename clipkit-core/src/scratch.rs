use std::path::{Path, PathBuf};

use rand::RngCore;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type ScratchResult<T> = Result<T, ScratchError>;

/// Per-job temporary directory. Every name carries the branding prefix and
/// a 32-hex-char random component so concurrent jobs cannot collide and
/// stray files remain identifiable.
///
/// `release` is the normal teardown; `Drop` removes the directory as a
/// backstop so a cancelled or aborted job leaves nothing behind.
#[derive(Debug)]
pub struct ScratchArea {
    root: PathBuf,
    brand: String,
    released: bool,
}

impl ScratchArea {
    pub async fn allocate(base: &Path, brand: &str) -> ScratchResult<Self> {
        let root = base.join(format!("{brand}_{}_", random_hex()));
        fs::create_dir_all(&root)
            .await
            .map_err(|source| ScratchError::Io {
                path: root.clone(),
                source,
            })?;
        Ok(Self {
            root,
            brand: brand.to_string(),
            released: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a fresh artifact inside this area, `<brand>_<32hex>.<ext>`.
    pub fn file(&self, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{}", self.brand, random_hex(), extension))
    }

    /// Removes the directory and everything in it. Idempotent; missing
    /// files are not an error.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = fs::remove_dir_all(&self.root).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), error = %err, "failed to release scratch area");
            }
        }
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}

fn random_hex() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
