use std::path::PathBuf;

use thiserror::Error;

use crate::scratch::ScratchError;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("download failed: {0}")]
    Extraction(String),
    #[error("asset too large for this source: no format fits {cap_bytes} bytes")]
    NoEligibleFormat { url: String, cap_bytes: u64 },
    #[error("post-processing failed ({command}): {stderr}")]
    PostProcess {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<ScratchError> for AcquireError {
    fn from(error: ScratchError) -> Self {
        match error {
            ScratchError::Io { source, path } => AcquireError::Io { source, path },
        }
    }
}

pub type AcquireResult<T> = Result<T, AcquireError>;
