use std::path::PathBuf;

use thiserror::Error;

use crate::acquire::AcquireError;
use crate::deliver::DeliverError;
use crate::scratch::ScratchError;
use crate::transform::TranscodeError;

/// Caller-facing failure taxonomy. Every component error is mapped into
/// exactly one of these kinds at the orchestrator boundary; messages carry
/// truncated process diagnostics, never stack traces.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("download failed: {0}")]
    SourceUnavailable(String),
    #[error("asset too large for this source: {0}")]
    NoEligibleFormat(String),
    #[error("media processing failed ({command}): {stderr}")]
    ProcessFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("upload failed: {0}")]
    UploadFailure(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<AcquireError> for PipelineError {
    fn from(error: AcquireError) -> Self {
        match error {
            AcquireError::Extraction(message) => PipelineError::SourceUnavailable(message),
            AcquireError::NoEligibleFormat { url, cap_bytes } => PipelineError::NoEligibleFormat(
                format!("no format of {url} fits {cap_bytes} bytes"),
            ),
            AcquireError::PostProcess {
                command,
                status,
                stderr,
            } => PipelineError::ProcessFailure {
                command,
                status,
                stderr,
            },
            AcquireError::Io { source, path } => PipelineError::Io { source, path },
        }
    }
}

impl From<TranscodeError> for PipelineError {
    fn from(error: TranscodeError) -> Self {
        match error {
            TranscodeError::CommandFailure {
                command,
                status,
                stderr,
            } => PipelineError::ProcessFailure {
                command,
                status,
                stderr,
            },
            TranscodeError::Io { source, path } => PipelineError::Io { source, path },
        }
    }
}

impl From<DeliverError> for PipelineError {
    fn from(error: DeliverError) -> Self {
        match error {
            DeliverError::Upload(message) => PipelineError::UploadFailure(message),
            DeliverError::Io { source, path } => PipelineError::Io { source, path },
        }
    }
}

impl From<ScratchError> for PipelineError {
    fn from(error: ScratchError) -> Self {
        match error {
            ScratchError::Io { source, path } => PipelineError::Io { source, path },
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
