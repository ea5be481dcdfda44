use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::config::HostingSection;

#[derive(Debug, Error)]
pub enum DeliverError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type DeliverResult<T> = Result<T, DeliverError>;

/// How the caller should hand the artifact to its channel: as a direct
/// payload, or as a time-limited link when the direct cap is exceeded.
/// Direct payloads carry bytes so nothing references scratch after release.
#[derive(Debug, Clone)]
pub enum Delivery {
    Direct { file_name: String, bytes: Vec<u8> },
    Hosted { url: String, expires_at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct HostedFile {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait ArtifactHost: Send + Sync {
    async fn upload(&self, path: &Path, file_name: &str) -> DeliverResult<HostedFile>;
}

/// Single-file multipart upload to a uguu-style hosting endpoint. The
/// response must carry a success flag and at least one file URL; anything
/// else is a hard failure. Expiry is computed locally from the provider's
/// documented retention window, never parsed from the response.
pub struct UguuHost {
    client: Client,
    endpoint: String,
    retention_hours: u32,
}

impl UguuHost {
    pub fn new(hosting: HostingSection) -> DeliverResult<Self> {
        let client = Client::builder()
            .user_agent("clipkit/0.1")
            .build()
            .map_err(|err| DeliverError::Upload(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: hosting.endpoint,
            retention_hours: hosting.retention_hours,
        })
    }
}

#[async_trait::async_trait]
impl ArtifactHost for UguuHost {
    async fn upload(&self, path: &Path, file_name: &str) -> DeliverResult<HostedFile> {
        let bytes = fs::read(path).await.map_err(|source| DeliverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("files[]", part);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| DeliverError::Upload(err.to_string()))?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(DeliverError::Upload(format!(
                "hosting endpoint returned status {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|err| DeliverError::Upload(err.to_string()))?;
        let url = parse_upload_body(&body)?;
        info!(%url, "artifact uploaded to remote host");
        Ok(HostedFile {
            url,
            expires_at: expiry_from(Utc::now(), self.retention_hours),
        })
    }
}

/// Expiry relative to the upload instant.
pub fn expiry_from(uploaded_at: DateTime<Utc>, retention_hours: u32) -> DateTime<Utc> {
    uploaded_at + Duration::hours(retention_hours as i64)
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    files: Vec<UploadedEntry>,
}

#[derive(Debug, Deserialize)]
struct UploadedEntry {
    url: Option<String>,
}

fn parse_upload_body(body: &str) -> DeliverResult<String> {
    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|err| DeliverError::Upload(format!("malformed hosting response: {err}")))?;
    if !response.success {
        return Err(DeliverError::Upload(
            "hosting endpoint reported failure".to_string(),
        ));
    }
    response
        .files
        .first()
        .and_then(|entry| entry.url.clone())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            DeliverError::Upload("hosting response missing file url".to_string())
        })
}

/// Decides between direct payload delivery and the remote hosting fallback.
pub struct DeliveryResolver {
    direct_budget: u64,
    host: Arc<dyn ArtifactHost>,
}

impl DeliveryResolver {
    pub fn new(direct_budget: u64, host: Arc<dyn ArtifactHost>) -> Self {
        Self {
            direct_budget,
            host,
        }
    }

    pub async fn resolve(&self, artifact: &Path) -> DeliverResult<Delivery> {
        let metadata = fs::metadata(artifact)
            .await
            .map_err(|source| DeliverError::Io {
                path: artifact.to_path_buf(),
                source,
            })?;
        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        if metadata.len() <= self.direct_budget {
            debug!(size = metadata.len(), budget = self.direct_budget, "delivering directly");
            let bytes = fs::read(artifact).await.map_err(|source| DeliverError::Io {
                path: artifact.to_path_buf(),
                source,
            })?;
            return Ok(Delivery::Direct { file_name, bytes });
        }
        let hosted = self.host.upload(artifact, &file_name).await?;
        Ok(Delivery::Hosted {
            url: hosted.url,
            expires_at: hosted.expires_at,
        })
    }
}
