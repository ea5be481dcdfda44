mod error;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::acquire::Acquirer;
use crate::config::PipelineConfig;
use crate::deliver::{ArtifactHost, Delivery, DeliveryResolver, UguuHost};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::scratch::ScratchArea;
use crate::transform::Transcoder;

pub use error::{PipelineError, PipelineResult};
pub use types::{MediaKind, MediaUpload};

/// Sequences acquisition, transformation and delivery for one job at a
/// time, owning the job's scratch directory for its whole lifetime. No
/// stage is retried; every failure is mapped into [`PipelineError`] after
/// scratch release. Methods take `&self` and independent jobs may run
/// concurrently from separate tasks.
pub struct MediaPipeline {
    config: Arc<PipelineConfig>,
    acquirer: Acquirer,
    transcoder: Transcoder,
    resolver: DeliveryResolver,
}

impl MediaPipeline {
    /// Production assembly: real subprocesses and the configured hosting
    /// endpoint.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let host = UguuHost::new(config.hosting.clone())?;
        Ok(Self::assemble(
            config,
            Arc::new(SystemCommandExecutor),
            Arc::new(host),
        ))
    }

    /// Assembly with explicit process and hosting seams.
    pub fn assemble(
        config: PipelineConfig,
        executor: Arc<dyn CommandExecutor>,
        host: Arc<dyn ArtifactHost>,
    ) -> Self {
        let acquirer = Acquirer::new(
            config.tools.clone(),
            config.limits.clone(),
            config.acquire.clone(),
            Arc::clone(&executor),
        );
        let transcoder = Transcoder::new(config.tools.ffmpeg.clone(), executor);
        let resolver = DeliveryResolver::new(config.limits.direct_channel_cap_bytes, host);
        Self {
            config: Arc::new(config),
            acquirer,
            transcoder,
            resolver,
        }
    }

    /// Fetch a remote asset under the family budget and deliver it.
    pub async fn download(&self, url: &str) -> PipelineResult<Delivery> {
        let mut scratch = self.allocate().await?;
        let outcome = self.download_inner(url, &scratch).await;
        scratch.release().await;
        outcome
    }

    /// Turn an uploaded video or image into a GIF that fits the direct
    /// channel, shrinking iteratively; oversized best-effort output falls
    /// back to hosted delivery.
    pub async fn render_gif(&self, upload: &MediaUpload) -> PipelineResult<Delivery> {
        if upload.kind() == MediaKind::Unsupported {
            return Err(PipelineError::InvalidInput(
                "expected a video or image upload".to_string(),
            ));
        }
        let mut scratch = self.allocate().await?;
        let outcome = self.render_gif_inner(upload, &scratch).await;
        scratch.release().await;
        outcome
    }

    /// Re-encode an uploaded video with heavy quantization.
    pub async fn degrade(&self, upload: &MediaUpload) -> PipelineResult<Delivery> {
        if upload.kind() != MediaKind::Video {
            return Err(PipelineError::InvalidInput(
                "expected a video upload".to_string(),
            ));
        }
        let mut scratch = self.allocate().await?;
        let outcome = self.degrade_inner(upload, &scratch).await;
        scratch.release().await;
        outcome
    }

    async fn download_inner(&self, url: &str, scratch: &ScratchArea) -> PipelineResult<Delivery> {
        let family = self.acquirer.classify(url);
        info!(url, ?family, "starting download job");
        let media = self.acquirer.acquire(url, scratch, family).await?;
        info!(size = media.size_bytes, format_id = %media.format_id, "acquisition complete");
        Ok(self.resolver.resolve(&media.path).await?)
    }

    async fn render_gif_inner(
        &self,
        upload: &MediaUpload,
        scratch: &ScratchArea,
    ) -> PipelineResult<Delivery> {
        let input = self.spool(upload, scratch).await?;
        let budget = self.config.limits.direct_channel_cap_bytes;
        let report = self
            .transcoder
            .shrink_to_fit(&input, scratch, budget, &self.config.gif)
            .await?;
        if !report.budget_met {
            warn!(
                size = report.size_bytes,
                budget, "gif still over budget at scale floor, delivering best effort"
            );
        }
        Ok(self.resolver.resolve(&report.path).await?)
    }

    async fn degrade_inner(
        &self,
        upload: &MediaUpload,
        scratch: &ScratchArea,
    ) -> PipelineResult<Delivery> {
        let input = self.spool(upload, scratch).await?;
        let output = scratch.file("mp4");
        let size = self
            .transcoder
            .convert(&input, &output, &self.config.degrade)
            .await?;
        info!(size, "degrade pass complete");
        Ok(self.resolver.resolve(&output).await?)
    }

    async fn allocate(&self) -> PipelineResult<ScratchArea> {
        Ok(ScratchArea::allocate(
            Path::new(&self.config.paths.scratch_dir),
            &self.config.system.branding,
        )
        .await?)
    }

    /// Copies the upload into the job's scratch area under a branded name.
    async fn spool(&self, upload: &MediaUpload, scratch: &ScratchArea) -> PipelineResult<PathBuf> {
        let path = scratch.file(upload.extension());
        fs::write(&path, &upload.bytes)
            .await
            .map_err(|source| PipelineError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}
