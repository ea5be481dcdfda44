mod error;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{AcquireSection, LimitsSection, ToolsSection};
use crate::exec::{truncate_diagnostic, CommandExecutor};
use crate::scratch::ScratchArea;

pub use error::{AcquireError, AcquireResult};
pub use types::{AcquiredMedia, FormatCandidate, SourceFamily};

use types::FormatListing;

/// Fetches a remote asset under a byte budget, picking among the source's
/// advertised encodings, and normalizes the result to MP4.
pub struct Acquirer {
    tools: ToolsSection,
    limits: LimitsSection,
    strict_hosts: Vec<String>,
    executor: Arc<dyn CommandExecutor>,
}

impl Acquirer {
    pub fn new(
        tools: ToolsSection,
        limits: LimitsSection,
        acquire: AcquireSection,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            tools,
            limits,
            strict_hosts: acquire.strict_hosts,
            executor,
        }
    }

    pub fn classify(&self, url: &str) -> SourceFamily {
        SourceFamily::classify(url, &self.strict_hosts)
    }

    pub async fn acquire(
        &self,
        url: &str,
        scratch: &ScratchArea,
        family: SourceFamily,
    ) -> AcquireResult<AcquiredMedia> {
        let budget = match family {
            SourceFamily::ShortForm => self.limits.direct_channel_cap_bytes,
            SourceFamily::General => self.limits.acquire_cap_bytes,
        };
        let candidates = self.list_formats(url).await?;
        let pick = match best_within(&candidates, budget) {
            Some(candidate) => candidate.clone(),
            None if family == SourceFamily::General => {
                // Sizes are often unreported for general sources; take the
                // overall best and let shrink/hosting absorb any overage.
                overall_best(&candidates)
                    .cloned()
                    .ok_or_else(|| AcquireError::NoEligibleFormat {
                        url: url.to_string(),
                        cap_bytes: budget,
                    })?
            }
            None => {
                return Err(AcquireError::NoEligibleFormat {
                    url: url.to_string(),
                    cap_bytes: budget,
                })
            }
        };
        debug!(url, format_id = %pick.format_id, "selected format candidate");

        let mut media = self.fetch_and_normalize(url, &pick, scratch).await?;

        // Advertised sizes are estimates; a strict-family retrieval can
        // still land over the cap.
        if family == SourceFamily::ShortForm && media.size_bytes > budget {
            warn!(
                url,
                size = media.size_bytes,
                cap = budget,
                "retrieved file exceeds strict cap, re-selecting"
            );
            let retry = largest_within(&candidates, budget, &pick.format_id)
                .cloned()
                .ok_or_else(|| AcquireError::NoEligibleFormat {
                    url: url.to_string(),
                    cap_bytes: budget,
                })?;
            self.remove_artifact(&media.path).await;
            media = self.fetch_and_normalize(url, &retry, scratch).await?;
            if media.size_bytes > budget {
                self.remove_artifact(&media.path).await;
                return Err(AcquireError::NoEligibleFormat {
                    url: url.to_string(),
                    cap_bytes: budget,
                });
            }
        }

        Ok(media)
    }

    async fn list_formats(&self, url: &str) -> AcquireResult<Vec<FormatCandidate>> {
        let mut command = Command::new(&self.tools.ytdlp);
        command
            .arg("-J")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(url);
        let output = self
            .executor
            .run(&mut command)
            .await
            .map_err(|err| AcquireError::Extraction(err.to_string()))?;
        if !output.status.success() {
            return Err(AcquireError::Extraction(truncate_diagnostic(
                &output.stderr,
            )));
        }
        let listing: FormatListing = serde_json::from_slice(&output.stdout)
            .map_err(|err| AcquireError::Extraction(format!("unreadable format listing: {err}")))?;
        let FormatListing { formats, top } = listing;
        let raw = formats.unwrap_or_else(|| vec![top]);
        let candidates: Vec<FormatCandidate> = raw
            .into_iter()
            .filter_map(|format| format.into_candidate())
            .collect();
        if candidates.is_empty() {
            return Err(AcquireError::Extraction(
                "source advertised no retrievable formats".to_string(),
            ));
        }
        Ok(candidates)
    }

    async fn fetch_and_normalize(
        &self,
        url: &str,
        candidate: &FormatCandidate,
        scratch: &ScratchArea,
    ) -> AcquireResult<AcquiredMedia> {
        let fetched = scratch.file(&candidate.extension);
        let mut command = Command::new(&self.tools.ytdlp);
        command
            .arg("-f")
            .arg(&candidate.format_id)
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&fetched)
            .arg(url);
        let output = self
            .executor
            .run(&mut command)
            .await
            .map_err(|err| AcquireError::Extraction(err.to_string()))?;
        if !output.status.success() {
            return Err(AcquireError::Extraction(truncate_diagnostic(
                &output.stderr,
            )));
        }

        let path = self.normalize_container(&fetched, scratch).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|source| AcquireError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(AcquiredMedia {
            path,
            size_bytes: metadata.len(),
            format_id: candidate.format_id.clone(),
        })
    }

    /// Every acquisition lands as MP4 regardless of source container. MP4
    /// inputs keep their branded path; anything else is stream-copied.
    async fn normalize_container(
        &self,
        fetched: &Path,
        scratch: &ScratchArea,
    ) -> AcquireResult<PathBuf> {
        if fetched.extension().map(|ext| ext == "mp4").unwrap_or(false) {
            return Ok(fetched.to_path_buf());
        }
        let normalized = scratch.file("mp4");
        let mut command = Command::new(&self.tools.ffmpeg);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(fetched)
            .arg("-c")
            .arg("copy")
            .arg(&normalized);
        let output = self
            .executor
            .run(&mut command)
            .await
            .map_err(|source| AcquireError::Io {
                path: normalized.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(AcquireError::PostProcess {
                command: self.tools.ffmpeg.clone(),
                status: output.status.code(),
                stderr: truncate_diagnostic(&output.stderr),
            });
        }
        self.remove_artifact(fetched).await;
        Ok(normalized)
    }

    async fn remove_artifact(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to remove stale artifact");
            }
        }
    }
}

/// Best-quality candidate whose advertised size fits the budget. Candidates
/// without a known size are never eligible here.
fn best_within(candidates: &[FormatCandidate], budget: u64) -> Option<&FormatCandidate> {
    candidates
        .iter()
        .filter(|c| c.size_bytes.map(|size| size <= budget).unwrap_or(false))
        .max_by_key(|c| c.quality_key())
}

fn overall_best(candidates: &[FormatCandidate]) -> Option<&FormatCandidate> {
    candidates.iter().max_by_key(|c| c.quality_key())
}

/// Largest candidate still under the cap, excluding the one already tried.
fn largest_within<'a>(
    candidates: &'a [FormatCandidate],
    budget: u64,
    exclude_id: &str,
) -> Option<&'a FormatCandidate> {
    candidates
        .iter()
        .filter(|c| c.format_id != exclude_id)
        .filter(|c| c.size_bytes.map(|size| size <= budget).unwrap_or(false))
        .max_by_key(|c| c.size_bytes)
}
