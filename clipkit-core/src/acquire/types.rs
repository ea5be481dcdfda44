use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// Source classification resolved once at job entry. Short-form platforms
/// enforce the direct channel cap at acquisition time because no shrink
/// fallback is applied to downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFamily {
    General,
    ShortForm,
}

impl SourceFamily {
    pub fn classify(url: &str, strict_hosts: &[String]) -> Self {
        let Ok(parsed) = Url::parse(url) else {
            return SourceFamily::General;
        };
        let Some(host) = parsed.host_str() else {
            return SourceFamily::General;
        };
        let matches_suffix = strict_hosts.iter().any(|suffix| {
            host == suffix || host.ends_with(&format!(".{suffix}"))
        });
        if matches_suffix {
            SourceFamily::ShortForm
        } else {
            SourceFamily::General
        }
    }
}

/// One retrievable encoding of a remote asset.
#[derive(Debug, Clone)]
pub struct FormatCandidate {
    pub format_id: String,
    pub extension: String,
    pub size_bytes: Option<u64>,
    pub height: Option<u32>,
    pub bitrate: Option<f64>,
}

impl FormatCandidate {
    /// Ordering key: taller first, then higher total bitrate.
    pub fn quality_key(&self) -> (u32, u64) {
        (
            self.height.unwrap_or(0),
            self.bitrate.unwrap_or(0.0).round() as u64,
        )
    }
}

#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format_id: String,
}

/// Shape of the extractor's `-J` dump. Single-format assets carry the
/// format fields at the top level instead of a `formats` array.
#[derive(Debug, Deserialize)]
pub(crate) struct FormatListing {
    #[serde(default)]
    pub formats: Option<Vec<RawFormat>>,
    #[serde(flatten)]
    pub top: RawFormat,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub height: Option<u32>,
    pub tbr: Option<f64>,
    pub vcodec: Option<String>,
}

impl RawFormat {
    pub fn into_candidate(self) -> Option<FormatCandidate> {
        let format_id = self.format_id?;
        let extension = self.ext.unwrap_or_else(|| "mp4".to_string());
        // Storyboard/audio-only entries are not retrievable as video.
        if extension == "mhtml" {
            return None;
        }
        if matches!(self.vcodec.as_deref(), Some("none")) {
            return None;
        }
        Some(FormatCandidate {
            format_id,
            extension,
            size_bytes: self.filesize.or(self.filesize_approx),
            height: self.height,
            bitrate: self.tbr,
        })
    }
}
