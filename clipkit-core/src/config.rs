use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    pub system: SystemSection,
    pub paths: PathsSection,
    pub tools: ToolsSection,
    pub limits: LimitsSection,
    pub acquire: AcquireSection,
    pub gif: GifSection,
    pub degrade: DegradeSection,
    pub hosting: HostingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemSection {
    /// Prefix stamped on every scratch file and directory so stray
    /// artifacts are identifiable for out-of-band cleanup.
    pub branding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub scratch_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    pub ffmpeg: String,
    pub ytdlp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Largest payload the direct delivery channel accepts.
    pub direct_channel_cap_bytes: u64,
    /// Looser ceiling used when acquiring from general sources; a later
    /// shrink or hosting step may still be applied downstream.
    pub acquire_cap_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcquireSection {
    /// Host suffixes of short-form platforms whose acquisitions must fit
    /// the direct channel cap outright.
    pub strict_hosts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GifSection {
    pub scale: u32,
    pub fps: u32,
    pub trim_seconds: u32,
    pub floor: u32,
    pub shrink_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DegradeSection {
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub fps: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_gain: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostingSection {
    pub endpoint: String,
    pub retention_hours: u32,
}

pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/pipeline.toml");
        let config = load_pipeline_config(path).expect("config should parse");
        assert_eq!(config.system.branding, "clipkit");
        assert_eq!(config.limits.direct_channel_cap_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.acquire_cap_bytes, 128 * 1024 * 1024);
        assert_eq!(config.gif.floor, 64);
        assert!(config.gif.shrink_factor < 1.0);
        assert_eq!(config.hosting.retention_hours, 3);
    }
}
