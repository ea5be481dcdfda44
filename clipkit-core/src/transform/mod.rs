use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::config::{DegradeSection, GifSection};
use crate::exec::{truncate_diagnostic, CommandExecutor};
use crate::scratch::ScratchArea;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("codec tool failed ({command}): {stderr}")]
    CommandFailure {
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

pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Outcome of an iterative shrink. `budget_met == false` means the scale
/// floor was reached first and the artifact is a best-effort result that
/// still exceeds the budget.
#[derive(Debug, Clone)]
pub struct ShrinkReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub scales_tried: Vec<u32>,
    pub budget_met: bool,
}

/// Drives the external codec tool for both transform kinds: the
/// fixed-parameter degrade pass and the palette-based GIF shrink loop.
pub struct Transcoder {
    ffmpeg: String,
    executor: Arc<dyn CommandExecutor>,
}

impl Transcoder {
    pub fn new(ffmpeg: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            executor,
        }
    }

    /// Single fixed-parameter pass: even dimensions, capped frame rate,
    /// heavy quantization, low-bitrate boosted audio.
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &DegradeSection,
    ) -> TranscodeResult<u64> {
        let filter = format!(
            "scale=trunc(iw/2/2)*2:trunc(ih/2/2)*2,fps={}",
            params.fps
        );
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(&filter)
            .arg("-c:v")
            .arg(&params.video_codec)
            .arg("-preset")
            .arg(&params.preset)
            .arg("-crf")
            .arg(params.crf.to_string())
            .arg("-c:a")
            .arg(&params.audio_codec)
            .arg("-b:a")
            .arg(&params.audio_bitrate)
            .arg("-af")
            .arg(format!("volume={}", params.audio_gain))
            .arg(output);
        self.run(&mut command).await?;
        self.measure(output).await
    }

    /// Two-phase GIF synthesis: a palette from a time-trimmed sample, then
    /// palette-based encodes at progressively smaller scales until the
    /// output fits the budget or the scale floor is reached.
    pub async fn shrink_to_fit(
        &self,
        input: &Path,
        scratch: &ScratchArea,
        budget: u64,
        params: &GifSection,
    ) -> TranscodeResult<ShrinkReport> {
        let palette = scratch.file("png");
        let output = scratch.file("gif");

        let palette_filter = format!(
            "fps={},scale={}:-1:flags=bicubic,palettegen",
            params.fps, params.scale
        );
        let mut palette_cmd = Command::new(&self.ffmpeg);
        palette_cmd
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(params.trim_seconds.to_string())
            .arg("-vf")
            .arg(&palette_filter)
            .arg(&palette);
        self.run(&mut palette_cmd).await?;

        // Scale descends geometrically, so the loop is finite without an
        // explicit counter; the truncated value never drops below floor.
        let mut scale = params.scale as f64;
        let mut scales_tried = vec![params.scale];
        self.encode_gif(input, &palette, &output, params, params.scale)
            .await?;
        loop {
            let size = self.measure(&output).await?;
            if size <= budget {
                debug!(size, scale = scale as u32, "gif fits budget");
                return Ok(ShrinkReport {
                    path: output,
                    size_bytes: size,
                    scales_tried,
                    budget_met: true,
                });
            }
            if scale as u32 <= params.floor {
                debug!(size, floor = params.floor, "scale floor reached, keeping best effort");
                return Ok(ShrinkReport {
                    path: output,
                    size_bytes: size,
                    scales_tried,
                    budget_met: false,
                });
            }
            scale = (scale * params.shrink_factor).max(params.floor as f64);
            let step = scale as u32;
            scales_tried.push(step);
            self.encode_gif(input, &palette, &output, params, step)
                .await?;
        }
    }

    async fn encode_gif(
        &self,
        input: &Path,
        palette: &Path,
        output: &Path,
        params: &GifSection,
        scale: u32,
    ) -> TranscodeResult<()> {
        let filter = format!(
            "fps={},scale={}:-1:flags=bicubic [x]; [x][1:v] paletteuse=dither=none",
            params.fps, scale
        );
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-i")
            .arg(palette)
            .arg("-t")
            .arg(params.trim_seconds.to_string())
            .arg("-lavfi")
            .arg(&filter)
            .arg(output);
        self.run(&mut command).await
    }

    async fn run(&self, command: &mut Command) -> TranscodeResult<()> {
        let output = self
            .executor
            .run(command)
            .await
            .map_err(|source| TranscodeError::Io {
                path: PathBuf::from(&self.ffmpeg),
                source,
            })?;
        if !output.status.success() {
            return Err(TranscodeError::CommandFailure {
                command: self.ffmpeg.clone(),
                status: output.status.code(),
                stderr: truncate_diagnostic(&output.stderr),
            });
        }
        Ok(())
    }

    async fn measure(&self, path: &Path) -> TranscodeResult<u64> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|source| TranscodeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::process::{ExitStatus, Output};
    use std::sync::Mutex;

    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;
    #[cfg(windows)]
    use std::os::windows::process::ExitStatusExt;

    fn gif_params() -> GifSection {
        GifSection {
            scale: 480,
            fps: 15,
            trim_seconds: 10,
            floor: 64,
            shrink_factor: 0.8,
        }
    }

    fn degrade_params() -> DegradeSection {
        DegradeSection {
            video_codec: "libx264".into(),
            preset: "veryfast".into(),
            crf: 42,
            fps: 15,
            audio_codec: "aac".into(),
            audio_bitrate: "16k".into(),
            audio_gain: 5,
        }
    }

    fn command_strings(command: &Command) -> Vec<String> {
        let std = command.as_std();
        let mut parts = vec![std.get_program().to_string_lossy().to_string()];
        parts.extend(
            std.get_args()
                .map(|arg| arg.to_string_lossy().to_string()),
        );
        parts
    }

    fn ok_output() -> Output {
        Output {
            status: ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Fakes ffmpeg: records every invocation and writes the trailing
    /// output-path argument with a size chosen per paletteuse scale.
    struct FfmpegStub {
        calls: Mutex<Vec<Vec<String>>>,
        gif_size: Box<dyn Fn(u32) -> u64 + Send + Sync>,
    }

    impl FfmpegStub {
        fn new(gif_size: impl Fn(u32) -> u64 + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                gif_size: Box::new(gif_size),
            }
        }

        fn scales(&self) -> Vec<u32> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|args| parse_scale(args))
                .collect()
        }
    }

    fn parse_scale(args: &[String]) -> Option<u32> {
        let filter = args
            .iter()
            .position(|arg| arg == "-lavfi")
            .map(|index| &args[index + 1])?;
        let start = filter.find("scale=")? + "scale=".len();
        let rest = &filter[start..];
        let end = rest.find(':')?;
        rest[..end].parse().ok()
    }

    #[async_trait::async_trait]
    impl CommandExecutor for FfmpegStub {
        async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
            let args = command_strings(command);
            let output_path = PathBuf::from(args.last().unwrap());
            if let Some(scale) = parse_scale(&args) {
                let size = (self.gif_size)(scale) as usize;
                std::fs::write(&output_path, vec![0u8; size])?;
            } else {
                // palette pass
                std::fs::write(&output_path, b"palette")?;
            }
            self.calls.lock().unwrap().push(args);
            Ok(ok_output())
        }
    }

    #[tokio::test]
    async fn shrink_descends_to_floor_on_stubborn_input() {
        let base = TempDir::new().unwrap();
        let scratch = ScratchArea::allocate(base.path(), "clipkit").await.unwrap();
        let input = scratch.file("mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        // Output never fits the budget at any scale.
        let stub = Arc::new(FfmpegStub::new(|_| 40_000));
        let transcoder = Transcoder::new("ffmpeg", stub.clone());
        let report = transcoder
            .shrink_to_fit(&input, &scratch, 10_000, &gif_params())
            .await
            .unwrap();

        assert!(!report.budget_met);
        assert_eq!(
            report.scales_tried,
            vec![480, 384, 307, 245, 196, 157, 125, 100, 80, 64]
        );
        assert_eq!(stub.scales(), report.scales_tried);
        // Bounded descent: at most ten encodes, none below the floor.
        assert!(report.scales_tried.len() <= 10);
        assert!(report.scales_tried.iter().all(|&s| s >= 64));
        assert!(report
            .scales_tried
            .windows(2)
            .all(|pair| pair[1] <= pair[0]));
    }

    #[tokio::test]
    async fn shrink_stops_once_budget_is_met() {
        let base = TempDir::new().unwrap();
        let scratch = ScratchArea::allocate(base.path(), "clipkit").await.unwrap();
        let input = scratch.file("mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        // Size tracks the encode area, so the third scale fits the budget.
        let stub = Arc::new(FfmpegStub::new(|scale| (scale as u64).pow(2) / 10));
        let transcoder = Transcoder::new("ffmpeg", stub.clone());
        let report = transcoder
            .shrink_to_fit(&input, &scratch, 10_000, &gif_params())
            .await
            .unwrap();

        assert!(report.budget_met);
        assert_eq!(report.scales_tried, vec![480, 384, 307]);
        assert!(report.size_bytes <= 10_000);
    }

    #[tokio::test]
    async fn shrink_returns_immediately_when_first_encode_fits() {
        let base = TempDir::new().unwrap();
        let scratch = ScratchArea::allocate(base.path(), "clipkit").await.unwrap();
        let input = scratch.file("mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let stub = Arc::new(FfmpegStub::new(|_| 1024));
        let transcoder = Transcoder::new("ffmpeg", stub.clone());
        let report = transcoder
            .shrink_to_fit(&input, &scratch, 10 * 1024 * 1024, &gif_params())
            .await
            .unwrap();

        assert!(report.budget_met);
        assert_eq!(report.scales_tried, vec![480]);
        // One palette pass plus one encode.
        assert_eq!(stub.calls.lock().unwrap().len(), 2);
    }

    struct FailingExecutor {
        stderr: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl CommandExecutor for FailingExecutor {
        async fn run(&self, _command: &mut Command) -> std::io::Result<Output> {
            Ok(Output {
                status: ExitStatus::from_raw(if cfg!(unix) { 1 << 8 } else { 1 }),
                stdout: Vec::new(),
                stderr: self.stderr.clone(),
            })
        }
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_truncated_stderr() {
        let base = TempDir::new().unwrap();
        let scratch = ScratchArea::allocate(base.path(), "clipkit").await.unwrap();
        let input = scratch.file("mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let stub = Arc::new(FailingExecutor {
            stderr: "x".repeat(5000).into_bytes(),
        });
        let transcoder = Transcoder::new("ffmpeg", stub);
        let err = transcoder
            .shrink_to_fit(&input, &scratch, 10 * 1024 * 1024, &gif_params())
            .await
            .unwrap_err();
        match err {
            TranscodeError::CommandFailure { stderr, status, .. } => {
                assert_eq!(stderr.len(), crate::exec::MAX_DIAGNOSTIC_LEN);
                assert_eq!(status, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    struct RecordingExecutor {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
            let args = command_strings(command);
            let output_path = PathBuf::from(args.last().unwrap());
            std::fs::write(&output_path, b"converted")?;
            self.calls.lock().unwrap().push(args);
            Ok(ok_output())
        }
    }

    #[tokio::test]
    async fn convert_builds_expected_invocation() {
        let base = TempDir::new().unwrap();
        let scratch = ScratchArea::allocate(base.path(), "clipkit").await.unwrap();
        let input = scratch.file("mp4");
        let output = scratch.file("mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let stub = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let transcoder = Transcoder::new("ffmpeg", stub.clone());
        let size = transcoder
            .convert(&input, &output, &degrade_params())
            .await
            .unwrap();
        assert_eq!(size, "converted".len() as u64);

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        assert_eq!(args[0], "ffmpeg");
        let filter_index = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[filter_index + 1],
            "scale=trunc(iw/2/2)*2:trunc(ih/2/2)*2,fps=15"
        );
        for expected in ["-c:v", "libx264", "-crf", "42", "-b:a", "16k", "volume=5"] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
    }
}
