//! External command-line media tool.
//!
//! The fallback path and the secondary probe shell out to `ffmpeg` and
//! `ffprobe`. [`MediaTool`] is the seam; [`FfmpegTool`] runs the real
//! binaries.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::configuration::FrameSize;
use crate::error::BifError;
use crate::hardware_acceleration::HardwareAccelerationMode;
use crate::probe::{self, ProbeResult};

/// File name pattern of frames written by [`MediaTool::extract_frames`].
///
/// Zero padding keeps lexicographic order equal to timestamp order.
pub const FRAME_PATTERN: &str = "frame-%06d.jpg";

/// Parameters for one streaming extraction pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamExtractRequest<'a> {
    /// Source video.
    pub source: &'a Path,
    /// Seconds between emitted frames.
    pub interval_seconds: u32,
    /// Seconds skipped before the first frame.
    pub offset_seconds: u32,
    /// Output frame size.
    pub size: FrameSize,
    /// Quality on the transcoder's inverted scale (2 best, 31 worst).
    pub quality: u8,
    /// Decoder hint forwarded as `-hwaccel`.
    pub hardware: HardwareAccelerationMode,
}

/// A command-line media tool used for probing and streaming extraction.
pub trait MediaTool: Send + Sync {
    /// Probe a video through the tool's structured report.
    fn probe(&self, path: &Path) -> Result<ProbeResult, BifError>;

    /// Decode the source once and write one JPEG per interval into
    /// `output_dir`, named after [`FRAME_PATTERN`].
    ///
    /// # Errors
    ///
    /// [`BifError::FallbackUnavailable`] if the tool is not installed.
    fn extract_frames(
        &self,
        request: &StreamExtractRequest<'_>,
        output_dir: &Path,
    ) -> Result<(), BifError>;
}

/// Runs the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTool {
    /// Use specific executables instead of the ones on `PATH`.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Arguments for a streaming extraction into `output_dir`.
    pub fn extract_arguments(
        request: &StreamExtractRequest<'_>,
        output_dir: &Path,
    ) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();

        if let Some(device) = request.hardware.transcoder_argument() {
            arguments.push("-hwaccel".into());
            arguments.push(device.into());
        }

        arguments.push("-ss".into());
        arguments.push(request.offset_seconds.to_string().into());
        arguments.push("-i".into());
        arguments.push(request.source.as_os_str().to_owned());
        arguments.push("-vf".into());
        arguments.push(
            format!(
                "fps=1/{}:round=up,scale={}:{}",
                request.interval_seconds, request.size.width, request.size.height
            )
            .into(),
        );
        arguments.push("-q:v".into());
        arguments.push(request.quality.to_string().into());
        arguments.push(output_dir.join(FRAME_PATTERN).into_os_string());
        arguments
    }
}

impl MediaTool for FfmpegTool {
    fn probe(&self, path: &Path) -> Result<ProbeResult, BifError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path);
        let output = run(&mut command, "ffprobe")?;

        probe::parse_probe_report(&output.stdout).ok_or_else(|| BifError::ToolFailed {
            tool: "ffprobe".to_string(),
            reason: "report holds no video stream".to_string(),
        })
    }

    fn extract_frames(
        &self,
        request: &StreamExtractRequest<'_>,
        output_dir: &Path,
    ) -> Result<(), BifError> {
        let mut command = Command::new(&self.ffmpeg);
        command.args(Self::extract_arguments(request, output_dir));
        log::debug!("Running {command:?}");
        run(&mut command, "ffmpeg").map(|_| ())
    }
}

fn run(command: &mut Command, tool: &str) -> Result<Output, BifError> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|error| match error.kind() {
            ErrorKind::NotFound => BifError::FallbackUnavailable(format!("{tool} not found")),
            _ => BifError::IoError(error),
        })?;

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = match stderr.trim().lines().last() {
        Some(line) => format!("{} ({line})", output.status),
        None => output.status.to_string(),
    };
    Err(BifError::ToolFailed {
        tool: tool.to_string(),
        reason,
    })
}
