//! Video probing.
//!
//! [`probe`] reads frame dimensions and duration from a video. It first
//! opens the file with the decoder backend; if that fails it asks the
//! external media tool for a JSON stream report. A source neither path can
//! read is rejected with [`BifError::InvalidSource`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bifgen::{FfmpegBackend, FfmpegTool, HardwareAccelerationMode, probe};
//!
//! let tool = FfmpegTool::default();
//! let result = probe(
//!     &FfmpegBackend,
//!     Some(&tool),
//!     Path::new("movie.mp4"),
//!     HardwareAccelerationMode::Auto,
//! )?;
//! println!("{}x{} for {} s", result.width, result.height, result.duration_seconds);
//! # Ok::<(), bifgen::BifError>(())
//! ```

use std::path::Path;

use serde_json::Value;

use crate::decoder::{FrameReader, StreamInfo, VideoBackend};
use crate::error::BifError;
use crate::hardware_acceleration::HardwareAccelerationMode;
use crate::tool::MediaTool;

/// Dimensions and duration of a source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// `width / height`.
    pub aspect: f64,
    /// Duration in whole seconds.
    pub duration_seconds: u64,
    /// Duration in milliseconds, a whole number of seconds.
    pub duration_ms: u64,
}

impl ProbeResult {
    /// Build a result from dimensions and a duration in seconds.
    ///
    /// Negative or non-finite durations become 0.
    pub fn new(width: u32, height: u32, duration: f64) -> Self {
        let duration_seconds = if duration.is_finite() && duration > 0.0 {
            duration as u64
        } else {
            0
        };
        let aspect = if height > 0 {
            f64::from(width) / f64::from(height)
        } else {
            0.0
        };
        Self {
            width,
            height,
            aspect,
            duration_seconds,
            duration_ms: duration_seconds * 1000,
        }
    }

    /// Derive the result from decoder stream info.
    ///
    /// Duration is `frame_count / fps`, or 0 if either is not positive.
    pub fn from_stream_info(info: &StreamInfo) -> Self {
        let duration = if info.frames_per_second > 0.0 && info.frame_count > 0 {
            info.frame_count as f64 / info.frames_per_second
        } else {
            0.0
        };
        Self::new(info.width, info.height, duration)
    }
}

/// Probe `path`, falling back to the external tool if the backend cannot
/// open it.
///
/// # Errors
///
/// [`BifError::InvalidSource`] when no path yields a usable result.
pub fn probe<B, T>(
    backend: &B,
    tool: Option<&T>,
    path: &Path,
    hardware: HardwareAccelerationMode,
) -> Result<ProbeResult, BifError>
where
    B: VideoBackend,
    T: MediaTool,
{
    let primary_error = match backend.open(path, hardware) {
        Ok(reader) => {
            let result = ProbeResult::from_stream_info(&reader.stream_info());
            log::debug!("Probed {} with the decoder: {result:?}", path.display());
            return Ok(result);
        }
        Err(error) => error,
    };
    log::debug!(
        "Decoder could not open {}: {primary_error}",
        path.display()
    );

    let Some(tool) = tool else {
        return Err(BifError::InvalidSource {
            path: path.to_path_buf(),
            reason: primary_error.to_string(),
        });
    };

    match tool.probe(path) {
        Ok(result) if result.width > 0 && result.height > 0 && result.duration_seconds > 0 => {
            log::info!("Probed {} with the external tool", path.display());
            Ok(result)
        }
        Ok(result) => Err(BifError::InvalidSource {
            path: path.to_path_buf(),
            reason: format!(
                "probe report has no usable video ({}x{}, {} s)",
                result.width, result.height, result.duration_seconds
            ),
        }),
        Err(error) => Err(BifError::InvalidSource {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }),
    }
}

/// Parse an `ffprobe -print_format json -show_streams -show_format` report.
///
/// Uses the first video stream's `width`/`height` and the container's
/// `format.duration`, falling back to the stream's own `duration`. Returns
/// `None` when the report is malformed or holds no video stream.
pub fn parse_probe_report(report: &[u8]) -> Option<ProbeResult> {
    let root: Value = serde_json::from_slice(report).ok()?;

    let stream = root
        .get("streams")?
        .as_array()?
        .iter()
        .find(|stream| stream.get("codec_type").and_then(Value::as_str) == Some("video"))?;

    let width = stream.get("width").and_then(Value::as_u64)? as u32;
    let height = stream.get("height").and_then(Value::as_u64)? as u32;

    let duration = root
        .get("format")
        .and_then(|format| format.get("duration"))
        .and_then(number_or_string)
        .or_else(|| stream.get("duration").and_then(number_or_string))
        .unwrap_or(0.0);

    Some(ProbeResult::new(width, height, duration))
}

/// ffprobe writes most numbers as JSON strings.
fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_frames_over_rate() {
        let info = StreamInfo {
            width: 1920,
            height: 1080,
            frames_per_second: 25.0,
            frame_count: 2375,
        };
        let result = ProbeResult::from_stream_info(&info);
        assert_eq!(result.duration_seconds, 95);
        assert_eq!(result.duration_ms, 95_000);
        assert!((result.aspect - 16.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn zero_rate_gives_zero_duration() {
        let info = StreamInfo {
            width: 640,
            height: 480,
            frames_per_second: 0.0,
            frame_count: 100,
        };
        assert_eq!(ProbeResult::from_stream_info(&info).duration_seconds, 0);
    }

    #[test]
    fn report_parsing_reads_string_duration() {
        let report = br#"{
            "streams": [
                {"codec_type": "audio", "sample_rate": "48000"},
                {"codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let result = parse_probe_report(report).unwrap();
        assert_eq!((result.width, result.height), (1280, 720));
        assert_eq!(result.duration_seconds, 12);
        assert_eq!(result.duration_ms, 12_000);
    }

    #[test]
    fn report_without_video_is_rejected() {
        let report = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_probe_report(report).is_none());
        assert!(parse_probe_report(b"not json").is_none());
    }
}
