//! Shared test doubles.
//!
//! [`SyntheticBackend`] produces solid-colour frames whose shade depends on
//! the second they were read at, so extracted thumbnails can be matched to
//! their timestamps. [`ScriptedTool`] stands in for the `ffmpeg` CLI.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use bifgen::{
    BifError, FrameReader, FrameSize, HardwareAccelerationMode, Interpolation, MediaTool,
    ProbeResult, StreamExtractRequest, StreamInfo, VideoBackend,
};
use image::{Rgb, RgbImage};

/// Colour of the synthetic frame shown during `second`.
pub fn shade(second: u64) -> Rgb<u8> {
    let value = ((second * 20) % 256) as u8;
    Rgb([value, 255 - value, value / 2])
}

/// Solid frame for `second` at `size`.
pub fn frame_at(second: u64, size: FrameSize) -> RgbImage {
    RgbImage::from_pixel(size.width, size.height, shade(second))
}

/// In-process video source.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    pub width: u32,
    pub height: u32,
    pub frames_per_second: f64,
    pub duration_seconds: u64,
    /// Reject every `open` call.
    pub fail_open: bool,
    /// Seconds whose frames fail to decode.
    pub unreadable: HashSet<u64>,
    /// Number of successful opens.
    pub opens: Arc<AtomicUsize>,
}

impl SyntheticBackend {
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            width: 1920,
            height: 1080,
            frames_per_second: 25.0,
            duration_seconds,
            fail_open: false,
            unreadable: HashSet::new(),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0)
        }
    }

    pub fn with_unreadable(mut self, seconds: impl IntoIterator<Item = u64>) -> Self {
        self.unreadable.extend(seconds);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VideoBackend for SyntheticBackend {
    type Reader = SyntheticReader;

    fn open(
        &self,
        path: &Path,
        _hardware: HardwareAccelerationMode,
    ) -> Result<SyntheticReader, BifError> {
        if self.fail_open {
            return Err(BifError::FfmpegError(format!(
                "cannot open {}",
                path.display()
            )));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticReader {
            backend: self.clone(),
            position_ms: 0,
        })
    }
}

pub struct SyntheticReader {
    backend: SyntheticBackend,
    position_ms: u64,
}

impl FrameReader for SyntheticReader {
    fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            width: self.backend.width,
            height: self.backend.height,
            frames_per_second: self.backend.frames_per_second,
            frame_count: (self.backend.duration_seconds as f64 * self.backend.frames_per_second)
                as u64,
        }
    }

    fn seek_ms(&mut self, millis: u64) -> Result<(), BifError> {
        self.position_ms = millis;
        Ok(())
    }

    fn read_frame(
        &mut self,
        size: FrameSize,
        _interpolation: Interpolation,
    ) -> Result<Option<RgbImage>, BifError> {
        let second = self.position_ms / 1000;
        if second >= self.backend.duration_seconds {
            return Ok(None);
        }
        // Uneven work so completion order differs from submission order.
        thread::sleep(Duration::from_millis((second * 7) % 5));
        if self.backend.unreadable.contains(&second) {
            return Err(BifError::DecodeFailure(format!("corrupt frame at {second}s")));
        }
        self.position_ms += (1000.0 / self.backend.frames_per_second) as u64;
        Ok(Some(frame_at(second, size)))
    }
}

/// What [`ScriptedTool::extract_frames`] does.
#[derive(Debug, Clone)]
pub enum ToolScript {
    /// Behave as if the executable is missing.
    Unavailable,
    /// Exit with an error.
    Fails,
    /// Write these JPEG payloads as numbered frames.
    Frames(Vec<Vec<u8>>),
}

/// Stand-in for the command-line transcoder.
#[derive(Debug, Clone)]
pub struct ScriptedTool {
    pub script: ToolScript,
    pub probe_result: Option<ProbeResult>,
    pub extract_calls: Arc<AtomicUsize>,
}

impl ScriptedTool {
    pub fn new(script: ToolScript) -> Self {
        Self {
            script,
            probe_result: None,
            extract_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_probe(mut self, result: ProbeResult) -> Self {
        self.probe_result = Some(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

impl MediaTool for ScriptedTool {
    fn probe(&self, _path: &Path) -> Result<ProbeResult, BifError> {
        match (&self.script, self.probe_result) {
            (ToolScript::Unavailable, _) => {
                Err(BifError::FallbackUnavailable("ffprobe not found".to_string()))
            }
            (_, Some(result)) => Ok(result),
            (_, None) => Err(BifError::ToolFailed {
                tool: "ffprobe".to_string(),
                reason: "exit status: 1".to_string(),
            }),
        }
    }

    fn extract_frames(
        &self,
        _request: &StreamExtractRequest<'_>,
        output_dir: &Path,
    ) -> Result<(), BifError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            ToolScript::Unavailable => {
                Err(BifError::FallbackUnavailable("ffmpeg not found".to_string()))
            }
            ToolScript::Fails => Err(BifError::ToolFailed {
                tool: "ffmpeg".to_string(),
                reason: "exit status: 1".to_string(),
            }),
            ToolScript::Frames(frames) => {
                // Written last-first; readers must sort by name.
                for (index, frame) in frames.iter().enumerate().rev() {
                    let name = format!("frame-{:06}.jpg", index + 1);
                    fs::write(output_dir.join(name), frame)?;
                }
                fs::write(output_dir.join("ffmpeg.log"), b"not a frame")?;
                Ok(())
            }
        }
    }
}

/// A real file the validator can check for existence.
pub fn placeholder_video(directory: &Path) -> std::path::PathBuf {
    let path = directory.join("source.mp4");
    fs::write(&path, b"synthetic").expect("Failed to write placeholder video");
    path
}
