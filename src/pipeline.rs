//! Primary/fallback frame extraction.
//!
//! The primary path seeks and decodes each sample timestamp on a worker
//! pool. It ends in an [`ExtractionOutcome`]: either the frames, or the
//! reason the fallback path must run instead. The fallback path runs the
//! external transcoder once over the whole file and reads its numbered
//! output back in name order.
//!
//! ```text
//! primary ─┬─ frames ───────────────────────────────► done
//!          ├─ source not openable ─┐
//!          └─ zero frames ─────────┴─► fallback ─┬─► done
//!                                                └─► NoFramesExtracted
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::configuration::{ExtractOptions, FrameSize};
use crate::decoder::VideoBackend;
use crate::error::BifError;
use crate::parallel::{self, SampledFrame};
use crate::progress::{OperationType, ProgressTracker};
use crate::tool::{MediaTool, StreamExtractRequest};

/// Why the primary path handed over to the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The decoder could not open the source.
    OpenFailed(String),
    /// Every sample was dropped, or there were none.
    NoFrames,
}

/// Result of the primary extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// At least one frame, sorted by timestamp.
    Succeeded(Vec<SampledFrame>),
    /// The fallback path must produce the frames.
    NeedsFallback(FallbackReason),
}

/// Which path produced an extraction's frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    /// Parallel seek-and-decode.
    Primary,
    /// Streaming transcode.
    Fallback,
}

/// Frames produced by [`ExtractionPipeline::extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Encoded JPEGs in timestamp order.
    pub frames: Vec<Vec<u8>>,
    /// Path that produced them.
    pub path: ExtractionPath,
    /// Sample timestamps with no frame.
    pub dropped: usize,
}

/// Runs the primary path with a [`VideoBackend`] and the fallback path
/// with an optional [`MediaTool`].
#[derive(Debug, Clone)]
pub struct ExtractionPipeline<B, T> {
    backend: B,
    tool: Option<T>,
}

impl<B: VideoBackend, T: MediaTool> ExtractionPipeline<B, T> {
    /// Pipeline with a fallback tool.
    pub fn new(backend: B, tool: T) -> Self {
        Self {
            backend,
            tool: Some(tool),
        }
    }

    /// Pipeline that has no fallback path.
    pub fn without_fallback(backend: B) -> Self {
        Self {
            backend,
            tool: None,
        }
    }

    /// The decoder backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The fallback tool, if any.
    pub fn tool(&self) -> Option<&T> {
        self.tool.as_ref()
    }

    /// Extract one JPEG per timestamp, falling back to the transcoder when
    /// the primary path cannot open the source or yields nothing.
    ///
    /// # Errors
    ///
    /// [`BifError::NoFramesExtracted`] when both paths come up empty and
    /// [`BifError::Cancelled`] if the run was cancelled.
    pub fn extract(
        &self,
        path: &Path,
        timestamps: &[u64],
        size: FrameSize,
        options: &ExtractOptions,
    ) -> Result<Extraction, BifError> {
        let reason = match self.run_primary(path, timestamps, size, options)? {
            ExtractionOutcome::Succeeded(frames) => {
                let dropped = timestamps.len().saturating_sub(frames.len());
                if dropped > 0 {
                    log::warn!("{dropped} of {} samples could not be read", timestamps.len());
                }
                log::info!("Extracted {} frames with the decoder", frames.len());
                return Ok(Extraction {
                    frames: frames.into_iter().map(|frame| frame.jpeg).collect(),
                    path: ExtractionPath::Primary,
                    dropped,
                });
            }
            ExtractionOutcome::NeedsFallback(reason) => reason,
        };

        match &reason {
            FallbackReason::OpenFailed(error) => {
                log::warn!("Decoder cannot open {}: {error}; using fallback", path.display())
            }
            FallbackReason::NoFrames => {
                log::warn!("Decoder produced no frames; using fallback")
            }
        }

        let mut frames = match self.run_fallback(path, size, options) {
            Ok(frames) => frames,
            Err(BifError::Cancelled) => return Err(BifError::Cancelled),
            Err(error) => {
                return Err(BifError::NoFramesExtracted {
                    reason: error.to_string(),
                });
            }
        };
        // The transcoder may flush one frame for the partial last interval.
        if !timestamps.is_empty() && frames.len() > timestamps.len() {
            log::debug!(
                "Discarding {} fallback frames past the last sample",
                frames.len() - timestamps.len()
            );
            frames.truncate(timestamps.len());
        }
        if frames.is_empty() {
            return Err(BifError::NoFramesExtracted {
                reason: "fallback extraction produced no frames".to_string(),
            });
        }

        log::info!("Extracted {} frames with the fallback", frames.len());
        Ok(Extraction {
            dropped: timestamps.len().saturating_sub(frames.len()),
            frames,
            path: ExtractionPath::Fallback,
        })
    }

    /// Primary attempt: verify the source opens, then decode in parallel.
    ///
    /// The probe reader is dropped before workers open their own, and the
    /// pool is joined before this returns.
    pub fn run_primary(
        &self,
        path: &Path,
        timestamps: &[u64],
        size: FrameSize,
        options: &ExtractOptions,
    ) -> Result<ExtractionOutcome, BifError> {
        if let Err(error) = self.backend.open(path, options.hardware()) {
            return Ok(ExtractionOutcome::NeedsFallback(FallbackReason::OpenFailed(
                error.to_string(),
            )));
        }

        let frames = parallel::extract_parallel(&self.backend, path, timestamps, size, options)?;
        if frames.is_empty() {
            return Ok(ExtractionOutcome::NeedsFallback(FallbackReason::NoFrames));
        }
        Ok(ExtractionOutcome::Succeeded(frames))
    }

    /// Fallback attempt: one transcoder pass into a scratch directory.
    ///
    /// # Errors
    ///
    /// [`BifError::FallbackUnavailable`] without a tool, or whatever the
    /// tool reports.
    pub fn run_fallback(
        &self,
        path: &Path,
        size: FrameSize,
        options: &ExtractOptions,
    ) -> Result<Vec<Vec<u8>>, BifError> {
        let Some(tool) = &self.tool else {
            return Err(BifError::FallbackUnavailable(
                "no external tool configured".to_string(),
            ));
        };
        if options.is_cancelled() {
            return Err(BifError::Cancelled);
        }

        let scratch = TempDir::with_prefix("bifgen-")?;
        let request = StreamExtractRequest {
            source: path,
            interval_seconds: options.interval(),
            offset_seconds: options.offset(),
            size,
            quality: options.preset().transcoder_quality(),
            hardware: options.hardware(),
        };
        tool.extract_frames(&request, scratch.path())?;

        let files = sorted_jpegs(scratch.path())?;
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FallbackExtraction,
            Some(files.len() as u64),
            options.batch_size,
        );
        let mut frames = Vec::with_capacity(files.len());
        for file in &files {
            frames.push(fs::read(file)?);
            tracker.advance();
        }
        tracker.finish();

        Ok(frames)
    }
}

/// `*.jpg` files in `directory`, sorted by name.
fn sorted_jpegs(directory: &Path) -> Result<Vec<PathBuf>, BifError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let is_jpeg = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("jpg"));
        if is_jpeg && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
