//! Video to BIF in one call.

use std::path::{Path, PathBuf};

use crate::bif;
use crate::configuration::{ExtractOptions, FrameSize};
use crate::decoder::VideoBackend;
use crate::error::BifError;
use crate::pipeline::{ExtractionPath, ExtractionPipeline};
use crate::probe::{self, ProbeResult};
use crate::sampler;
use crate::tool::MediaTool;

/// What [`generate_bif`] produced.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    /// Probed source properties.
    pub probe: ProbeResult,
    /// Size of every thumbnail.
    pub frame_size: FrameSize,
    /// Timestamps that were requested.
    pub sampled: usize,
    /// Images written.
    pub frames: usize,
    /// Requested timestamps with no image.
    pub dropped: usize,
    /// Path that produced the images.
    pub path: ExtractionPath,
    /// Destination file.
    pub output: PathBuf,
    /// Size of the written file.
    pub bytes_written: u64,
}

/// Probe, sample, extract, and write `output`.
///
/// # Errors
///
/// [`BifError::InvalidInterval`] for a zero interval,
/// [`BifError::InvalidSource`] if the video cannot be probed, and
/// [`BifError::NoFramesExtracted`] if neither extraction path produced an
/// image.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use bifgen::{ExtractOptions, ExtractionPipeline, FfmpegBackend, FfmpegTool, generate_bif};
///
/// let pipeline = ExtractionPipeline::new(FfmpegBackend, FfmpegTool::default());
/// let summary = generate_bif(
///     &pipeline,
///     Path::new("movie.mkv"),
///     Path::new("movie-HD.bif"),
///     &ExtractOptions::new(),
/// )?;
/// println!("{} frames", summary.frames);
/// # Ok::<(), bifgen::BifError>(())
/// ```
pub fn generate_bif<B, T>(
    pipeline: &ExtractionPipeline<B, T>,
    video: &Path,
    output: &Path,
    options: &ExtractOptions,
) -> Result<GenerationSummary, BifError>
where
    B: VideoBackend,
    T: MediaTool,
{
    if options.interval() == 0 {
        return Err(BifError::InvalidInterval);
    }

    let probe = probe::probe(pipeline.backend(), pipeline.tool(), video, options.hardware())?;
    let frame_size = options.resolution().frame_size(probe.aspect);
    log::info!(
        "{}: {}x{}, {} s, thumbnails {}x{}",
        video.display(),
        probe.width,
        probe.height,
        probe.duration_seconds,
        frame_size.width,
        frame_size.height
    );

    let timestamps =
        sampler::sample_timestamps(probe.duration_seconds, options.interval(), options.offset())?;
    let extraction = pipeline.extract(video, &timestamps, frame_size, options)?;
    let bytes_written = bif::write_bif(output, &extraction.frames, options.interval())?;

    Ok(GenerationSummary {
        probe,
        frame_size,
        sampled: timestamps.len(),
        frames: extraction.frames.len(),
        dropped: extraction.dropped,
        path: extraction.path,
        output: output.to_path_buf(),
        bytes_written,
    })
}
