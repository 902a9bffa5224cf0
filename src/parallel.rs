//! Parallel seek-and-decode extraction.
//!
//! [`extract_parallel`] runs one task per thread of a [`rayon`] pool. Each
//! worker claims chunks of timestamps from a shared cursor, opens its own
//! reader when it claims its first chunk, and reuses that reader until the
//! timestamps run out. Readers are never shared and are dropped when their
//! worker returns. Results are sorted by timestamp before returning.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::ThreadPoolBuilder;

use crate::configuration::{ExtractOptions, FrameSize, Interpolation};
use crate::decoder::{FrameReader, VideoBackend};
use crate::error::BifError;
use crate::imaging;
use crate::progress::{OperationType, ProgressTracker};

/// One extracted thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFrame {
    /// Source position in seconds.
    pub timestamp: u64,
    /// Encoded JPEG bytes.
    pub jpeg: Vec<u8>,
}

/// Extract one JPEG per timestamp on a worker pool of `options.jobs()`
/// threads.
///
/// Timestamps that cannot be read are dropped with a warning. The result
/// is sorted by timestamp.
///
/// # Errors
///
/// [`BifError::WorkerPool`] if the pool cannot be built and
/// [`BifError::Cancelled`] if the token fired during the run.
pub(crate) fn extract_parallel<B: VideoBackend>(
    backend: &B,
    path: &Path,
    timestamps: &[u64],
    size: FrameSize,
    options: &ExtractOptions,
) -> Result<Vec<SampledFrame>, BifError> {
    if timestamps.is_empty() {
        return Ok(Vec::new());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(options.jobs())
        .thread_name(|index| format!("bifgen-worker-{index}"))
        .build()
        .map_err(|error| BifError::WorkerPool(error.to_string()))?;

    let tracker = Mutex::new(ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameExtraction,
        Some(timestamps.len() as u64),
        options.batch_size,
    ));

    let interpolation = options.preset().interpolation();
    let quality = options.preset().jpeg_quality();
    let hardware = options.hardware();
    let chunk = options.chunk_size.max(1);
    let cursor = AtomicUsize::new(0);

    let per_worker: Vec<Vec<SampledFrame>> = pool.broadcast(|_| {
        let mut slot: Option<Result<B::Reader, BifError>> = None;
        let mut frames = Vec::new();
        loop {
            let start = cursor.fetch_add(chunk, Ordering::Relaxed);
            if start >= timestamps.len() || options.is_cancelled() {
                break;
            }
            let end = (start + chunk).min(timestamps.len());
            let reader = slot.get_or_insert_with(|| backend.open(path, hardware));

            for &timestamp in &timestamps[start..end] {
                if options.is_cancelled() {
                    break;
                }
                let frame = match reader.as_mut() {
                    Ok(reader) => extract_one(reader, timestamp, size, interpolation, quality),
                    Err(error) => Err(BifError::FfmpegError(format!(
                        "worker could not open the source: {error}"
                    ))),
                };
                if let Ok(mut tracker) = tracker.lock() {
                    tracker.advance();
                }
                match frame {
                    Ok(frame) => frames.push(frame),
                    Err(error) => log::warn!("Dropping frame at {timestamp} s: {error}"),
                }
            }
        }
        frames
    });

    if let Ok(mut tracker) = tracker.lock() {
        tracker.finish();
    }
    if options.is_cancelled() {
        return Err(BifError::Cancelled);
    }

    let mut frames: Vec<SampledFrame> = per_worker.into_iter().flatten().collect();
    frames.sort_by_key(|frame| frame.timestamp);
    Ok(frames)
}

fn extract_one<R: FrameReader>(
    reader: &mut R,
    timestamp: u64,
    size: FrameSize,
    interpolation: Interpolation,
    quality: u8,
) -> Result<SampledFrame, BifError> {
    reader.seek_ms(timestamp * 1000)?;
    let image = reader
        .read_frame(size, interpolation)?
        .ok_or_else(|| BifError::DecodeFailure("end of stream".to_string()))?;
    let jpeg = imaging::encode_jpeg(&image, quality)?;
    Ok(SampledFrame { timestamp, jpeg })
}
