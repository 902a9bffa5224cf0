//! BIF fidelity checks against the source video.
//!
//! [`Validator::validate`] samples entries from a BIF file, reads the frame
//! at each entry's timestamp from the video, and compares the two by mean
//! squared error. Failures are recorded per sample; none of them stops the
//! run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bifgen::{FfmpegBackend, ValidateOptions, Validator};
//!
//! let validator = Validator::new(FfmpegBackend);
//! let report = validator.validate(
//!     Path::new("movie-HD.bif"),
//!     Path::new("movie.mkv"),
//!     &ValidateOptions::new(),
//! )?;
//! print!("{report}");
//! if !report.passed() {
//!     std::process::exit(1);
//! }
//! # Ok::<(), bifgen::BifError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use rand::{SeedableRng, rngs::StdRng, seq::index::sample};

use crate::bif::BifReader;
use crate::configuration::{FrameSize, Interpolation, SampleSelection, ValidateOptions};
use crate::decoder::{FrameReader, VideoBackend};
use crate::error::BifError;
use crate::imaging;
use crate::progress::{OperationType, ProgressTracker};

/// What happened to one sampled entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// MSE below the threshold.
    Match {
        /// Mean squared error.
        mse: f64,
    },
    /// MSE at or above the threshold.
    Mismatch {
        /// Mean squared error.
        mse: f64,
    },
    /// The BIF payload is not a readable JPEG.
    DecodeFailure(String),
    /// No frame could be read from the video at the timestamp.
    ReadFailure(String),
}

impl SampleOutcome {
    /// Every outcome except [`Match`](SampleOutcome::Match) counts as a
    /// mismatch.
    pub fn is_mismatch(&self) -> bool {
        !matches!(self, SampleOutcome::Match { .. })
    }

    /// The computed error, if the comparison ran.
    pub fn mse(&self) -> Option<f64> {
        match self {
            SampleOutcome::Match { mse } | SampleOutcome::Mismatch { mse } => Some(*mse),
            _ => None,
        }
    }
}

/// Diagnostics for one sampled entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    /// Entry index in the BIF file.
    pub index: usize,
    /// `index * interval_ms`.
    pub timestamp_ms: u64,
    /// Comparison result.
    pub outcome: SampleOutcome,
}

/// Summary of a validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Entries in the BIF file.
    pub total_entries: usize,
    /// Threshold the samples were held to.
    pub mse_threshold: f64,
    /// One result per checked entry, in check order.
    pub samples: Vec<SampleResult>,
}

impl ValidationReport {
    /// `true` if no checked sample is a mismatch.
    pub fn passed(&self) -> bool {
        self.mismatches() == 0
    }

    /// Number of mismatching samples, failures included.
    pub fn mismatches(&self) -> usize {
        self.samples
            .iter()
            .filter(|sample| sample.outcome.is_mismatch())
            .count()
    }

    /// Number of samples checked.
    pub fn checked(&self) -> usize {
        self.samples.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for sample in &self.samples {
            let seconds = sample.timestamp_ms as f64 / 1000.0;
            match &sample.outcome {
                SampleOutcome::Match { mse } => writeln!(
                    f,
                    "[INFO] frame {} at {seconds:.1}s: MSE {mse:.2}",
                    sample.index
                )?,
                SampleOutcome::Mismatch { mse } => writeln!(
                    f,
                    "[WARN] frame {} at {seconds:.1}s: MSE {mse:.2} (threshold {:.2})",
                    sample.index, self.mse_threshold
                )?,
                SampleOutcome::DecodeFailure(reason) => writeln!(
                    f,
                    "[ERROR] frame {}: cannot decode image: {reason}",
                    sample.index
                )?,
                SampleOutcome::ReadFailure(reason) => writeln!(
                    f,
                    "[ERROR] frame {} at {seconds:.1}s: cannot read video: {reason}",
                    sample.index
                )?,
            }
        }
        if self.total_entries == 0 {
            writeln!(f, "BIF file has no entries.")?;
        }
        writeln!(
            f,
            "{} of {} checked frames mismatched ({} entries total).",
            self.mismatches(),
            self.checked(),
            self.total_entries
        )
    }
}

/// Compares BIF entries with frames read through a [`VideoBackend`].
#[derive(Debug, Clone)]
pub struct Validator<B> {
    backend: B,
}

impl<B: VideoBackend> Validator<B> {
    /// Validator reading the source through `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Check `bif_path` against `video_path`.
    ///
    /// # Errors
    ///
    /// Structural errors from opening the BIF file, and
    /// [`BifError::InvalidSource`] when `video_path` is not a file.
    /// Per-sample failures are reported in the [`ValidationReport`].
    pub fn validate(
        &self,
        bif_path: &Path,
        video_path: &Path,
        options: &ValidateOptions,
    ) -> Result<ValidationReport, BifError> {
        let mut bif = BifReader::open(bif_path)?;
        let mut report = ValidationReport {
            total_entries: bif.len(),
            mse_threshold: options.mse_threshold(),
            samples: Vec::new(),
        };
        if bif.is_empty() {
            log::info!("{} has no entries, nothing to validate", bif_path.display());
            return Ok(report);
        }
        if !video_path.is_file() {
            return Err(BifError::InvalidSource {
                path: video_path.to_path_buf(),
                reason: "not a file".to_string(),
            });
        }

        let indices = select_samples(bif.len(), options.selection(), options.seed);
        log::debug!("Validating {} of {} entries", indices.len(), bif.len());

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Validation,
            Some(indices.len() as u64),
            1,
        );
        for index in indices {
            let timestamp_ms = bif.timestamp_ms(index);
            let outcome = self.check_sample(&mut bif, index, video_path, options);
            if let SampleOutcome::Mismatch { mse } = outcome {
                log::warn!("Frame {index} at {timestamp_ms} ms differs from the source (MSE {mse:.2})");
            }
            report.samples.push(SampleResult {
                index,
                timestamp_ms,
                outcome,
            });
            tracker.advance();
        }
        tracker.finish();

        Ok(report)
    }

    fn check_sample(
        &self,
        bif: &mut BifReader,
        index: usize,
        video_path: &Path,
        options: &ValidateOptions,
    ) -> SampleOutcome {
        let stored = match bif.image(index).and_then(|bytes| imaging::decode_jpeg(&bytes)) {
            Ok(image) => image,
            Err(error) => return SampleOutcome::DecodeFailure(error.to_string()),
        };
        let size = FrameSize::new(stored.width(), stored.height());

        let frame = self
            .backend
            .open(video_path, options.hardware)
            .and_then(|mut reader| {
                reader.seek_ms(bif.timestamp_ms(index))?;
                reader.read_frame(size, Interpolation::Area)
            });
        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => return SampleOutcome::ReadFailure("end of stream".to_string()),
            Err(error) => return SampleOutcome::ReadFailure(error.to_string()),
        };

        let mse = imaging::mean_squared_error(&stored, &frame);
        if mse >= options.mse_threshold() {
            SampleOutcome::Mismatch { mse }
        } else {
            SampleOutcome::Match { mse }
        }
    }
}

/// Indices to check, ascending.
///
/// `Random(n)` draws `min(n, total)` distinct indices uniformly.
pub fn select_samples(total: usize, selection: SampleSelection, seed: Option<u64>) -> Vec<usize> {
    match selection {
        SampleSelection::All => (0..total).collect(),
        SampleSelection::Random(count) => {
            let amount = count.min(total);
            let mut indices = match seed {
                Some(seed) => sample(&mut StdRng::seed_from_u64(seed), total, amount),
                None => sample(&mut rand::thread_rng(), total, amount),
            }
            .into_vec();
            indices.sort_unstable();
            indices
        }
    }
}
