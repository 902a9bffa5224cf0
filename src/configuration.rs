//! Extraction and validation configuration.
//!
//! [`ExtractOptions`] is a builder that threads the sampling cadence,
//! quality preset, worker count, hardware hint, progress callbacks, and
//! cancellation through the pipeline without polluting every function
//! signature. [`ValidateOptions`] does the same for the validator.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bifgen::{CancellationToken, ExtractOptions, Preset, Resolution};
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_interval(5)
//!     .with_preset(Preset::Quality)
//!     .with_resolution(Resolution::Sd)
//!     .with_jobs(4)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use ffmpeg_next::software::scaling::Flags as ScalingFlags;

use crate::hardware_acceleration::HardwareAccelerationMode;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Resize interpolation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Bilinear.
    Linear,
    /// Pixel-area averaging; best for downscaling.
    Area,
    /// Lanczos windowed sinc.
    Lanczos,
}

impl Interpolation {
    /// Map to the matching swscale flag.
    pub(crate) fn to_scaling_flags(self) -> ScalingFlags {
        match self {
            Interpolation::Linear => ScalingFlags::BILINEAR,
            Interpolation::Area => ScalingFlags::AREA,
            Interpolation::Lanczos => ScalingFlags::LANCZOS,
        }
    }
}

/// Speed/quality trade-off for thumbnail production.
///
/// | preset | interpolation | JPEG quality | `-q:v` |
/// |---|---|---|---|
/// | `Fast` | linear | 80 | 6 |
/// | `Medium` | area | 90 | 4 |
/// | `Quality` | Lanczos | 95 | 2 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Favour speed.
    Fast,
    /// Balanced default.
    #[default]
    Medium,
    /// Favour image fidelity.
    Quality,
}

impl Preset {
    /// Interpolation used when resizing decoded frames.
    pub fn interpolation(self) -> Interpolation {
        match self {
            Preset::Fast => Interpolation::Linear,
            Preset::Medium => Interpolation::Area,
            Preset::Quality => Interpolation::Lanczos,
        }
    }

    /// JPEG quality on the 1-100 scale.
    pub fn jpeg_quality(self) -> u8 {
        match self {
            Preset::Fast => 80,
            Preset::Medium => 90,
            Preset::Quality => 95,
        }
    }

    /// Equivalent quality on FFmpeg's inverted `-q:v` scale (lower is better).
    pub fn transcoder_quality(self) -> u8 {
        match self {
            Preset::Fast => 6,
            Preset::Medium => 4,
            Preset::Quality => 2,
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fast" => Ok(Preset::Fast),
            "medium" => Ok(Preset::Medium),
            "quality" => Ok(Preset::Quality),
            other => Err(format!("unknown preset '{other}' (fast, medium, quality)")),
        }
    }
}

impl Display for Preset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Quality => "quality",
        };
        f.write_str(name)
    }
}

/// Pixel dimensions of an output thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Output resolution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Standard definition, nominal 240x136.
    Sd,
    /// High definition, nominal 320x180.
    #[default]
    Hd,
}

impl Resolution {
    /// Nominal `(width, height)` of the mode.
    pub fn nominal(self) -> FrameSize {
        match self {
            Resolution::Sd => FrameSize::new(240, 136),
            Resolution::Hd => FrameSize::new(320, 180),
        }
    }

    /// Thumbnail size for a source with the given aspect ratio.
    ///
    /// The height is fixed by the mode and the width is always derived as
    /// `height * aspect`, for landscape and portrait sources alike.
    pub fn frame_size(self, aspect: f64) -> FrameSize {
        let nominal = self.nominal();
        if !aspect.is_finite() || aspect <= 0.0 {
            return nominal;
        }
        let width = (nominal.height as f64 * aspect) as u32;
        FrameSize::new(width.max(1), nominal.height)
    }

    /// Upper-case tag used in default output file names.
    pub fn tag(self) -> &'static str {
        match self {
            Resolution::Sd => "SD",
            Resolution::Hd => "HD",
        }
    }
}

/// Options for the forward (video to BIF) path.
///
/// All fields have defaults matching the command-line tool: 10 second
/// interval, no offset, HD, medium preset, one job per available core.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) hardware: HardwareAccelerationMode,
    pub(crate) jobs: usize,
    pub(crate) interval_seconds: u32,
    pub(crate) offset_seconds: u32,
    pub(crate) resolution: Resolution,
    pub(crate) preset: Preset,
    /// Minimum number of timestamps handed to a worker at once.
    pub(crate) chunk_size: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("hardware", &self.hardware)
            .field("jobs", &self.jobs)
            .field("interval_seconds", &self.interval_seconds)
            .field("offset_seconds", &self.offset_seconds)
            .field("resolution", &self.resolution)
            .field("preset", &self.preset)
            .field("chunk_size", &self.chunk_size)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            hardware: HardwareAccelerationMode::Auto,
            jobs: default_jobs(),
            interval_seconds: 10,
            offset_seconds: 0,
            resolution: Resolution::Hd,
            preset: Preset::Medium,
            chunk_size: 4,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the hardware acceleration hint for the primary decoder.
    #[must_use]
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware = mode;
        self
    }

    /// Set the worker count. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set the time between thumbnails in seconds.
    #[must_use]
    pub fn with_interval(mut self, seconds: u32) -> Self {
        self.interval_seconds = seconds;
        self
    }

    /// Set the time of the first thumbnail in seconds.
    #[must_use]
    pub fn with_offset(mut self, seconds: u32) -> Self {
        self.offset_seconds = seconds;
        self
    }

    /// Set the output resolution mode.
    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the quality preset.
    #[must_use]
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Set how many timestamps a worker takes per dispatch. Clamped to 1.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Hardware acceleration hint.
    pub fn hardware(&self) -> HardwareAccelerationMode {
        self.hardware
    }

    /// Worker count.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Interval in seconds.
    pub fn interval(&self) -> u32 {
        self.interval_seconds
    }

    /// Offset in seconds.
    pub fn offset(&self) -> u32 {
        self.offset_seconds
    }

    /// Resolution mode.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Quality preset.
    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Which BIF entries the validator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSelection {
    /// Every entry, in index order.
    All,
    /// A uniform random subset of this size, without replacement.
    Random(usize),
}

/// Options for validating a BIF file against its source.
#[derive(Clone)]
pub struct ValidateOptions {
    pub(crate) selection: SampleSelection,
    pub(crate) mse_threshold: f64,
    pub(crate) hardware: HardwareAccelerationMode,
    pub(crate) seed: Option<u64>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for ValidateOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ValidateOptions")
            .field("selection", &self.selection)
            .field("mse_threshold", &self.mse_threshold)
            .field("hardware", &self.hardware)
            .field("seed", &self.seed)
            .finish()
    }
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidateOptions {
    /// Defaults: 5 random samples, threshold 400.0, auto hardware hint.
    pub fn new() -> Self {
        Self {
            selection: SampleSelection::Random(5),
            mse_threshold: 400.0,
            hardware: HardwareAccelerationMode::Auto,
            seed: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Choose which entries to check.
    #[must_use]
    pub fn with_selection(mut self, selection: SampleSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Mean squared error at or above which a sample is a mismatch.
    #[must_use]
    pub fn with_mse_threshold(mut self, threshold: f64) -> Self {
        self.mse_threshold = threshold;
        self
    }

    /// Set the hardware hint used when re-reading the source.
    #[must_use]
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware = mode;
        self
    }

    /// Seed the random sample selection for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach a progress callback, fired once per checked sample.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Which entries are checked.
    pub fn selection(&self) -> SampleSelection {
        self.selection
    }

    /// Mismatch threshold.
    pub fn mse_threshold(&self) -> f64 {
        self.mse_threshold
    }
}
