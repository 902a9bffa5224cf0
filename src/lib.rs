//! # bifgen
//!
//! Generate, preview, and validate BIF (Base Index Frame) files: the
//! compact JPEG thumbnail containers media players use for scrub-bar
//! trick-play previews.
//!
//! Frames are sampled from a video at a fixed cadence with FFmpeg (via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)), decoded in
//! parallel on a [`rayon`] pool, resized, encoded to JPEG, and packed into
//! the BIF layout with a consistent offset table. When the decoder cannot
//! open a source or produces nothing, a single streaming pass of the
//! `ffmpeg` command-line tool takes over.
//!
//! ## Quick Start
//!
//! ### Generate a BIF file
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bifgen::{
//!     ExtractOptions, ExtractionPipeline, FfmpegBackend, FfmpegTool, Preset, generate_bif,
//! };
//!
//! let pipeline = ExtractionPipeline::new(FfmpegBackend, FfmpegTool::default());
//! let options = ExtractOptions::new().with_interval(10).with_preset(Preset::Quality);
//! let summary = generate_bif(
//!     &pipeline,
//!     Path::new("movie.mkv"),
//!     Path::new("movie-HD.bif"),
//!     &options,
//! )?;
//! println!("{} thumbnails, {} dropped", summary.frames, summary.dropped);
//! # Ok::<(), bifgen::BifError>(())
//! ```
//!
//! ### Read one back
//!
//! ```no_run
//! use bifgen::BifReader;
//!
//! let mut reader = BifReader::open("movie-HD.bif")?;
//! for index in 0..reader.len() {
//!     let jpeg = reader.image(index)?;
//!     println!("{} ms: {} bytes", reader.timestamp_ms(index), jpeg.len());
//! }
//! # Ok::<(), bifgen::BifError>(())
//! ```
//!
//! ### Encode in memory
//!
//! ```
//! use bifgen::container::{self, BifView};
//!
//! let images: [&[u8]; 2] = [b"first", b"second"];
//! let bytes = container::encode(&images, 10)?;
//! let view = BifView::parse(&bytes)?;
//! assert_eq!(view.index().header().interval_ms, 10_000);
//! assert_eq!(view.image(1), Some(&b"second"[..]));
//! # Ok::<(), bifgen::BifError>(())
//! ```
//!
//! ## Features
//!
//! - **Container codec**: bit-exact BIF encode and decode, random access
//!   to payloads without loading the whole file
//! - **Parallel extraction**: one decoder per worker, results re-sorted by
//!   timestamp
//! - **Fallback path**: streaming extraction through the `ffmpeg` CLI
//! - **Validation**: random or exhaustive MSE comparison against the
//!   source video
//! - **Preview export**: dump every entry as a numbered JPEG
//! - **Progress & cancellation**: callbacks and `CancellationToken`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `hardware` | Hardware-accelerated decoding (CUDA, VAAPI, DXVA2, D3D11VA, VideoToolbox, QSV) |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build. The fallback
//! path and secondary probe additionally need the `ffmpeg` and `ffprobe`
//! executables on `PATH` at run time.

pub mod bif;
pub mod configuration;
pub mod container;
mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod generate;
pub mod hardware_acceleration;
pub mod imaging;
mod parallel;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod sampler;
pub mod tool;
pub mod validation;

pub use bif::{BifReader, default_output_path, default_preview_dir, export_frames, write_bif};
pub use configuration::{
    ExtractOptions, FrameSize, Interpolation, Preset, Resolution, SampleSelection,
    ValidateOptions,
};
pub use container::{BifHeader, BifIndex, BifView, IndexEntry};
pub use decoder::{FfmpegBackend, FfmpegReader, FrameReader, StreamInfo, VideoBackend};
pub use error::BifError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use generate::{GenerationSummary, generate_bif};
#[cfg(feature = "hardware")]
pub use hardware_acceleration::available_hardware_devices;
pub use hardware_acceleration::{HardwareAccelerationMode, HardwareDeviceType};
pub use parallel::SampledFrame;
pub use pipeline::{
    Extraction, ExtractionOutcome, ExtractionPath, ExtractionPipeline, FallbackReason,
};
pub use probe::{ProbeResult, parse_probe_report, probe};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampler::sample_timestamps;
pub use tool::{FfmpegTool, MediaTool, StreamExtractRequest};
pub use validation::{SampleOutcome, SampleResult, ValidationReport, Validator};
