//! Error types for the `bifgen` crate.
//!
//! This module defines [`BifError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context (paths,
//! byte counts, upstream messages) to produce a one-line diagnostic.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `bifgen` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BifError {
    /// The source video could not be opened or probed by any path.
    #[error("Invalid or corrupt video file {path}: {reason}")]
    InvalidSource {
        /// Path of the video that was rejected.
        path: PathBuf,
        /// Why the last probing path failed.
        reason: String,
    },

    /// The first eight bytes are not the BIF signature.
    #[error("Not a valid BIF file (magic signature mismatch)")]
    InvalidMagic,

    /// Fewer bytes than the fixed 64-byte header.
    #[error("Truncated BIF header: expected {expected} bytes, found {actual}")]
    TruncatedHeader {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Fewer bytes than the header plus the offset table require.
    #[error("Truncated BIF index: expected {expected} bytes, found {actual}")]
    TruncatedIndex {
        /// Bytes required for header and index table.
        expected: u64,
        /// Bytes available.
        actual: u64,
    },

    /// The image set does not fit the 32-bit offsets of the format.
    #[error("BIF format overflow: {0}")]
    FormatOverflow(String),

    /// The offset table disagrees with the file contents.
    #[error("Corrupt BIF index: {0}")]
    CorruptIndex(String),

    /// Neither the primary nor the fallback path produced a frame.
    #[error("No images were extracted: {reason}")]
    NoFramesExtracted {
        /// Why the final extraction attempt came up empty.
        reason: String,
    },

    /// The secondary command-line tool is not installed.
    #[error("Fallback extraction unavailable: {0}")]
    FallbackUnavailable(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A single image payload could not be decoded.
    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    /// An interval of zero seconds was supplied.
    #[error("Interval must be greater than zero")]
    InvalidInterval,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An error from the `image` crate while encoding thumbnails.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An external tool ran but did not succeed.
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        /// Program name (`ffmpeg`, `ffprobe`).
        tool: String,
        /// Exit status and trimmed stderr.
        reason: String,
    },

    /// The extraction worker pool could not be built.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl BifError {
    /// Process exit status used by the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            BifError::InvalidSource { .. } => 2,
            BifError::InvalidMagic
            | BifError::TruncatedHeader { .. }
            | BifError::TruncatedIndex { .. }
            | BifError::FormatOverflow(_)
            | BifError::CorruptIndex(_) => 3,
            BifError::NoFramesExtracted { .. } | BifError::FallbackUnavailable(_) => 4,
            _ => 1,
        }
    }
}

impl From<FfmpegError> for BifError {
    fn from(error: FfmpegError) -> Self {
        BifError::FfmpegError(error.to_string())
    }
}
