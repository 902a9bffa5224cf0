//! BIF files on disk.
//!
//! [`write_bif`] encodes images into a temporary file next to the target
//! and renames it into place, so readers never see a half-written file.
//! [`BifReader`] parses only the header and offset table up front and reads
//! individual images on demand.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::configuration::Resolution;
use crate::container::{self, BifHeader, BifIndex};
use crate::error::BifError;

/// Encode `images` and atomically write them to `path`.
///
/// Returns the number of bytes written.
pub fn write_bif<B: AsRef<[u8]>>(
    path: &Path,
    images: &[B],
    interval_seconds: u32,
) -> Result<u64, BifError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temporary = NamedTempFile::new_in(parent)?;
    let mut writer = BufWriter::new(temporary);
    let written = container::encode_to(&mut writer, images, interval_seconds)?;
    writer.flush()?;
    let temporary = writer
        .into_inner()
        .map_err(|error| BifError::IoError(error.into_error()))?;
    temporary.as_file().sync_all()?;
    temporary.persist(path).map_err(|error| error.error)?;

    log::info!(
        "Wrote {} images ({written} bytes) to {}",
        images.len(),
        path.display()
    );
    Ok(written)
}

/// A BIF file opened for random access.
#[derive(Debug)]
pub struct BifReader {
    path: PathBuf,
    file: BufReader<File>,
    index: BifIndex,
}

impl BifReader {
    /// Open `path` and parse its header and offset table.
    ///
    /// # Errors
    ///
    /// I/O errors, or the structural errors of [`BifIndex::read_from`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BifError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_length = file.metadata()?.len();
        let mut file = BufReader::new(file);
        let index = BifIndex::read_from(&mut file, total_length)?;

        log::debug!(
            "Opened {}: {} images every {} ms",
            path.display(),
            index.len(),
            index.header().interval_ms
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
            index,
        })
    }

    /// Path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header.
    pub fn header(&self) -> &BifHeader {
        self.index.header()
    }

    /// Parsed offset table.
    pub fn index(&self) -> &BifIndex {
        &self.index
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// `true` if the file holds no images.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Milliseconds between images.
    pub fn interval_ms(&self) -> u32 {
        self.index.header().interval_ms
    }

    /// Source position of image `index` in milliseconds.
    pub fn timestamp_ms(&self, index: usize) -> u64 {
        self.index.timestamp_ms(index)
    }

    /// Byte length of image `index`, if it exists.
    pub fn image_len(&self, index: usize) -> Option<usize> {
        self.index.range(index).map(|range| range.len())
    }

    /// Read the bytes of image `index`.
    ///
    /// # Errors
    ///
    /// [`BifError::CorruptIndex`] for an index past the end, or an I/O
    /// error.
    pub fn image(&mut self, index: usize) -> Result<Vec<u8>, BifError> {
        let range = self.index.range(index).ok_or_else(|| {
            BifError::CorruptIndex(format!(
                "image {index} requested from a file with {} images",
                self.index.len()
            ))
        })?;

        self.file.seek(SeekFrom::Start(range.start as u64))?;
        let mut bytes = vec![0; range.len()];
        self.file.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Write every image of `bif_path` to `out_dir/frame_NNNN.jpg`.
///
/// Creates `out_dir` if needed and returns the paths in index order.
pub fn export_frames(bif_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BifError> {
    let mut reader = BifReader::open(bif_path)?;
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(reader.len());
    for index in 0..reader.len() {
        let bytes = reader.image(index)?;
        let path = out_dir.join(format!("frame_{index:04}.jpg"));
        fs::write(&path, bytes)?;
        written.push(path);
    }

    log::info!(
        "Exported {} frames to {}",
        written.len(),
        out_dir.display()
    );
    Ok(written)
}

/// `<video stem>-<MODE>.bif` in the current directory.
pub fn default_output_path(video: &Path, resolution: Resolution) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}-{}.bif", resolution.tag()))
}

/// `<bif stem>_preview` next to the BIF file.
pub fn default_preview_dir(bif_path: &Path) -> PathBuf {
    let stem = bif_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bif".to_string());
    bif_path.with_file_name(format!("{stem}_preview"))
}
