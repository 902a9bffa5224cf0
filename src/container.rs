//! BIF container codec.
//!
//! A BIF file is a fixed 64-byte header, an offset table of `N + 1`
//! little-endian `(index, offset)` pairs, and the concatenated JPEG
//! payloads. The last table entry is a terminator whose offset is the
//! total file length, so the size of every image is the difference of two
//! neighbouring offsets.
//!
//! ```text
//! 0x00  8 bytes   magic 89 42 49 46 0D 0A 1A 0A
//! 0x08  4 bytes   version (0)
//! 0x0C  4 bytes   image count N
//! 0x10  4 bytes   interval in milliseconds
//! 0x14  44 bytes  reserved, zero
//! 0x40  8*(N+1)   index table, terminator index 0xFFFFFFFF
//! ...             JPEG payloads in index order
//! ```
//!
//! This module is pure: [`encode`] / [`encode_to`] serialize, and
//! [`BifIndex`] parses the header and table without copying payloads.

use std::io::{Read, Write};
use std::ops::Range;

use crate::error::BifError;

/// The eight-byte BIF signature.
pub const BIF_MAGIC: [u8; 8] = [0x89, 0x42, 0x49, 0x46, 0x0D, 0x0A, 0x1A, 0x0A];

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Format version written by this crate.
pub const BIF_VERSION: u32 = 0;

/// Index value of the end-of-table entry.
pub const TERMINATOR_INDEX: u32 = 0xFFFF_FFFF;

const ENTRY_SIZE: u64 = 8;

/// Parsed fixed header of a BIF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BifHeader {
    /// Format version (currently always 0).
    pub version: u32,
    /// Number of images in the file.
    pub image_count: u32,
    /// Time between consecutive images in milliseconds.
    pub interval_ms: u32,
}

impl BifHeader {
    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&BIF_MAGIC);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.image_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.interval_ms.to_le_bytes());
        bytes
    }

    /// Parse a header, checking the signature first.
    ///
    /// # Errors
    ///
    /// [`BifError::InvalidMagic`] if the leading bytes differ from
    /// [`BIF_MAGIC`], [`BifError::TruncatedHeader`] if fewer than
    /// [`HEADER_SIZE`] bytes are available.
    pub fn parse(bytes: &[u8]) -> Result<Self, BifError> {
        let signature_length = bytes.len().min(BIF_MAGIC.len());
        if bytes[..signature_length] != BIF_MAGIC[..signature_length] {
            return Err(BifError::InvalidMagic);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(BifError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            version: read_u32(bytes, 8),
            image_count: read_u32(bytes, 12),
            interval_ms: read_u32(bytes, 16),
        })
    }

    /// Byte length of header plus index table for this image count.
    pub fn table_end(&self) -> u64 {
        HEADER_SIZE as u64 + table_size(self.image_count as u64)
    }
}

/// One row of the offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Frame index (`0..N`), or [`TERMINATOR_INDEX`].
    pub index: u32,
    /// Absolute byte offset of the payload within the file.
    pub offset: u32,
}

fn table_size(image_count: u64) -> u64 {
    ENTRY_SIZE * (image_count + 1)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

/// Compute the offset table for a set of payloads.
///
/// Returns the per-image entries followed by the terminator.
fn layout<B: AsRef<[u8]>>(images: &[B]) -> Result<Vec<IndexEntry>, BifError> {
    let count = u32::try_from(images.len()).map_err(|_| {
        BifError::FormatOverflow(format!("{} images exceed the 32-bit count", images.len()))
    })?;

    let mut entries = Vec::with_capacity(images.len() + 1);
    let mut position = HEADER_SIZE as u64 + table_size(count as u64);

    for (index, image) in images.iter().enumerate() {
        entries.push(IndexEntry {
            index: index as u32,
            offset: to_offset(position)?,
        });
        position += image.as_ref().len() as u64;
    }

    entries.push(IndexEntry {
        index: TERMINATOR_INDEX,
        offset: to_offset(position)?,
    });
    Ok(entries)
}

fn to_offset(position: u64) -> Result<u32, BifError> {
    u32::try_from(position).map_err(|_| {
        BifError::FormatOverflow(format!(
            "offset {position} does not fit in 32 bits (file would exceed 4 GiB)"
        ))
    })
}

/// Serialize images into a BIF byte stream written to `writer`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// [`BifError::InvalidInterval`] for a zero interval,
/// [`BifError::FormatOverflow`] if an offset does not fit in 32 bits, or
/// any I/O error from `writer`.
pub fn encode_to<W: Write, B: AsRef<[u8]>>(
    writer: &mut W,
    images: &[B],
    interval_seconds: u32,
) -> Result<u64, BifError> {
    if interval_seconds == 0 {
        return Err(BifError::InvalidInterval);
    }
    let interval_ms = interval_seconds.checked_mul(1000).ok_or_else(|| {
        BifError::FormatOverflow(format!("interval {interval_seconds}s overflows milliseconds"))
    })?;

    let entries = layout(images)?;
    let header = BifHeader {
        version: BIF_VERSION,
        image_count: images.len() as u32,
        interval_ms,
    };

    writer.write_all(&header.to_bytes())?;
    for entry in &entries {
        writer.write_all(&entry.index.to_le_bytes())?;
        writer.write_all(&entry.offset.to_le_bytes())?;
    }
    for image in images {
        writer.write_all(image.as_ref())?;
    }

    let total = entries.last().map(|entry| entry.offset as u64).unwrap_or(0);
    log::debug!(
        "Encoded BIF: {} images, interval {}ms, {} bytes",
        header.image_count,
        interval_ms,
        total
    );
    Ok(total)
}

/// Serialize images into an in-memory BIF byte stream.
///
/// # Errors
///
/// Same as [`encode_to`].
pub fn encode<B: AsRef<[u8]>>(images: &[B], interval_seconds: u32) -> Result<Vec<u8>, BifError> {
    let payload: usize = images.iter().map(|image| image.as_ref().len()).sum();
    let mut bytes = Vec::with_capacity(HEADER_SIZE + 8 * (images.len() + 1) + payload);
    encode_to(&mut bytes, images, interval_seconds)?;
    Ok(bytes)
}

/// Header and offset table of a BIF file.
///
/// Holds no payload bytes; use [`range`](BifIndex::range) to locate an
/// image inside the original buffer or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BifIndex {
    header: BifHeader,
    entries: Vec<IndexEntry>,
    end_offset: u32,
}

impl BifIndex {
    /// Parse header and table from a complete in-memory BIF file.
    ///
    /// # Errors
    ///
    /// [`BifError::InvalidMagic`], [`BifError::TruncatedHeader`],
    /// [`BifError::TruncatedIndex`] or [`BifError::CorruptIndex`].
    pub fn parse(bytes: &[u8]) -> Result<Self, BifError> {
        let header = BifHeader::parse(bytes)?;
        let table_end = header.table_end();
        if (bytes.len() as u64) < table_end {
            return Err(BifError::TruncatedIndex {
                expected: table_end,
                actual: bytes.len() as u64,
            });
        }
        Self::from_table(header, &bytes[HEADER_SIZE..table_end as usize], bytes.len() as u64)
    }

    /// Parse header and table from a reader positioned at the start of a
    /// BIF file of `total_length` bytes. Payloads are not read.
    ///
    /// # Errors
    ///
    /// Same as [`parse`](BifIndex::parse), plus I/O errors.
    pub fn read_from<R: Read>(reader: &mut R, total_length: u64) -> Result<Self, BifError> {
        let available = total_length.min(HEADER_SIZE as u64) as usize;
        let mut header_bytes = vec![0u8; available];
        reader.read_exact(&mut header_bytes)?;
        let header = BifHeader::parse(&header_bytes)?;

        let table_end = header.table_end();
        if total_length < table_end {
            return Err(BifError::TruncatedIndex {
                expected: table_end,
                actual: total_length,
            });
        }

        let mut table = vec![0u8; (table_end - HEADER_SIZE as u64) as usize];
        reader.read_exact(&mut table)?;
        Self::from_table(header, &table, total_length)
    }

    fn from_table(header: BifHeader, table: &[u8], total_length: u64) -> Result<Self, BifError> {
        if header.version != BIF_VERSION {
            log::warn!("Unexpected BIF version {}, reading anyway", header.version);
        }

        let count = header.image_count as usize;
        let mut entries = Vec::with_capacity(count);
        for row in table.chunks_exact(ENTRY_SIZE as usize).take(count) {
            entries.push(IndexEntry {
                index: read_u32(row, 0),
                offset: read_u32(row, 4),
            });
        }

        let terminator_at = count * ENTRY_SIZE as usize;
        let terminator_index = read_u32(table, terminator_at);
        let end_offset = read_u32(table, terminator_at + 4);
        if terminator_index != TERMINATOR_INDEX {
            log::warn!("BIF terminator index is {terminator_index:#010x}, expected 0xffffffff");
        }

        let table_end = header.table_end();
        let mut previous = table_end;
        for entry in entries
            .iter()
            .map(|entry| entry.offset)
            .chain(std::iter::once(end_offset))
        {
            let offset = entry as u64;
            if offset < previous {
                return Err(BifError::CorruptIndex(format!(
                    "offset {offset} precedes {previous}"
                )));
            }
            previous = offset;
        }
        if end_offset as u64 != total_length {
            return Err(BifError::CorruptIndex(format!(
                "terminator offset {end_offset} does not match file length {total_length}"
            )));
        }

        Ok(Self {
            header,
            entries,
            end_offset,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &BifHeader {
        &self.header
    }

    /// Per-image table entries in index order (terminator excluded).
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Offset of the end of the last image (the file length).
    pub fn end_offset(&self) -> u32 {
        self.end_offset
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the file holds no images.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte range `[offset[i], offset[i + 1])` of image `i`.
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        let start = self.entries.get(i)?.offset as usize;
        let end = self
            .entries
            .get(i + 1)
            .map_or(self.end_offset, |next| next.offset) as usize;
        Some(start..end)
    }

    /// Presentation time of image `i` in milliseconds.
    pub fn timestamp_ms(&self, i: usize) -> u64 {
        i as u64 * self.header.interval_ms as u64
    }
}

/// Borrowed view over an in-memory BIF file.
#[derive(Debug, Clone)]
pub struct BifView<'a> {
    index: BifIndex,
    bytes: &'a [u8],
}

impl<'a> BifView<'a> {
    /// Parse `bytes` and keep a reference for payload lookups.
    ///
    /// # Errors
    ///
    /// Same as [`BifIndex::parse`].
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BifError> {
        Ok(Self {
            index: BifIndex::parse(bytes)?,
            bytes,
        })
    }

    /// The parsed header and table.
    pub fn index(&self) -> &BifIndex {
        &self.index
    }

    /// Payload of image `i`, without copying.
    pub fn image(&self, i: usize) -> Option<&'a [u8]> {
        self.index.range(i).map(|range| &self.bytes[range])
    }

    /// Iterate payloads in index order.
    pub fn images(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.index.len()).filter_map(|i| self.image(i))
    }
}
