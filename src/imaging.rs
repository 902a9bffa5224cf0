//! JPEG encoding and decoding plus image comparison.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::BifError;

/// Encode an RGB image as baseline JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, BifError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    image.write_with_encoder(encoder)?;
    Ok(bytes)
}

/// Decode JPEG bytes to RGB.
///
/// # Errors
///
/// [`BifError::DecodeFailure`] if the bytes are not a readable JPEG.
pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage, BifError> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(ImageFormat::Jpeg);
    reader
        .decode()
        .map(|image| image.to_rgb8())
        .map_err(|error| BifError::DecodeFailure(error.to_string()))
}

/// Mean squared error between two equally sized RGB images.
///
/// Squared differences are summed over every channel of every pixel and
/// divided by the pixel count (`width * height`), not the channel count.
/// Images of different sizes yield `f64::INFINITY`.
pub fn mean_squared_error(left: &RgbImage, right: &RgbImage) -> f64 {
    if left.dimensions() != right.dimensions() {
        return f64::INFINITY;
    }
    let pixels = u64::from(left.width()) * u64::from(left.height());
    if pixels == 0 {
        return 0.0;
    }

    let sum: u64 = left
        .as_raw()
        .iter()
        .zip(right.as_raw())
        .map(|(&a, &b)| {
            let difference = i64::from(a) - i64::from(b);
            (difference * difference) as u64
        })
        .sum();

    sum as f64 / pixels as f64
}
