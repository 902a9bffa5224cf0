//! Internal conversion helpers.
//!
//! Pixel-plane copying and millisecond/PTS arithmetic shared by the
//! FFmpeg decoder backend.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy an RGB24 frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        data.chunks(stride)
            .take(height as usize)
            .flat_map(|row| &row[..row_length])
            .copied()
            .collect()
    }
}

/// Container-level seek target for a millisecond position.
///
/// `Input::seek` expects AV_TIME_BASE (microsecond) units.
pub(crate) fn millis_to_seek_timestamp(millis: u64) -> i64 {
    (millis as i64).saturating_mul(1000)
}

/// Rescale a PTS value from stream time base to milliseconds.
pub(crate) fn pts_to_millis(pts: i64, time_base: Rational) -> i64 {
    if time_base.denominator() == 0 {
        return 0;
    }
    let seconds = pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    (seconds * 1000.0).round() as i64
}

/// Frames per second from a rational rate, or 0 for an unset rate.
pub(crate) fn rational_to_fps(rate: Rational) -> f64 {
    if rate.denominator() == 0 {
        0.0
    } else {
        rate.numerator() as f64 / rate.denominator() as f64
    }
}
