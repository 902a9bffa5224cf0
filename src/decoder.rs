//! Random-access video decoding.
//!
//! The extraction pipeline and the validator talk to video sources only
//! through the [`VideoBackend`] / [`FrameReader`] pair. A backend opens
//! independent readers; a reader owns its demuxer and decoder state and is
//! never shared between threads. Dropping a reader closes it.
//!
//! [`FfmpegBackend`] is the production implementation on top of
//! `ffmpeg-next`.

use std::path::Path;

use ffmpeg_next::{
    Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::Context as ScalingContext,
};
use image::RgbImage;

use crate::configuration::{FrameSize, Interpolation};
use crate::conversion;
use crate::error::BifError;
use crate::hardware_acceleration::HardwareAccelerationMode;

/// Stream properties reported by an open reader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second, 0 when unknown.
    pub frames_per_second: f64,
    /// Total frames, 0 when unknown.
    pub frame_count: u64,
}

/// Opens readers on video sources.
pub trait VideoBackend: Send + Sync {
    /// Reader type produced by [`open`](VideoBackend::open).
    type Reader: FrameReader;

    /// Open `path` with the given hardware hint.
    ///
    /// # Errors
    ///
    /// Any error means the source is not openable on this path.
    fn open(
        &self,
        path: &Path,
        hardware: HardwareAccelerationMode,
    ) -> Result<Self::Reader, BifError>;
}

/// One open video source with its own decode state.
pub trait FrameReader {
    /// Properties of the decoded stream.
    fn stream_info(&self) -> StreamInfo;

    /// Position the reader so the next frame is the one at `millis`.
    fn seek_ms(&mut self, millis: u64) -> Result<(), BifError>;

    /// Decode the next frame, resized to `size` with `interpolation`.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn read_frame(
        &mut self,
        size: FrameSize,
        interpolation: Interpolation,
    ) -> Result<Option<RgbImage>, BifError>;
}

/// FFmpeg-based backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl VideoBackend for FfmpegBackend {
    type Reader = FfmpegReader;

    fn open(
        &self,
        path: &Path,
        hardware: HardwareAccelerationMode,
    ) -> Result<FfmpegReader, BifError> {
        FfmpegReader::open(path, hardware)
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
struct ScalerKey {
    format: Pixel,
    width: u32,
    height: u32,
    size: FrameSize,
    interpolation: Interpolation,
}

/// A demuxer plus video decoder for one file.
pub struct FfmpegReader {
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    start_ms: i64,
    info: StreamInfo,
    hardware_active: bool,
    target_ms: Option<i64>,
    end_of_input: bool,
    scaler: Option<(ScalerKey, ScalingContext)>,
}

impl FfmpegReader {
    /// Open the best video stream of `path`.
    ///
    /// # Errors
    ///
    /// [`BifError::FfmpegError`] if FFmpeg cannot open or decode the file,
    /// [`BifError::InvalidSource`] if it holds no video stream.
    pub fn open(path: &Path, hardware: HardwareAccelerationMode) -> Result<Self, BifError> {
        log::debug!("Opening video: {} (hardware={hardware})", path.display());

        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(&path)?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| BifError::InvalidSource {
                path: path.to_path_buf(),
                reason: "no video stream".to_string(),
            })?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let start_time = stream.start_time();
        let start_ms = if start_time == ffmpeg_next::ffi::AV_NOPTS_VALUE || start_time <= 0 {
            0
        } else {
            conversion::pts_to_millis(start_time, time_base)
        };

        let mut frames_per_second = conversion::rational_to_fps(stream.avg_frame_rate());
        if frames_per_second <= 0.0 {
            frames_per_second = conversion::rational_to_fps(stream.rate());
        }

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if input.duration() > 0 && frames_per_second > 0.0 {
            (input.duration() as f64 / 1_000_000.0 * frames_per_second) as u64
        } else {
            0
        };

        let codec_context = CodecContext::from_parameters(stream.parameters())?;
        let (decoder, hardware_active) = create_decoder(codec_context, hardware)?;

        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
        };
        log::debug!(
            "Video stream {stream_index}: {}x{} @ {:.3} fps, {} frames, hardware={hardware_active}",
            info.width,
            info.height,
            info.frames_per_second,
            info.frame_count,
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            start_ms,
            info,
            hardware_active,
            target_ms: None,
            end_of_input: false,
            scaler: None,
        })
    }

    /// Whether a hardware device is attached to the decoder.
    pub fn hardware_active(&self) -> bool {
        self.hardware_active
    }

    fn next_packet(&mut self) -> Option<Packet> {
        let stream_index = self.stream_index;
        for (stream, packet) in self.input.packets() {
            if stream.index() == stream_index {
                return Some(packet);
            }
        }
        None
    }

    /// Decode forward until a frame at or after the pending seek target.
    fn next_decoded_frame(&mut self) -> Result<Option<VideoFrame>, BifError> {
        let target_ms = self.target_ms.take();
        let mut decoded = VideoFrame::empty();

        loop {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let reached = match (target_ms, decoded.pts()) {
                    (Some(target), Some(pts)) => {
                        conversion::pts_to_millis(pts, self.time_base) >= target
                    }
                    _ => true,
                };
                if reached {
                    return Ok(Some(decoded));
                }
            }

            if self.end_of_input {
                return Ok(None);
            }

            match self.next_packet() {
                Some(packet) => {
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {error}");
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.end_of_input = true;
                }
            }
        }
    }

    fn scale(
        &mut self,
        frame: &VideoFrame,
        size: FrameSize,
        interpolation: Interpolation,
    ) -> Result<RgbImage, BifError> {
        let key = ScalerKey {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
            size,
            interpolation,
        };
        if self.scaler.as_ref().is_none_or(|(cached, _)| *cached != key) {
            let context = ScalingContext::get(
                key.format,
                key.width,
                key.height,
                Pixel::RGB24,
                size.width,
                size.height,
                interpolation.to_scaling_flags(),
            )?;
            self.scaler = Some((key, context));
        }

        let mut rgb_frame = VideoFrame::empty();
        if let Some((_, scaler)) = self.scaler.as_mut() {
            scaler.run(frame, &mut rgb_frame)?;
        }

        let buffer = conversion::frame_to_rgb_buffer(&rgb_frame, size.width, size.height);
        RgbImage::from_raw(size.width, size.height, buffer).ok_or_else(|| {
            BifError::FfmpegError("scaled frame is smaller than its dimensions".to_string())
        })
    }
}

impl FrameReader for FfmpegReader {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn seek_ms(&mut self, millis: u64) -> Result<(), BifError> {
        let target_ms = self.start_ms + millis as i64;
        let timestamp = conversion::millis_to_seek_timestamp(target_ms.max(0) as u64);
        self.input.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.end_of_input = false;
        self.target_ms = Some(target_ms);
        Ok(())
    }

    fn read_frame(
        &mut self,
        size: FrameSize,
        interpolation: Interpolation,
    ) -> Result<Option<RgbImage>, BifError> {
        let Some(frame) = self.next_decoded_frame()? else {
            return Ok(None);
        };
        let frame = self.to_system_memory(frame);
        self.scale(&frame, size, interpolation).map(Some)
    }
}

impl FfmpegReader {
    #[cfg(feature = "hardware")]
    fn to_system_memory(&self, frame: VideoFrame) -> VideoFrame {
        if !self.hardware_active {
            return frame;
        }
        crate::hardware_acceleration::transfer_hardware_frame(&frame).unwrap_or(frame)
    }

    #[cfg(not(feature = "hardware"))]
    fn to_system_memory(&self, frame: VideoFrame) -> VideoFrame {
        frame
    }
}

#[cfg(feature = "hardware")]
fn create_decoder(
    codec_context: CodecContext,
    hardware: HardwareAccelerationMode,
) -> Result<(VideoDecoder, bool), BifError> {
    crate::hardware_acceleration::create_decoder(codec_context, hardware)
}

#[cfg(not(feature = "hardware"))]
fn create_decoder(
    codec_context: CodecContext,
    hardware: HardwareAccelerationMode,
) -> Result<(VideoDecoder, bool), BifError> {
    if hardware != HardwareAccelerationMode::Software {
        log::debug!("Built without the `hardware` feature; decoding {hardware} in software");
    }
    Ok((codec_context.decoder().video()?, false))
}
