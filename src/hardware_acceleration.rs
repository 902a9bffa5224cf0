//! Hardware-accelerated video decoding.
//!
//! [`HardwareAccelerationMode`] is the decoder hint accepted by every
//! operation that opens a video. With the `hardware` feature enabled the
//! FFmpeg backend uses it to attach a hardware device context to the
//! decoder and transfer decoded surfaces back to system memory. Without
//! the feature the hint is accepted and software decoding is used.
//!
//! The same hint is forwarded to the command-line transcoder on the
//! fallback path as `-hwaccel <name>`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

#[cfg(feature = "hardware")]
use ffmpeg_next::{
    codec::context::Context as CodecContext, decoder::Video as VideoDecoder,
    frame::Video as VideoFrame,
};
#[cfg(feature = "hardware")]
use ffmpeg_sys_next::{
    AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX, AVBufferRef, AVCodecContext, AVCodecHWConfig,
    AVHWDeviceType,
};

#[cfg(feature = "hardware")]
use crate::error::BifError;

/// Hardware acceleration hint for video decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAccelerationMode {
    /// Use the first device the codec supports, else software.
    #[default]
    Auto,
    /// Software decoding only.
    Software,
    /// A specific device. Falls back to software if unavailable.
    Specific(HardwareDeviceType),
}

/// Hardware device backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareDeviceType {
    /// NVIDIA CUDA (Linux, Windows).
    Cuda,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// DirectX Video Acceleration 2 (Windows).
    Dxva2,
    /// Direct3D 11 Video Acceleration (Windows).
    D3d11va,
    /// Apple VideoToolbox (macOS, iOS).
    VideoToolbox,
    /// Intel Quick Sync Video.
    Qsv,
}

impl HardwareDeviceType {
    /// FFmpeg's name for the device, as used by `-hwaccel`.
    pub fn name(self) -> &'static str {
        match self {
            HardwareDeviceType::Cuda => "cuda",
            HardwareDeviceType::Vaapi => "vaapi",
            HardwareDeviceType::Dxva2 => "dxva2",
            HardwareDeviceType::D3d11va => "d3d11va",
            HardwareDeviceType::VideoToolbox => "videotoolbox",
            HardwareDeviceType::Qsv => "qsv",
        }
    }

    #[cfg(feature = "hardware")]
    fn to_av_hw_device_type(self) -> AVHWDeviceType {
        match self {
            HardwareDeviceType::Cuda => AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            HardwareDeviceType::Vaapi => AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            HardwareDeviceType::Dxva2 => AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
            HardwareDeviceType::D3d11va => AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            HardwareDeviceType::VideoToolbox => AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            HardwareDeviceType::Qsv => AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
        }
    }
}

impl HardwareAccelerationMode {
    /// Value for the transcoder's `-hwaccel` option, if any.
    pub fn transcoder_argument(self) -> Option<&'static str> {
        match self {
            HardwareAccelerationMode::Auto => Some("auto"),
            HardwareAccelerationMode::Software => None,
            HardwareAccelerationMode::Specific(device) => Some(device.name()),
        }
    }
}

impl FromStr for HardwareAccelerationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let device = match value.to_ascii_lowercase().as_str() {
            "auto" => return Ok(HardwareAccelerationMode::Auto),
            "none" | "software" | "sw" | "cpu" => return Ok(HardwareAccelerationMode::Software),
            "cuda" => HardwareDeviceType::Cuda,
            "vaapi" => HardwareDeviceType::Vaapi,
            "dxva2" => HardwareDeviceType::Dxva2,
            "d3d11va" => HardwareDeviceType::D3d11va,
            "videotoolbox" => HardwareDeviceType::VideoToolbox,
            "qsv" => HardwareDeviceType::Qsv,
            other => return Err(format!("unsupported hardware mode '{other}'")),
        };
        Ok(HardwareAccelerationMode::Specific(device))
    }
}

impl Display for HardwareAccelerationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HardwareAccelerationMode::Auto => f.write_str("auto"),
            HardwareAccelerationMode::Software => f.write_str("none"),
            HardwareAccelerationMode::Specific(device) => f.write_str(device.name()),
        }
    }
}

/// List all hardware device types compiled into the linked FFmpeg.
#[cfg(feature = "hardware")]
pub fn available_hardware_devices() -> Vec<HardwareDeviceType> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }
        let known = [
            HardwareDeviceType::Cuda,
            HardwareDeviceType::Vaapi,
            HardwareDeviceType::Dxva2,
            HardwareDeviceType::D3d11va,
            HardwareDeviceType::VideoToolbox,
            HardwareDeviceType::Qsv,
        ];
        if let Some(device) = known
            .into_iter()
            .find(|device| device.to_av_hw_device_type() == device_type)
        {
            devices.push(device);
        }
    }

    devices
}

/// Build a video decoder honouring the hint.
///
/// Returns the decoder and whether a hardware device was attached. Any
/// failure to set up the device yields a plain software decoder.
#[cfg(feature = "hardware")]
pub(crate) fn create_decoder(
    codec_context: CodecContext,
    mode: HardwareAccelerationMode,
) -> Result<(VideoDecoder, bool), BifError> {
    let supported = codec_device_types(&codec_context);
    let device_type = match mode {
        HardwareAccelerationMode::Software => None,
        HardwareAccelerationMode::Auto => supported.first().copied(),
        HardwareAccelerationMode::Specific(device) => {
            let wanted = device.to_av_hw_device_type();
            supported.into_iter().find(|candidate| *candidate == wanted)
        }
    };

    let Some(device_type) = device_type else {
        return Ok((codec_context.decoder().video()?, false));
    };

    let mut device_context: *mut AVBufferRef = std::ptr::null_mut();
    let result = unsafe {
        ffmpeg_sys_next::av_hwdevice_ctx_create(
            &mut device_context,
            device_type,
            std::ptr::null(),
            std::ptr::null_mut(),
            0,
        )
    };
    if result < 0 {
        log::debug!("Hardware device {device_type:?} unavailable (result={result}), using software");
        return Ok((codec_context.decoder().video()?, false));
    }

    unsafe {
        let context_pointer = codec_context.as_ptr() as *mut AVCodecContext;
        (*context_pointer).hw_device_ctx = ffmpeg_sys_next::av_buffer_ref(device_context);
    }
    let decoder = codec_context.decoder().video();
    // The codec context holds its own reference now.
    unsafe {
        ffmpeg_sys_next::av_buffer_unref(&mut device_context);
    }

    log::debug!("Hardware decoding enabled via {device_type:?}");
    Ok((decoder?, true))
}

/// Device types the codec can decode with through a device context.
#[cfg(feature = "hardware")]
fn codec_device_types(codec_context: &CodecContext) -> Vec<AVHWDeviceType> {
    let codec_pointer = unsafe { (*codec_context.as_ptr()).codec };
    let mut types = Vec::new();
    if codec_pointer.is_null() {
        return types;
    }

    for index in 0.. {
        let config: *const AVCodecHWConfig =
            unsafe { ffmpeg_sys_next::avcodec_get_hw_config(codec_pointer, index) };
        if config.is_null() {
            break;
        }
        let (methods, device_type) = unsafe { ((*config).methods, (*config).device_type) };
        if methods & (AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32) != 0
            && device_type != AVHWDeviceType::AV_HWDEVICE_TYPE_NONE
        {
            types.push(device_type);
        }
    }

    types
}

/// Copy a decoded hardware surface into system memory.
///
/// Fails for frames that already live in system memory; callers use the
/// original frame in that case.
#[cfg(feature = "hardware")]
pub(crate) fn transfer_hardware_frame(hardware_frame: &VideoFrame) -> Result<VideoFrame, BifError> {
    let mut software_frame = VideoFrame::empty();
    let result = unsafe {
        ffmpeg_sys_next::av_hwframe_transfer_data(
            software_frame.as_mut_ptr(),
            hardware_frame.as_ptr(),
            0,
        )
    };
    if result < 0 {
        return Err(BifError::FfmpegError(format!(
            "hardware frame transfer failed (result={result})"
        )));
    }
    unsafe {
        (*software_frame.as_mut_ptr()).pts = (*hardware_frame.as_ptr()).pts;
    }
    Ok(software_frame)
}
