use crate::instance::NDIHandle;
use crate::sdk;
use log::debug;
use std::ffi::CString;
use std::ptr::{null, null_mut};
use std::sync::Arc;
use thiserror::Error;

unsafe impl Send for SendInstance {}
pub struct SendInstance {
    sdk_instance: Arc<NDIHandle>,
    instance: sdk::NDIlib_send_instance_t,
    in_flight_video: Option<NDISendVideoFrame>,
}
impl Drop for SendInstance {
    fn drop(&mut self) {
        if self.in_flight_video.is_some() {
            self.send_video_flush();
        }

        unsafe {
            (self.sdk_instance.send_destroy)(self.instance);
        }
    }
}
impl SendInstance {
    /// Submits a frame. When the sender is clocked to video this blocks until
    /// the frame is due, so a tight loop runs at the frame's rate.
    pub fn send_video(&mut self, frame: &NDISendVideoFrame) {
        unsafe {
            (self.sdk_instance.send_send_video_v2)(self.instance, &frame.instance);
        }
        // A sync send also completes any pending async frame
        self.in_flight_video = None;
    }
    /// Submits a frame without waiting for it to be encoded. The frame is held
    /// until the next send or flush.
    pub fn send_video_async(&mut self, frame: NDISendVideoFrame) {
        unsafe {
            (self.sdk_instance.send_send_video_async_v2)(self.instance, &frame.instance);
        }
        self.in_flight_video = Some(frame);
    }
    pub fn send_video_flush(&mut self) {
        unsafe {
            (self.sdk_instance.send_send_video_async_v2)(self.instance, null());
        }
        self.in_flight_video = None;
    }

    /// Receivers currently connected, waiting up to `timeout` ms for one to appear.
    pub fn connection_count(&self, timeout: u32) -> usize {
        let count = unsafe { (self.sdk_instance.send_get_no_connections)(self.instance, timeout) };
        count.max(0) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormatType {
    Progressive = sdk::NDIlib_frame_format_type_progressive as isize,
    Interleaved = sdk::NDIlib_frame_format_type_interleaved as isize,
    Field0 = sdk::NDIlib_frame_format_type_field_0 as isize,
    Field1 = sdk::NDIlib_frame_format_type_field_1 as isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FourCC {
    Uyvy = sdk::NDIlib_FourCC_type_UYVY as isize,
    Uyva = sdk::NDIlib_FourCC_type_UYVA as isize,
    P216 = sdk::NDIlib_FourCC_type_P216 as isize,
    Pa16 = sdk::NDIlib_FourCC_type_PA16 as isize,
    Yv12 = sdk::NDIlib_FourCC_type_YV12 as isize,
    I420 = sdk::NDIlib_FourCC_type_I420 as isize,
    Nv12 = sdk::NDIlib_FourCC_type_NV12 as isize,
    Bgra = sdk::NDIlib_FourCC_type_BGRA as isize,
    Bgrx = sdk::NDIlib_FourCC_type_BGRX as isize,
    Rgba = sdk::NDIlib_FourCC_type_RGBA as isize,
    Rgbx = sdk::NDIlib_FourCC_type_RGBX as isize,
}

impl FourCC {
    const ALL: [FourCC; 11] = [
        FourCC::Uyvy,
        FourCC::Uyva,
        FourCC::P216,
        FourCC::Pa16,
        FourCC::Yv12,
        FourCC::I420,
        FourCC::Nv12,
        FourCC::Bgra,
        FourCC::Bgrx,
        FourCC::Rgba,
        FourCC::Rgbx,
    ];

    fn from_raw(raw: u32) -> Option<FourCC> {
        Self::ALL.iter().copied().find(|f| *f as u32 == raw)
    }

    /// Bytes per line of the first plane.
    pub fn min_line_stride(self, width: u64) -> u64 {
        match self {
            FourCC::Yv12 | FourCC::I420 | FourCC::Nv12 => width,
            FourCC::Uyvy | FourCC::Uyva => width * 2,
            // 16 bit samples, luma only in the first plane
            FourCC::P216 | FourCC::Pa16 => width * 2,
            FourCC::Bgra | FourCC::Bgrx | FourCC::Rgba | FourCC::Rgbx => width * 4,
        }
    }

    /// Bytes the SDK reads for a whole frame, all planes included.
    pub fn buffer_size(self, width: u64, height: u64, stride: u64) -> u64 {
        let plane = stride * height;
        match self {
            FourCC::Uyvy | FourCC::Bgra | FourCC::Bgrx | FourCC::Rgba | FourCC::Rgbx => plane,
            // 8 bit alpha plane, width bytes per line, after the UYVY plane
            FourCC::Uyva => plane + width * height,
            // interleaved UV plane at the same stride
            FourCC::P216 => plane * 2,
            // ... then a 16 bit alpha plane
            FourCC::Pa16 => plane * 3,
            // quarter size chroma, rounded up for odd heights
            FourCC::Yv12 | FourCC::I420 | FourCC::Nv12 => plane + stride * height.div_ceil(2),
        }
    }
}

pub struct NDISendVideoFrameBuilder {
    instance: sdk::NDIlib_video_frame_v2_t,
    metadata: Option<String>,
    data: Option<Vec<u8>>,
}
impl NDISendVideoFrameBuilder {
    pub fn with_framerate(mut self, num: i32, den: i32) -> Self {
        self.instance.frame_rate_N = num;
        self.instance.frame_rate_D = den;
        self
    }
    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.instance.picture_aspect_ratio = aspect_ratio;
        self
    }
    pub fn with_timecode(mut self, timecode: i64) -> Self {
        self.instance.timecode = timecode;
        self
    }
    pub fn with_data(mut self, data: Vec<u8>, line_stride: i32, format: FourCC) -> Self {
        self.data = Some(data);
        self.instance.line_stride_in_bytes = line_stride;
        self.instance.FourCC = format as u32;
        self
    }
    pub fn with_metadata(mut self, metadata: String) -> Self {
        self.metadata = Some(metadata);
        self
    }
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.instance.timestamp = timestamp;
        self
    }
    pub fn build(self) -> Result<NDISendVideoFrame, FrameBuildError> {
        let data = self.data.ok_or(FrameBuildError::MissingData)?;
        let (xres, yres, stride) = (
            self.instance.xres,
            self.instance.yres,
            self.instance.line_stride_in_bytes,
        );
        if xres <= 0 || yres <= 0 {
            return Err(FrameBuildError::InvalidSize { width: xres, height: yres });
        }
        let format = FourCC::from_raw(self.instance.FourCC).ok_or(FrameBuildError::UnknownFourCC(self.instance.FourCC))?;
        let (xres, yres) = (xres as u64, yres as u64);

        let min_stride = format.min_line_stride(xres);
        if stride <= 0 || (stride as u64) < min_stride {
            return Err(FrameBuildError::StrideTooSmall {
                minimum: min_stride as usize,
                actual: stride,
            });
        }
        let needed = format.buffer_size(xres, yres, stride as u64);
        if (data.len() as u64) < needed {
            return Err(FrameBuildError::BufferTooSmall {
                needed: needed as usize,
                actual: data.len(),
            });
        }
        let metadata = self
            .metadata
            .map(CString::new)
            .transpose()
            .map_err(|_| FrameBuildError::InvalidMetadata)?;

        let mut res = NDISendVideoFrame {
            instance: self.instance,
            _metadata: metadata,
            data,
        };
        if let Some(metadata) = &res._metadata {
            res.instance.p_metadata = metadata.as_ptr();
        }
        res.instance.p_data = res.data.as_mut_ptr();

        Ok(res)
    }
}

/// A 29.97fps frame of the given size with BGRA layout and a synthesized
/// timecode. Supply pixels with `with_data`.
pub fn create_ndi_send_video_frame(width: i32, height: i32, frame_type: FrameFormatType) -> NDISendVideoFrameBuilder {
    NDISendVideoFrameBuilder {
        instance: sdk::NDIlib_video_frame_v2_t {
            xres: width,
            yres: height,
            FourCC: sdk::NDIlib_FourCC_type_BGRA,
            frame_rate_N: 30000,
            frame_rate_D: 1001,
            picture_aspect_ratio: 0.0,
            frame_format_type: frame_type as u32,
            timecode: sdk::NDIlib_send_timecode_synthesize,
            p_data: null_mut(),
            line_stride_in_bytes: 0,
            p_metadata: null(),
            timestamp: 0,
        },
        metadata: None,
        data: None,
    }
}

/// A frame that owns its pixels, so one buffer can be rewritten and resent.
pub struct NDISendVideoFrame {
    instance: sdk::NDIlib_video_frame_v2_t,
    // Pointed to by instance.p_metadata
    _metadata: Option<CString>,
    // Pointed to by instance.p_data; never reallocated
    data: Vec<u8>,
}
impl NDISendVideoFrame {
    pub fn width(&self) -> i32 {
        self.instance.xres
    }
    pub fn height(&self) -> i32 {
        self.instance.yres
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameBuildError {
    #[error("frame has no pixel data")]
    MissingData,
    #[error("frame size {width}x{height} is not positive")]
    InvalidSize { width: i32, height: i32 },
    #[error("unknown FourCC {0:#010x}")]
    UnknownFourCC(u32),
    #[error("line stride {actual} is below the minimum of {minimum} bytes")]
    StrideTooSmall { minimum: usize, actual: i32 },
    #[error("pixel buffer holds {actual} bytes, frame needs {needed}")]
    BufferTooSmall { needed: usize, actual: usize },
    #[error("frame metadata contains a NUL byte")]
    InvalidMetadata,
}

#[derive(Debug, Error)]
pub enum SendCreateError {
    #[error("sender name contains a NUL byte")]
    InvalidName,
    #[error("the NDI runtime could not create a sender")]
    Failed,
}

pub(crate) fn create_send_instance(
    sdk_instance: Arc<NDIHandle>,
    name: &str,
    clock_video: bool,
    clock_audio: bool,
) -> Result<SendInstance, SendCreateError> {
    let name2 = CString::new(name.as_bytes()).map_err(|_| SendCreateError::InvalidName)?;

    let props = sdk::NDIlib_send_create_t {
        p_ndi_name: name2.as_ptr(),
        p_groups: null(),
        clock_video,
        clock_audio,
    };

    let instance = unsafe { (sdk_instance.send_create)(&props) };

    if instance.is_null() {
        Err(SendCreateError::Failed)
    } else {
        debug!("Created sender {:?} (clock_video={}, clock_audio={})", name, clock_video, clock_audio);
        Ok(SendInstance {
            sdk_instance,
            instance,
            in_flight_video: None,
        })
    }
}
