//! Raw mirror of the NDI SDK C interface.
//!
//! Nothing here is linked at build time: the symbols are resolved from the
//! runtime library by [`NDIlib::load`].

use libloading::Library;
use std::os::raw::{c_char, c_float, c_int, c_void};

#[cfg(test)]
pub(crate) mod stub;

pub type NDIlib_find_instance_t = *mut c_void;
pub type NDIlib_recv_instance_t = *mut c_void;
pub type NDIlib_send_instance_t = *mut c_void;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_source_t {
    pub p_ndi_name: *const c_char,
    // A union with p_ip_address in the header; both are a single pointer.
    pub p_url_address: *const c_char,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_find_create_t {
    pub show_local_sources: bool,
    pub p_groups: *const c_char,
    pub p_extra_ips: *const c_char,
}

pub type NDIlib_frame_type_e = c_int;
pub const NDIlib_frame_type_none: NDIlib_frame_type_e = 0;
pub const NDIlib_frame_type_video: NDIlib_frame_type_e = 1;
pub const NDIlib_frame_type_audio: NDIlib_frame_type_e = 2;
pub const NDIlib_frame_type_metadata: NDIlib_frame_type_e = 3;
pub const NDIlib_frame_type_error: NDIlib_frame_type_e = 4;
pub const NDIlib_frame_type_status_change: NDIlib_frame_type_e = 100;

pub type NDIlib_recv_bandwidth_e = c_int;
pub const NDIlib_recv_bandwidth_metadata_only: NDIlib_recv_bandwidth_e = -10;
pub const NDIlib_recv_bandwidth_audio_only: NDIlib_recv_bandwidth_e = 10;
pub const NDIlib_recv_bandwidth_lowest: NDIlib_recv_bandwidth_e = 0;
pub const NDIlib_recv_bandwidth_highest: NDIlib_recv_bandwidth_e = 100;

pub type NDIlib_recv_color_format_e = u32;
pub const NDIlib_recv_color_format_BGRX_BGRA: NDIlib_recv_color_format_e = 0;
pub const NDIlib_recv_color_format_UYVY_BGRA: NDIlib_recv_color_format_e = 1;
pub const NDIlib_recv_color_format_RGBX_RGBA: NDIlib_recv_color_format_e = 2;
pub const NDIlib_recv_color_format_UYVY_RGBA: NDIlib_recv_color_format_e = 3;
pub const NDIlib_recv_color_format_fastest: NDIlib_recv_color_format_e = 100;
pub const NDIlib_recv_color_format_best: NDIlib_recv_color_format_e = 101;

pub type NDIlib_frame_format_type_e = u32;
pub const NDIlib_frame_format_type_interleaved: NDIlib_frame_format_type_e = 0;
pub const NDIlib_frame_format_type_progressive: NDIlib_frame_format_type_e = 1;
pub const NDIlib_frame_format_type_field_0: NDIlib_frame_format_type_e = 2;
pub const NDIlib_frame_format_type_field_1: NDIlib_frame_format_type_e = 3;

pub const fn make_fourcc(fourcc: &[u8; 4]) -> u32 {
    (fourcc[0] as u32)
        | ((fourcc[1] as u32) << 8)
        | ((fourcc[2] as u32) << 16)
        | ((fourcc[3] as u32) << 24)
}

pub type NDIlib_FourCC_type_e = u32;
pub const NDIlib_FourCC_type_UYVY: NDIlib_FourCC_type_e = make_fourcc(b"UYVY");
pub const NDIlib_FourCC_type_UYVA: NDIlib_FourCC_type_e = make_fourcc(b"UYVA");
pub const NDIlib_FourCC_type_P216: NDIlib_FourCC_type_e = make_fourcc(b"P216");
pub const NDIlib_FourCC_type_PA16: NDIlib_FourCC_type_e = make_fourcc(b"PA16");
pub const NDIlib_FourCC_type_YV12: NDIlib_FourCC_type_e = make_fourcc(b"YV12");
pub const NDIlib_FourCC_type_I420: NDIlib_FourCC_type_e = make_fourcc(b"I420");
pub const NDIlib_FourCC_type_NV12: NDIlib_FourCC_type_e = make_fourcc(b"NV12");
pub const NDIlib_FourCC_type_BGRA: NDIlib_FourCC_type_e = make_fourcc(b"BGRA");
pub const NDIlib_FourCC_type_BGRX: NDIlib_FourCC_type_e = make_fourcc(b"BGRX");
pub const NDIlib_FourCC_type_RGBA: NDIlib_FourCC_type_e = make_fourcc(b"RGBA");
pub const NDIlib_FourCC_type_RGBX: NDIlib_FourCC_type_e = make_fourcc(b"RGBX");

pub const NDIlib_send_timecode_synthesize: i64 = i64::MAX;
pub const NDIlib_recv_timestamp_undefined: i64 = i64::MAX;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_recv_create_v3_t {
    pub source_to_connect_to: NDIlib_source_t,
    pub color_format: NDIlib_recv_color_format_e,
    pub bandwidth: NDIlib_recv_bandwidth_e,
    pub allow_video_fields: bool,
    pub p_ndi_recv_name: *const c_char,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_send_create_t {
    pub p_ndi_name: *const c_char,
    pub p_groups: *const c_char,
    pub clock_video: bool,
    pub clock_audio: bool,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_video_frame_v2_t {
    pub xres: c_int,
    pub yres: c_int,
    pub FourCC: NDIlib_FourCC_type_e,
    pub frame_rate_N: c_int,
    pub frame_rate_D: c_int,
    pub picture_aspect_ratio: c_float,
    pub frame_format_type: NDIlib_frame_format_type_e,
    pub timecode: i64,
    pub p_data: *mut u8,
    pub line_stride_in_bytes: c_int,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_audio_frame_v2_t {
    pub sample_rate: c_int,
    pub no_channels: c_int,
    pub no_samples: c_int,
    pub timecode: i64,
    pub p_data: *mut c_float,
    pub channel_stride_in_bytes: c_int,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NDIlib_metadata_frame_t {
    pub length: c_int,
    pub timecode: i64,
    pub p_data: *mut c_char,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct NDIlib_recv_recording_time_t {
    pub no_frames: i64,
    pub start_time: i64,
    pub last_time: i64,
}

/// Recording entry points. Only some SDK builds export these.
#[derive(Copy, Clone)]
pub struct NDIlib_recording {
    pub recv_recording_start:
        unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_filename_hint: *const c_char) -> bool,
    pub recv_recording_stop: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t) -> bool,
    pub recv_recording_set_audio_level:
        unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, level_dB: c_float) -> bool,
    pub recv_recording_is_recording: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t) -> bool,
    pub recv_recording_get_filename: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t) -> *const c_char,
    pub recv_recording_get_error: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t) -> *const c_char,
    pub recv_recording_get_times:
        unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_times: *mut NDIlib_recv_recording_time_t) -> bool,
    pub recv_recording_is_supported: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t) -> bool,
    pub recv_free_string: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_string: *const c_char),
}

/// The resolved function table. The pointers stay valid for as long as
/// `_library` is loaded, which is the lifetime of this struct. Tables built
/// from in-process functions carry no library.
pub struct NDIlib {
    _library: Option<Library>,

    pub initialize: unsafe extern "C" fn() -> bool,
    pub destroy: unsafe extern "C" fn(),
    pub version: unsafe extern "C" fn() -> *const c_char,
    pub is_supported_CPU: unsafe extern "C" fn() -> bool,

    pub find_create_v2: unsafe extern "C" fn(p_create_settings: *const NDIlib_find_create_t) -> NDIlib_find_instance_t,
    pub find_destroy: unsafe extern "C" fn(p_instance: NDIlib_find_instance_t),
    pub find_wait_for_sources: unsafe extern "C" fn(p_instance: NDIlib_find_instance_t, timeout_in_ms: u32) -> bool,
    pub find_get_current_sources:
        unsafe extern "C" fn(p_instance: NDIlib_find_instance_t, p_no_sources: *mut u32) -> *const NDIlib_source_t,

    pub recv_create_v3: unsafe extern "C" fn(p_create_settings: *const NDIlib_recv_create_v3_t) -> NDIlib_recv_instance_t,
    pub recv_destroy: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t),
    pub recv_connect: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_src: *const NDIlib_source_t),
    pub recv_capture_v2: unsafe extern "C" fn(
        p_instance: NDIlib_recv_instance_t,
        p_video_data: *mut NDIlib_video_frame_v2_t,
        p_audio_data: *mut NDIlib_audio_frame_v2_t,
        p_metadata: *mut NDIlib_metadata_frame_t,
        timeout_in_ms: u32,
    ) -> NDIlib_frame_type_e,
    pub recv_free_video_v2: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_video_data: *const NDIlib_video_frame_v2_t),
    pub recv_free_audio_v2: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_audio_data: *const NDIlib_audio_frame_v2_t),
    pub recv_free_metadata: unsafe extern "C" fn(p_instance: NDIlib_recv_instance_t, p_metadata: *const NDIlib_metadata_frame_t),

    pub send_create: unsafe extern "C" fn(p_create_settings: *const NDIlib_send_create_t) -> NDIlib_send_instance_t,
    pub send_destroy: unsafe extern "C" fn(p_instance: NDIlib_send_instance_t),
    pub send_send_video_v2: unsafe extern "C" fn(p_instance: NDIlib_send_instance_t, p_video_data: *const NDIlib_video_frame_v2_t),
    pub send_send_video_async_v2:
        unsafe extern "C" fn(p_instance: NDIlib_send_instance_t, p_video_data: *const NDIlib_video_frame_v2_t),
    pub send_get_no_connections: unsafe extern "C" fn(p_instance: NDIlib_send_instance_t, timeout_in_ms: u32) -> c_int,

    pub recording: Option<NDIlib_recording>,
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, (&'static str, libloading::Error)> {
    library.get::<T>(name.as_bytes()).map(|s| *s).map_err(|e| (name, e))
}

unsafe fn load_recording(library: &Library) -> Option<NDIlib_recording> {
    Some(NDIlib_recording {
        recv_recording_start: symbol(library, "NDIlib_recv_recording_start").ok()?,
        recv_recording_stop: symbol(library, "NDIlib_recv_recording_stop").ok()?,
        recv_recording_set_audio_level: symbol(library, "NDIlib_recv_recording_set_audio_level").ok()?,
        recv_recording_is_recording: symbol(library, "NDIlib_recv_recording_is_recording").ok()?,
        recv_recording_get_filename: symbol(library, "NDIlib_recv_recording_get_filename").ok()?,
        recv_recording_get_error: symbol(library, "NDIlib_recv_recording_get_error").ok()?,
        recv_recording_get_times: symbol(library, "NDIlib_recv_recording_get_times").ok()?,
        recv_recording_is_supported: symbol(library, "NDIlib_recv_recording_is_supported").ok()?,
        recv_free_string: symbol(library, "NDIlib_recv_free_string").ok()?,
    })
}

impl NDIlib {
    /// Resolves every required symbol from `library`. The first missing one
    /// is returned as the error, along with the symbol name.
    ///
    /// # Safety
    /// `library` must be an NDI SDK runtime whose exports match the
    /// signatures declared here.
    pub unsafe fn load(library: Library) -> Result<NDIlib, (&'static str, libloading::Error)> {
        let lib = &library;
        let table = NDIlib {
            initialize: symbol(lib, "NDIlib_initialize")?,
            destroy: symbol(lib, "NDIlib_destroy")?,
            version: symbol(lib, "NDIlib_version")?,
            is_supported_CPU: symbol(lib, "NDIlib_is_supported_CPU")?,
            find_create_v2: symbol(lib, "NDIlib_find_create_v2")?,
            find_destroy: symbol(lib, "NDIlib_find_destroy")?,
            find_wait_for_sources: symbol(lib, "NDIlib_find_wait_for_sources")?,
            find_get_current_sources: symbol(lib, "NDIlib_find_get_current_sources")?,
            recv_create_v3: symbol(lib, "NDIlib_recv_create_v3")?,
            recv_destroy: symbol(lib, "NDIlib_recv_destroy")?,
            recv_connect: symbol(lib, "NDIlib_recv_connect")?,
            recv_capture_v2: symbol(lib, "NDIlib_recv_capture_v2")?,
            recv_free_video_v2: symbol(lib, "NDIlib_recv_free_video_v2")?,
            recv_free_audio_v2: symbol(lib, "NDIlib_recv_free_audio_v2")?,
            recv_free_metadata: symbol(lib, "NDIlib_recv_free_metadata")?,
            send_create: symbol(lib, "NDIlib_send_create")?,
            send_destroy: symbol(lib, "NDIlib_send_destroy")?,
            send_send_video_v2: symbol(lib, "NDIlib_send_send_video_v2")?,
            send_send_video_async_v2: symbol(lib, "NDIlib_send_send_video_async_v2")?,
            send_get_no_connections: symbol(lib, "NDIlib_send_get_no_connections")?,
            recording: load_recording(lib),
            _library: Some(library),
        };
        Ok(table)
    }
}
