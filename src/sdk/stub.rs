//! An in-process stand-in for the NDI runtime. Every entry point records that
//! it was called; capture results and a few return values can be scripted.
//!
//! State is thread local, and each test runs on its own thread.

use super::*;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::{null, NonNull};

thread_local! {
    static CALLS: RefCell<HashMap<&'static str, usize>> = RefCell::new(HashMap::new());
    static NEXT_FRAME: Cell<NDIlib_frame_type_e> = const { Cell::new(NDIlib_frame_type_none) };
    static INITIALIZE_OK: Cell<bool> = const { Cell::new(true) };
    static RECORDING_ERROR: Cell<bool> = const { Cell::new(false) };
    static SOURCES: Vec<NDIlib_source_t> = vec![
        NDIlib_source_t {
            p_ndi_name: b"STUDIO (Camera 1)\0".as_ptr() as *const c_char,
            p_url_address: b"10.0.0.5:5961\0".as_ptr() as *const c_char,
        },
        NDIlib_source_t {
            p_ndi_name: b"STUDIO (Camera 2)\0".as_ptr() as *const c_char,
            p_url_address: null(),
        },
    ];
}

static PIXELS: [u8; 64] = [0x80; 64];
static SAMPLES: [f32; 8] = [0.25; 8];
const METADATA: &[u8] = b"<ndi_tally on_program=\"true\"/>\0";
const RECORDING_FILE: &[u8] = b"/tmp/Record Example.mov\0";
const RECORDING_ERROR_TEXT: &[u8] = b"disk full\0";

pub fn reset() {
    CALLS.with(|c| c.borrow_mut().clear());
    NEXT_FRAME.with(|f| f.set(NDIlib_frame_type_none));
    INITIALIZE_OK.with(|i| i.set(true));
    RECORDING_ERROR.with(|e| e.set(false));
}

/// How often `name` (the SDK function name without the `NDIlib_` prefix) was called.
pub fn calls(name: &str) -> usize {
    CALLS.with(|c| c.borrow().get(name).copied().unwrap_or(0))
}

pub fn set_next_frame(frame_type: NDIlib_frame_type_e) {
    NEXT_FRAME.with(|f| f.set(frame_type));
}

pub fn set_initialize_result(ok: bool) {
    INITIALIZE_OK.with(|i| i.set(ok));
}

pub fn set_recording_error(present: bool) {
    RECORDING_ERROR.with(|e| e.set(present));
}

fn record(name: &'static str) {
    CALLS.with(|c| *c.borrow_mut().entry(name).or_insert(0) += 1);
}

fn handle() -> *mut c_void {
    NonNull::<c_void>::dangling().as_ptr()
}

extern "C" fn initialize() -> bool {
    record("initialize");
    INITIALIZE_OK.with(|i| i.get())
}
extern "C" fn destroy() {
    record("destroy");
}
extern "C" fn version() -> *const c_char {
    b"NDI SDK LINUX 5.6.0\0".as_ptr() as *const c_char
}
extern "C" fn is_supported_cpu() -> bool {
    true
}

extern "C" fn find_create_v2(_settings: *const NDIlib_find_create_t) -> NDIlib_find_instance_t {
    record("find_create_v2");
    handle()
}
extern "C" fn find_destroy(_instance: NDIlib_find_instance_t) {
    record("find_destroy");
}
extern "C" fn find_wait_for_sources(_instance: NDIlib_find_instance_t, _timeout: u32) -> bool {
    record("find_wait_for_sources");
    true
}
unsafe extern "C" fn find_get_current_sources(_instance: NDIlib_find_instance_t, count: *mut u32) -> *const NDIlib_source_t {
    record("find_get_current_sources");
    SOURCES.with(|s| {
        *count = s.len() as u32;
        s.as_ptr()
    })
}

extern "C" fn recv_create_v3(_settings: *const NDIlib_recv_create_v3_t) -> NDIlib_recv_instance_t {
    record("recv_create_v3");
    handle()
}
extern "C" fn recv_destroy(_instance: NDIlib_recv_instance_t) {
    record("recv_destroy");
}
extern "C" fn recv_connect(_instance: NDIlib_recv_instance_t, _source: *const NDIlib_source_t) {
    record("recv_connect");
}
unsafe extern "C" fn recv_capture_v2(
    _instance: NDIlib_recv_instance_t,
    video: *mut NDIlib_video_frame_v2_t,
    audio: *mut NDIlib_audio_frame_v2_t,
    metadata: *mut NDIlib_metadata_frame_t,
    _timeout: u32,
) -> NDIlib_frame_type_e {
    record("recv_capture_v2");
    let frame_type = NEXT_FRAME.with(|f| f.get());
    match frame_type {
        NDIlib_frame_type_video if !video.is_null() => {
            let video = &mut *video;
            video.xres = 4;
            video.yres = 4;
            video.FourCC = NDIlib_FourCC_type_BGRX;
            video.frame_rate_N = 30000;
            video.frame_rate_D = 1001;
            video.line_stride_in_bytes = 16;
            video.p_data = PIXELS.as_ptr() as *mut u8;
            video.timecode = 1234;
        }
        NDIlib_frame_type_audio if !audio.is_null() => {
            let audio = &mut *audio;
            audio.sample_rate = 48000;
            audio.no_channels = 2;
            audio.no_samples = 4;
            audio.channel_stride_in_bytes = 16;
            audio.p_data = SAMPLES.as_ptr() as *mut f32;
        }
        NDIlib_frame_type_metadata if !metadata.is_null() => {
            let metadata = &mut *metadata;
            metadata.length = METADATA.len() as c_int;
            metadata.timecode = 99;
            metadata.p_data = METADATA.as_ptr() as *mut c_char;
        }
        _ => {}
    }
    frame_type
}
extern "C" fn recv_free_video_v2(_instance: NDIlib_recv_instance_t, _video: *const NDIlib_video_frame_v2_t) {
    record("recv_free_video_v2");
}
extern "C" fn recv_free_audio_v2(_instance: NDIlib_recv_instance_t, _audio: *const NDIlib_audio_frame_v2_t) {
    record("recv_free_audio_v2");
}
extern "C" fn recv_free_metadata(_instance: NDIlib_recv_instance_t, _metadata: *const NDIlib_metadata_frame_t) {
    record("recv_free_metadata");
}

extern "C" fn send_create(_settings: *const NDIlib_send_create_t) -> NDIlib_send_instance_t {
    record("send_create");
    handle()
}
extern "C" fn send_destroy(_instance: NDIlib_send_instance_t) {
    record("send_destroy");
}
extern "C" fn send_send_video_v2(_instance: NDIlib_send_instance_t, _video: *const NDIlib_video_frame_v2_t) {
    record("send_send_video_v2");
}
extern "C" fn send_send_video_async_v2(_instance: NDIlib_send_instance_t, video: *const NDIlib_video_frame_v2_t) {
    if video.is_null() {
        record("send_send_video_async_v2(flush)");
    } else {
        record("send_send_video_async_v2");
    }
}
extern "C" fn send_get_no_connections(_instance: NDIlib_send_instance_t, _timeout: u32) -> c_int {
    2
}

extern "C" fn recv_recording_start(_instance: NDIlib_recv_instance_t, _hint: *const c_char) -> bool {
    record("recv_recording_start");
    true
}
extern "C" fn recv_recording_stop(_instance: NDIlib_recv_instance_t) -> bool {
    record("recv_recording_stop");
    true
}
extern "C" fn recv_recording_set_audio_level(_instance: NDIlib_recv_instance_t, _level: c_float) -> bool {
    true
}
extern "C" fn recv_recording_is_recording(_instance: NDIlib_recv_instance_t) -> bool {
    true
}
extern "C" fn recv_recording_get_filename(_instance: NDIlib_recv_instance_t) -> *const c_char {
    RECORDING_FILE.as_ptr() as *const c_char
}
extern "C" fn recv_recording_get_error(_instance: NDIlib_recv_instance_t) -> *const c_char {
    if RECORDING_ERROR.with(|e| e.get()) {
        RECORDING_ERROR_TEXT.as_ptr() as *const c_char
    } else {
        null()
    }
}
unsafe extern "C" fn recv_recording_get_times(
    _instance: NDIlib_recv_instance_t,
    times: *mut NDIlib_recv_recording_time_t,
) -> bool {
    *times = NDIlib_recv_recording_time_t {
        no_frames: 60,
        start_time: 10_000_000,
        last_time: 30_000_000,
    };
    true
}
extern "C" fn recv_recording_is_supported(_instance: NDIlib_recv_instance_t) -> bool {
    true
}
extern "C" fn recv_free_string(_instance: NDIlib_recv_instance_t, _string: *const c_char) {
    record("recv_free_string");
}

/// A function table backed by the stubs above, optionally without the
/// recording entry points.
pub fn table(with_recording: bool) -> NDIlib {
    NDIlib {
        _library: None,
        initialize,
        destroy,
        version,
        is_supported_CPU: is_supported_cpu,
        find_create_v2,
        find_destroy,
        find_wait_for_sources,
        find_get_current_sources,
        recv_create_v3,
        recv_destroy,
        recv_connect,
        recv_capture_v2,
        recv_free_video_v2,
        recv_free_audio_v2,
        recv_free_metadata,
        send_create,
        send_destroy,
        send_send_video_v2,
        send_send_video_async_v2,
        send_get_no_connections,
        recording: with_recording.then_some(NDIlib_recording {
            recv_recording_start,
            recv_recording_stop,
            recv_recording_set_audio_level,
            recv_recording_is_recording,
            recv_recording_get_filename,
            recv_recording_get_error,
            recv_recording_get_times,
            recv_recording_is_supported,
            recv_free_string,
        }),
    }
}
