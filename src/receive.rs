use crate::finder::FindSource;
use crate::instance::NDIHandle;
use crate::sdk;
use crate::util::{from_ndi_string, optional_ptr, to_ndi_source, to_optional_cstring};
use log::{debug, warn};
use ptrplus::AsPtr;
use std::collections::HashMap;
use std::ffi::CString;
use std::ops::Deref;
use std::ptr::{null, null_mut};
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use thiserror::Error;

pub struct GuardedPointer<'a, T, T2> {
    _guard: MutexGuard<'a, T>,
    value: &'a [T2],
}
impl<'a, T, T2> Deref for GuardedPointer<'a, T, T2> {
    type Target = [T2];

    fn deref(&self) -> &[T2] {
        self.value
    }
}

pub type VideoFrameData<'a> = GuardedPointer<'a, sdk::NDIlib_video_frame_v2_t, u8>;
unsafe impl Send for VideoFrame {}
unsafe impl Sync for VideoFrame {}
pub struct VideoFrame {
    id: usize,
    instance: Arc<Mutex<sdk::NDIlib_video_frame_v2_t>>,
    parent: Weak<ReceiveInstance>,

    pub width: i32,
    pub height: i32,

    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub fourcc: u32,
    pub picture_aspect_ratio: f32,
    pub line_stride: i32,
    pub timecode: i64,
    pub timestamp: i64,
}
impl Drop for VideoFrame {
    fn drop(&mut self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.free_video(self.id);
        }
    }
}
impl VideoFrame {
    /// The pixel data, or None once the receiver has been dropped.
    pub fn lock_data(&self) -> Option<VideoFrameData<'_>> {
        let locked = self.instance.lock().ok()?;
        if locked.p_data.is_null() {
            return None;
        }
        unsafe {
            let len = locked.line_stride_in_bytes * locked.yres;
            let data = slice::from_raw_parts(locked.p_data, len as usize);
            Some(GuardedPointer {
                _guard: locked,
                value: data,
            })
        }
    }
}

pub type AudioFrameData<'a> = GuardedPointer<'a, sdk::NDIlib_audio_frame_v2_t, f32>;
unsafe impl Send for AudioFrame {}
unsafe impl Sync for AudioFrame {}
pub struct AudioFrame {
    id: usize,
    instance: Arc<Mutex<sdk::NDIlib_audio_frame_v2_t>>,
    parent: Weak<ReceiveInstance>,

    pub sample_rate: i32,
    pub channel_count: i32,
    pub sample_count: i32,
    pub timecode: i64,
    pub timestamp: i64,
}
impl Drop for AudioFrame {
    fn drop(&mut self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.free_audio(self.id);
        }
    }
}
impl AudioFrame {
    /// Planar samples, one channel after another.
    pub fn lock_data(&self) -> Option<AudioFrameData<'_>> {
        let locked = self.instance.lock().ok()?;
        if locked.p_data.is_null() {
            return None;
        }
        unsafe {
            // Divide by four as this is a list of f32
            let len = locked.channel_stride_in_bytes * locked.no_channels / 4;
            let data = slice::from_raw_parts(locked.p_data, len as usize);
            Some(GuardedPointer {
                _guard: locked,
                value: data,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFrame {
    pub data: String,
    pub timecode: i64,
}

struct ReceiveDataStore<T> {
    data: Mutex<HashMap<usize, Arc<Mutex<T>>>>,
    next_id: AtomicUsize,
}
impl<T> ReceiveDataStore<T> {
    fn new() -> Self {
        ReceiveDataStore {
            data: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
    fn remove(&self, id: usize) -> Option<Arc<Mutex<T>>> {
        self.data.lock().ok()?.remove(&id)
    }
    fn track(&self, data: T) -> Option<(usize, Arc<Mutex<T>>)> {
        let tracked = Arc::new(Mutex::new(data));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame_list = self.data.lock().ok()?;
        frame_list.insert(id, tracked.clone());
        Some((id, tracked))
    }
    fn len(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }
}

/// Frame counts and times reported by an active recording.
///
/// Times are in the SDK's 100ns units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingTimes {
    pub frames: i64,
    pub start_time: i64,
    pub last_time: i64,
}
impl RecordingTimes {
    fn from_raw(raw: &sdk::NDIlib_recv_recording_time_t) -> Self {
        RecordingTimes {
            frames: raw.no_frames,
            start_time: raw.start_time,
            last_time: raw.last_time,
        }
    }

    pub fn duration(&self) -> Duration {
        let ticks = self.last_time.saturating_sub(self.start_time).max(0) as u64;
        Duration::from_nanos(ticks.saturating_mul(100))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordingError {
    #[error("this NDI runtime does not support recording")]
    Unsupported,
    #[error("recording filename hint contains a NUL byte")]
    InvalidName,
    #[error("the receiver rejected the recording request")]
    Rejected,
}

// All receiver calls into the SDK are thread safe; frame bookkeeping is behind mutexes
unsafe impl Send for ReceiveInstance {}
unsafe impl Sync for ReceiveInstance {}
pub struct ReceiveInstance {
    sdk_instance: Arc<NDIHandle>,
    instance: sdk::NDIlib_recv_instance_t,
    video_frames: ReceiveDataStore<sdk::NDIlib_video_frame_v2_t>,
    audio_frames: ReceiveDataStore<sdk::NDIlib_audio_frame_v2_t>,
}
impl Drop for ReceiveInstance {
    fn drop(&mut self) {
        unsafe {
            if let Ok(frame_store) = self.video_frames.data.lock() {
                for f in frame_store.values() {
                    self.free_video_inner(f)
                }
            }
            if let Ok(frame_store) = self.audio_frames.data.lock() {
                for f in frame_store.values() {
                    self.free_audio_inner(f)
                }
            }

            (self.sdk_instance.recv_destroy)(self.instance);
        }
    }
}
impl ReceiveInstance {
    /// Switches to `source`, or disconnects when given None.
    pub fn connect(&self, source: Option<&FindSource>) -> bool {
        match source {
            None => unsafe {
                (self.sdk_instance.recv_connect)(self.instance, null());
                true
            },
            Some(s) => {
                if let Ok(s2) = to_ndi_source(s) {
                    unsafe {
                        (self.sdk_instance.recv_connect)(self.instance, &s2.2);
                    }

                    true
                } else {
                    false
                }
            }
        }
    }

    /// Number of captured frames the caller still holds.
    pub fn frames_in_use(&self) -> usize {
        self.video_frames.len() + self.audio_frames.len()
    }

    fn free_video(&self, id: usize) {
        if let Some(frame) = self.video_frames.remove(id) {
            self.free_video_inner(&frame);
        }
    }
    fn free_video_inner(&self, video: &Arc<Mutex<sdk::NDIlib_video_frame_v2_t>>) {
        match video.lock() {
            Ok(mut ndi_ref) => unsafe {
                (self.sdk_instance.recv_free_video_v2)(self.instance, &*ndi_ref);
                ndi_ref.p_data = null_mut();
            },
            Err(_) => warn!("Video frame lock poisoned, frame leaked"),
        }
    }
    fn free_audio(&self, id: usize) {
        if let Some(frame) = self.audio_frames.remove(id) {
            self.free_audio_inner(&frame);
        }
    }
    fn free_audio_inner(&self, audio: &Arc<Mutex<sdk::NDIlib_audio_frame_v2_t>>) {
        match audio.lock() {
            Ok(mut ndi_ref) => unsafe {
                (self.sdk_instance.recv_free_audio_v2)(self.instance, &*ndi_ref);
                ndi_ref.p_data = null_mut();
            },
            Err(_) => warn!("Audio frame lock poisoned, frame leaked"),
        }
    }

    fn recording_api(&self) -> Result<&sdk::NDIlib_recording, RecordingError> {
        self.sdk_instance.recording.as_ref().ok_or(RecordingError::Unsupported)
    }

    /// Whether the connected source can be recorded. Only meaningful once a
    /// status change has been seen after connecting.
    pub fn recording_is_supported(&self) -> bool {
        match self.recording_api() {
            Ok(api) => unsafe { (api.recv_recording_is_supported)(self.instance) },
            Err(_) => false,
        }
    }

    /// Starts recording the connected source. The SDK picks the final file
    /// name from `filename_hint`; query it with [`Self::recording_filename`].
    pub fn recording_start(&self, filename_hint: &str) -> Result<(), RecordingError> {
        let api = self.recording_api()?;
        let hint = CString::new(filename_hint).map_err(|_| RecordingError::InvalidName)?;
        if unsafe { (api.recv_recording_start)(self.instance, hint.as_ptr()) } {
            debug!("Recording started with hint {:?}", filename_hint);
            Ok(())
        } else {
            Err(RecordingError::Rejected)
        }
    }

    pub fn recording_stop(&self) -> Result<(), RecordingError> {
        let api = self.recording_api()?;
        if unsafe { (api.recv_recording_stop)(self.instance) } {
            Ok(())
        } else {
            Err(RecordingError::Rejected)
        }
    }

    pub fn recording_is_recording(&self) -> bool {
        match self.recording_api() {
            Ok(api) => unsafe { (api.recv_recording_is_recording)(self.instance) },
            Err(_) => false,
        }
    }

    /// Gain applied to recorded audio, in dB.
    pub fn recording_set_audio_level(&self, level_db: f32) -> Result<(), RecordingError> {
        let api = self.recording_api()?;
        if unsafe { (api.recv_recording_set_audio_level)(self.instance, level_db) } {
            Ok(())
        } else {
            Err(RecordingError::Rejected)
        }
    }

    /// Path of the file being (or last) recorded.
    pub fn recording_filename(&self) -> Option<String> {
        let api = self.recording_api().ok()?;
        unsafe { self.take_string(api, (api.recv_recording_get_filename)(self.instance)) }
    }

    /// The last recording error, if any.
    pub fn recording_error(&self) -> Option<String> {
        let api = self.recording_api().ok()?;
        unsafe { self.take_string(api, (api.recv_recording_get_error)(self.instance)) }
    }

    pub fn recording_times(&self) -> Option<RecordingTimes> {
        let api = self.recording_api().ok()?;
        let mut raw = sdk::NDIlib_recv_recording_time_t::default();
        if unsafe { (api.recv_recording_get_times)(self.instance, &mut raw) } {
            Some(RecordingTimes::from_raw(&raw))
        } else {
            None
        }
    }

    unsafe fn take_string(&self, api: &sdk::NDIlib_recording, ptr: *const std::os::raw::c_char) -> Option<String> {
        let value = from_ndi_string(ptr);
        if !ptr.is_null() {
            (api.recv_free_string)(self.instance, ptr);
        }
        value
    }
}

#[derive(Debug, Error)]
pub enum ReceiveCaptureError {
    #[error("the SDK returned a frame type that was not requested")]
    Failed,
    #[error("frame store lock poisoned")]
    Poisoned,
    #[error("the SDK returned an unknown frame type {0}")]
    Invalid(i32),
    #[error("the connection to the source was lost")]
    ConnectionLost,
}

pub enum ReceiveCaptureResult {
    None,
    Video(VideoFrame),
    Audio(AudioFrame),
    Metadata(MetadataFrame),
    /// Something about the connection changed, e.g. recording became available
    StatusChange,
}

pub trait ReceiveInstanceExt {
    fn receive_capture(
        &self,
        capture_video: bool,
        capture_audio: bool,
        capture_metadata: bool,
        timeout: u32,
    ) -> Result<ReceiveCaptureResult, ReceiveCaptureError>;
}

impl ReceiveInstanceExt for Arc<ReceiveInstance> {
    fn receive_capture(
        &self,
        capture_video: bool,
        capture_audio: bool,
        capture_metadata: bool,
        timeout: u32,
    ) -> Result<ReceiveCaptureResult, ReceiveCaptureError> {
        let video_data = if capture_video {
            Some(sdk::NDIlib_video_frame_v2_t {
                xres: 0,
                yres: 0,
                FourCC: 0,
                frame_rate_N: 0,
                frame_rate_D: 0,
                picture_aspect_ratio: 0.0,
                frame_format_type: sdk::NDIlib_frame_format_type_progressive,
                timecode: 0,
                p_data: null_mut(),
                line_stride_in_bytes: 0,
                p_metadata: null(),
                timestamp: 0,
            })
        } else {
            None
        };
        let audio_data = if capture_audio {
            Some(sdk::NDIlib_audio_frame_v2_t {
                sample_rate: 0,
                no_channels: 0,
                no_samples: 0,
                timecode: 0,
                p_data: null_mut(),
                channel_stride_in_bytes: 0,
                p_metadata: null(),
                timestamp: 0,
            })
        } else {
            None
        };
        let metadata = if capture_metadata {
            Some(sdk::NDIlib_metadata_frame_t {
                length: 0,
                timecode: 0,
                p_data: null_mut(),
            })
        } else {
            None
        };

        let captured = unsafe {
            (self.sdk_instance.recv_capture_v2)(
                self.instance,
                video_data.as_ref().as_ptr() as *mut sdk::NDIlib_video_frame_v2_t,
                audio_data.as_ref().as_ptr() as *mut sdk::NDIlib_audio_frame_v2_t,
                metadata.as_ref().as_ptr() as *mut sdk::NDIlib_metadata_frame_t,
                timeout,
            )
        };
        match captured {
            sdk::NDIlib_frame_type_video => match video_data {
                None => Err(ReceiveCaptureError::Failed),
                Some(video_data) => match self.video_frames.track(video_data) {
                    None => Err(ReceiveCaptureError::Poisoned),
                    Some(v) => {
                        let frame = VideoFrame {
                            id: v.0,
                            instance: v.1,
                            parent: Arc::downgrade(self),

                            width: video_data.xres,
                            height: video_data.yres,

                            frame_rate_d: video_data.frame_rate_D,
                            frame_rate_n: video_data.frame_rate_N,
                            fourcc: video_data.FourCC,
                            picture_aspect_ratio: video_data.picture_aspect_ratio,
                            line_stride: video_data.line_stride_in_bytes,

                            timecode: video_data.timecode,

                            timestamp: video_data.timestamp,
                        };
                        Ok(ReceiveCaptureResult::Video(frame))
                    }
                },
            },
            sdk::NDIlib_frame_type_audio => match audio_data {
                None => Err(ReceiveCaptureError::Failed),
                Some(audio_data) => match self.audio_frames.track(audio_data) {
                    None => Err(ReceiveCaptureError::Poisoned),
                    Some(v) => {
                        let frame = AudioFrame {
                            id: v.0,
                            instance: v.1,
                            parent: Arc::downgrade(self),

                            sample_rate: audio_data.sample_rate,
                            channel_count: audio_data.no_channels,
                            sample_count: audio_data.no_samples,
                            timecode: audio_data.timecode,
                            timestamp: audio_data.timestamp,
                        };
                        Ok(ReceiveCaptureResult::Audio(frame))
                    }
                },
            },
            sdk::NDIlib_frame_type_metadata => match metadata {
                None => Err(ReceiveCaptureError::Failed),
                Some(metadata) => {
                    // Copied out so the SDK buffer can go straight back
                    let frame = MetadataFrame {
                        data: unsafe { from_ndi_string(metadata.p_data) }.unwrap_or_default(),
                        timecode: metadata.timecode,
                    };
                    unsafe { (self.sdk_instance.recv_free_metadata)(self.instance, &metadata) };
                    Ok(ReceiveCaptureResult::Metadata(frame))
                }
            },
            sdk::NDIlib_frame_type_status_change => Ok(ReceiveCaptureResult::StatusChange),
            sdk::NDIlib_frame_type_none => Ok(ReceiveCaptureResult::None),
            sdk::NDIlib_frame_type_error => Err(ReceiveCaptureError::ConnectionLost),
            other => Err(ReceiveCaptureError::Invalid(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReceiveCreateError {
    #[error("receiver name or source contains a NUL byte")]
    InvalidString,
    #[error("the NDI runtime could not create a receiver")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveBandwidth {
    MetadataOnly = sdk::NDIlib_recv_bandwidth_metadata_only as isize,
    AudioOnly = sdk::NDIlib_recv_bandwidth_audio_only as isize,
    Lowest = sdk::NDIlib_recv_bandwidth_lowest as isize,
    #[default]
    Highest = sdk::NDIlib_recv_bandwidth_highest as isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveColorFormat {
    BgrxBgra = sdk::NDIlib_recv_color_format_BGRX_BGRA as isize, // No alpha channel: BGRX, Alpha channel: BGRA
    #[default]
    UyvyBgra = sdk::NDIlib_recv_color_format_UYVY_BGRA as isize, // No alpha channel: UYVY, Alpha channel: BGRA
    RgbxRgba = sdk::NDIlib_recv_color_format_RGBX_RGBA as isize, // No alpha channel: RGBX, Alpha channel: RGBA
    UyvyRgba = sdk::NDIlib_recv_color_format_UYVY_RGBA as isize, // No alpha channel: UYVY, Alpha channel: RGBA
    Fastest = sdk::NDIlib_recv_color_format_fastest as isize,
    Best = sdk::NDIlib_recv_color_format_best as isize,
}

/// Receiver settings. The defaults are those of the SDK header.
#[derive(Debug, Clone)]
pub struct ReceiveSettings {
    /// Connect to this source straight away
    pub source: Option<FindSource>,
    pub bandwidth: ReceiveBandwidth,
    pub color_format: ReceiveColorFormat,
    pub allow_video_fields: bool,
    /// How this receiver shows up to the source
    pub name: Option<String>,
}
impl Default for ReceiveSettings {
    fn default() -> Self {
        ReceiveSettings {
            source: None,
            bandwidth: ReceiveBandwidth::default(),
            color_format: ReceiveColorFormat::default(),
            allow_video_fields: true,
            name: None,
        }
    }
}

pub(crate) fn create_receive_instance(
    sdk_instance: Arc<NDIHandle>,
    settings: &ReceiveSettings,
) -> Result<Arc<ReceiveInstance>, ReceiveCreateError> {
    let source = settings
        .source
        .as_ref()
        .map(to_ndi_source)
        .transpose()
        .map_err(|_| ReceiveCreateError::InvalidString)?;
    let name = to_optional_cstring(settings.name.as_deref()).map_err(|_| ReceiveCreateError::InvalidString)?;

    let props = sdk::NDIlib_recv_create_v3_t {
        source_to_connect_to: match &source {
            Some(s) => s.2,
            None => sdk::NDIlib_source_t {
                p_ndi_name: null(),
                p_url_address: null(),
            },
        },
        color_format: settings.color_format as u32,
        bandwidth: settings.bandwidth as i32,
        allow_video_fields: settings.allow_video_fields,
        p_ndi_recv_name: optional_ptr(&name),
    };

    let instance = unsafe { (sdk_instance.recv_create_v3)(&props) };

    if instance.is_null() {
        Err(ReceiveCreateError::Failed)
    } else {
        debug!(
            "Created receiver {:?} for {:?}",
            settings.name,
            settings.source.as_ref().map(|s| &s.name)
        );
        Ok(Arc::new(ReceiveInstance {
            sdk_instance,
            instance,
            video_frames: ReceiveDataStore::new(),
            audio_frames: ReceiveDataStore::new(),
        }))
    }
}
