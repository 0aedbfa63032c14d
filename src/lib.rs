use crate::finder::{FindCreateError, FindInstance, FindOptions};
use crate::instance::NDIHandle;
use crate::receive::{ReceiveCreateError, ReceiveInstance, ReceiveSettings};
use crate::send::{SendCreateError, SendInstance};
use std::ffi::CStr;
use std::sync::Arc;

#[allow(
    non_snake_case,
    non_camel_case_types,
    non_upper_case_globals,
    dead_code,
    clippy::all
)]
mod sdk;

pub mod finder;
mod instance;
pub mod receive;
pub mod send;
pub mod shutdown;
mod util;

pub use crate::instance::{load, LoadError};

pub struct NDIInstance {
    handle: Arc<NDIHandle>,
}
impl NDIInstance {
    /// Not required, but "correct" (see the SDK documentation). Returns false
    /// when the CPU cannot run NDI.
    pub fn initialize(&self) -> bool {
        self.handle.initialize()
    }

    pub fn is_supported_cpu(&self) -> bool {
        unsafe { (self.handle.is_supported_CPU)() }
    }

    pub fn version(&self) -> Option<String> {
        unsafe {
            let version = (self.handle.version)();
            if version.is_null() {
                None
            } else {
                Some(CStr::from_ptr(version).to_string_lossy().into_owned())
            }
        }
    }

    pub fn create_find_instance(&self, options: &FindOptions) -> Result<FindInstance, FindCreateError> {
        finder::create_find_instance(self.handle.clone(), options)
    }

    pub fn create_receive_instance(
        &self,
        settings: &ReceiveSettings,
    ) -> Result<Arc<ReceiveInstance>, ReceiveCreateError> {
        receive::create_receive_instance(self.handle.clone(), settings)
    }

    pub fn create_send_instance(
        &self,
        name: &str,
        clock_video: bool,
        clock_audio: bool,
    ) -> Result<SendInstance, SendCreateError> {
        send::create_send_instance(self.handle.clone(), name, clock_video, clock_audio)
    }
}
