use crate::instance::NDIHandle;
use crate::sdk;
use crate::util::{from_ndi_string, optional_ptr, to_optional_cstring};
use log::debug;
use std::slice;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindSource {
    pub name: String,
    pub url: Option<String>,
}

/// Discovery settings. The defaults show sources on this machine and use the
/// groups configured for it.
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub show_local_sources: bool,
    /// Comma separated group names
    pub groups: Option<String>,
    /// Comma separated addresses to query directly, for networks without mDNS
    pub extra_ips: Option<String>,
}
impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            show_local_sources: true,
            groups: None,
            extra_ips: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FindCreateError {
    #[error("find options contain a NUL byte")]
    InvalidString,
    #[error("the NDI runtime could not create a finder")]
    Failed,
}

// The SDK allows a finder to be used from another thread, but not concurrently
unsafe impl Send for FindInstance {}
pub struct FindInstance {
    sdk_instance: Arc<NDIHandle>,
    instance: sdk::NDIlib_find_instance_t,
}
impl Drop for FindInstance {
    fn drop(&mut self) {
        unsafe {
            (self.sdk_instance.find_destroy)(self.instance);
        }
    }
}
impl FindInstance {
    pub fn get_current_sources(&self) -> Vec<FindSource> {
        unsafe {
            let mut source_count = 0;
            // Memory is freed on next call, or destroy
            let sources = (self.sdk_instance.find_get_current_sources)(self.instance, &mut source_count);
            if sources.is_null() {
                return Vec::new();
            }

            slice::from_raw_parts(sources, source_count as usize)
                .iter()
                .map(|s| FindSource {
                    name: from_ndi_string(s.p_ndi_name).unwrap_or_default(),
                    url: from_ndi_string(s.p_url_address),
                })
                .collect()
        }
    }

    /// Blocks for up to `timeout` ms. Returns true if the list of sources changed.
    pub fn wait_for_sources(&self, timeout: u32) -> bool {
        unsafe { (self.sdk_instance.find_wait_for_sources)(self.instance, timeout) }
    }
}

pub(crate) fn create_find_instance(
    sdk_instance: Arc<NDIHandle>,
    options: &FindOptions,
) -> Result<FindInstance, FindCreateError> {
    let groups = to_optional_cstring(options.groups.as_deref()).map_err(|_| FindCreateError::InvalidString)?;
    let extra_ips = to_optional_cstring(options.extra_ips.as_deref()).map_err(|_| FindCreateError::InvalidString)?;

    let props = sdk::NDIlib_find_create_t {
        show_local_sources: options.show_local_sources,
        p_groups: optional_ptr(&groups),
        p_extra_ips: optional_ptr(&extra_ips),
    };

    let instance = unsafe { (sdk_instance.find_create_v2)(&props) };

    if instance.is_null() {
        Err(FindCreateError::Failed)
    } else {
        debug!("Created finder with {:?}", options);
        Ok(FindInstance {
            sdk_instance,
            instance,
        })
    }
}
