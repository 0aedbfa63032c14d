use crate::finder::FindSource;
use crate::sdk;
use std::ffi::{CStr, CString, NulError};
use std::os::raw::c_char;
use std::ptr::null;

// Messy return type to keep the CStrings alive long enough
pub fn to_ndi_source(source: &FindSource) -> Result<(CString, Option<CString>, sdk::NDIlib_source_t), NulError> {
    let source_name = CString::new(source.name.as_bytes())?;
    let source_url = match &source.url {
        None => None,
        Some(url) => Some(CString::new(url.as_bytes())?),
    };

    let res = sdk::NDIlib_source_t {
        p_ndi_name: source_name.as_ptr(),
        p_url_address: source_url.as_ref().map_or(null(), |url| url.as_ptr()),
    };

    Ok((source_name, source_url, res))
}

pub fn to_optional_cstring(value: Option<&str>) -> Result<Option<CString>, NulError> {
    value.map(CString::new).transpose()
}

pub fn optional_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(null(), |v| v.as_ptr())
}

/// Copies a nullable C string out of SDK-owned memory.
///
/// # Safety
/// `ptr` must be null or point to a NUL terminated string.
pub unsafe fn from_ndi_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}
