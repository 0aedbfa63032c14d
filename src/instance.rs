use crate::{sdk, NDIInstance};
use libloading::Library;
use log::{debug, info};
use std::env;
use std::ffi::OsString;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[cfg(target_os = "linux")]
const LIBRARY_NAMES: &[&str] = &["libndi.so.6", "libndi.so.5", "libndi.so"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libndi.dylib"];
#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
const LIBRARY_NAMES: &[&str] = &["Processing.NDI.Lib.x64.dll"];
#[cfg(all(target_os = "windows", not(target_arch = "x86_64")))]
const LIBRARY_NAMES: &[&str] = &["Processing.NDI.Lib.x86.dll"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIBRARY_NAMES: &[&str] = &["libndi.so"];

// Newest runtime first
const RUNTIME_DIR_VARS: &[&str] = &["NDI_RUNTIME_DIR_V6", "NDI_RUNTIME_DIR_V5", "NDI_RUNTIME_DIR_V3"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load the NDI runtime from any of {tried} locations")]
    NotFound { tried: usize },
    #[error("could not open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("invalid NDI runtime {}: missing {symbol}", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

pub struct NDIHandle {
    instance: sdk::NDIlib,
    initialized: AtomicBool,
}
impl Deref for NDIHandle {
    type Target = sdk::NDIlib;

    fn deref(&self) -> &sdk::NDIlib {
        &self.instance
    }
}
impl Drop for NDIHandle {
    fn drop(&mut self) {
        if self.initialized.load(Ordering::SeqCst) {
            unsafe { (self.instance.destroy)() };
            info!("NDI runtime destroyed");
        }
    }
}
impl NDIHandle {
    fn new(instance: sdk::NDIlib) -> Self {
        NDIHandle {
            instance,
            initialized: AtomicBool::new(false),
        }
    }

    pub(crate) fn initialize(&self) -> bool {
        let ok = unsafe { (self.instance.initialize)() };
        if ok {
            self.initialized.store(true, Ordering::SeqCst);
        }
        ok
    }
}

/// Every location `load` tries, in order.
pub(crate) fn candidate_paths<F>(custom_path: Option<&Path>, lookup_env: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    let mut paths = Vec::new();
    if let Some(path) = custom_path {
        paths.push(path.to_path_buf());
    }

    for name in LIBRARY_NAMES {
        paths.push(Path::new(".").join(name));
    }

    let mut dirs: Vec<PathBuf> = RUNTIME_DIR_VARS
        .iter()
        .filter_map(|var| lookup_env(var))
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect();
    if let Some(dir) = option_env!("NDI_SDK_LIB_DIR") {
        dirs.push(PathBuf::from(dir));
    }
    for dir in dirs {
        for name in LIBRARY_NAMES {
            paths.push(dir.join(name));
        }
    }

    // Bare names go through the platform's own search path
    for name in LIBRARY_NAMES {
        paths.push(PathBuf::from(name));
    }
    paths
}

// Tries each candidate in turn. A library that opens but is missing symbols
// is skipped too, so a stale copy cannot hide a valid runtime further down.
fn load_first<T, F>(candidates: &[PathBuf], mut try_load: F) -> Result<T, LoadError>
where
    F: FnMut(&Path) -> Result<T, LoadError>,
{
    let mut invalid = None;
    for path in candidates {
        match try_load(path) {
            Ok(loaded) => return Ok(loaded),
            Err(e) => {
                debug!("Skipping NDI runtime candidate {}: {}", path.display(), e);
                if let LoadError::MissingSymbol { .. } = e {
                    invalid = Some(e);
                }
            }
        }
    }

    Err(invalid.unwrap_or(LoadError::NotFound {
        tried: candidates.len(),
    }))
}

pub fn load(custom_path: Option<&Path>) -> Result<NDIInstance, LoadError> {
    let candidates = candidate_paths(custom_path, |var| env::var_os(var));

    let (path, instance) = load_first(&candidates, |path| {
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let instance = unsafe { sdk::NDIlib::load(library) }.map_err(|(symbol, source)| LoadError::MissingSymbol {
            path: path.to_path_buf(),
            symbol,
            source,
        })?;
        Ok((path.to_path_buf(), instance))
    })?;
    info!(
        "Loaded NDI runtime from {} (recording {})",
        path.display(),
        if instance.recording.is_some() { "available" } else { "unavailable" }
    );

    Ok(NDIInstance {
        handle: Arc::new(NDIHandle::new(instance)),
    })
}

#[cfg(test)]
pub(crate) fn stub_instance(with_recording: bool) -> NDIInstance {
    NDIInstance {
        handle: Arc::new(NDIHandle::new(sdk::stub::table(with_recording))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_path_is_tried_first() {
        let paths = candidate_paths(Some(Path::new("/opt/ndi/libcustom.so")), |_| None);
        assert_eq!(paths[0], PathBuf::from("/opt/ndi/libcustom.so"));
        assert_eq!(paths[1], Path::new(".").join(LIBRARY_NAMES[0]));
    }

    #[test]
    fn runtime_dirs_come_before_bare_names() {
        let paths = candidate_paths(None, |var| {
            (var == "NDI_RUNTIME_DIR_V5").then(|| OsString::from("/usr/lib/ndi"))
        });
        let in_dir = paths
            .iter()
            .position(|p| p == &Path::new("/usr/lib/ndi").join(LIBRARY_NAMES[0]))
            .expect("runtime dir candidate");
        let bare = paths
            .iter()
            .rposition(|p| p == &PathBuf::from(LIBRARY_NAMES[0]))
            .expect("bare candidate");
        assert!(in_dir < bare);
        assert_eq!(paths.last(), Some(&PathBuf::from(LIBRARY_NAMES[LIBRARY_NAMES.len() - 1])));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let with_empty = candidate_paths(None, |_| Some(OsString::new()));
        let without = candidate_paths(None, |_| None);
        assert_eq!(with_empty, without);
    }

    fn open_failure(path: &Path) -> LoadError {
        LoadError::Open {
            path: path.to_path_buf(),
            source: libloading::Error::DlOpenUnknown,
        }
    }

    fn missing_symbol(path: &Path) -> LoadError {
        LoadError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: "NDIlib_initialize",
            source: libloading::Error::DlSymUnknown,
        }
    }

    #[test]
    fn incomplete_runtime_does_not_hide_later_candidates() {
        let candidates = vec![
            PathBuf::from("./libndi.so"),
            PathBuf::from("/stale/libndi.so"),
            PathBuf::from("/opt/ndi/libndi.so.6"),
        ];
        let mut tried = Vec::new();
        let loaded = load_first(&candidates, |path| {
            tried.push(path.to_path_buf());
            match path.to_str() {
                Some("./libndi.so") => Err(open_failure(path)),
                Some("/stale/libndi.so") => Err(missing_symbol(path)),
                _ => Ok(6),
            }
        });
        assert_eq!(loaded.unwrap(), 6);
        assert_eq!(tried, candidates);
    }

    #[test]
    fn missing_symbol_reported_when_nothing_loads() {
        let candidates = vec![PathBuf::from("/stale/libndi.so"), PathBuf::from("libndi.so")];
        let res: Result<(), _> = load_first(&candidates, |path| {
            if path.starts_with("/stale") {
                Err(missing_symbol(path))
            } else {
                Err(open_failure(path))
            }
        });
        match res {
            Err(LoadError::MissingSymbol { path, symbol, .. }) => {
                assert_eq!(path, PathBuf::from("/stale/libndi.so"));
                assert_eq!(symbol, "NDIlib_initialize");
            }
            other => panic!("unexpected {:?}", other.err()),
        }
    }

    #[test]
    fn nothing_opened_is_not_found() {
        let candidates = vec![PathBuf::from("a"), PathBuf::from("b")];
        let res: Result<(), _> = load_first(&candidates, |path| Err(open_failure(path)));
        assert!(matches!(res, Err(LoadError::NotFound { tried: 2 })));
    }

    #[test]
    fn destroy_only_follows_successful_initialize() {
        sdk::stub::reset();
        sdk::stub::set_initialize_result(false);
        let instance = stub_instance(false);
        assert!(!instance.initialize());
        drop(instance);
        assert_eq!(sdk::stub::calls("destroy"), 0);

        sdk::stub::set_initialize_result(true);
        let instance = stub_instance(false);
        assert!(instance.initialize());
        drop(instance);
        assert_eq!(sdk::stub::calls("destroy"), 1);
    }

    #[test]
    fn destroy_waits_for_last_holder() {
        sdk::stub::reset();
        let instance = stub_instance(false);
        assert!(instance.initialize());
        let finder = instance.create_find_instance(&crate::finder::FindOptions::default()).unwrap();
        drop(instance);
        assert_eq!(sdk::stub::calls("destroy"), 0);
        drop(finder);
        assert_eq!(sdk::stub::calls("find_destroy"), 1);
        assert_eq!(sdk::stub::calls("destroy"), 1);
    }

    #[test]
    fn version_and_cpu_come_from_the_runtime() {
        let instance = stub_instance(false);
        assert!(instance.is_supported_cpu());
        assert_eq!(instance.version().as_deref(), Some("NDI SDK LINUX 5.6.0"));
    }
}
