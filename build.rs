// build.rs
//
// The NDI runtime is loaded at run time, so nothing is linked here. If an SDK
// install can be found, its directory is baked in as NDI_SDK_LIB_DIR and used
// as a fallback search location.

use std::env;
use std::path::Path;

fn choose_source_dir() -> Option<String> {
    // Follow the 'recommended' install path
    for var in ["NDI_RUNTIME_DIR_V6", "NDI_RUNTIME_DIR_V5"] {
        println!("cargo:rerun-if-env-changed={}", var);
        if let Ok(path) = env::var(var) {
            if Path::new(&path).exists() {
                return Some(path);
            }
        }
    }

    // Try the local lib folder
    if let Ok(dir) = env::var("CARGO_MANIFEST_DIR") {
        let path = Path::new(&dir).join("lib");
        if path.exists() {
            return path.to_str().map(|s| s.to_string());
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Try the standard SDK install location on Mac OS
        let std_location = Path::new("/Library/NDI SDK for macOS/lib/macOS/");
        if std_location.exists() {
            return std_location.to_str().map(|s| s.to_string());
        }
    }

    #[cfg(target_os = "linux")]
    {
        let std_location = Path::new("/usr/share/NDI SDK for Linux/lib/x86_64-linux-gnu");
        if std_location.exists() {
            return std_location.to_str().map(|s| s.to_string());
        }
    }

    None
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if let Some(dir) = choose_source_dir() {
        println!("cargo:rustc-env=NDI_SDK_LIB_DIR={}", dir);
    }
}
