//! Connects to the first NDI source found and records it to disk, if the
//! source allows it.
//!
//! Usage: cargo run --example recv_record -- --duration 30

use clap::Parser;
use ndi_sdk::finder::{FindOptions, FindSource};
use ndi_sdk::receive::{ReceiveCaptureResult, ReceiveInstanceExt, ReceiveSettings};
use ndi_sdk::shutdown::{ExitFlag, RunLimit};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Record an NDI source")]
struct Args {
    /// Seconds to record for
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Record the source with this name instead of the first one found
    #[arg(long)]
    source: Option<String>,

    /// Name this receiver shows to the source
    #[arg(long, default_value = "Example Record Receiver")]
    receiver_name: String,

    /// Hint the SDK uses to name the recording
    #[arg(long, default_value = "Record Example")]
    filename_hint: String,

    /// Explicit path to the NDI runtime library
    #[arg(long, env = "NDI_LIB_PATH")]
    ndi_lib: Option<PathBuf>,
}

fn pick_source(sources: Vec<FindSource>, wanted: Option<&str>) -> Option<FindSource> {
    match wanted {
        Some(name) => sources.into_iter().find(|s| s.name == name),
        None => sources.into_iter().next(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let instance = ndi_sdk::load(args.ndi_lib.as_deref())?;
    if !instance.initialize() {
        println!("Cannot run NDI.");
        return Ok(());
    }

    // Catch interrupt so that we can shut down gracefully
    let exit = ExitFlag::on_ctrlc()?;

    // We wait until there is at least one source on the network
    let source = {
        let finder = instance.create_find_instance(&FindOptions::default())?;
        loop {
            if exit.is_raised() {
                return Ok(());
            }
            finder.wait_for_sources(1000);
            if let Some(source) = pick_source(finder.get_current_sources(), args.source.as_deref()) {
                break source;
            }
        }
    };
    log::info!("Found source: {}", source.name);

    // The SDK defaults prefer YCbCr video, with BGRA when the source has alpha
    let settings = ReceiveSettings {
        source: Some(source),
        name: Some(args.receiver_name),
        ..ReceiveSettings::default()
    };
    let receiver = instance.create_receive_instance(&settings)?;

    let mut is_recording = false;
    let limit = RunLimit::new(Some(Duration::from_secs(args.duration)), exit);
    while limit.keep_running() {
        // Only interested in status changes, so no frame buffers are passed
        let timeout = if is_recording { 250 } else { 1000 };
        match receiver.receive_capture(false, false, false, timeout) {
            // There is a status change on the receiver, e.g. recording became available
            Ok(ReceiveCaptureResult::StatusChange) => {
                if !is_recording && receiver.recording_is_supported() {
                    println!("This source supports recording !");

                    match receiver.recording_start(&args.filename_hint) {
                        Ok(()) => {
                            is_recording = true;
                            println!("Starting recording !");
                        }
                        Err(e) => log::warn!("Could not start recording: {}", e),
                    }
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("Capture failed: {}", e),
        }

        if is_recording {
            if let Some(times) = receiver.recording_times() {
                // Seconds in the SDK's 100 ns time base. The SDK's C example
                // divides by 1e8 instead, so its figure is ten times smaller.
                println!(
                    "Recorded {} frames, {} seconds.",
                    times.frames,
                    times.duration().as_secs_f32()
                );
            }
        }
    }

    if is_recording {
        println!("Stop recording now !");
        if let Err(e) = receiver.recording_stop() {
            log::warn!("Could not stop recording: {}", e);
        }
        if let Some(error) = receiver.recording_error() {
            log::warn!("Recording reported: {}", error);
        }

        // Available while recording too
        if let Some(filename) = receiver.recording_filename() {
            println!("The file is stored at : {}", filename);
        }
    }

    Ok(())
}
