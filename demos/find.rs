//! Lists NDI sources on the network as they appear and disappear.
//!
//! Usage: cargo run --example find -- --duration 60

use clap::Parser;
use ndi_sdk::finder::FindOptions;
use ndi_sdk::shutdown::{ExitFlag, RunLimit};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Watch the network for NDI sources")]
struct Args {
    /// Seconds to run for
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// How long to wait for the source list to change, in ms
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u32,

    /// Hide sources running on this machine
    #[arg(long)]
    no_local: bool,

    /// Comma separated groups to search
    #[arg(long)]
    groups: Option<String>,

    /// Comma separated addresses to query directly
    #[arg(long)]
    extra_ips: Option<String>,

    /// Explicit path to the NDI runtime library
    #[arg(long, env = "NDI_LIB_PATH")]
    ndi_lib: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let instance = ndi_sdk::load(args.ndi_lib.as_deref())?;

    // Not required, but "correct" (see the SDK documentation).
    if !instance.initialize() {
        // Most likely the CPU is not sufficient
        println!("Cannot run NDI.");
        return Ok(());
    }

    // Catch interrupt so that we can shut down gracefully
    let exit = ExitFlag::on_ctrlc()?;

    let options = FindOptions {
        show_local_sources: !args.no_local,
        groups: args.groups,
        extra_ips: args.extra_ips,
    };
    let finder = instance.create_find_instance(&options)?;

    let limit = RunLimit::new(Some(Duration::from_secs(args.duration)), exit);
    while limit.keep_running() {
        // Wait to check for new sources to be added or removed
        if !finder.wait_for_sources(args.timeout_ms) {
            println!("No change to the sources found.");
            continue;
        }

        let sources = finder.get_current_sources();
        println!("Network sources ({} found).", sources.len());
        for (i, source) in sources.iter().enumerate() {
            println!("{}. {}", i + 1, source.name);
        }
    }

    Ok(())
}
