//! Sends a frame that flashes between black and white, clocked by the SDK.
//!
//! Usage: cargo run --example send_video -- --name "My Video"

use clap::Parser;
use ndi_sdk::send::{create_ndi_send_video_frame, FourCC, FrameFormatType};
use ndi_sdk::shutdown::{average_fps, ExitFlag, RunLimit};
use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(about = "Send a synthetic NDI video source")]
struct Args {
    /// Source name shown on the network
    #[arg(long, default_value = "My Video")]
    name: String,

    #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    #[arg(long, default_value_t = 480, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Frames between fps reports
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(1..))]
    batch: u32,

    /// Seconds to run for; runs until interrupted when unset
    #[arg(long)]
    duration: Option<u64>,

    /// Explicit path to the NDI runtime library
    #[arg(long, env = "NDI_LIB_PATH")]
    ndi_lib: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let instance = ndi_sdk::load(args.ndi_lib.as_deref())?;
    if !instance.initialize() {
        println!("Cannot run NDI.");
        return Ok(());
    }

    let exit = ExitFlag::on_ctrlc()?;

    // Clocked to the video, so each send waits for its slot
    let mut sender = instance.create_send_instance(&args.name, true, true)?;

    let width = i32::try_from(args.width)?;
    let height = i32::try_from(args.height)?;
    let stride = width.checked_mul(4).ok_or("frame width too large")?;
    let len = usize::try_from(stride)?
        .checked_mul(args.height as usize)
        .ok_or("frame size overflows")?;
    let mut frame = create_ndi_send_video_frame(width, height, FrameFormatType::Interleaved)
        .with_data(vec![0; len], stride, FourCC::Bgrx)
        .build()?;

    let limit = RunLimit::new(args.duration.map(Duration::from_secs), exit);
    while limit.keep_running() {
        let start_time = Instant::now();

        let mut sent = 0;
        for idx in 0..args.batch {
            if !limit.keep_running() {
                break;
            }
            frame.fill(if idx & 1 == 1 { 255 } else { 0 });

            sender.send_video(&frame);
            sent += 1;
        }

        println!(
            "{} frames sent, average fps={:.2}",
            sent,
            average_fps(sent as u64, start_time.elapsed())
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_batch_must_be_positive() {
        assert!(Args::try_parse_from(["send_video", "--batch", "0"]).is_err());
        assert!(Args::try_parse_from(["send_video", "--width", "0"]).is_err());
        assert!(Args::try_parse_from(["send_video", "--height", "-480"]).is_err());
        let args = Args::try_parse_from(["send_video"]).unwrap();
        assert_eq!((args.width, args.height, args.batch), (720, 480, 200));
    }
}
