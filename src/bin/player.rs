use anyhow::{Context, Result};
use clap::Parser;
use crc32fast::Hasher as Crc32;
use sensor_replay::frame::{PayloadMode, ReplayColorImageFrame, ReplayDepthImageFrame, ReplayFrame, ReplaySkeletonFrame};
use sensor_replay::synthetic::Calibration;
use sensor_replay::{DispatchQueue, Replay, ReplayAllFrames, ReplayConfig, ReplayMode};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Replay a recorded color/depth/skeleton session with its original timing")]
struct Args {
    /// Input log to replay
    #[arg(long, short = 'i', env = "REPLAY_FILE")]
    input: PathBuf,

    /// One timeline per modality even when every modality was recorded
    #[arg(long, default_value_t = false)]
    independent: bool,

    /// Copy pixel payloads into memory while parsing
    #[arg(long, default_value_t = false)]
    eager: bool,

    /// Print a CRC32 of each resolved pixel payload
    #[arg(long, default_value_t = false)]
    checksum: bool,

    /// Print the parsed frame index and exit without replaying
    #[arg(long, default_value_t = false)]
    inspect: bool,
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn color_line(frame: &ReplayColorImageFrame, checksum: bool) -> String {
    let mut line = format!(
        "color     #{:<6} +{:>4}ms {}x{} bpp={} {:?} bytes={}",
        frame.frame_number(),
        frame.timestamp(),
        frame.width(),
        frame.height(),
        frame.bytes_per_pixel(),
        frame.format(),
        frame.pixel_data_len()
    );
    if checksum {
        match frame.pixel_data() {
            Ok(pixels) => line.push_str(&format!(" crc={:#010x}", crc32(&pixels))),
            Err(e) => warn!(frame = frame.frame_number(), "color payload unreadable: {e}"),
        }
    }
    line
}

fn depth_line(frame: &ReplayDepthImageFrame, checksum: bool) -> String {
    let mut line = format!(
        "depth     #{:<6} +{:>4}ms {}x{} {:?} samples={}",
        frame.frame_number(),
        frame.timestamp(),
        frame.width(),
        frame.height(),
        frame.format(),
        frame.pixel_data_len()
    );
    if checksum {
        match frame.pixel_data() {
            Ok(samples) => {
                let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                line.push_str(&format!(" crc={:#010x}", crc32(&bytes)));
            }
            Err(e) => warn!(frame = frame.frame_number(), "depth payload unreadable: {e}"),
        }
    }
    line
}

fn skeleton_line(frame: &ReplaySkeletonFrame) -> String {
    format!(
        "skeletons #{:<6} +{:>4}ms {:?} tracked={} floor={:?}",
        frame.frame_number(),
        frame.timestamp(),
        frame.tracking_mode(),
        frame.tracked_skeletons().count(),
        frame.floor_clip_plane()
    )
}

fn all_frames_lines(unit: &ReplayAllFrames, checksum: bool) -> String {
    let mut out = format!("unit      #{:<6}\n  {}", unit.frame_number(), color_line(unit.color(), checksum));
    if let Some(depth) = unit.depth() {
        out.push_str(&format!("\n  {}", depth_line(depth, checksum)));
    }
    if let Some(skeletons) = unit.skeletons() {
        out.push_str(&format!("\n  {}", skeleton_line(skeletons)));
    }
    out
}

fn inspect(replay: &Replay, checksum: bool) {
    for unit in replay.all_frames() {
        println!("{}", all_frames_lines(unit, checksum));
    }
    for frame in replay.color_frames() {
        println!("{}", color_line(frame, checksum));
    }
    for frame in replay.depth_frames() {
        println!("{}", depth_line(frame, checksum));
    }
    for frame in replay.skeleton_frames() {
        println!("{}", skeleton_line(frame));
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sensor_replay=debug")),
        )
        .init();

    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let config = ReplayConfig {
        payload_mode: if args.eager { PayloadMode::Eager } else { PayloadMode::Lazy },
        mode: if args.independent { ReplayMode::Independent } else { ReplayMode::Auto },
    };
    // handlers run here, on the thread that pumps the queue
    let queue = DispatchQueue::new();
    let mut replay = Replay::with_config(BufReader::new(file), config, queue.handle())
        .with_context(|| format!("parse {:?}", args.input))?;

    match Calibration::from_bytes(replay.calibration()) {
        Ok(c) => eprintln!(
            "Header: {} calibration={}x{} color_f={:.2} depth_f={:.2}",
            replay.options(),
            c.width,
            c.height,
            c.color_focal_length,
            c.depth_focal_length
        ),
        Err(_) => eprintln!("Header: {} calibration={} bytes", replay.options(), replay.calibration().len()),
    }
    eprintln!(
        "Parsed: color={} depth={} skeletons={} units={} dropped={}",
        replay.color_frames().len(),
        replay.depth_frames().len(),
        replay.skeleton_frames().len(),
        replay.all_frames().len(),
        replay.dropped_records()
    );

    if args.inspect {
        inspect(&replay, args.checksum);
        return Ok(());
    }

    let delivered = Arc::new(AtomicUsize::new(0));
    let checksum = args.checksum;
    {
        let delivered = delivered.clone();
        replay.on_color(move |frame| {
            delivered.fetch_add(1, Ordering::Relaxed);
            println!("{}", color_line(frame, checksum));
        });
    }
    {
        let delivered = delivered.clone();
        replay.on_depth(move |frame| {
            delivered.fetch_add(1, Ordering::Relaxed);
            println!("{}", depth_line(frame, checksum));
        });
    }
    {
        let delivered = delivered.clone();
        replay.on_skeletons(move |frame| {
            delivered.fetch_add(1, Ordering::Relaxed);
            println!("{}", skeleton_line(frame));
        });
    }
    {
        let delivered = delivered.clone();
        replay.on_all_frames(move |unit| {
            delivered.fetch_add(1, Ordering::Relaxed);
            println!("{}", all_frames_lines(unit, checksum));
        });
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let on_signal = interrupted.clone();
    ctrlc::set_handler(move || on_signal.store(true, Ordering::Relaxed)).context("install Ctrl+C handler")?;

    replay.start().context("start replay")?;
    queue.run_until(|| replay.is_finished() || interrupted.load(Ordering::Relaxed));
    if interrupted.load(Ordering::Relaxed) {
        replay.stop();
        // release playback threads blocked on the queue
        queue.run_until_finished(&replay);
        warn!("interrupted");
    }
    info!(delivered = delivered.load(Ordering::Relaxed), "replay complete");
    Ok(())
}
