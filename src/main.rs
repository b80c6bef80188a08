use anyhow::{Context, Result, bail};
use clap::Parser;
use dotenvy::dotenv;
use sensor_replay::synthetic::TestPatternSensor;
use sensor_replay::{RecordOptions, Recorder, RecorderConfig};
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Color/depth/skeleton session recorder (test-pattern sensor)")]
struct Args {
    /// Output log path; defaults to captures/session_YYYY_MM_DD.replay
    #[arg(long, short = 'o', env = "OUT_FILE")]
    out: Option<PathBuf>,

    /// Record the color stream
    #[arg(long, default_value_t = false)]
    color: bool,

    /// Record the depth stream
    #[arg(long, default_value_t = false)]
    depth: bool,

    /// Record the skeleton stream
    #[arg(long, default_value_t = false)]
    skeleton: bool,

    /// Record every stream (replays in correlated mode)
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Frames per second per stream
    #[arg(long, env = "FPS", default_value_t = 30)]
    fps: u32,

    /// Stop after this many frames per stream
    #[arg(long, conflicts_with = "duration")]
    frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    #[arg(long, env = "WIDTH", default_value_t = 640)]
    width: i32,

    #[arg(long, env = "HEIGHT", default_value_t = 480)]
    height: i32,

    /// Seconds between durability flushes
    #[arg(long, env = "FLUSH_INTERVAL_SECS", default_value_t = 60)]
    flush_interval: u64,
}

impl Args {
    fn options(&self) -> RecordOptions {
        if self.all {
            return RecordOptions::ALL;
        }
        let mut options = RecordOptions::NONE;
        if self.color {
            options |= RecordOptions::COLOR;
        }
        if self.depth {
            options |= RecordOptions::DEPTH;
        }
        if self.skeleton {
            options |= RecordOptions::SKELETONS;
        }
        options
    }

    fn frame_limit(&self) -> Option<u64> {
        self.frames.or_else(|| self.duration.map(|secs| (secs * f64::from(self.fps)).ceil().max(0.0) as u64))
    }
}

fn default_out_path() -> Result<PathBuf> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
        // local offset can be unavailable in multi-threaded processes
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        OffsetDateTime::from_unix_timestamp(secs).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    });
    let date = now.format(format_description!("[year]_[month]_[day]")).context("format capture date")?;
    let mut path = PathBuf::from("captures");
    path.push(format!("session_{date}.replay"));
    Ok(path)
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    // resolved before any thread exists so the local offset is available
    let out_path = match args.out.clone() {
        Some(p) => p,
        None => default_out_path()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sensor_replay=debug")),
        )
        .init();

    let options = args.options();
    if options.is_empty() {
        bail!("select at least one stream: --color, --depth, --skeleton or --all");
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
        }
    }
    let file = File::create(&out_path).with_context(|| format!("create {out_path:?}"))?;

    let mut sensor = TestPatternSensor::new(options, args.width, args.height)?;
    let calibration = sensor.calibration().to_bytes()?;
    let config = RecorderConfig { flush_interval: Duration::from_secs(args.flush_interval) };
    let mut recorder = Recorder::with_config(options, file, &calibration, config).context("write log header")?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = stop.clone();
    ctrlc::set_handler(move || stop_on_signal.store(true, Ordering::Relaxed)).context("install Ctrl+C handler")?;

    info!(path = ?out_path, %options, fps = args.fps, limit = ?args.frame_limit(), "recording test pattern");
    let produced = sensor.run(&mut recorder, args.fps, args.frame_limit(), &stop);
    let stopped = recorder.stop().context("close log");
    let produced = produced.context("record frames")?;
    stopped?;

    if stop.load(Ordering::Relaxed) {
        warn!("interrupted");
    }
    info!(path = ?out_path, frames_per_stream = produced, records = recorder.records_written(), "capture complete");
    Ok(())
}
