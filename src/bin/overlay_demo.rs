//! overlay_demo - run the detection overlay pipeline against a configured source
//!
//! This binary:
//! 1. Loads the session config (file + env overrides)
//! 2. Opens the detector and the frame source (fails fast if either is missing)
//! 3. Acts as the display thread: applies overlay batches to an in-memory renderer
//! 4. Logs overlay updates and pipeline health until the time limit or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use detect_overlay::ui::Ui;
use detect_overlay::{DisplaySize, PipelineConfig, RecordingRenderer, Session};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const STATUS_INTERVAL: Duration = Duration::from_millis(250);
const DISPLAY_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "overlay_demo",
    about = "Run the camera detection overlay pipeline"
)]
struct Args {
    /// JSON config file (overrides OVERLAY_CONFIG).
    #[arg(long, value_name = "PATH", env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Override the source frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Override the display size, e.g. 1334x750.
    #[arg(long, value_name = "WxH")]
    display: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let config = {
        let _stage = ui.stage("Load config");
        let mut config = PipelineConfig::load_from(args.config.as_deref())?;
        if let Some(fps) = args.fps {
            if fps == 0 {
                return Err(anyhow!("fps must be >= 1"));
            }
            config.source.target_fps = fps;
        }
        if let Some(display) = args.display.as_deref() {
            config.display.size = DisplaySize::parse(display)?;
        }
        config
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    let (session, mut display) = {
        let _stage = ui.stage("Open detector + source");
        Session::start(&config, RecordingRenderer::new())?
    };
    log::info!(
        "model={} source={} {} @ {} fps",
        config.model.path,
        config.source.url,
        config.source.dimensions,
        config.source.target_fps
    );

    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    let live = ui.live();
    let mut last_health_log = Instant::now();
    let mut last_status = Instant::now();

    // This thread is the display context from here on.
    while !stop.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        if display.pump_timeout(DISPLAY_POLL) > 0 {
            let state = display.renderer().state();
            log::debug!(
                "frame #{}: {} boxes {:?}",
                display.last_sequence().unwrap_or_default(),
                state.shapes.len(),
                state.display_bounds()
            );
        }

        if last_status.elapsed() >= STATUS_INTERVAL {
            live.update(&session.stats(), display.renderer().shape_count());
            last_status = Instant::now();
        }
        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            log::info!(
                "pipeline health: running={} {}",
                session.is_running(),
                session.stats()
            );
            last_health_log = Instant::now();
        }
        if !session.is_running() {
            log::warn!("capture stopped; ending session");
            break;
        }
    }

    let (stats, source_stats) = session.stop()?;
    display.pump();
    live.finish(&stats);
    log::info!(
        "captured {} frames from {}; {}; overlay redraws={} transform builds={}",
        source_stats.frames_captured,
        source_stats.url,
        stats,
        display.batches_applied(),
        display.transform_builds()
    );
    Ok(())
}
