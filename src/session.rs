//! Host lifecycle: wires a detector, a frame source, the pipeline and the
//! display context together.
//!
//! Startup order is detector, then source, then pipeline. A failure at either
//! of the first two steps returns before any thread is spawned, so a session
//! that failed to start never runs a detection pass.
//!
//! The capture thread owns the pipeline. When the source stops, for any reason,
//! the pipeline is torn down with it and the display context sees the channel close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::config::PipelineConfig;
use crate::detect::Detector;
use crate::display::DisplayContext;
use crate::error::StartupError;
use crate::ingest::{open_source, FrameSource, SourceStats};
use crate::overlay::OverlayRenderer;
use crate::pipeline::{Pipeline, PipelineMonitor, PipelineStats, Submission};

type CaptureOutcome = Result<(PipelineStats, SourceStats)>;

/// A running capture session.
pub struct Session {
    monitor: PipelineMonitor,
    stop: Arc<AtomicBool>,
    capture: Option<JoinHandle<CaptureOutcome>>,
}

impl Session {
    /// Open the model and the source from `config`, then start capturing.
    pub fn start<R: OverlayRenderer>(
        config: &PipelineConfig,
        renderer: R,
    ) -> Result<(Self, DisplayContext<R>), StartupError> {
        let detector = Detector::open(&config.model, config.source.dimensions)?;
        let source = open_source(&config.source)?;
        Self::start_with(detector, source, config, renderer)
    }

    /// Start with an already-opened detector and connected source.
    pub fn start_with<R: OverlayRenderer>(
        detector: Detector,
        source: Box<dyn FrameSource>,
        config: &PipelineConfig,
        renderer: R,
    ) -> Result<(Self, DisplayContext<R>), StartupError> {
        if source.dimensions() != detector.dimensions() {
            return Err(StartupError::InvalidConfig(format!(
                "source produces {} frames but the detector expects {}",
                source.dimensions(),
                detector.dimensions()
            )));
        }
        let dimensions = detector.dimensions();

        let (pipeline, batches) =
            Pipeline::spawn(detector).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
        let monitor = pipeline.monitor();
        let display = DisplayContext::new(
            renderer,
            batches,
            dimensions,
            config.display.size,
            config.display.orientation,
        )
        .with_style(config.style);

        let stop = Arc::new(AtomicBool::new(false));
        let frame_interval = Duration::from_secs(1) / config.source.target_fps.max(1);
        let capture = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("overlay-capture".to_string())
                .spawn(move || run_capture(source, pipeline, stop, frame_interval))
                .map_err(|e| {
                    StartupError::InvalidConfig(format!("failed to spawn capture thread: {}", e))
                })?
        };

        log::info!(
            "session started: {} frames every {:?}, display {}x{}",
            dimensions,
            frame_interval,
            config.display.size.width,
            config.display.size.height
        );
        Ok((
            Self {
                monitor,
                stop,
                capture: Some(capture),
            },
            display,
        ))
    }

    pub fn stats(&self) -> PipelineStats {
        self.monitor.stats()
    }

    /// True while the capture loop is running.
    pub fn is_running(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop capture and wait for the pipeline to tear down.
    ///
    /// Also valid after the source has already stopped on its own.
    pub fn stop(mut self) -> Result<(PipelineStats, SourceStats)> {
        let (stats, source_stats) = self.join_capture()?;
        log::info!("session stopped: {}", stats);
        Ok((stats, source_stats))
    }

    fn join_capture(&mut self) -> CaptureOutcome {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self
            .capture
            .take()
            .ok_or_else(|| anyhow!("session already stopped"))?;
        handle
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))?
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.capture.is_none() {
            return;
        }
        if let Err(e) = self.join_capture() {
            log::error!("session shutdown failed: {:#}", e);
        }
    }
}

fn run_capture(
    mut source: Box<dyn FrameSource>,
    pipeline: Pipeline,
    stop: Arc<AtomicBool>,
    frame_interval: Duration,
) -> CaptureOutcome {
    let mut next_tick = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("frame source failed, stopping capture: {:#}", e);
                break;
            }
        };
        if pipeline.submit(frame) == Submission::Dropped {
            log::trace!("capture: frame dropped by busy pipeline");
        }

        next_tick += frame_interval;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
    let source_stats = source.stats();
    let stats = pipeline.shutdown()?;
    log::debug!("capture ended after {} frames; pipeline torn down", source_stats.frames_captured);
    Ok((stats, source_stats))
}
