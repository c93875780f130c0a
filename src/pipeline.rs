//! Frame-to-overlay pipeline.
//!
//! One background worker runs detection, one display context applies overlay
//! batches. At most one frame is in flight:
//!
//! ```text
//!  submit ──► Idle ──► Detecting ──► Rendering ──► Idle
//!              │ busy: frame dropped
//! ```
//!
//! Frames that arrive outside `Idle` are dropped, never queued. Batches reach the
//! display in submission order because nothing is pipelined.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};

use crate::detect::{BufferDetection, Detection, Detector};
use crate::frame::{BufferDimensions, FrameBuffer};

/// Batches the worker may have queued for a slow display context.
const BATCH_QUEUE_DEPTH: usize = 4;
/// How often a blocked dispatch re-checks for teardown.
const DISPATCH_POLL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Detecting = 1,
    Rendering = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Detecting,
            2 => PipelineState::Rendering,
            _ => PipelineState::Idle,
        }
    }
}

/// Outcome of handing a frame to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Pipeline was busy (or stopped); the frame was discarded.
    Dropped,
}

/// Everything the display context needs to redraw one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayBatch {
    /// Sequence number of the frame the batch came from.
    pub sequence: u64,
    pub detections: Vec<BufferDetection>,
}

impl OverlayBatch {
    /// Scale normalized detections to absolute buffer pixels.
    pub fn from_detections(
        sequence: u64,
        dimensions: BufferDimensions,
        detections: Vec<Detection>,
    ) -> Self {
        let detections = detections
            .into_iter()
            .map(|det| BufferDetection {
                bounds: det.bounds.to_buffer_space(dimensions),
                confidence: det.confidence,
                labels: det.labels,
            })
            .collect();
        Self {
            sequence,
            detections,
        }
    }
}

/// Point-in-time pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub detection_passes: u64,
    pub detection_failures: u64,
    pub batches_dispatched: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} dropped={} passes={} failures={} dispatched={}",
            self.frames_accepted,
            self.frames_dropped,
            self.detection_passes,
            self.detection_failures,
            self.batches_dispatched
        )
    }
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    passes: AtomicU64,
    failures: AtomicU64,
    dispatched: AtomicU64,
}

struct Shared {
    state: AtomicU8,
    torn_down: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set(&self, to: PipelineState) {
        self.state.store(to as u8, Ordering::SeqCst);
    }

    fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            frames_accepted: c.accepted.load(Ordering::Relaxed),
            frames_dropped: c.dropped.load(Ordering::Relaxed),
            detection_passes: c.passes.load(Ordering::Relaxed),
            detection_failures: c.failures.load(Ordering::Relaxed),
            batches_dispatched: c.dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Receiving end of the worker-to-display handoff.
pub struct BatchReceiver {
    batches: Receiver<OverlayBatch>,
    shared: Arc<Shared>,
}

impl BatchReceiver {
    /// True once the owning pipeline has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }

    pub(crate) fn channel(&self) -> &Receiver<OverlayBatch> {
        &self.batches
    }
}

/// Read-only view of a pipeline's state and counters.
///
/// Stays valid after the pipeline itself has moved to another thread or shut down.
#[derive(Clone)]
pub struct PipelineMonitor {
    shared: Arc<Shared>,
}

impl PipelineMonitor {
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats()
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }
}

/// Handle to a running pipeline.
pub struct Pipeline {
    frames: Option<Sender<FrameBuffer>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    dimensions: BufferDimensions,
}

impl Pipeline {
    /// Start the detection worker. The returned receiver belongs to the display context.
    pub fn spawn(detector: Detector) -> Result<(Self, BatchReceiver)> {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameBuffer>(1);
        let (batch_tx, batch_rx) = crossbeam_channel::bounded::<OverlayBatch>(BATCH_QUEUE_DEPTH);
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PipelineState::Idle as u8),
            torn_down: AtomicBool::new(false),
            counters: Counters::default(),
        });
        let dimensions = detector.dimensions();

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("overlay-detect".to_string())
            .spawn(move || run_worker(detector, frame_rx, batch_tx, worker_shared))
            .map_err(|e| anyhow!("failed to spawn detection worker: {}", e))?;

        let receiver = BatchReceiver {
            batches: batch_rx,
            shared: shared.clone(),
        };
        Ok((
            Self {
                frames: Some(frame_tx),
                shared,
                worker: Some(worker),
                dimensions,
            },
            receiver,
        ))
    }

    /// Offer a frame. Accepted only when the pipeline is idle.
    pub fn submit(&self, frame: FrameBuffer) -> Submission {
        let Some(frames) = self.frames.as_ref() else {
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Submission::Dropped;
        };

        if !self
            .shared
            .transition(PipelineState::Idle, PipelineState::Detecting)
        {
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "frame #{} dropped: pipeline {:?}",
                frame.sequence(),
                self.shared.state()
            );
            return Submission::Dropped;
        }

        match frames.try_send(frame) {
            Ok(()) => {
                self.shared.counters.accepted.fetch_add(1, Ordering::Relaxed);
                Submission::Accepted
            }
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => {
                self.shared.set(PipelineState::Idle);
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("frame #{} dropped: worker unavailable", frame.sequence());
                Submission::Dropped
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn dimensions(&self) -> BufferDimensions {
        self.dimensions
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor {
            shared: self.shared.clone(),
        }
    }

    /// Stop accepting frames and wait for the worker.
    ///
    /// An in-flight pass runs to completion; its batch is discarded.
    pub fn shutdown(mut self) -> Result<PipelineStats> {
        self.teardown()?;
        Ok(self.stats())
    }

    fn teardown(&mut self) -> Result<()> {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        self.frames.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("detection worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            log::error!("pipeline teardown failed: {}", e);
        }
    }
}

fn run_worker(
    mut detector: Detector,
    frames: Receiver<FrameBuffer>,
    batches: Sender<OverlayBatch>,
    shared: Arc<Shared>,
) {
    let dimensions = detector.dimensions();
    for frame in frames.iter() {
        let sequence = frame.sequence();
        // A panicking backend costs one frame, not the worker.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame)));
        let detections = match outcome {
            Ok(Ok(detections)) => detections,
            Ok(Err(e)) => {
                shared.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("frame #{}: detection failed: {}", sequence, e);
                Vec::new()
            }
            Err(payload) => {
                shared.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "frame #{}: detector panicked: {}",
                    sequence,
                    panic_message(payload.as_ref())
                );
                Vec::new()
            }
        };
        drop(frame);
        shared.counters.passes.fetch_add(1, Ordering::Relaxed);
        shared.set(PipelineState::Rendering);

        if shared.torn_down.load(Ordering::SeqCst) {
            log::debug!("frame #{}: result discarded after teardown", sequence);
            shared.set(PipelineState::Idle);
            continue;
        }

        let batch = OverlayBatch::from_detections(sequence, dimensions, detections);
        if dispatch(&batches, batch, &shared) {
            shared.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        }
        shared.set(PipelineState::Idle);
    }
    log::debug!("detection worker exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Hand a batch to the display. Gives up once the pipeline is torn down so a
/// display that stopped pumping cannot wedge shutdown.
fn dispatch(batches: &Sender<OverlayBatch>, mut batch: OverlayBatch, shared: &Shared) -> bool {
    loop {
        match batches.send_timeout(batch, DISPATCH_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(pending)) => {
                if shared.torn_down.load(Ordering::SeqCst) {
                    log::debug!("frame #{}: result discarded after teardown", pending.sequence);
                    return false;
                }
                batch = pending;
            }
            Err(SendTimeoutError::Disconnected(pending)) => {
                log::debug!("frame #{}: display context gone, batch discarded", pending.sequence);
                return false;
            }
        }
    }
}
