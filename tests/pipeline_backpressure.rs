//! Backpressure and ordering tests for the frame pipeline.
//!
//! A gated backend blocks inside `detect` until the test releases it, so "busy"
//! does not depend on timing.

use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};

use detect_overlay::{
    BufferDimensions, Detection, Detector, DetectorBackend, DisplayContext, DisplaySize,
    FrameBuffer, NormalizedRect, Orientation, Pipeline, PipelineState, PixelFormat,
    RecordingRenderer, Submission,
};

const DIMS: BufferDimensions = BufferDimensions::new(8, 6);

struct GatedBackend {
    started: Sender<()>,
    release: Receiver<()>,
}

impl DetectorBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        let _ = self.started.send(());
        let _ = self.release.recv();
        Ok(vec![Detection::new(NormalizedRect::new(0.25, 0.25, 0.5, 0.5), 0.9)])
    }
}

struct SlowBackend(Duration);

impl DetectorBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        std::thread::sleep(self.0);
        Ok(Vec::new())
    }
}

/// Panics on its first pass, then reports one box per frame.
#[derive(Default)]
struct PanicsOnce {
    panicked: bool,
}

impl DetectorBackend for PanicsOnce {
    fn name(&self) -> &'static str {
        "panics-once"
    }

    fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        if !self.panicked {
            self.panicked = true;
            panic!("model runtime aborted");
        }
        Ok(vec![Detection::new(NormalizedRect::new(0.1, 0.1, 0.2, 0.2), 0.7)])
    }
}

fn frame(sequence: u64) -> FrameBuffer {
    let len = PixelFormat::Rgb24.frame_len(DIMS).expect("frame len");
    FrameBuffer::new(vec![0u8; len], DIMS, PixelFormat::Rgb24, sequence).expect("frame")
}

fn gated_pipeline() -> (Pipeline, DisplayContext<RecordingRenderer>, Receiver<()>, Sender<()>) {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let detector = Detector::with_backend(
        GatedBackend {
            started: started_tx,
            release: release_rx,
        },
        DIMS,
    );
    let (pipeline, batches) = Pipeline::spawn(detector).expect("spawn pipeline");
    let display = DisplayContext::new(
        RecordingRenderer::new(),
        batches,
        DIMS,
        DisplaySize::new(16.0, 12.0),
        Orientation::default(),
    );
    (pipeline, display, started_rx, release_tx)
}

fn wait_for_idle(pipeline: &Pipeline) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.state() != PipelineState::Idle {
        assert!(Instant::now() < deadline, "pipeline never returned to idle");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn frames_arriving_mid_detection_are_dropped() {
    let (pipeline, mut display, started, release) = gated_pipeline();

    assert_eq!(pipeline.submit(frame(1)), Submission::Accepted);
    started.recv_timeout(Duration::from_secs(5)).expect("detection started");
    assert_eq!(pipeline.state(), PipelineState::Detecting);

    assert_eq!(pipeline.submit(frame(2)), Submission::Dropped);
    assert_eq!(pipeline.submit(frame(3)), Submission::Dropped);

    release.send(()).expect("release");
    wait_for_idle(&pipeline);
    assert_eq!(display.pump(), 1);
    assert_eq!(display.last_sequence(), Some(1));

    // Ready for the next arriving frame; the dropped ones never come back.
    assert_eq!(pipeline.submit(frame(4)), Submission::Accepted);
    started.recv_timeout(Duration::from_secs(5)).expect("detection started");
    release.send(()).expect("release");
    wait_for_idle(&pipeline);
    assert_eq!(display.pump(), 1);
    assert_eq!(display.last_sequence(), Some(4));

    let stats = pipeline.shutdown().expect("shutdown");
    assert_eq!(stats.frames_accepted, 2);
    assert_eq!(stats.frames_dropped, 2);
    assert_eq!(stats.detection_passes, 2);
}

#[test]
fn three_rapid_frames_with_slow_detection_yield_one_pass() {
    let detector = Detector::with_backend(SlowBackend(Duration::from_millis(200)), DIMS);
    let (pipeline, _batches) = Pipeline::spawn(detector).expect("spawn pipeline");

    let outcomes: Vec<Submission> = (1..=3).map(|seq| pipeline.submit(frame(seq))).collect();
    assert_eq!(
        outcomes,
        vec![Submission::Accepted, Submission::Dropped, Submission::Dropped]
    );

    wait_for_idle(&pipeline);
    let stats = pipeline.shutdown().expect("shutdown");
    assert_eq!(stats.detection_passes, 1);
    assert_eq!(stats.frames_dropped, 2);
}

#[test]
fn batches_are_applied_in_submission_order() {
    let detector = Detector::with_backend(SlowBackend(Duration::from_millis(1)), DIMS);
    let (pipeline, batches) = Pipeline::spawn(detector).expect("spawn pipeline");
    let mut display = DisplayContext::new(
        RecordingRenderer::new(),
        batches,
        DIMS,
        DisplaySize::new(16.0, 12.0),
        Orientation::default(),
    );

    let mut seen = Vec::new();
    for seq in 10..15 {
        assert_eq!(pipeline.submit(frame(seq)), Submission::Accepted);
        wait_for_idle(&pipeline);
        assert_eq!(display.pump(), 1);
        seen.push(display.last_sequence().expect("sequence"));
    }
    assert_eq!(seen, vec![10, 11, 12, 13, 14]);
    pipeline.shutdown().expect("shutdown");
}

#[test]
fn in_flight_result_is_discarded_after_teardown() {
    let (pipeline, mut display, started, release) = gated_pipeline();

    assert_eq!(pipeline.submit(frame(1)), Submission::Accepted);
    started.recv_timeout(Duration::from_secs(5)).expect("detection started");

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        let _ = release.send(());
    });
    let stats = pipeline.shutdown().expect("shutdown");
    releaser.join().expect("releaser");

    assert_eq!(stats.detection_passes, 1);
    assert_eq!(stats.batches_dispatched, 0);
    assert_eq!(display.run_until_closed(), 0);
    assert_eq!(display.renderer().clears(), 0);
}

#[test]
fn idle_shutdown_reports_no_activity() {
    let detector = Detector::with_backend(SlowBackend(Duration::ZERO), DIMS);
    let (pipeline, _batches) = Pipeline::spawn(detector).expect("spawn pipeline");
    assert_eq!(pipeline.state(), PipelineState::Idle);
    let stats = pipeline.shutdown().expect("shutdown");
    assert_eq!(stats, detect_overlay::PipelineStats::default());
}

#[test]
fn panicking_backend_costs_one_frame_not_the_pipeline() {
    let detector = Detector::with_backend(PanicsOnce::default(), DIMS);
    let (pipeline, batches) = Pipeline::spawn(detector).expect("spawn pipeline");
    let mut display = DisplayContext::new(
        RecordingRenderer::new(),
        batches,
        DIMS,
        DisplaySize::new(16.0, 12.0),
        Orientation::default(),
    );

    assert_eq!(pipeline.submit(frame(1)), Submission::Accepted);
    wait_for_idle(&pipeline);
    assert_eq!(display.pump(), 1);
    assert_eq!(display.renderer().shape_count(), 0);

    for seq in 2..=4 {
        assert_eq!(pipeline.submit(frame(seq)), Submission::Accepted);
        wait_for_idle(&pipeline);
        assert_eq!(display.pump(), 1);
        assert_eq!(display.renderer().shape_count(), 1);
        assert_eq!(display.last_sequence(), Some(seq));
    }

    let stats = pipeline.shutdown().expect("shutdown");
    assert_eq!(stats.detection_passes, 4);
    assert_eq!(stats.detection_failures, 1);
    assert_eq!(stats.batches_dispatched, 4);
    assert_eq!(stats.frames_dropped, 0);
}
