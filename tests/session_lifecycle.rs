//! Session startup failures and an end-to-end run on stub resources.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use detect_overlay::geometry::DisplayTransform;
use detect_overlay::{
    BufferDimensions, Detector, DisplaySize, FrameBuffer, FrameSource, OverlayRenderer,
    PipelineConfig, Rect, RectStyle, RecordingRenderer, Session, SourceStats, StartupError,
    SyntheticSource,
};

/// Renderer for sessions that are expected to fail before drawing.
struct NullRenderer;

impl OverlayRenderer for NullRenderer {
    fn clear_all(&mut self) {}

    fn add_rectangle(&mut self, _bounds: Rect, _style: &RectStyle, _confidence: f32) {}

    fn apply_transform(&mut self, _transform: &DisplayTransform) {}
}

/// Delivers a fixed number of frames, then reports the device as lost.
struct FlakySource {
    inner: SyntheticSource,
    remaining: u64,
}

impl FrameSource for FlakySource {
    fn dimensions(&self) -> BufferDimensions {
        self.inner.dimensions()
    }

    fn connect(&mut self) -> Result<()> {
        self.inner.connect()
    }

    fn next_frame(&mut self) -> Result<FrameBuffer> {
        if self.remaining == 0 {
            return Err(anyhow!("camera disconnected"));
        }
        self.remaining -= 1;
        self.inner.next_frame()
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

fn small_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.source.dimensions = BufferDimensions::new(64, 48);
    config.source.target_fps = 120;
    config.display.size = DisplaySize::new(128.0, 96.0);
    config
}

#[test]
fn missing_model_file_fails_before_any_pass() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = small_config();
    config.model.path = dir.path().join("absent.onnx").display().to_string();

    match Session::start(&config, NullRenderer) {
        Err(StartupError::ModelUnavailable(message)) => {
            assert!(message.contains("absent.onnx"), "message: {message}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session must not start without a model"),
    }
}

#[test]
fn empty_model_identifier_is_unavailable() {
    let mut config = small_config();
    config.model.path = "   ".to_string();
    assert!(matches!(
        Session::start(&config, NullRenderer),
        Err(StartupError::ModelUnavailable(_))
    ));
}

#[test]
fn unknown_capture_device_is_unavailable() {
    let mut config = small_config();
    config.source.url = "avfoundation://back_wide".to_string();
    assert!(matches!(
        Session::start(&config, NullRenderer),
        Err(StartupError::DeviceUnavailable(_))
    ));
}

#[test]
fn mismatched_source_dimensions_are_rejected() {
    let config = small_config();
    let detector =
        Detector::open(&config.model, BufferDimensions::new(32, 24)).expect("stub detector");
    let mut source = SyntheticSource::new(config.source.clone());
    source.connect().expect("connect");

    assert!(matches!(
        Session::start_with(detector, Box::new(source), &config, RecordingRenderer::new()),
        Err(StartupError::InvalidConfig(_))
    ));
}

#[test]
fn stub_session_runs_and_accounts_for_every_frame() {
    let config = small_config();
    let (session, mut display) =
        Session::start(&config, RecordingRenderer::new()).expect("stub session");

    let deadline = Instant::now() + Duration::from_secs(10);
    while display.batches_applied() < 3 {
        assert!(Instant::now() < deadline, "no overlay batches arrived");
        display.pump_timeout(Duration::from_millis(20));
    }
    assert!(session.is_running());

    let (stats, source_stats) = session.stop().expect("stop");
    display.run_until_closed();

    assert!(stats.detection_passes >= 3);
    assert_eq!(
        stats.frames_accepted + stats.frames_dropped,
        source_stats.frames_captured
    );
    assert_eq!(stats.frames_accepted, stats.detection_passes);
    assert_eq!(stats.detection_failures, 0);
    assert_eq!(source_stats.url, "stub://back_camera");

    // One transform for the whole session; the layout never changed.
    assert_eq!(display.transform_builds(), 1);
    let transform = display.renderer().state().transform.expect("transform");
    assert_eq!(transform.scale, 2.0);
}

#[test]
fn source_failure_tears_the_pipeline_down() {
    let config = small_config();
    let detector = Detector::open(&config.model, config.source.dimensions).expect("stub detector");
    let mut source = FlakySource {
        inner: SyntheticSource::new(config.source.clone()),
        remaining: 2,
    };
    source.connect().expect("connect");

    let (session, mut display) =
        Session::start_with(detector, Box::new(source), &config, RecordingRenderer::new())
            .expect("session");

    let deadline = Instant::now() + Duration::from_secs(10);
    while session.is_running() {
        assert!(Instant::now() < deadline, "capture never stopped");
        std::thread::sleep(Duration::from_millis(5));
    }

    // The worker is gone, so the display loop ends instead of waiting forever.
    display.run_until_closed();

    let (stats, source_stats) = session.stop().expect("stop after source failure");
    assert_eq!(source_stats.frames_captured, 2);
    assert_eq!(stats.frames_accepted + stats.frames_dropped, 2);
    assert_eq!(stats.frames_accepted, stats.detection_passes);
}

#[test]
fn dropping_a_running_session_joins_capture() {
    let config = small_config();
    let (session, mut display) =
        Session::start(&config, RecordingRenderer::new()).expect("stub session");
    display.pump_timeout(Duration::from_millis(200));

    drop(session);
    // Capture joined and the pipeline shut down inside drop.
    display.run_until_closed();
}
