//! Display context: the only place overlay state changes.
//!
//! Owned by the display thread. Pulls batches from the pipeline worker and
//! replays each as clear, add-per-box, apply-transform. The transform is cached
//! and rebuilt only when the layout (display size or orientation) changes.

use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, TryRecvError};

use crate::frame::BufferDimensions;
use crate::geometry::{DisplaySize, DisplayTransform, Orientation};
use crate::overlay::{OverlayRenderer, RectStyle};
use crate::pipeline::{BatchReceiver, OverlayBatch};

pub struct DisplayContext<R: OverlayRenderer> {
    renderer: R,
    batches: BatchReceiver,
    buffer: BufferDimensions,
    display: DisplaySize,
    orientation: Orientation,
    style: RectStyle,
    transform: Option<DisplayTransform>,
    transform_builds: u64,
    last_sequence: Option<u64>,
    batches_applied: u64,
}

impl<R: OverlayRenderer> DisplayContext<R> {
    pub fn new(
        renderer: R,
        batches: BatchReceiver,
        buffer: BufferDimensions,
        display: DisplaySize,
        orientation: Orientation,
    ) -> Self {
        Self {
            renderer,
            batches,
            buffer,
            display,
            orientation,
            style: RectStyle::default(),
            transform: None,
            transform_builds: 0,
            last_sequence: None,
            batches_applied: 0,
        }
    }

    pub fn with_style(mut self, style: RectStyle) -> Self {
        self.style = style;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Layout change: the transform is rebuilt on the next geometry update.
    pub fn set_display_size(&mut self, display: DisplaySize) {
        if display != self.display {
            self.display = display;
            self.transform = None;
        }
    }

    /// Layout change: the transform is rebuilt on the next geometry update.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if orientation != self.orientation {
            self.orientation = orientation;
            self.transform = None;
        }
    }

    /// Times the transform has been computed since construction.
    pub fn transform_builds(&self) -> u64 {
        self.transform_builds
    }

    pub fn batches_applied(&self) -> u64 {
        self.batches_applied
    }

    /// Sequence number of the last frame drawn.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Place the overlay container, rebuilding the transform only if the layout changed.
    pub fn update_geometry(&mut self) {
        let transform = match self.transform {
            Some(transform) => transform,
            None => {
                let transform = DisplayTransform::fill(self.buffer, self.display, self.orientation);
                self.transform_builds += 1;
                log::debug!(
                    "overlay transform rebuilt: scale={:.3} rotation={}deg display={}x{}",
                    transform.scale,
                    transform.rotation.degrees(),
                    self.display.width,
                    self.display.height
                );
                self.transform = Some(transform);
                transform
            }
        };
        self.renderer.apply_transform(&transform);
    }

    /// Replace everything on screen with one batch.
    ///
    /// Runs even for an empty batch so stale rectangles disappear.
    pub fn apply(&mut self, batch: OverlayBatch) {
        self.renderer.clear_all();
        for detection in &batch.detections {
            self.renderer
                .add_rectangle(detection.bounds, &self.style, detection.confidence);
        }
        self.update_geometry();
        self.last_sequence = Some(batch.sequence);
        self.batches_applied += 1;
    }

    /// Apply every batch already waiting. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.batches.channel().try_recv() {
                Ok(batch) => applied += self.accept(batch),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return applied,
            }
        }
    }

    /// Wait up to `timeout` for a batch, then drain whatever else is waiting.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.batches.channel().recv_timeout(timeout) {
            Ok(batch) => self.accept(batch) + self.pump(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Apply batches until the pipeline worker exits.
    pub fn run_until_closed(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(batch) = self.batches.channel().recv() {
            applied += self.accept(batch);
        }
        applied
    }

    fn accept(&mut self, batch: OverlayBatch) -> usize {
        if self.batches.is_torn_down() {
            log::debug!("batch for frame #{} discarded: pipeline torn down", batch.sequence);
            return 0;
        }
        self.apply(batch);
        1
    }
}
