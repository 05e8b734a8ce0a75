//! Frame submission from other threads.
//!
//! A worker thread owns the view. Frames go through a bounded channel; when
//! it is full the oldest pending frame is dropped so the newest frame always
//! gets drawn. Control messages (configuration, snapshots) use an unbounded
//! channel and are handled before pending frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use image::RgbaImage;
use metaltool_core::memory_budget::FRAME_QUEUE_DEPTH;
use metaltool_core::{MetalToolError, Result, SharedPixelBuffer};
use tracing::{debug, trace, warn};

use crate::view::MetalView;

type ConfigureFn = Box<dyn FnOnce(&mut MetalView) + Send>;

enum Control {
    Configure(ConfigureFn),
    Snapshot(Sender<Option<RgbaImage>>),
    /// Reply once every frame queued before this message has been drawn.
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
}

/// Frame counters of a queue.
///
/// Once the queue is flushed, `rendered + dropped + failed == submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub submitted: u64,
    pub dropped: u64,
    /// Frames drawn successfully.
    pub rendered: u64,
    /// Frames the view rejected or failed to draw.
    pub failed: u64,
}

pub struct FrameQueue {
    frames_tx: Sender<SharedPixelBuffer>,
    /// Used by `submit` to pop the oldest frame when the channel is full.
    frames_rx: Receiver<SharedPixelBuffer>,
    control_tx: Sender<Control>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<MetalView>>,
}

impl FrameQueue {
    pub fn new(view: MetalView) -> Result<Self> {
        Self::with_depth(view, FRAME_QUEUE_DEPTH)
    }

    /// A queue holding at most `depth` pending frames.
    pub fn with_depth(view: MetalView, depth: usize) -> Result<Self> {
        let (frames_tx, frames_rx) = bounded(depth.max(1));
        let (control_tx, control_rx) = unbounded();
        let counters = Arc::new(Counters::default());

        let worker_frames = frames_rx.clone();
        let worker_counters = Arc::clone(&counters);
        let worker = std::thread::Builder::new()
            .name("metaltool-frame-queue".to_string())
            .spawn(move || run_worker(view, worker_frames, control_rx, worker_counters))
            .map_err(|e| MetalToolError::Internal(format!("Failed to spawn thread: {}", e)))?;

        Ok(Self {
            frames_tx,
            frames_rx,
            control_tx,
            counters,
            worker: Some(worker),
        })
    }

    /// Queue a frame, dropping the oldest pending frame when full.
    pub fn submit(&self, frame: impl Into<SharedPixelBuffer>) {
        let mut frame = frame.into();
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        loop {
            match self.frames_tx.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if self.frames_rx.try_recv().is_ok() {
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!("frame queue full, oldest frame dropped");
                    }
                    frame = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("frame queue worker has stopped, frame discarded");
                    return;
                }
            }
        }
    }

    /// Run `f` on the view before any pending frame is drawn.
    pub fn configure(&self, f: impl FnOnce(&mut MetalView) + Send + 'static) {
        if self.control_tx.send(Control::Configure(Box::new(f))).is_err() {
            warn!("frame queue worker has stopped, configuration discarded");
        }
    }

    /// The view's last rendered frame.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let (tx, rx) = bounded(1);
        self.control_tx.send(Control::Snapshot(tx)).ok()?;
        rx.recv().ok().flatten()
    }

    /// Block until every frame submitted so far has been drawn or dropped.
    pub fn flush(&self) {
        let (tx, rx) = bounded(1);
        if self.control_tx.send(Control::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            rendered: self.counters.rendered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker and take the view back. Pending frames are discarded.
    pub fn shutdown(mut self) -> Result<MetalView> {
        self.stop()
            .ok_or_else(|| MetalToolError::Internal("frame queue worker panicked".to_string()))
    }

    fn stop(&mut self) -> Option<MetalView> {
        let worker = self.worker.take()?;
        let _ = self.control_tx.send(Control::Shutdown);
        worker.join().ok()
    }
}

impl Drop for FrameQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut view: MetalView,
    frames: Receiver<SharedPixelBuffer>,
    control: Receiver<Control>,
    counters: Arc<Counters>,
) -> MetalView {
    debug!(renderer = view.renderer_name(), "frame queue worker started");
    loop {
        if !drain_control(&mut view, &control, None, &frames, &counters) {
            return view;
        }

        select! {
            recv(control) -> message => match message {
                Ok(message) => {
                    if !handle_control(&mut view, message, &mut None, &frames, &counters) {
                        return view;
                    }
                }
                Err(_) => return view,
            },
            recv(frames) -> frame => match frame {
                Ok(frame) => {
                    // select! picks randomly; control sent before this frame still goes first
                    if !drain_control(&mut view, &control, Some(frame), &frames, &counters) {
                        return view;
                    }
                }
                Err(_) => return view,
            },
        }
    }
}

/// Handle every queued control message, then draw `held` if nothing drew it.
///
/// Returns `false` when the worker should stop.
fn drain_control(
    view: &mut MetalView,
    control: &Receiver<Control>,
    mut held: Option<SharedPixelBuffer>,
    frames: &Receiver<SharedPixelBuffer>,
    counters: &Counters,
) -> bool {
    while let Ok(message) = control.try_recv() {
        if !handle_control(view, message, &mut held, frames, counters) {
            return false;
        }
    }
    if let Some(frame) = held {
        draw(view, &frame, counters);
    }
    true
}

/// Returns `false` when the worker should stop.
fn handle_control(
    view: &mut MetalView,
    message: Control,
    held: &mut Option<SharedPixelBuffer>,
    frames: &Receiver<SharedPixelBuffer>,
    counters: &Counters,
) -> bool {
    match message {
        Control::Configure(f) => f(view),
        Control::Snapshot(reply) => {
            let _ = reply.send(view.snapshot());
        }
        Control::Flush(reply) => {
            // the held frame is older than anything still in the channel
            if let Some(frame) = held.take() {
                draw(view, &frame, counters);
            }
            while let Ok(frame) = frames.try_recv() {
                draw(view, &frame, counters);
            }
            let _ = reply.send(());
        }
        Control::Shutdown => {
            debug!("frame queue worker stopping");
            return false;
        }
    }
    true
}

fn draw(view: &mut MetalView, frame: &SharedPixelBuffer, counters: &Counters) {
    match view.try_draw(frame) {
        Ok(()) => {
            counters.rendered.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(renderer = view.renderer_name(), "queued frame not drawn: {}", e);
        }
    }
}
