use serde::Serialize;

use crate::{render::DrawRect, Result, VisualiserError};

/// Token for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameHandle(pub u64);

/// Host "next visual frame" primitive.
///
/// The host answers each request by calling
/// [`Visualiser::on_frame`](crate::Visualiser::on_frame) once with the
/// returned handle and the frame timestamp, unless the request was cancelled.
pub trait FrameScheduler {
    /// Current time in milliseconds, on the same clock as frame timestamps.
    fn now_ms(&self) -> f64;

    fn request_frame(&mut self) -> FrameHandle;

    fn cancel(&mut self, handle: FrameHandle);
}

/// Deterministic scheduler driven by explicit clock advances.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    now_ms: f64,
    next_handle: u64,
    pending: Vec<FrameHandle>,
    requested: usize,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward and returns the callbacks that are now due,
    /// oldest first. The host delivers them at [`ManualScheduler::now_ms`].
    pub fn advance(&mut self, delta_ms: f64) -> Vec<FrameHandle> {
        self.now_ms += delta_ms.max(0.0);
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[FrameHandle] {
        &self.pending
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;
        self.requested += 1;
        self.pending.push(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != handle);
        if self.pending.len() != before {
            self.cancelled += 1;
        }
    }
}

/// Run state of the render loop.
///
/// Idle until [`AnimationState::begin`], running until
/// [`AnimationState::halt`]. While running at most one frame request is
/// pending and painting is throttled to `target_frame_ms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationState {
    running: bool,
    last_frame_ms: f64,
    target_frame_ms: f64,
    #[serde(skip)]
    pending: Option<FrameHandle>,
    area: DrawRect,
}

impl AnimationState {
    pub fn new(target_frame_ms: f64) -> Self {
        Self {
            running: false,
            last_frame_ms: 0.0,
            target_frame_ms,
            pending: None,
            area: DrawRect::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_frame_ms(&self) -> f64 {
        self.last_frame_ms
    }

    pub fn target_frame_ms(&self) -> f64 {
        self.target_frame_ms
    }

    pub fn set_target_frame_ms(&mut self, target_frame_ms: f64) {
        self.target_frame_ms = target_frame_ms;
    }

    /// Rectangle the running loop paints into.
    pub fn area(&self) -> DrawRect {
        self.area
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Idle → Running. Throttling counts from `now_ms`.
    pub fn begin(&mut self, area: DrawRect, now_ms: f64) -> Result<()> {
        if self.running {
            return Err(VisualiserError::AlreadyRunning);
        }
        self.running = true;
        self.last_frame_ms = now_ms;
        self.area = area;
        self.pending = None;
        Ok(())
    }

    /// Running → Idle. Returns `false` if the loop was already idle.
    pub fn halt(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn set_pending(&mut self, handle: FrameHandle) {
        self.pending = Some(handle);
    }

    pub fn take_pending(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    /// Consumes the pending request if `handle` matches it. Callbacks for
    /// cancelled or superseded requests are rejected.
    pub fn accept(&mut self, handle: FrameHandle) -> bool {
        if self.running && self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Whether a frame at `timestamp_ms` is due. Marks it painted if so.
    pub fn should_paint(&mut self, timestamp_ms: f64) -> bool {
        if timestamp_ms - self.last_frame_ms >= self.target_frame_ms {
            self.last_frame_ms = timestamp_ms;
            true
        } else {
            false
        }
    }
}
