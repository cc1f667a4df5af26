//! Time and frame collaborators
//!
//! The scheduler does not own a frame loop. It asks a [`FrameSource`] for
//! the next frame and the host answers by calling `Scheduler::frame` with a
//! timestamp, usually read from a [`Clock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic time in milliseconds
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock advanced by hand; clones share the same time
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Identifier of an outstanding frame request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Source of "next frame" callbacks (e.g. a platform animation-frame API)
pub trait FrameSource {
    /// Ask for one more frame
    fn request(&mut self) -> FrameRequest;

    /// Withdraw an outstanding request
    fn cancel(&mut self, request: FrameRequest);
}

/// Frame source that records the outstanding request for a polling host.
/// Clones share state, so the host can keep one while the scheduler owns another.
#[derive(Clone, Debug, Default)]
pub struct PendingFrames {
    state: Rc<PendingState>,
}

#[derive(Debug, Default)]
struct PendingState {
    next: Cell<u64>,
    pending: Cell<Option<FrameRequest>>,
    requested: Cell<u64>,
}

impl PendingFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outstanding request, if any
    pub fn pending(&self) -> Option<FrameRequest> {
        self.state.pending.get()
    }

    /// Consume the outstanding request before running a frame
    pub fn take(&self) -> Option<FrameRequest> {
        self.state.pending.take()
    }

    /// Total number of requests made so far
    pub fn request_count(&self) -> u64 {
        self.state.requested.get()
    }
}

impl FrameSource for PendingFrames {
    fn request(&mut self) -> FrameRequest {
        let id = self.state.next.get() + 1;
        self.state.next.set(id);
        self.state.requested.set(self.state.requested.get() + 1);
        let request = FrameRequest(id);
        self.state.pending.set(Some(request));
        request
    }

    fn cancel(&mut self, request: FrameRequest) {
        if self.state.pending.get() == Some(request) {
            self.state.pending.set(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(16.0);
        assert_eq!(other.now_ms(), 16.0);
    }

    #[test]
    fn test_pending_frames_cancel() {
        let host = PendingFrames::new();
        let mut source = host.clone();
        let first = source.request();
        assert_eq!(host.pending(), Some(first));
        source.cancel(FrameRequest(first.0 + 100));
        assert_eq!(host.pending(), Some(first));
        source.cancel(first);
        assert_eq!(host.pending(), None);
        assert_eq!(host.request_count(), 1);
    }
}
