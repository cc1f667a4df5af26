//! Rate-limited periodic ticker
//!
//! A ticker keeps its own "then" timestamp and fires only once the time since
//! then reaches its step. Only whole steps are delivered: the remainder stays
//! behind for the next poll, and the delta handed out is capped so a long
//! stall does not turn into one huge jump.

use crate::scheduler::TimelineId;

/// What a ticker advances when it fires
pub(crate) enum TickerDrive {
    /// The scheduler's queue of free-standing tweens
    Tweens,
    /// One timeline
    Timeline(TimelineId),
    /// A user callback receiving the delta in seconds
    Callback(Box<dyn FnMut(f64)>),
}

/// Periodic callback primitive with a configurable rate
pub struct Ticker {
    step_ms: f64,
    max_catch_up: f64,
    then: Option<f64>,
    running: bool,
    pub(crate) drive: TickerDrive,
}

impl Ticker {
    pub(crate) fn new(fps: u32, max_catch_up: f64, drive: TickerDrive) -> Self {
        let mut ticker = Self {
            step_ms: 0.0,
            max_catch_up: max_catch_up.max(1.0),
            then: None,
            running: true,
            drive,
        };
        ticker.set_fps(fps);
        ticker
    }

    /// Set the rate in frames per second (at least 1)
    pub fn set_fps(&mut self, fps: u32) {
        self.step_ms = 1000.0 / fps.max(1) as f64;
    }

    pub fn fps(&self) -> f64 {
        1000.0 / self.step_ms
    }

    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.then = None;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Forget the last timestamp so the next poll only re-arms
    pub fn reset(&mut self) {
        self.then = None;
    }

    /// Delta in seconds to deliver at `now_ms`, if a step has elapsed
    pub fn poll(&mut self, now_ms: f64) -> Option<f64> {
        if !self.running {
            return None;
        }
        let Some(then) = self.then else {
            self.then = Some(now_ms);
            return None;
        };

        let delta = now_ms - then;
        if delta < self.step_ms {
            return None;
        }

        let remainder = delta % self.step_ms;
        self.then = Some(now_ms - remainder);
        let due = (delta - remainder).min(self.step_ms * self.max_catch_up);
        Some(due / 1000.0)
    }
}
