//! Shared timing state of tweens and timelines
//!
//! A [`Runnable`] owns the elapsed clock and all delay / repeat / yoyo math.
//! It never writes values itself: tweens and timelines step it, ask it which
//! transitions were crossed, and render at its local progress.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use crate::config::PlaybackConfig;
use crate::target::Target;

/// Guard added to divisors that can legitimately be zero
pub(crate) const EPSILON: f64 = 1e-9;

/// Playback direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Transitions crossed between the previous and current elapsed time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transitions {
    pub started: bool,
    pub repeated: bool,
    pub completed: bool,
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Elapsed-time bookkeeping shared by tweens and timelines
#[derive(Clone, Debug)]
pub struct Runnable {
    elapsed: f64,
    last_elapsed: f64,
    duration: f64,
    total_duration: f64,
    delay: f64,
    repeat: i32,
    repeat_delay: f64,
    yoyo: bool,
    inverted: bool,
    direction: Direction,
    time_scale: f64,
    completed: bool,
    pub(crate) running: bool,
    pub(crate) queued: bool,
}

impl Runnable {
    pub fn new(duration: f64, playback: &PlaybackConfig) -> Self {
        let mut runnable = Self {
            elapsed: 0.0,
            last_elapsed: 0.0,
            duration: non_negative(duration),
            total_duration: 0.0,
            delay: non_negative(playback.delay),
            repeat: playback.repeat,
            repeat_delay: non_negative(playback.repeat_delay),
            yoyo: playback.yoyo,
            inverted: playback.inverted,
            direction: Direction::Forward,
            time_scale: 1.0,
            completed: false,
            running: playback.auto_start,
            queued: false,
        };
        runnable.set_time_scale(playback.time_scale);
        runnable.update_total_duration();
        runnable
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = non_negative(duration);
        self.update_total_duration();
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.delay = non_negative(delay);
        self.update_total_duration();
    }

    /// Set repeat count, negative for infinite
    pub fn set_repeat(&mut self, repeat: i32) {
        self.repeat = repeat;
        self.update_total_duration();
    }

    pub fn set_repeat_delay(&mut self, repeat_delay: f64) {
        self.repeat_delay = non_negative(repeat_delay);
        self.update_total_duration();
    }

    pub fn set_yoyo(&mut self, yoyo: bool) {
        self.yoyo = yoyo;
        self.update_total_duration();
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    /// Set the time scale. Non-positive or non-finite scales are ignored.
    pub fn set_time_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.time_scale = scale;
        } else {
            warn!(scale, "time scale must be a positive number, keeping {}", self.time_scale);
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn update_total_duration(&mut self) {
        self.total_duration = if self.is_infinite() {
            // Two laps act as the nominal period of a loop that never ends
            2.0 * self.duration + self.delay + 2.0 * self.repeat_delay
        } else if self.repeat > 0 {
            self.duration + (self.duration + self.repeat_delay) * self.repeat as f64 + self.delay
        } else {
            self.duration + self.delay
        };
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn last_elapsed(&self) -> f64 {
        self.last_elapsed
    }

    /// Length of one lap
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Delay plus every lap and repeat gap
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn repeat(&self) -> i32 {
        self.repeat
    }

    pub fn repeat_delay(&self) -> f64 {
        self.repeat_delay
    }

    pub fn yoyo(&self) -> bool {
        self.yoyo
    }

    pub fn inverted(&self) -> bool {
        self.inverted
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_infinite(&self) -> bool {
        self.repeat < 0
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn period(&self) -> f64 {
        (self.duration + self.repeat_delay).max(EPSILON)
    }

    fn is_repeating(&self) -> bool {
        self.is_infinite() || self.repeat > 0
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Advance by `dt` seconds in the current direction and time scale
    pub fn advance(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        self.last_elapsed = self.elapsed;
        self.elapsed = (self.elapsed + dt * self.direction.sign() * self.time_scale).max(0.0);
    }

    /// Jump to an absolute elapsed time
    pub fn seek(&mut self, elapsed: f64) {
        self.last_elapsed = self.elapsed;
        self.elapsed = non_negative(elapsed);
    }

    /// Rewind for a restart, optionally replaying the delay
    pub fn rewind(&mut self, account_for_delay: bool) {
        let start = if account_for_delay { 0.0 } else { self.delay };
        self.elapsed = start;
        self.last_elapsed = start;
        self.direction = Direction::Forward;
        self.completed = false;
    }

    /// Flip the playback direction
    pub fn reverse(&mut self) {
        if !self.is_infinite() {
            self.elapsed = self.elapsed.min(self.total_duration);
        }
        self.last_elapsed = self.elapsed;
        self.direction = self.direction.flipped();
        self.completed = false;
    }

    /// Elapsed time matching a progress fraction.
    ///
    /// `account_for_repeats` spans every lap instead of one; `account_for_delay`
    /// makes the fraction cover the delay as well.
    pub fn elapsed_for_progress(
        &self,
        progress: f64,
        account_for_repeats: bool,
        account_for_delay: bool,
    ) -> f64 {
        let p = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        let span = if account_for_repeats {
            self.total_duration - self.delay
        } else {
            self.duration
        };
        if account_for_delay {
            p * (span + self.delay)
        } else {
            self.delay + p * span
        }
    }

    /// Elapsed time matching a local time in seconds
    pub fn elapsed_for_time(&self, seconds: f64, account_for_delay: bool) -> f64 {
        let seconds = non_negative(seconds);
        if account_for_delay {
            seconds
        } else {
            self.delay + seconds
        }
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Whether the last step crossed the end of the delay
    pub fn crossed_start(&self) -> bool {
        self.last_elapsed <= self.delay && self.elapsed > self.delay
    }

    /// Lap index at an elapsed time
    pub fn lap_at(&self, elapsed: f64) -> i64 {
        let t = elapsed - self.delay;
        if t <= 0.0 {
            return 0;
        }
        (t / self.period()).floor() as i64
    }

    /// Lap index at an elapsed time, never past the final lap
    pub fn capped_lap_at(&self, elapsed: f64) -> i64 {
        if !self.is_repeating() {
            return 0;
        }
        let lap = self.lap_at(elapsed);
        if self.is_infinite() {
            lap
        } else {
            lap.min(self.repeat as i64)
        }
    }

    /// Local progress at the start or end edge of a lap
    pub fn lap_edge_progress(&self, lap: i64, at_end: bool) -> f64 {
        let reflected = self.yoyo && lap % 2 == 1;
        let progress = if at_end != reflected { 1.0 } else { 0.0 };
        if self.inverted {
            1.0 - progress
        } else {
            progress
        }
    }

    /// Lap and time within the lap, capped at the end of the final lap
    fn lap_position(&self) -> (i64, f64) {
        let t = (self.elapsed - self.delay).max(0.0);
        if !self.is_repeating() {
            return (0, t.min(self.duration));
        }

        let period = self.period();
        if !self.is_infinite() {
            let active = period * self.repeat as f64 + self.duration;
            if t >= active {
                return (self.repeat as i64, self.duration);
            }
        }

        let lap = (t / period).floor();
        (lap as i64, t - lap * period)
    }

    /// Progress within the current lap, after yoyo and inversion
    pub fn local_progress(&self) -> f64 {
        let mut progress = if self.duration <= EPSILON {
            if self.elapsed > self.delay {
                1.0
            } else {
                0.0
            }
        } else {
            let (lap, local) = self.lap_position();
            // Inside the repeat gap the lap stays finished
            let progress = (local / self.duration).min(1.0);
            if self.yoyo && lap % 2 == 1 {
                1.0 - progress
            } else {
                progress
            }
        };
        if self.inverted {
            progress = 1.0 - progress;
        }
        progress
    }

    /// Fraction of the total duration elapsed
    pub fn total_progress(&self) -> f64 {
        if self.total_duration <= EPSILON {
            return if self.elapsed > 0.0 { 1.0 } else { 0.0 };
        }
        let progress = self.elapsed / self.total_duration;
        if self.is_infinite() {
            progress.fract()
        } else {
            progress.clamp(0.0, 1.0)
        }
    }

    /// Transitions crossed by the last step. Completion latches until rewound.
    pub fn transitions(&mut self) -> Transitions {
        let mut transitions = Transitions {
            started: self.crossed_start(),
            ..Default::default()
        };

        if !self.is_infinite() && !self.completed {
            let finished = match self.direction {
                Direction::Forward => self.total_progress() >= 1.0,
                Direction::Backward => self.elapsed <= 0.0 && self.last_elapsed > 0.0,
            };
            if finished {
                self.completed = true;
                transitions.completed = true;
            }
        }

        let lap = self.lap_at(self.elapsed);
        if !transitions.completed
            && self.is_repeating()
            && lap != self.lap_at(self.last_elapsed)
            && lap >= 1
            && (self.is_infinite() || lap <= self.repeat as i64)
        {
            transitions.repeated = true;
        }

        transitions
    }
}

/// Handler invoked with the targets of the runnable that fired it
pub type Callback = Box<dyn FnMut(&[Target])>;

/// Lifecycle notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    Start,
    Update,
    Repeat,
    Complete,
}

/// Optional lifecycle handlers; missing handlers are no-ops
#[derive(Default)]
pub struct Callbacks {
    pub on_start: Option<Callback>,
    pub on_update: Option<Callback>,
    pub on_complete: Option<Callback>,
    pub on_repeat: Option<Callback>,
}

impl Callbacks {
    /// Invoke a handler. A panicking handler is logged and does not unwind
    /// into the scheduler.
    pub(crate) fn fire(&mut self, event: CallbackEvent, targets: &[Target]) {
        let handler = match event {
            CallbackEvent::Start => self.on_start.as_mut(),
            CallbackEvent::Update => self.on_update.as_mut(),
            CallbackEvent::Repeat => self.on_repeat.as_mut(),
            CallbackEvent::Complete => self.on_complete.as_mut(),
        };
        if let Some(handler) = handler {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(targets))).is_err() {
                error!(?event, "tween callback panicked");
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_repeat", &self.on_repeat.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable(duration: f64, playback: PlaybackConfig) -> Runnable {
        Runnable::new(duration, &playback)
    }

    #[test]
    fn test_total_duration_derivation() {
        let plain = runnable(1.0, PlaybackConfig::default().delay(0.5));
        assert_eq!(plain.total_duration(), 1.5);

        let repeated = runnable(
            1.0,
            PlaybackConfig::default()
                .delay(0.5)
                .repeat(2)
                .repeat_delay(0.25),
        );
        assert_eq!(repeated.total_duration(), 1.0 + 1.25 * 2.0 + 0.5);

        let infinite = runnable(
            1.0,
            PlaybackConfig::default()
                .delay(0.5)
                .repeat(-1)
                .repeat_delay(0.25),
        );
        assert_eq!(infinite.total_duration(), 2.0 + 0.5 + 0.5);
    }

    #[test]
    fn test_total_duration_tracks_setters() {
        let mut r = runnable(1.0, PlaybackConfig::default());
        r.set_repeat(1);
        assert_eq!(r.total_duration(), 2.0);
        r.set_delay(1.0);
        assert_eq!(r.total_duration(), 3.0);
        r.set_duration(f64::NAN);
        assert_eq!(r.total_duration(), 1.0);
    }

    #[test]
    fn test_yoyo_reflects_odd_laps() {
        let mut r = runnable(1.0, PlaybackConfig::default().repeat(2).yoyo(true));
        r.seek(0.5);
        assert!((r.local_progress() - 0.5).abs() < 1e-9);
        r.seek(1.25);
        assert!((r.local_progress() - 0.75).abs() < 1e-9);
        r.seek(2.25);
        assert!((r.local_progress() - 0.25).abs() < 1e-9);
        r.seek(3.0);
        assert_eq!(r.local_progress(), 1.0);
    }

    #[test]
    fn test_lap_edges() {
        let r = runnable(1.0, PlaybackConfig::default().repeat(2).yoyo(true));
        assert_eq!(r.capped_lap_at(0.5), 0);
        assert_eq!(r.capped_lap_at(2.5), 2);
        assert_eq!(r.capped_lap_at(9.0), 2);
        assert_eq!(r.lap_edge_progress(0, true), 1.0);
        assert_eq!(r.lap_edge_progress(1, true), 0.0);
        assert_eq!(r.lap_edge_progress(1, false), 1.0);

        let once = runnable(1.0, PlaybackConfig::default());
        assert_eq!(once.capped_lap_at(5.0), 0);
    }

    #[test]
    fn test_repeat_gap_holds_end_of_lap() {
        let mut r = runnable(1.0, PlaybackConfig::default().repeat(1).repeat_delay(0.5));
        r.seek(1.25);
        assert_eq!(r.local_progress(), 1.0);
        r.seek(1.75);
        assert!((r.local_progress() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_delay_holds_progress_at_zero() {
        let mut r = runnable(1.0, PlaybackConfig::default().delay(1.0));
        r.advance(0.5);
        assert_eq!(r.local_progress(), 0.0);
        assert!(!r.crossed_start());
        r.advance(0.75);
        assert!(r.crossed_start());
        assert!((r.local_progress() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_transitions_repeat_then_complete() {
        let mut r = runnable(1.0, PlaybackConfig::default().repeat(2));
        let mut repeats = 0;
        let mut completions = 0;
        for _ in 0..40 {
            r.advance(0.1);
            let t = r.transitions();
            repeats += t.repeated as usize;
            completions += t.completed as usize;
        }
        assert_eq!(repeats, 2);
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_backward_completion() {
        let mut r = runnable(1.0, PlaybackConfig::default());
        r.seek(0.5);
        r.reverse();
        r.advance(0.3);
        assert!(!r.transitions().completed);
        r.advance(0.3);
        assert_eq!(r.elapsed(), 0.0);
        assert!(r.transitions().completed);
    }

    #[test]
    fn test_time_scale_rejects_non_positive() {
        let mut r = runnable(1.0, PlaybackConfig::default());
        r.set_time_scale(0.0);
        assert_eq!(r.time_scale(), 1.0);
        r.set_time_scale(2.0);
        r.advance(0.25);
        assert_eq!(r.elapsed(), 0.5);
    }

    #[test]
    fn test_elapsed_for_progress_modes() {
        let r = runnable(1.0, PlaybackConfig::default().delay(1.0).repeat(1));
        assert_eq!(r.elapsed_for_progress(0.5, false, false), 1.5);
        assert_eq!(r.elapsed_for_progress(0.5, false, true), 1.0);
        assert_eq!(r.elapsed_for_progress(0.5, true, false), 2.0);
        assert_eq!(r.elapsed_for_progress(0.5, true, true), 1.5);
        assert_eq!(r.elapsed_for_progress(7.0, false, false), 2.0);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let mut callbacks = Callbacks {
            on_update: Some(Box::new(|_| panic!("boom"))),
            ..Default::default()
        };
        callbacks.fire(CallbackEvent::Update, &[]);
        callbacks.fire(CallbackEvent::Start, &[]);
    }
}
