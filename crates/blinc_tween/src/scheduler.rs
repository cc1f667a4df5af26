//! Tween scheduler
//!
//! Owns every tween, timeline, and ticker, and advances them each frame.
//! The scheduler never runs its own loop: it asks its [`FrameSource`] for a
//! frame whenever there is work and the host answers with [`Scheduler::frame`].
//! With nothing left to animate it goes to sleep and stops asking.

use std::panic::{self, AssertUnwindSafe};

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error, trace};

use crate::config::{EngineConfig, TimelineConfig, TweenConfig};
use crate::error::Result;
use crate::frame::{Clock, FrameRequest, FrameSource, PendingFrames, SystemClock};
use crate::handle::{TimelineHandle, TweenHandle};
use crate::registry::{PropertyKey, PropertyRegistry};
use crate::target::{IntoTargets, Target};
use crate::ticker::{Ticker, TickerDrive};
use crate::timeline::Timeline;
use crate::tween::Tween;

new_key_type! {
    pub struct TweenId;
    pub struct TimelineId;
    pub struct TickerId;
}

/// Resolved drive of a fired ticker
enum Dispatch {
    Tweens,
    Timeline(TimelineId),
    Callback,
}

/// The scheduler that ticks all active tweens and timelines
pub struct Scheduler {
    pub(crate) tweens: SlotMap<TweenId, Tween>,
    /// Running free-standing tweens in registration order
    queue: Vec<TweenId>,
    pub(crate) timelines: SlotMap<TimelineId, Timeline>,
    tickers: SlotMap<TickerId, Ticker>,
    ticker_order: Vec<TickerId>,
    main_ticker: TickerId,
    pub(crate) registry: PropertyRegistry,
    clock: Box<dyn Clock>,
    frames: Box<dyn FrameSource>,
    pending_frame: Option<FrameRequest>,
    sleeping: bool,
    needs_cleanup: bool,
    config: EngineConfig,
}

impl Scheduler {
    /// Scheduler on the system clock with a polled frame source
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), SystemClock::new(), PendingFrames::new())
    }

    pub fn with_config(
        config: EngineConfig,
        clock: impl Clock + 'static,
        frames: impl FrameSource + 'static,
    ) -> Self {
        let mut tickers = SlotMap::with_key();
        let main_ticker = tickers.insert(Ticker::new(
            config.fps,
            config.max_catch_up,
            TickerDrive::Tweens,
        ));

        Self {
            tweens: SlotMap::with_key(),
            queue: Vec::new(),
            timelines: SlotMap::with_key(),
            tickers,
            ticker_order: vec![main_ticker],
            main_ticker,
            registry: PropertyRegistry::new(),
            clock: Box::new(clock),
            frames: Box::new(frames),
            pending_frame: None,
            sleeping: true,
            needs_cleanup: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Tweens
    // =========================================================================

    /// Create a tween over `duration` seconds
    pub fn create(
        &mut self,
        targets: impl IntoTargets,
        duration: f64,
        config: TweenConfig,
    ) -> Result<TweenId> {
        let targets = targets.into_targets();
        let auto_start = config.playback.auto_start;
        let id = self
            .tweens
            .try_insert_with_key(|id| Tween::new(id, targets, duration, config))?;
        debug!(tween = ?id, duration, "tween created");

        if auto_start {
            self.enqueue(id);
        }
        Ok(id)
    }

    /// Tween from the current values to `config.to`
    pub fn to(
        &mut self,
        targets: impl IntoTargets,
        duration: f64,
        mut config: TweenConfig,
    ) -> Result<TweenId> {
        config.from.clear();
        self.create(targets, duration, config)
    }

    /// Tween from `config.from` to the current values
    pub fn from(
        &mut self,
        targets: impl IntoTargets,
        duration: f64,
        mut config: TweenConfig,
    ) -> Result<TweenId> {
        config.to.clear();
        self.create(targets, duration, config)
    }

    /// Zero-duration tween that applies `config.to` on the next tick
    pub fn set(&mut self, targets: impl IntoTargets, config: TweenConfig) -> Result<TweenId> {
        self.create(targets, 0.0, config)
    }

    pub fn tween(&mut self, id: TweenId) -> Option<TweenHandle<'_>> {
        if self.tweens.contains_key(id) {
            Some(TweenHandle::new(self, id))
        } else {
            None
        }
    }

    pub fn get_tween(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.get(id)
    }

    pub fn tween_count(&self) -> usize {
        self.tweens.len()
    }

    /// Number of tweens driven by the main ticker
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    // =========================================================================
    // Timelines
    // =========================================================================

    pub fn create_timeline(&mut self, config: TimelineConfig) -> TimelineId {
        let fps = self.config.fps;
        let max_catch_up = self.config.max_catch_up;
        let tickers = &mut self.tickers;
        let ticker_order = &mut self.ticker_order;

        let id = self.timelines.insert_with_key(|id| {
            let mut ticker = Ticker::new(fps, max_catch_up, TickerDrive::Timeline(id));
            ticker.stop();
            let ticker = tickers.insert(ticker);
            ticker_order.push(ticker);
            Timeline::new(id, ticker, config)
        });
        debug!(timeline = ?id, "timeline created");
        id
    }

    pub fn timeline(&mut self, id: TimelineId) -> Option<TimelineHandle<'_>> {
        if self.timelines.contains_key(id) {
            Some(TimelineHandle::new(self, id))
        } else {
            None
        }
    }

    pub fn get_timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(id)
    }

    pub fn timeline_count(&self) -> usize {
        self.timelines.len()
    }

    // =========================================================================
    // Tickers
    // =========================================================================

    /// Register a callback receiving the delta in seconds at `fps`
    pub fn add_ticker(&mut self, fps: u32, handler: impl FnMut(f64) + 'static) -> TickerId {
        let ticker = Ticker::new(
            fps,
            self.config.max_catch_up,
            TickerDrive::Callback(Box::new(handler)),
        );
        let id = self.tickers.insert(ticker);
        self.ticker_order.push(id);
        self.wakeup();
        id
    }

    /// Stop a callback ticker; it is dropped at the next sweep
    pub fn remove_ticker(&mut self, id: TickerId) {
        if let Some(ticker) = self.tickers.get_mut(id) {
            if matches!(ticker.drive, TickerDrive::Callback(_)) {
                ticker.stop();
                self.needs_cleanup = true;
            }
        }
    }

    pub fn ticker(&self, id: TickerId) -> Option<&Ticker> {
        self.tickers.get(id)
    }

    /// Retune the main ticker and every timeline and callback ticker
    pub fn set_fps(&mut self, fps: u32) {
        self.config.fps = fps;
        for (_, ticker) in self.tickers.iter_mut() {
            ticker.set_fps(fps);
        }
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Tween currently driving `field` of `target`
    pub fn owner_of(&self, target: &Target, field: &str) -> Option<TweenId> {
        self.registry.owner(&PropertyKey::new(target.id(), field))
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Outstanding frame request, if any
    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.pending_frame
    }

    /// Request frames automatically; disabling cancels any pending request
    pub fn auto_update(&mut self, enabled: bool) {
        self.config.auto_update = enabled;
        if enabled {
            if self.has_work() {
                self.wakeup();
            }
        } else if let Some(request) = self.pending_frame.take() {
            self.frames.cancel(request);
        }
    }

    /// Advance manually. `Some(step)` drives every running ticker by `step`
    /// seconds; `None` runs a regular frame at the clock's current time.
    pub fn update(&mut self, step: Option<f64>) {
        let Some(step) = step else {
            let now = self.clock.now_ms();
            self.frame(now);
            return;
        };

        if self.needs_cleanup {
            self.sweep();
        }
        for n in 0..self.ticker_order.len() {
            let id = self.ticker_order[n];
            if self.tickers.get(id).is_some_and(Ticker::is_running) {
                self.dispatch(id, step);
            }
        }
        self.finish_frame();
    }

    /// Run one frame at `now_ms`, answering the pending frame request
    pub fn frame(&mut self, now_ms: f64) {
        self.pending_frame = None;
        if self.needs_cleanup {
            self.sweep();
        }

        for n in 0..self.ticker_order.len() {
            let id = self.ticker_order[n];
            let fired = self.tickers.get_mut(id).and_then(|ticker| ticker.poll(now_ms));
            if let Some(dt) = fired {
                self.dispatch(id, dt);
            }
        }
        self.finish_frame();
    }

    fn dispatch(&mut self, id: TickerId, dt: f64) {
        let Some(ticker) = self.tickers.get(id) else {
            return;
        };
        let dispatch = match &ticker.drive {
            TickerDrive::Tweens => Dispatch::Tweens,
            TickerDrive::Timeline(timeline) => Dispatch::Timeline(*timeline),
            TickerDrive::Callback(_) => Dispatch::Callback,
        };

        match dispatch {
            Dispatch::Tweens => self.tick_tweens(dt),
            Dispatch::Timeline(timeline) => self.tick_timeline(timeline, dt),
            Dispatch::Callback => {
                let Some(ticker) = self.tickers.get_mut(id) else {
                    return;
                };
                if let TickerDrive::Callback(handler) = &mut ticker.drive {
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(dt))).is_err() {
                        error!(ticker = ?id, "ticker callback panicked");
                    }
                }
            }
        }
    }

    fn tick_tweens(&mut self, dt: f64) {
        trace!(dt, tweens = self.queue.len(), "ticking tweens");
        for n in 0..self.queue.len() {
            let id = self.queue[n];
            let Some(tween) = self.tweens.get_mut(id) else {
                continue;
            };
            if !tween.timing().is_running() || tween.is_cleared() {
                continue;
            }
            tween.advance(dt, &mut self.registry);
            if tween.is_cleared() {
                self.needs_cleanup = true;
            }
        }
    }

    fn tick_timeline(&mut self, id: TimelineId, dt: f64) {
        let Some(timeline) = self.timelines.get_mut(id) else {
            return;
        };
        if !timeline.is_running() {
            return;
        }
        let cleared = timeline.advance(dt, &mut self.tweens, &mut self.registry);
        if !timeline.is_running() {
            let ticker = timeline.ticker();
            if let Some(ticker) = self.tickers.get_mut(ticker) {
                ticker.stop();
            }
        }
        if cleared {
            self.needs_cleanup = true;
        }
    }

    fn finish_frame(&mut self) {
        if self.needs_cleanup {
            self.sweep();
        }
        if self.has_work() {
            if self.config.auto_update && self.pending_frame.is_none() {
                self.pending_frame = Some(self.frames.request());
            }
        } else if !self.sleeping {
            self.sleeping = true;
            debug!("scheduler idle, sleeping");
        }
    }

    /// Anything besides the main ticker left to drive
    fn has_work(&self) -> bool {
        !self.queue.is_empty()
            || self
                .tickers
                .iter()
                .any(|(id, ticker)| id != self.main_ticker && ticker.is_running())
    }

    /// Drop stopped runnables from the queue and finished ones from the arenas
    fn sweep(&mut self) {
        self.needs_cleanup = false;

        let tweens = &mut self.tweens;
        self.queue.retain(|id| match tweens.get_mut(*id) {
            Some(tween) if tween.timing().is_running() && !tween.is_cleared() => true,
            Some(tween) => {
                tween.timing_mut().queued = false;
                false
            }
            None => false,
        });

        let cleared_timelines: Vec<TimelineId> = self
            .timelines
            .iter()
            .filter(|(_, timeline)| timeline.is_cleared())
            .map(|(id, _)| id)
            .collect();
        for id in cleared_timelines {
            if let Some(timeline) = self.timelines.remove(id) {
                self.tickers.remove(timeline.ticker());
            }
        }

        let before = self.tweens.len();
        self.tweens
            .retain(|_, tween| !tween.is_cleared() || tween.keep_alive());

        let main = self.main_ticker;
        self.tickers.retain(|id, ticker| {
            id == main || ticker.is_running() || !matches!(ticker.drive, TickerDrive::Callback(_))
        });
        let tickers = &self.tickers;
        self.ticker_order.retain(|id| tickers.contains_key(*id));

        trace!(
            removed = before - self.tweens.len(),
            queued = self.queue.len(),
            "scheduler swept"
        );
    }

    /// Queue a free-standing tween on the main ticker
    pub(crate) fn enqueue(&mut self, id: TweenId) {
        let Some(tween) = self.tweens.get_mut(id) else {
            return;
        };
        if tween.parent().is_some() {
            return;
        }
        tween.set_paused(false);
        let timing = tween.timing_mut();
        timing.running = true;
        if !timing.queued {
            timing.queued = true;
            self.queue.push(id);
        }
        self.wakeup();
    }

    /// Leave the sleeping state with one deferred frame request
    pub(crate) fn wakeup(&mut self) {
        if self.sleeping {
            self.sleeping = false;
            for (_, ticker) in self.tickers.iter_mut() {
                ticker.reset();
            }
            debug!("scheduler waking up");
        }
        if self.config.auto_update && self.pending_frame.is_none() {
            self.pending_frame = Some(self.frames.request());
        }
    }

    pub(crate) fn mark_cleanup(&mut self) {
        self.needs_cleanup = true;
    }

    pub(crate) fn start_ticker(&mut self, id: TickerId) {
        if let Some(ticker) = self.tickers.get_mut(id) {
            ticker.start();
        }
        self.wakeup();
    }

    pub(crate) fn stop_ticker(&mut self, id: TickerId) {
        if let Some(ticker) = self.tickers.get_mut(id) {
            ticker.stop();
        }
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Pause every queued tween
    pub fn pause_all(&mut self) {
        for n in (0..self.queue.len()).rev() {
            if let Some(tween) = self.tweens.get_mut(self.queue[n]) {
                tween.timing_mut().running = false;
                tween.set_paused(true);
            }
        }
        self.needs_cleanup = true;
        debug!(count = self.queue.len(), "paused all tweens");
    }

    /// Resume every paused free-standing tween. Tweens that were never
    /// started stay idle.
    pub fn resume_all(&mut self) {
        let paused: Vec<TweenId> = self
            .tweens
            .iter()
            .filter(|(_, tween)| {
                tween.is_paused() && tween.parent().is_none() && !tween.is_cleared()
            })
            .map(|(id, _)| id)
            .collect();
        debug!(count = paused.len(), "resuming all tweens");
        for id in paused.into_iter().rev() {
            self.enqueue(id);
        }
    }

    /// Clear every queued tween, releasing its properties
    pub fn clear_all(&mut self) {
        for n in (0..self.queue.len()).rev() {
            if let Some(tween) = self.tweens.get_mut(self.queue[n]) {
                tween.clear(&mut self.registry);
            }
        }
        self.needs_cleanup = true;
        debug!("cleared all tweens");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tweens", &self.tweens.len())
            .field("queue", &self.queue)
            .field("timelines", &self.timelines.len())
            .field("tickers", &self.tickers.len())
            .field("sleeping", &self.sleeping)
            .field("config", &self.config)
            .finish()
    }
}
