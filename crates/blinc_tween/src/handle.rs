//! Chainable handles over scheduler-owned tweens and timelines
//!
//! A handle borrows the scheduler mutably for as long as it lives, so every
//! operation sees the shared ownership registry and can queue or wake the
//! scheduler. Operations on a handle whose runnable has since been removed
//! are no-ops.

use tracing::warn;

use crate::error::Result;
use crate::registry::PropertyRegistry;
use crate::scheduler::{Scheduler, TimelineId, TweenId};
use crate::timeline::{Step, Timeline, TimelineItem};
use crate::tween::Tween;

/// Mutable view of one tween
pub struct TweenHandle<'a> {
    scheduler: &'a mut Scheduler,
    id: TweenId,
}

impl<'a> TweenHandle<'a> {
    pub(crate) fn new(scheduler: &'a mut Scheduler, id: TweenId) -> Self {
        Self { scheduler, id }
    }

    pub fn id(&self) -> TweenId {
        self.id
    }

    pub fn get(&self) -> Option<&Tween> {
        self.scheduler.tweens.get(self.id)
    }

    fn with<R>(&mut self, f: impl FnOnce(&mut Tween, &mut PropertyRegistry) -> R) -> Option<R> {
        let tween = self.scheduler.tweens.get_mut(self.id)?;
        Some(f(tween, &mut self.scheduler.registry))
    }

    /// Seconds elapsed, including the delay
    pub fn elapsed(&self) -> f64 {
        self.get().map_or(0.0, |t| t.timing().elapsed())
    }

    pub fn total_duration(&self) -> f64 {
        self.get().map_or(0.0, |t| t.timing().total_duration())
    }

    pub fn is_running(&self) -> bool {
        self.get().is_some_and(|t| t.timing().is_running())
    }

    pub fn delay(&mut self, seconds: f64) -> &mut Self {
        self.with(|tween, _| tween.timing_mut().set_delay(seconds));
        self
    }

    /// Seek to a fraction of one lap
    pub fn progress(&mut self, progress: f64, account_for_delay: bool) -> &mut Self {
        self.with(|tween, registry| {
            let elapsed = tween
                .timing()
                .elapsed_for_progress(progress, false, account_for_delay);
            tween.seek(elapsed, registry);
        });
        self
    }

    /// Seek to a fraction of every lap together
    pub fn total_progress(&mut self, progress: f64, account_for_delay: bool) -> &mut Self {
        self.with(|tween, registry| {
            let elapsed = tween
                .timing()
                .elapsed_for_progress(progress, true, account_for_delay);
            tween.seek(elapsed, registry);
        });
        self
    }

    /// Seek to a local time in seconds
    pub fn time(&mut self, seconds: f64, account_for_delay: bool) -> &mut Self {
        self.with(|tween, registry| {
            let elapsed = tween.timing().elapsed_for_time(seconds, account_for_delay);
            tween.seek(elapsed, registry);
        });
        self
    }

    /// Re-evaluate at the current time
    pub fn render(&mut self) {
        self.with(|tween, registry| tween.render(registry));
    }

    pub fn restart(&mut self, account_for_delay: bool, immediate_render: bool) -> &mut Self {
        self.with(|tween, registry| tween.restart(account_for_delay, immediate_render, registry));
        self.scheduler.enqueue(self.id);
        self
    }

    pub fn reverse(&mut self) -> &mut Self {
        self.with(|tween, _| tween.reverse());
        self.scheduler.enqueue(self.id);
        self
    }

    pub fn time_scale(&mut self, scale: f64) -> &mut Self {
        self.with(|tween, _| tween.timing_mut().set_time_scale(scale));
        self
    }

    /// Stop and release every property
    pub fn clear(&mut self) -> &mut Self {
        self.with(|tween, registry| tween.clear(registry));
        self.scheduler.mark_cleanup();
        self
    }

    /// Stop driving the named properties; the tween keeps running
    pub fn clear_properties(&mut self, names: &[&str]) -> &mut Self {
        self.with(|tween, registry| tween.clear_properties(names, registry));
        self
    }

    pub fn pause(&mut self) -> &mut Self {
        self.with(|tween, _| {
            tween.timing_mut().running = false;
            tween.set_paused(true);
        });
        self.scheduler.mark_cleanup();
        self
    }

    pub fn resume(&mut self) -> &mut Self {
        let state = self.get().map(|t| (t.is_cleared(), t.parent().is_some()));
        match state {
            Some((true, _)) => {
                warn!(tween = ?self.id, "cannot resume a cleared tween, restart it instead");
            }
            Some((_, true)) => warn!(tween = ?self.id, "tween is driven by a timeline"),
            Some(_) => self.scheduler.enqueue(self.id),
            None => {}
        }
        self
    }
}

/// Mutable view of one timeline
pub struct TimelineHandle<'a> {
    scheduler: &'a mut Scheduler,
    id: TimelineId,
}

impl<'a> TimelineHandle<'a> {
    pub(crate) fn new(scheduler: &'a mut Scheduler, id: TimelineId) -> Self {
        Self { scheduler, id }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn get(&self) -> Option<&Timeline> {
        self.scheduler.timelines.get(self.id)
    }

    /// Define a labeled step, logging and skipping it when invalid
    pub fn define(&mut self, label: &str, step: impl Into<Step>) -> &mut Self {
        if let Err(err) = self.try_define(label, step) {
            warn!(timeline = ?self.id, "{err}");
        }
        self
    }

    /// Define a labeled step, returning why it was rejected
    pub fn try_define(&mut self, label: &str, step: impl Into<Step>) -> Result<&mut Self> {
        let scheduler = &mut *self.scheduler;
        if let Some(timeline) = scheduler.timelines.get_mut(self.id) {
            let members = timeline.define(label, step.into(), &scheduler.tweens)?;
            for id in members {
                if let Some(tween) = scheduler.tweens.get_mut(id) {
                    tween.set_parent(self.id);
                }
            }
            scheduler.mark_cleanup();
        }
        Ok(self)
    }

    /// Play `label` from the start, logging unknown labels
    pub fn play(&mut self, label: &str) -> &mut Self {
        if let Err(err) = self.try_play(label) {
            warn!(timeline = ?self.id, "{err}");
        }
        self
    }

    pub fn try_play(&mut self, label: &str) -> Result<&mut Self> {
        let scheduler = &mut *self.scheduler;
        if let Some(timeline) = scheduler.timelines.get_mut(self.id) {
            timeline.play(label, &mut scheduler.tweens)?;
            let ticker = timeline.ticker();
            scheduler.start_ticker(ticker);
        }
        Ok(self)
    }

    pub fn pause(&mut self) -> &mut Self {
        if let Some(timeline) = self.scheduler.timelines.get_mut(self.id) {
            timeline.timing_mut().running = false;
            let ticker = timeline.ticker();
            self.scheduler.stop_ticker(ticker);
        }
        self
    }

    pub fn resume(&mut self) -> &mut Self {
        if let Some(timeline) = self.scheduler.timelines.get_mut(self.id) {
            if timeline.is_cleared() || timeline.start_label().is_none() {
                warn!(timeline = ?self.id, "nothing to resume, play a label first");
                return self;
            }
            timeline.timing_mut().running = true;
            let ticker = timeline.ticker();
            self.scheduler.start_ticker(ticker);
        }
        self
    }

    /// Seek to a local time in seconds
    pub fn seek(&mut self, seconds: f64, account_for_delay: bool) -> &mut Self {
        let scheduler = &mut *self.scheduler;
        if let Some(timeline) = scheduler.timelines.get_mut(self.id) {
            let elapsed = timeline.timing().elapsed_for_time(seconds, account_for_delay);
            if timeline.seek(elapsed, &mut scheduler.tweens, &mut scheduler.registry) {
                scheduler.mark_cleanup();
            }
        }
        self
    }

    /// Seek to a fraction of one lap
    pub fn progress(&mut self, progress: f64, account_for_delay: bool) -> &mut Self {
        let scheduler = &mut *self.scheduler;
        if let Some(timeline) = scheduler.timelines.get_mut(self.id) {
            timeline.ensure_computed(&scheduler.tweens);
            let elapsed = timeline
                .timing()
                .elapsed_for_progress(progress, false, account_for_delay);
            if timeline.seek(elapsed, &mut scheduler.tweens, &mut scheduler.registry) {
                scheduler.mark_cleanup();
            }
        }
        self
    }

    /// Length of one lap of the playing label
    pub fn duration(&mut self) -> f64 {
        let scheduler = &mut *self.scheduler;
        match scheduler.timelines.get_mut(self.id) {
            Some(timeline) => {
                timeline.ensure_computed(&scheduler.tweens);
                timeline.timing().duration()
            }
            None => 0.0,
        }
    }

    /// Flattened schedule of the playing label
    pub fn items(&mut self) -> Vec<TimelineItem> {
        let scheduler = &mut *self.scheduler;
        match scheduler.timelines.get_mut(self.id) {
            Some(timeline) => {
                timeline.ensure_computed(&scheduler.tweens);
                timeline.computed_items().to_vec()
            }
            None => Vec::new(),
        }
    }

    pub fn time_scale(&mut self, scale: f64) -> &mut Self {
        if let Some(timeline) = self.scheduler.timelines.get_mut(self.id) {
            timeline.timing_mut().set_time_scale(scale);
        }
        self
    }

    pub fn reverse(&mut self) -> &mut Self {
        if let Some(timeline) = self.scheduler.timelines.get_mut(self.id) {
            timeline.timing_mut().reverse();
            if timeline.start_label().is_some() && !timeline.is_cleared() {
                timeline.timing_mut().running = true;
                let ticker = timeline.ticker();
                self.scheduler.start_ticker(ticker);
            }
        }
        self
    }

    pub fn yoyo(&mut self, yoyo: bool) -> &mut Self {
        if let Some(timeline) = self.scheduler.timelines.get_mut(self.id) {
            timeline.timing_mut().set_yoyo(yoyo);
        }
        self
    }

    /// Text rendering of the schedule of `label`, empty for unknown labels
    pub fn plot(&self, label: &str) -> String {
        let Some(timeline) = self.get() else {
            return String::new();
        };
        timeline
            .plot(label, &self.scheduler.tweens)
            .unwrap_or_else(|err| {
                warn!(timeline = ?self.id, "{err}");
                String::new()
            })
    }

    /// Stop, release every member tween, and drop the timeline at the next sweep
    pub fn clear(&mut self) {
        let scheduler = &mut *self.scheduler;
        if let Some(timeline) = scheduler.timelines.get_mut(self.id) {
            timeline.clear(&mut scheduler.tweens, &mut scheduler.registry);
            let ticker = timeline.ticker();
            scheduler.stop_ticker(ticker);
            scheduler.mark_cleanup();
        }
    }
}
