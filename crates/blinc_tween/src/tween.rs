//! Tween state machine
//!
//! A tween binds its targets lazily: nothing is read from or written to the
//! objects until the first evaluation past the delay, at which point start
//! and end values are captured and every property claims its field in the
//! ownership registry.

use tracing::{debug, trace};

use crate::config::TweenConfig;
use crate::easing::Easing;
use crate::error::{Result, TweenError};
use crate::property::{NodeEval, PropMap, TargetNode};
use crate::registry::PropertyRegistry;
use crate::runnable::{CallbackEvent, Callbacks, Runnable};
use crate::scheduler::{TimelineId, TweenId};
use crate::target::{Target, Targets};

/// Interpolates named fields of one or more targets over time
#[derive(Debug)]
pub struct Tween {
    id: TweenId,
    timing: Runnable,
    targets: Targets,
    from: PropMap,
    to: PropMap,
    ease: Easing,
    nodes: Vec<TargetNode>,
    sync_next_tick: bool,
    claim_next_tick: bool,
    callbacks: Callbacks,
    parent: Option<TimelineId>,
    keep_alive: bool,
    cleared: bool,
    paused: bool,
}

impl Tween {
    pub(crate) fn new(
        id: TweenId,
        targets: Targets,
        duration: f64,
        config: TweenConfig,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(TweenError::InvalidTween(
                "a tween needs at least one target".to_string(),
            ));
        }

        let ease = Easing::resolve(&config.ease)?;
        let nodes = targets
            .iter()
            .map(|target| TargetNode::bind(target, &config.from, &config.to))
            .collect();

        Ok(Self {
            id,
            timing: Runnable::new(duration, &config.playback),
            targets,
            from: config.from,
            to: config.to,
            ease,
            nodes,
            sync_next_tick: true,
            claim_next_tick: false,
            callbacks: config.callbacks,
            parent: None,
            keep_alive: config.keep_alive,
            cleared: false,
            paused: false,
        })
    }

    pub fn id(&self) -> TweenId {
        self.id
    }

    pub fn timing(&self) -> &Runnable {
        &self.timing
    }

    pub(crate) fn timing_mut(&mut self) -> &mut Runnable {
        &mut self.timing
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn from_props(&self) -> &PropMap {
        &self.from
    }

    pub fn to_props(&self) -> &PropMap {
        &self.to
    }

    pub fn ease(&self) -> Easing {
        self.ease
    }

    pub fn nodes(&self) -> &[TargetNode] {
        &self.nodes
    }

    /// Number of bindings still attached
    pub fn property_count(&self) -> usize {
        self.nodes.iter().map(|n| n.properties().len()).sum()
    }

    /// Timeline driving this tween, if any
    pub fn parent(&self) -> Option<TimelineId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: TimelineId) {
        self.parent = Some(parent);
        self.timing.running = false;
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Stopped by an explicit pause rather than by never starting
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Bound to targets and waiting for its first evaluation
    pub fn is_pending_sync(&self) -> bool {
        self.sync_next_tick
    }

    /// Advance by one scheduler step
    pub(crate) fn advance(&mut self, dt: f64, registry: &mut PropertyRegistry) {
        if self.cleared {
            return;
        }
        self.timing.advance(dt);
        self.evaluate(registry, false);
    }

    /// Jump to an elapsed time and render immediately
    pub(crate) fn seek(&mut self, elapsed: f64, registry: &mut PropertyRegistry) {
        self.revive();
        self.timing.seek(elapsed);
        self.evaluate(registry, true);
    }

    /// Re-render at the current elapsed time
    pub(crate) fn render(&mut self, registry: &mut PropertyRegistry) {
        self.revive();
        self.timing.seek(self.timing.elapsed());
        self.evaluate(registry, true);
    }

    /// Rewind and resync from the objects' current values
    pub(crate) fn restart(
        &mut self,
        account_for_delay: bool,
        immediate_render: bool,
        registry: &mut PropertyRegistry,
    ) {
        self.cleared = false;
        self.sync_next_tick = true;
        self.claim_next_tick = false;
        self.timing.rewind(account_for_delay);
        if self.parent.is_none() {
            self.paused = false;
            self.timing.running = true;
        }
        if immediate_render {
            self.evaluate(registry, true);
        }
    }

    pub(crate) fn reverse(&mut self) {
        self.revive();
        self.timing.reverse();
    }

    /// Rewind latches for a timeline replay, keeping the captured values.
    /// Fields are claimed again once the member is next rendered.
    pub(crate) fn rewind_for_replay(&mut self) {
        self.revive();
        self.timing.rewind(true);
        self.claim_next_tick = !self.sync_next_tick;
    }

    /// Cleared tweens regain their bindings when sought or reversed,
    /// keeping the start and end values captured at sync
    fn revive(&mut self) {
        if self.cleared {
            self.cleared = false;
            self.claim_next_tick = !self.sync_next_tick;
        }
    }

    /// Release every property and stop
    pub(crate) fn clear(&mut self, registry: &mut PropertyRegistry) {
        for node in &mut self.nodes {
            for property in node.properties_mut() {
                property.release(registry);
            }
        }
        self.timing.running = false;
        self.cleared = true;
        debug!(id = ?self.id, "tween cleared");
    }

    /// Disable named properties; they are purged at the next evaluation
    pub(crate) fn clear_properties(&mut self, names: &[&str], registry: &mut PropertyRegistry) {
        for node in &mut self.nodes {
            for property in node.properties_mut() {
                if names.contains(&property.name()) {
                    property.disable(registry);
                }
            }
        }
    }

    fn sync(&mut self, registry: &mut PropertyRegistry) {
        for node in &mut self.nodes {
            for property in node.properties_mut() {
                property.sync();
            }
        }
        self.claim(registry);
        self.sync_next_tick = false;
        trace!(id = ?self.id, "tween synced from targets");
    }

    fn claim(&mut self, registry: &mut PropertyRegistry) {
        for node in &mut self.nodes {
            for property in node.properties_mut() {
                property.claim(registry, self.id, self.parent);
            }
        }
        self.claim_next_tick = false;
    }

    /// Evaluate at the current elapsed time and fire notifications
    pub(crate) fn evaluate(&mut self, registry: &mut PropertyRegistry, forced: bool) {
        if self.cleared {
            return;
        }

        let transitions = self.timing.transitions();
        if transitions.started {
            self.callbacks.fire(CallbackEvent::Start, &self.targets);
        }

        let reached = transitions.started
            || (forced && self.timing.elapsed() >= self.timing.delay());
        if self.sync_next_tick {
            if reached {
                self.sync(registry);
            }
        } else if self.claim_next_tick {
            self.claim(registry);
        }

        let mut eval = NodeEval::default();
        if !self.sync_next_tick {
            if let Some(parent) = self.parent {
                for node in &mut self.nodes {
                    for property in node.properties_mut() {
                        property.reclaim(registry, self.id, parent);
                    }
                }
            }

            let progress = self.timing.local_progress();
            let keep_displaced = self.parent.is_some();
            for node in &mut self.nodes {
                let node_eval = node.evaluate(&self.ease, progress, registry, keep_displaced);
                eval.updated += node_eval.updated;
                eval.purged += node_eval.purged;
            }
        }

        // Every field was claimed by a competing tween
        if eval.purged > 0 && self.nodes.iter().all(TargetNode::is_empty) {
            debug!(id = ?self.id, "all properties overridden, clearing tween");
            self.clear(registry);
            return;
        }

        if eval.updated > 0 {
            self.callbacks.fire(CallbackEvent::Update, &self.targets);
        }
        if transitions.repeated {
            self.callbacks.fire(CallbackEvent::Repeat, &self.targets);
        }
        if transitions.completed {
            self.callbacks.fire(CallbackEvent::Complete, &self.targets);
            if self.parent.is_none() {
                self.clear(registry);
            }
        }
    }
}
