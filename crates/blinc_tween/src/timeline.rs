//! Timeline orchestration for multiple tweens
//!
//! A timeline holds labeled steps and flattens the one it plays into an
//! absolute schedule of [`TimelineItem`]s. The schedule is cached and only
//! recomputed after a definition changes.

use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error, warn};

use crate::config::TimelineConfig;
use crate::error::{Result, TweenError};
use crate::plot::render_plot;
use crate::registry::PropertyRegistry;
use crate::runnable::{CallbackEvent, Callbacks, Direction, Runnable};
use crate::scheduler::{TickerId, TimelineId, TweenId};
use crate::tween::Tween;

new_key_type! {
    pub struct CallbackId;
}

/// Column width of [`Timeline::plot`] output
const PLOT_WIDTH: usize = 40;

/// One step of a timeline definition
pub enum Step {
    /// A tween; contributes its total duration
    Tween(TweenId),
    /// Seconds of idle time before the next step
    Delay(f64),
    /// Another defined label
    Label(String),
    /// Steps played one after another
    Sequence(Vec<Step>),
    /// Labels played together, each shifted by its offset in seconds
    Parallel(Vec<(String, f64)>),
    /// Zero-duration handler fired once when first reached
    Callback(Box<dyn FnMut()>),
}

impl Step {
    pub fn seq<S: Into<Step>>(steps: impl IntoIterator<Item = S>) -> Self {
        Step::Sequence(steps.into_iter().map(Into::into).collect())
    }

    pub fn parallel<L: Into<String>>(members: impl IntoIterator<Item = (L, f64)>) -> Self {
        Step::Parallel(
            members
                .into_iter()
                .map(|(label, offset)| (label.into(), offset))
                .collect(),
        )
    }

    pub fn call(handler: impl FnMut() + 'static) -> Self {
        Step::Callback(Box::new(handler))
    }

    pub fn label(label: impl Into<String>) -> Self {
        Step::Label(label.into())
    }
}

impl From<TweenId> for Step {
    fn from(id: TweenId) -> Self {
        Step::Tween(id)
    }
}

impl From<f64> for Step {
    fn from(seconds: f64) -> Self {
        Step::Delay(seconds)
    }
}

impl From<&str> for Step {
    fn from(label: &str) -> Self {
        Step::Label(label.to_string())
    }
}

impl From<String> for Step {
    fn from(label: String) -> Self {
        Step::Label(label)
    }
}

impl From<Vec<Step>> for Step {
    fn from(steps: Vec<Step>) -> Self {
        Step::Sequence(steps)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Tween(id) => f.debug_tuple("Tween").field(id).finish(),
            Step::Delay(s) => f.debug_tuple("Delay").field(s).finish(),
            Step::Label(l) => f.debug_tuple("Label").field(l).finish(),
            Step::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            Step::Parallel(members) => f.debug_tuple("Parallel").field(members).finish(),
            Step::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Accepted step with callbacks moved into the timeline's arena
#[derive(Clone, Debug)]
enum Node {
    Tween(TweenId),
    Delay(f64),
    Label(String),
    Sequence(Vec<Node>),
    Parallel(Vec<(String, f64)>),
    Callback(CallbackId),
}

struct CallbackEntry {
    handler: Box<dyn FnMut()>,
    events_enabled: bool,
}

/// What a scheduled item drives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemRef {
    Tween(TweenId),
    Callback(CallbackId),
}

/// A flattened schedule entry, in seconds from the timeline start
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineItem {
    pub obj: ItemRef,
    pub start: f64,
    pub end: f64,
}

/// A runnable composed of labeled steps
pub struct Timeline {
    id: TimelineId,
    ticker: TickerId,
    timing: Runnable,
    definitions: IndexMap<String, Node>,
    callbacks: SlotMap<CallbackId, CallbackEntry>,
    start_label: Option<String>,
    items: Vec<TimelineItem>,
    dirty: bool,
    last_time: f64,
    begun: bool,
    lifecycle: Callbacks,
    cleared: bool,
}

impl Timeline {
    pub(crate) fn new(id: TimelineId, ticker: TickerId, config: TimelineConfig) -> Self {
        let mut timing = Runnable::new(0.0, &config.playback);
        timing.running = false;
        Self {
            id,
            ticker,
            timing,
            definitions: IndexMap::new(),
            callbacks: SlotMap::with_key(),
            start_label: None,
            items: Vec::new(),
            dirty: false,
            last_time: 0.0,
            begun: false,
            lifecycle: config.callbacks,
            cleared: false,
        }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub(crate) fn ticker(&self) -> TickerId {
        self.ticker
    }

    pub fn timing(&self) -> &Runnable {
        &self.timing
    }

    pub(crate) fn timing_mut(&mut self) -> &mut Runnable {
        &mut self.timing
    }

    pub fn is_running(&self) -> bool {
        self.timing.running
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Label passed to the last `play`
    pub fn start_label(&self) -> Option<&str> {
        self.start_label.as_deref()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Schedule of the playing label as of the last compute
    pub fn computed_items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Validate and store a step. Returns the tweens it places on the timeline.
    pub(crate) fn define(
        &mut self,
        label: &str,
        step: Step,
        tweens: &SlotMap<TweenId, Tween>,
    ) -> Result<Vec<TweenId>> {
        self.validate(label, &step, tweens)?;

        let mut seen = Vec::new();
        if self.step_reaches(&step, label, &mut seen) {
            return Err(TweenError::invalid_step(
                label,
                "definition would reference itself",
            ));
        }

        let mut members = Vec::new();
        let node = self.lower(step, &mut members);
        self.definitions.insert(label.to_string(), node);
        self.dirty = true;
        debug!(timeline = ?self.id, label, "timeline step defined");
        Ok(members)
    }

    fn validate(&self, label: &str, step: &Step, tweens: &SlotMap<TweenId, Tween>) -> Result<()> {
        match step {
            Step::Tween(id) => {
                if !tweens.contains_key(*id) {
                    return Err(TweenError::invalid_step(label, format!("unknown tween {id:?}")));
                }
            }
            Step::Delay(seconds) => {
                if !seconds.is_finite() || *seconds < 0.0 {
                    return Err(TweenError::invalid_step(
                        label,
                        format!("delay must be a non-negative number, got {seconds}"),
                    ));
                }
            }
            Step::Label(reference) => self.validate_reference(label, reference)?,
            Step::Sequence(steps) => {
                for step in steps {
                    self.validate(label, step, tweens)?;
                }
            }
            Step::Parallel(members) => {
                for (reference, offset) in members {
                    self.validate_reference(label, reference)?;
                    if !offset.is_finite() {
                        return Err(TweenError::invalid_step(
                            label,
                            format!("offset of `{reference}` must be a number"),
                        ));
                    }
                }
            }
            Step::Callback(_) => {}
        }
        Ok(())
    }

    fn validate_reference(&self, label: &str, reference: &str) -> Result<()> {
        if self.definitions.contains_key(reference) {
            Ok(())
        } else {
            Err(TweenError::invalid_step(
                label,
                format!("undefined label `{reference}`"),
            ))
        }
    }

    fn step_reaches(&self, step: &Step, target: &str, seen: &mut Vec<String>) -> bool {
        match step {
            Step::Label(reference) => self.label_reaches(reference, target, seen),
            Step::Sequence(steps) => steps.iter().any(|s| self.step_reaches(s, target, seen)),
            Step::Parallel(members) => members
                .iter()
                .any(|(reference, _)| self.label_reaches(reference, target, seen)),
            Step::Tween(_) | Step::Delay(_) | Step::Callback(_) => false,
        }
    }

    fn node_reaches(&self, node: &Node, target: &str, seen: &mut Vec<String>) -> bool {
        match node {
            Node::Label(reference) => self.label_reaches(reference, target, seen),
            Node::Sequence(nodes) => nodes.iter().any(|n| self.node_reaches(n, target, seen)),
            Node::Parallel(members) => members
                .iter()
                .any(|(reference, _)| self.label_reaches(reference, target, seen)),
            Node::Tween(_) | Node::Delay(_) | Node::Callback(_) => false,
        }
    }

    fn label_reaches(&self, label: &str, target: &str, seen: &mut Vec<String>) -> bool {
        if label == target {
            return true;
        }
        if seen.iter().any(|s| s == label) {
            return false;
        }
        seen.push(label.to_string());
        self.definitions
            .get(label)
            .is_some_and(|node| self.node_reaches(node, target, seen))
    }

    fn lower(&mut self, step: Step, members: &mut Vec<TweenId>) -> Node {
        match step {
            Step::Tween(id) => {
                members.push(id);
                Node::Tween(id)
            }
            Step::Delay(seconds) => Node::Delay(seconds),
            Step::Label(label) => Node::Label(label),
            Step::Sequence(steps) => Node::Sequence(
                steps
                    .into_iter()
                    .map(|step| self.lower(step, members))
                    .collect(),
            ),
            Step::Parallel(members) => Node::Parallel(members),
            Step::Callback(handler) => Node::Callback(self.callbacks.insert(CallbackEntry {
                handler,
                events_enabled: true,
            })),
        }
    }

    // =========================================================================
    // Compositor
    // =========================================================================

    /// Flatten `label` into an absolute, start-ordered schedule
    pub(crate) fn schedule(&self, label: &str, tweens: &SlotMap<TweenId, Tween>) -> Vec<TimelineItem> {
        let mut items = Vec::new();
        let mut visiting = Vec::new();
        self.compute_label(label, 0.0, tweens, &mut items, &mut visiting);

        // Negative parallel offsets can schedule items before zero
        let earliest = items.iter().map(|item| item.start).fold(0.0, f64::min);
        if earliest < 0.0 {
            for item in &mut items {
                item.start -= earliest;
                item.end -= earliest;
            }
        }

        items.sort_by(|a, b| a.start.total_cmp(&b.start));
        items
    }

    fn compute_label(
        &self,
        label: &str,
        offset: f64,
        tweens: &SlotMap<TweenId, Tween>,
        items: &mut Vec<TimelineItem>,
        visiting: &mut Vec<String>,
    ) -> f64 {
        if visiting.iter().any(|l| l == label) {
            warn!(label, "cyclic label reference ignored");
            return offset;
        }
        let Some(node) = self.definitions.get(label) else {
            warn!(label, "undefined label ignored");
            return offset;
        };
        visiting.push(label.to_string());
        let end = self.compute_node(node, offset, tweens, items, visiting);
        visiting.pop();
        end
    }

    fn compute_node(
        &self,
        node: &Node,
        offset: f64,
        tweens: &SlotMap<TweenId, Tween>,
        items: &mut Vec<TimelineItem>,
        visiting: &mut Vec<String>,
    ) -> f64 {
        match node {
            Node::Tween(id) => {
                let Some(tween) = tweens.get(*id) else {
                    warn!(tween = ?id, "tween no longer exists, skipping");
                    return offset;
                };
                let end = offset + tween.timing().total_duration();
                items.push(TimelineItem {
                    obj: ItemRef::Tween(*id),
                    start: offset,
                    end,
                });
                end
            }
            Node::Callback(id) => {
                items.push(TimelineItem {
                    obj: ItemRef::Callback(*id),
                    start: offset,
                    end: offset,
                });
                offset
            }
            Node::Delay(seconds) => offset + seconds,
            Node::Label(label) => self.compute_label(label, offset, tweens, items, visiting),
            Node::Sequence(nodes) => {
                let mut at = offset;
                for node in nodes {
                    at = self.compute_node(node, at, tweens, items, visiting);
                }
                at
            }
            Node::Parallel(members) => {
                let mut end = offset;
                for (label, shift) in members {
                    let member_end =
                        self.compute_label(label, offset + shift, tweens, items, visiting);
                    end = end.max(member_end);
                }
                end
            }
        }
    }

    /// Recompute the cached schedule if a definition changed
    pub(crate) fn ensure_computed(&mut self, tweens: &SlotMap<TweenId, Tween>) {
        if !self.dirty {
            return;
        }
        self.items = match &self.start_label {
            Some(label) => self.schedule(label, tweens),
            None => Vec::new(),
        };
        let duration = self.items.iter().map(|item| item.end).fold(0.0, f64::max);
        self.timing.set_duration(duration);
        self.enable_callbacks();
        self.dirty = false;
        debug!(
            timeline = ?self.id,
            items = self.items.len(),
            duration,
            "timeline schedule computed"
        );
    }

    fn enable_callbacks(&mut self) {
        for (_, entry) in self.callbacks.iter_mut() {
            entry.events_enabled = true;
        }
    }

    /// Text rendering of the schedule of `label`
    pub(crate) fn plot(&self, label: &str, tweens: &SlotMap<TweenId, Tween>) -> Result<String> {
        if !self.definitions.contains_key(label) {
            return Err(TweenError::UnknownLabel(label.to_string()));
        }
        let plot = render_plot(label, &self.schedule(label, tweens), PLOT_WIDTH);
        debug!(timeline = ?self.id, "\n{plot}");
        Ok(plot)
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Start `label` from the beginning
    pub(crate) fn play(&mut self, label: &str, tweens: &mut SlotMap<TweenId, Tween>) -> Result<()> {
        if !self.definitions.contains_key(label) {
            return Err(TweenError::UnknownLabel(label.to_string()));
        }

        if self.start_label.as_deref() != Some(label) {
            self.start_label = Some(label.to_string());
            self.dirty = true;
        }
        self.ensure_computed(tweens);
        self.enable_callbacks();

        for item in &self.items {
            if let ItemRef::Tween(id) = item.obj {
                if let Some(tween) = tweens.get_mut(id) {
                    tween.rewind_for_replay();
                }
            }
        }

        self.timing.rewind(true);
        self.last_time = 0.0;
        self.begun = false;
        self.cleared = false;
        self.timing.running = true;
        debug!(timeline = ?self.id, label, "timeline playing");
        Ok(())
    }

    /// Step the timeline; `true` when a member was cleared while rendering
    pub(crate) fn advance(
        &mut self,
        dt: f64,
        tweens: &mut SlotMap<TweenId, Tween>,
        registry: &mut PropertyRegistry,
    ) -> bool {
        if self.cleared {
            return false;
        }
        self.ensure_computed(tweens);
        self.timing.advance(dt);
        self.render(tweens, registry, false)
    }

    /// Jump to an elapsed time and render immediately
    pub(crate) fn seek(
        &mut self,
        elapsed: f64,
        tweens: &mut SlotMap<TweenId, Tween>,
        registry: &mut PropertyRegistry,
    ) -> bool {
        self.ensure_computed(tweens);
        self.timing.seek(elapsed);
        self.render(tweens, registry, true)
    }

    /// Render every reached item at the current local time
    fn render(
        &mut self,
        tweens: &mut SlotMap<TweenId, Tween>,
        registry: &mut PropertyRegistry,
        forced: bool,
    ) -> bool {
        let transitions = self.timing.transitions();
        if transitions.started {
            self.begun = true;
            self.lifecycle.fire(CallbackEvent::Start, &[]);
        }
        if forced && self.timing.elapsed() >= self.timing.delay() {
            self.begun = true;
        }
        if !self.begun {
            return false;
        }

        let duration = self.timing.duration();
        let lap = self.timing.capped_lap_at(self.timing.elapsed());
        let last_lap = self.timing.capped_lap_at(self.timing.last_elapsed());
        let mut pass = RenderPass::default();

        // Close the lap being left, then enter the new one from its far edge
        if lap != last_lap {
            let forward = lap > last_lap;
            let edge = self.timing.lap_edge_progress(last_lap, forward) * duration;
            pass.merge(self.render_items(edge, tweens, registry));
            self.enable_callbacks();
            self.last_time = self.timing.lap_edge_progress(lap, !forward) * duration;
        }

        let time = self.timing.local_progress() * duration;
        pass.merge(self.render_items(time, tweens, registry));

        if pass.rendered {
            self.lifecycle.fire(CallbackEvent::Update, &[]);
        }
        if transitions.repeated {
            self.lifecycle.fire(CallbackEvent::Repeat, &[]);
        }
        if transitions.completed {
            self.lifecycle.fire(CallbackEvent::Complete, &[]);
            self.timing.running = false;
            debug!(timeline = ?self.id, "timeline completed");
        }
        pass.cleared
    }

    /// Seek every item reached at local `time`, in playback order
    fn render_items(
        &mut self,
        time: f64,
        tweens: &mut SlotMap<TweenId, Tween>,
        registry: &mut PropertyRegistry,
    ) -> RenderPass {
        let direction = if time >= self.last_time {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.last_time = time;

        let mut pass = RenderPass::default();
        let count = self.items.len();
        for n in 0..count {
            // Later items render first when moving backwards
            let item = match direction {
                Direction::Forward => self.items[n],
                Direction::Backward => self.items[count - 1 - n],
            };
            let reached = match direction {
                Direction::Forward => time >= item.start,
                Direction::Backward => time <= item.end,
            };
            if !reached {
                continue;
            }

            match item.obj {
                ItemRef::Tween(id) => {
                    if let Some(tween) = tweens.get_mut(id) {
                        tween.seek(time - item.start, registry);
                        pass.rendered = true;
                        pass.cleared |= tween.is_cleared();
                    }
                }
                ItemRef::Callback(id) => {
                    if let Some(entry) = self.callbacks.get_mut(id) {
                        if entry.events_enabled {
                            entry.events_enabled = false;
                            let handler = &mut entry.handler;
                            if panic::catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                                error!(timeline = ?self.id, "timeline callback panicked");
                            }
                        }
                    }
                }
            }
        }
        pass
    }

    /// Stop and release every member tween
    pub(crate) fn clear(&mut self, tweens: &mut SlotMap<TweenId, Tween>, registry: &mut PropertyRegistry) {
        for node in self.definitions.values() {
            let mut members = Vec::new();
            collect_tweens(node, &mut members);
            for id in members {
                if let Some(tween) = tweens.get_mut(id) {
                    tween.clear(registry);
                }
            }
        }
        self.timing.running = false;
        self.cleared = true;
        debug!(timeline = ?self.id, "timeline cleared");
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RenderPass {
    rendered: bool,
    cleared: bool,
}

impl RenderPass {
    fn merge(&mut self, other: RenderPass) {
        self.rendered |= other.rendered;
        self.cleared |= other.cleared;
    }
}

fn collect_tweens(node: &Node, out: &mut Vec<TweenId>) {
    match node {
        Node::Tween(id) => out.push(*id),
        Node::Sequence(nodes) => {
            for node in nodes {
                collect_tweens(node, out);
            }
        }
        Node::Delay(_) | Node::Label(_) | Node::Parallel(_) | Node::Callback(_) => {}
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("id", &self.id)
            .field("timing", &self.timing)
            .field("labels", &self.definitions.keys().collect::<Vec<_>>())
            .field("start_label", &self.start_label)
            .field("items", &self.items)
            .field("dirty", &self.dirty)
            .finish()
    }
}
