//! Property binder
//!
//! Turns a tween's `from`/`to` maps into per-target property bindings and
//! interpolates them. A binding's [`PropertyKind`] is re-derived every time
//! it syncs from the live object, so fields may change shape between runs.

use indexmap::IndexMap;
use tracing::trace;

use crate::easing::Easing;
use crate::registry::{BindingId, PropertyKey, PropertyRegistry};
use crate::scheduler::{TimelineId, TweenId};
use crate::target::Target;
use crate::value::{Rgb, Value};

/// Ordered field → value map used for `from` / `to`
pub type PropMap = IndexMap<String, Value>;

/// Keys that configure a tween and are never bound as properties
pub const RESERVED_KEYS: &[&str] = &[
    "from",
    "to",
    "ease",
    "delay",
    "repeat",
    "repeat_delay",
    "repeatDelay",
    "yoyo",
    "inverted",
    "auto_start",
    "autoStart",
    "time_scale",
    "timeScale",
    "keep_alive",
    "on_start",
    "onStart",
    "on_update",
    "onUpdate",
    "on_complete",
    "onComplete",
    "on_repeat",
    "onRepeat",
];

/// Interpolation state of one binding
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    Number { start: f64, end: f64 },
    Array { start: Vec<f64>, end: Vec<f64> },
    Color { start: [f64; 3], end: [f64; 3] },
    /// Piecewise path; the first point is the start value
    Waypoints { points: Vec<f64> },
    Invalid,
}

impl PropertyKind {
    /// Classify a binding from its start, end, and the object's current value
    pub fn classify(start: &Value, end: &Value, current: &Value) -> Self {
        if let (Some(start), Some(end), Some(_)) =
            (start.as_number(), end.as_number(), current.as_number())
        {
            return PropertyKind::Number { start, end };
        }

        if let (Some(start), Some(end), Some(_)) =
            (start.as_color(), end.as_color(), current.as_color())
        {
            return PropertyKind::Color {
                start: start.channels(),
                end: end.channels(),
            };
        }

        if let (Some(start), Some(end), Some(current)) =
            (start.as_array(), end.as_array(), current.as_array())
        {
            let (start, end) = pad_arrays(start, end, current);
            return PropertyKind::Array { start, end };
        }

        if let (Some(start), Some(path), Some(_)) =
            (start.as_number(), end.as_array(), current.as_number())
        {
            let mut points = Vec::with_capacity(path.len() + 1);
            points.push(start);
            points.extend_from_slice(path);
            return PropertyKind::Waypoints { points };
        }

        PropertyKind::Invalid
    }

    /// Value at `progress`, or `None` for invalid bindings
    pub fn value_at(&self, easing: &Easing, progress: f64) -> Option<Value> {
        match self {
            PropertyKind::Number { start, end } => {
                Some(Value::Number(easing.interpolate(progress, *start, *end)))
            }
            PropertyKind::Array { start, end } => Some(Value::Array(
                start
                    .iter()
                    .zip(end)
                    .map(|(s, e)| easing.interpolate(progress, *s, *e))
                    .collect(),
            )),
            PropertyKind::Color { start, end } => {
                let mut channels = [0.0; 3];
                for (i, channel) in channels.iter_mut().enumerate() {
                    *channel = easing.interpolate(progress, start[i], end[i]);
                }
                Some(Value::Text(Rgb::from_channels(channels).to_hex()))
            }
            PropertyKind::Waypoints { points } => {
                Some(Value::Number(waypoint_value(points, easing, progress)))
            }
            PropertyKind::Invalid => None,
        }
    }
}

/// Pad the shorter of two arrays from the current value, then the longer array
fn pad_arrays(start: &[f64], end: &[f64], current: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let len = start.len().max(end.len());
    let fill = |values: &[f64], other: &[f64]| -> Vec<f64> {
        (0..len)
            .map(|i| {
                values
                    .get(i)
                    .or_else(|| current.get(i))
                    .or_else(|| other.get(i))
                    .copied()
                    .unwrap_or_default()
            })
            .collect()
    };
    (fill(start, end), fill(end, start))
}

fn waypoint_value(points: &[f64], easing: &Easing, progress: f64) -> f64 {
    let segments = points.len().saturating_sub(1);
    if segments == 0 {
        return points.first().copied().unwrap_or_default();
    }
    let scaled = progress * segments as f64;
    let segment = (scaled.floor().max(0.0) as usize).min(segments - 1);
    let local = scaled - segment as f64;
    easing.interpolate(local, points[segment], points[segment + 1])
}

/// Live association between one target field and one tween
#[derive(Debug)]
pub struct Property {
    key: PropertyKey,
    target: Target,
    from: Option<Value>,
    to: Option<Value>,
    start: Option<Value>,
    end: Option<Value>,
    kind: PropertyKind,
    binding: Option<BindingId>,
    enabled: bool,
}

impl Property {
    pub(crate) fn new(target: &Target, name: &str, from: Option<Value>, to: Option<Value>) -> Self {
        Self {
            key: PropertyKey::new(target.id(), name),
            target: target.clone(),
            from,
            to,
            start: None,
            end: None,
            kind: PropertyKind::Invalid,
            binding: None,
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.key.field
    }

    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn start(&self) -> Option<&Value> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&Value> {
        self.end.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot start/end from the object and re-derive the kind
    pub(crate) fn sync(&mut self) {
        let Some(current) = self.target.get(self.name()) else {
            self.kind = PropertyKind::Invalid;
            return;
        };
        let start = self.from.clone().unwrap_or_else(|| current.clone());
        let end = self.to.clone().unwrap_or_else(|| current.clone());
        self.kind = PropertyKind::classify(&start, &end, &current);
        if self.kind == PropertyKind::Invalid {
            trace!(field = %self.key.field, "property values cannot be interpolated");
        }
        self.start = Some(start);
        self.end = Some(end);
    }

    pub(crate) fn claim(
        &mut self,
        registry: &mut PropertyRegistry,
        tween: TweenId,
        timeline: Option<TimelineId>,
    ) {
        if self.enabled {
            self.binding = Some(registry.claim(self.key.clone(), tween, timeline));
        }
    }

    /// Take the key back from a sibling member of the same timeline.
    /// Keys claimed by anything outside the timeline stay with their owner.
    pub(crate) fn reclaim(
        &mut self,
        registry: &mut PropertyRegistry,
        tween: TweenId,
        timeline: TimelineId,
    ) {
        if !self.owns(registry) && registry.owned_by_timeline(&self.key, timeline) {
            self.claim(registry, tween, Some(timeline));
        }
    }

    pub(crate) fn release(&mut self, registry: &mut PropertyRegistry) {
        if let Some(binding) = self.binding.take() {
            registry.release(&self.key, binding);
        }
    }

    /// Disable and release; the binding is purged at the next evaluation
    pub(crate) fn disable(&mut self, registry: &mut PropertyRegistry) {
        self.enabled = false;
        self.release(registry);
    }

    pub(crate) fn owns(&self, registry: &PropertyRegistry) -> bool {
        self.binding
            .is_some_and(|binding| registry.owns(&self.key, binding))
    }

    /// Write the interpolated value; `false` for invalid bindings
    pub(crate) fn evaluate(&self, easing: &Easing, progress: f64) -> bool {
        match self.kind.value_at(easing, progress) {
            Some(value) => {
                self.target.set(self.name(), value);
                true
            }
            None => false,
        }
    }
}

/// Outcome of evaluating one target node
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NodeEval {
    pub updated: usize,
    pub purged: usize,
}

/// The bindings of one tween on one target object
#[derive(Debug)]
pub struct TargetNode {
    target: Target,
    properties: Vec<Property>,
}

impl TargetNode {
    /// Bind every non-reserved key of `from ∪ to` that exists on the target
    pub(crate) fn bind(target: &Target, from: &PropMap, to: &PropMap) -> Self {
        let mut properties = Vec::new();
        let keys = from.keys().chain(to.keys().filter(|k| !from.contains_key(*k)));

        for name in keys {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            if !target.has_field(name) {
                trace!(field = %name, target = ?target.id(), "target has no such field, skipping");
                continue;
            }
            properties.push(Property::new(
                target,
                name,
                from.get(name).cloned(),
                to.get(name).cloned(),
            ));
        }

        Self {
            target: target.clone(),
            properties,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Evaluate owned bindings last-bound first, purging dead ones in place.
    ///
    /// With `keep_displaced`, a binding that lost its key is skipped rather
    /// than purged so it can claim the key again on a later replay.
    pub(crate) fn evaluate(
        &mut self,
        easing: &Easing,
        progress: f64,
        registry: &PropertyRegistry,
        keep_displaced: bool,
    ) -> NodeEval {
        let mut eval = NodeEval::default();
        for i in (0..self.properties.len()).rev() {
            let property = &self.properties[i];
            let owned = property.owns(registry);
            if property.enabled && !owned && keep_displaced {
                continue;
            }
            if !property.enabled || !owned {
                self.properties.remove(i);
                eval.purged += 1;
                continue;
            }
            if self.properties[i].evaluate(easing, progress) {
                eval.updated += 1;
            }
        }
        eval
    }
}
