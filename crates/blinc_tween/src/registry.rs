//! Property ownership registry
//!
//! Maps `(object, field)` to the single binding currently allowed to drive
//! it. Claiming a key silently displaces the previous owner: the last binding
//! *registered* wins, and displaced bindings notice at their next evaluation.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::scheduler::{TimelineId, TweenId};
use crate::target::ObjectId;

/// Ownership key: object identity plus field name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub object: ObjectId,
    pub field: String,
}

impl PropertyKey {
    pub fn new(object: ObjectId, field: impl Into<String>) -> Self {
        Self {
            object,
            field: field.into(),
        }
    }
}

/// Ticket proving a property currently owns its key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

#[derive(Clone, Copy, Debug)]
struct Owner {
    binding: BindingId,
    tween: TweenId,
    timeline: Option<TimelineId>,
}

/// Registry of which binding drives each object field
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    owners: FxHashMap<PropertyKey, Owner>,
    next_binding: u64,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a key, displacing any previous owner.
    /// `timeline` is the timeline driving `tween`, if any.
    pub fn claim(
        &mut self,
        key: PropertyKey,
        tween: TweenId,
        timeline: Option<TimelineId>,
    ) -> BindingId {
        self.next_binding += 1;
        let binding = BindingId(self.next_binding);
        let owner = Owner {
            binding,
            tween,
            timeline,
        };
        if let Some(previous) = self.owners.insert(key, owner) {
            if previous.tween != tween {
                trace!(
                    previous = ?previous.tween,
                    current = ?tween,
                    "property ownership transferred"
                );
            }
        }
        binding
    }

    /// Whether `binding` still owns `key`
    pub fn owns(&self, key: &PropertyKey, binding: BindingId) -> bool {
        self.owners
            .get(key)
            .is_some_and(|owner| owner.binding == binding)
    }

    /// Release a key. Only its current owner can release it.
    pub fn release(&mut self, key: &PropertyKey, binding: BindingId) -> bool {
        if self.owns(key, binding) {
            self.owners.remove(key);
            true
        } else {
            false
        }
    }

    /// The tween currently driving a key
    pub fn owner(&self, key: &PropertyKey) -> Option<TweenId> {
        self.owners.get(key).map(|owner| owner.tween)
    }

    /// Whether the key is driven by a member of `timeline`
    pub fn owned_by_timeline(&self, key: &PropertyKey, timeline: TimelineId) -> bool {
        self.owners
            .get(key)
            .is_some_and(|owner| owner.timeline == Some(timeline))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Object, Target};
    use slotmap::SlotMap;

    fn tween_ids() -> (TweenId, TweenId) {
        let mut ids: SlotMap<TweenId, ()> = SlotMap::with_key();
        (ids.insert(()), ids.insert(()))
    }

    #[test]
    fn test_last_claim_wins() {
        let target = Target::new(Object::new().with("x", 0.0));
        let key = PropertyKey::new(target.id(), "x");
        let (a, b) = tween_ids();
        let mut registry = PropertyRegistry::new();

        let first = registry.claim(key.clone(), a, None);
        assert!(registry.owns(&key, first));

        let second = registry.claim(key.clone(), b, None);
        assert!(!registry.owns(&key, first));
        assert!(registry.owns(&key, second));
        assert_eq!(registry.owner(&key), Some(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_only_owner_releases() {
        let target = Target::new(Object::new().with("x", 0.0));
        let key = PropertyKey::new(target.id(), "x");
        let (a, b) = tween_ids();
        let mut registry = PropertyRegistry::new();

        let stale = registry.claim(key.clone(), a, None);
        let current = registry.claim(key.clone(), b, None);

        assert!(!registry.release(&key, stale));
        assert_eq!(registry.owner(&key), Some(b));
        assert!(registry.release(&key, current));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_owner_timeline_is_tracked() {
        let target = Target::new(Object::new().with("x", 0.0));
        let key = PropertyKey::new(target.id(), "x");
        let (a, b) = tween_ids();
        let mut timelines: SlotMap<TimelineId, ()> = SlotMap::with_key();
        let timeline = timelines.insert(());
        let mut registry = PropertyRegistry::new();

        registry.claim(key.clone(), a, Some(timeline));
        assert!(registry.owned_by_timeline(&key, timeline));

        registry.claim(key.clone(), b, None);
        assert!(!registry.owned_by_timeline(&key, timeline));
    }
}
