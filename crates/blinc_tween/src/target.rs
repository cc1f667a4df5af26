//! Animatable objects and the shared handles tweens hold on them
//!
//! The engine never touches rendering APIs. It reads and writes named fields
//! through [`Animatable`], and identifies objects by the address of their
//! shared cell so the ownership registry can key on object identity.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::value::Value;

/// An object whose named fields can be tweened
pub trait Animatable {
    /// Read a field, `None` when the object has no such field
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a field
    fn set(&mut self, field: &str, value: Value);

    /// Whether the field exists on this object
    fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

/// A plain field bag
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a field
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Animatable for Object {
    fn get(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// Identity of a target object, stable while any handle to it is alive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Shared handle to an animatable object
#[derive(Clone)]
pub struct Target {
    cell: Rc<RefCell<dyn Animatable>>,
}

impl Target {
    /// Wrap a new object
    pub fn new(object: impl Animatable + 'static) -> Self {
        Self {
            cell: Rc::new(RefCell::new(object)),
        }
    }

    /// Share an object the caller keeps a typed handle to
    pub fn from_rc<T: Animatable + 'static>(object: Rc<RefCell<T>>) -> Self {
        Self { cell: object }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.cell) as *const () as usize)
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.cell.borrow().get(field)
    }

    /// Read a numeric field
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.as_number())
    }

    pub fn set(&self, field: &str, value: impl Into<Value>) {
        self.cell.borrow_mut().set(field, value.into());
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.cell.borrow().has_field(field)
    }

    /// Borrow the underlying object
    pub fn borrow(&self) -> Ref<'_, dyn Animatable> {
        self.cell.borrow()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.id()).finish()
    }
}

/// One or more targets driven by a single tween
pub type Targets = SmallVec<[Target; 1]>;

/// Conversion into the target list of a tween
pub trait IntoTargets {
    fn into_targets(self) -> Targets;
}

impl IntoTargets for Target {
    fn into_targets(self) -> Targets {
        smallvec::smallvec![self]
    }
}

impl IntoTargets for &Target {
    fn into_targets(self) -> Targets {
        smallvec::smallvec![self.clone()]
    }
}

impl IntoTargets for Vec<Target> {
    fn into_targets(self) -> Targets {
        self.into_iter().collect()
    }
}

impl IntoTargets for &[Target] {
    fn into_targets(self) -> Targets {
        self.iter().cloned().collect()
    }
}

impl<const N: usize> IntoTargets for [Target; N] {
    fn into_targets(self) -> Targets {
        self.into_iter().collect()
    }
}
