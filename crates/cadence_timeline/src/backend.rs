//! Targets and the property backend
//!
//! The engine never touches a real object. Everything it renders ends up in a
//! [`PropertyBackend::write`] call keyed by [`TargetId`] and property name.

use rustc_hash::FxHashMap;

/// Opaque identity of an animated object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl TargetId {
    /// Placeholder used when resolving parameters for children without a target
    /// (timers, unmatched selectors).
    pub const DETACHED: TargetId = TargetId(u64::MAX);
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        TargetId(id)
    }
}

/// (target, property) pair that identifies a tween chain and a composition record
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub target: TargetId,
    pub property: String,
}

impl PropertyKey {
    pub fn new(target: TargetId, property: impl Into<String>) -> Self {
        Self {
            target,
            property: property.into(),
        }
    }
}

/// What an `add` call animates
#[derive(Clone, Debug, PartialEq)]
pub enum Targets {
    One(TargetId),
    Many(Vec<TargetId>),
    /// Resolved through [`PropertyBackend::query`] at add-time
    Selector(String),
}

impl From<TargetId> for Targets {
    fn from(id: TargetId) -> Self {
        Targets::One(id)
    }
}

impl From<Vec<TargetId>> for Targets {
    fn from(ids: Vec<TargetId>) -> Self {
        Targets::Many(ids)
    }
}

impl From<&[TargetId]> for Targets {
    fn from(ids: &[TargetId]) -> Self {
        Targets::Many(ids.to_vec())
    }
}

impl From<&str> for Targets {
    fn from(selector: &str) -> Self {
        Targets::Selector(selector.to_string())
    }
}

/// Writer for resolved property values.
///
/// `read` supplies the base value a property has before any tween touched it;
/// `query` resolves selector strings. Both are optional.
pub trait PropertyBackend {
    fn write(&mut self, target: TargetId, property: &str, value: f64);

    fn read(&self, _target: TargetId, _property: &str) -> Option<f64> {
        None
    }

    fn query(&self, _selector: &str) -> Vec<TargetId> {
        Vec::new()
    }
}

/// Backend that drops every write
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl PropertyBackend for NullBackend {
    fn write(&mut self, _target: TargetId, _property: &str, _value: f64) {}
}

/// In-memory backend: a property store plus a selector table
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    values: FxHashMap<PropertyKey, f64>,
    selectors: FxHashMap<String, Vec<TargetId>>,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a selector
    pub fn with_selector(
        mut self,
        selector: impl Into<String>,
        targets: impl Into<Vec<TargetId>>,
    ) -> Self {
        self.selectors.insert(selector.into(), targets.into());
        self
    }

    /// Builder: seed a base value
    pub fn with_value(mut self, target: TargetId, property: impl Into<String>, value: f64) -> Self {
        self.values.insert(PropertyKey::new(target, property), value);
        self
    }

    /// Number of writes received so far
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl PropertyBackend for MemoryBackend {
    fn write(&mut self, target: TargetId, property: &str, value: f64) {
        self.writes += 1;
        self.values.insert(PropertyKey::new(target, property), value);
    }

    fn read(&self, target: TargetId, property: &str) -> Option<f64> {
        self.values.get(&PropertyKey::new(target, property)).copied()
    }

    fn query(&self, selector: &str) -> Vec<TargetId> {
        self.selectors.get(selector).cloned().unwrap_or_default()
    }
}
