//! Composition registry
//!
//! The registry is the only state shared between timelines. It keeps one
//! record per (target, property): the value last written, the claim of the
//! segment that currently owns the property, and the blend layers stacked on
//! top. Timelines receive it by reference at construction; nothing here is
//! global, so independent registries never see each other.
//!
//! Arbitration rules when a timeline commits its local winner:
//!
//! - a running `replace` segment writes and claims the property, unless a
//!   newer timeline holds a running claim;
//! - any other winner (running `none`, finished, not yet started) writes only
//!   when no other timeline holds a running claim, and never claims;
//! - blend deltas are kept per timeline and added on top of the base value.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::backend::{PropertyBackend, PropertyKey, TargetId};
use crate::chain::{Outcome, Resolution, SegmentId};
use crate::error::TimelineError;

/// How overlapping tweens on the same property combine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositionMode {
    /// The most recently started running tween overrides the others
    #[default]
    Replace,
    /// The tween's delta is added on top of the current value
    Blend,
    /// The tween writes only when nothing else claims the property
    None,
}

impl FromStr for CompositionMode {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "replace" => Ok(CompositionMode::Replace),
            "blend" | "add" => Ok(CompositionMode::Blend),
            "none" => Ok(CompositionMode::None),
            other => Err(TimelineError::UnknownComposition(other.to_string())),
        }
    }
}

/// Registration order of a timeline; later timelines have higher priority
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimelineId(pub u64);

/// A running segment's ownership of a property
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Claim {
    pub timeline: TimelineId,
    pub segment: SegmentId,
}

/// Shared state for one (target, property)
#[derive(Clone, Debug, PartialEq)]
pub struct CompositionRecord {
    value: f64,
    base: f64,
    owner: Option<Claim>,
    layers: SmallVec<[(TimelineId, f64); 2]>,
}

impl CompositionRecord {
    fn new(base: f64) -> Self {
        Self {
            value: base,
            base,
            owner: None,
            layers: SmallVec::new(),
        }
    }

    /// Last written value, blend layers included
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value written by the last non-blend writer
    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn owner(&self) -> Option<Claim> {
        self.owner
    }

    fn set_layer(&mut self, timeline: TimelineId, delta: Option<f64>) {
        self.layers.retain(|(id, _)| *id != timeline);
        if let Some(delta) = delta {
            self.layers.push((timeline, delta));
        }
    }

    fn recompute(&mut self) {
        self.value = self.base + self.layers.iter().map(|(_, d)| d).sum::<f64>();
    }
}

/// Handle shared by every timeline animating into the same backend
pub type SharedRegistry = Rc<RefCell<CompositionRegistry>>;

/// Process-wide (per registry) composition state
pub struct CompositionRegistry {
    records: FxHashMap<PropertyKey, CompositionRecord>,
    backend: Box<dyn PropertyBackend>,
    next_timeline: u64,
}

impl CompositionRegistry {
    pub fn new(backend: impl PropertyBackend + 'static) -> Self {
        Self {
            records: FxHashMap::default(),
            backend: Box::new(backend),
            next_timeline: 0,
        }
    }

    /// Create a registry wrapped for sharing between timelines
    pub fn shared(backend: impl PropertyBackend + 'static) -> SharedRegistry {
        Rc::new(RefCell::new(Self::new(backend)))
    }

    pub fn backend(&self) -> &dyn PropertyBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn PropertyBackend {
        self.backend.as_mut()
    }

    /// Last written value of a property
    pub fn value(&self, target: TargetId, property: &str) -> Option<f64> {
        self.record(target, property).map(CompositionRecord::value)
    }

    pub fn record(&self, target: TargetId, property: &str) -> Option<&CompositionRecord> {
        self.records.get(&PropertyKey::new(target, property))
    }

    /// Number of records created so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn register_timeline(&mut self) -> TimelineId {
        let id = TimelineId(self.next_timeline);
        self.next_timeline += 1;
        id
    }

    /// Value a new chain starts from: the record, else the backend, else zero
    pub(crate) fn starting_value(&self, key: &PropertyKey) -> f64 {
        self.records
            .get(key)
            .map(CompositionRecord::value)
            .or_else(|| self.backend.read(key.target, &key.property))
            .unwrap_or(0.0)
    }

    /// Arbitrate a timeline's local resolution and write the result.
    ///
    /// Returns the value written to the backend, if any.
    pub(crate) fn commit(
        &mut self,
        timeline: TimelineId,
        key: &PropertyKey,
        resolution: &Resolution,
    ) -> Option<f64> {
        if !self.records.contains_key(key) {
            let base = self
                .backend
                .read(key.target, &key.property)
                .or_else(|| resolution.base.map(|winner| winner.value))
                .unwrap_or(0.0);
            self.records.insert(key.clone(), CompositionRecord::new(base));
        }
        let record = self.records.get_mut(key)?;

        let foreign = record.owner.filter(|claim| claim.timeline != timeline);
        let mut wrote = false;

        match resolution.base {
            Some(winner) if winner.outcome == Outcome::ActiveReplace => {
                if foreign.map_or(true, |claim| claim.timeline < timeline) {
                    record.base = winner.value;
                    record.owner = Some(Claim {
                        timeline,
                        segment: winner.segment,
                    });
                    wrote = true;
                }
            }
            Some(winner) => {
                if foreign.is_none() {
                    record.owner = None;
                    record.base = winner.value;
                    wrote = true;
                }
            }
            None => {
                if foreign.is_none() {
                    record.owner = None;
                }
            }
        }

        record.set_layer(timeline, resolution.blend);
        record.recompute();

        if wrote || resolution.blend.is_some() {
            let value = record.value;
            self.backend.write(key.target, &key.property, value);
            tracing::trace!(
                target_id = key.target.0,
                property = %key.property,
                value,
                "property written"
            );
            Some(value)
        } else {
            tracing::trace!(
                target_id = key.target.0,
                property = %key.property,
                "write skipped, property claimed"
            );
            None
        }
    }

    /// Drop every claim held by a timeline; written values stay
    pub(crate) fn release(&mut self, timeline: TimelineId) {
        for record in self.records.values_mut() {
            if record.owner.is_some_and(|claim| claim.timeline == timeline) {
                record.owner = None;
            }
        }
    }
}

impl std::fmt::Debug for CompositionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionRegistry")
            .field("records", &self.records.len())
            .field("next_timeline", &self.next_timeline)
            .finish()
    }
}
