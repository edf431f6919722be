//! Shared fixtures for the integration tests

#![allow(dead_code)]

use cadence_timeline::{
    CompositionRegistry, Defaults, MemoryBackend, SharedRegistry, TargetId, Timeline,
    TimelineConfig,
};

/// `#target-id`, also the first match of `.target-class`
pub const TARGET: TargetId = TargetId(1);

pub fn backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_selector("#target-id", vec![TARGET])
        .with_selector(
            ".target-class",
            vec![TARGET, TargetId(2), TargetId(3), TargetId(4)],
        )
}

pub fn registry() -> SharedRegistry {
    CompositionRegistry::shared(backend())
}

/// Paused timeline with the given defaults on a fresh registry
pub fn paused(defaults: Defaults) -> (SharedRegistry, Timeline) {
    let registry = registry();
    let tl = Timeline::new(
        &registry,
        TimelineConfig::new().autoplay(false).defaults(defaults),
    );
    (registry, tl)
}

pub fn value(registry: &SharedRegistry, target: TargetId, property: &str) -> Option<f64> {
    registry.borrow().value(target, property)
}

#[track_caller]
pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap_or_else(|| panic!("no value written, expected {expected}"));
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
