//! Timeline scheduler
//!
//! Stand-in for the host frame loop: owns timelines and advances the running
//! ones each frame, in the order they were added.

use crate::timeline::Timeline;
use slotmap::{new_key_type, SlotMap};
use std::time::Instant;

new_key_type! {
    pub struct TimelineKey;
}

/// The scheduler that ticks all running timelines
pub struct TimelineScheduler {
    timelines: SlotMap<TimelineKey, Timeline>,
    order: Vec<TimelineKey>,
    last_frame: Instant,
}

impl TimelineScheduler {
    pub fn new() -> Self {
        Self {
            timelines: SlotMap::with_key(),
            order: Vec::new(),
            last_frame: Instant::now(),
        }
    }

    pub fn add_timeline(&mut self, timeline: Timeline) -> TimelineKey {
        let key = self.timelines.insert(timeline);
        self.order.push(key);
        key
    }

    pub fn get(&self, key: TimelineKey) -> Option<&Timeline> {
        self.timelines.get(key)
    }

    pub fn get_mut(&mut self, key: TimelineKey) -> Option<&mut Timeline> {
        self.timelines.get_mut(key)
    }

    /// Remove a timeline; dropping it releases its composition claims
    pub fn remove(&mut self, key: TimelineKey) -> Option<Timeline> {
        self.order.retain(|k| *k != key);
        self.timelines.remove(key)
    }

    /// Advance every running timeline by `delta_ms`
    pub fn tick(&mut self, delta_ms: f64) {
        for key in &self.order {
            if let Some(timeline) = self.timelines.get_mut(*key) {
                if timeline.is_running() {
                    timeline.advance(delta_ms);
                }
            }
        }
        tracing::trace!(delta_ms, timelines = self.order.len(), "scheduler tick");
    }

    /// Tick using the wall-clock time elapsed since the previous call
    pub fn tick_now(&mut self) {
        let now = Instant::now();
        let delta_ms = (now - self.last_frame).as_secs_f64() * 1000.0;
        self.last_frame = now;
        self.tick(delta_ms);
    }

    /// Check if any timeline is still running
    pub fn has_active_timelines(&self) -> bool {
        self.timelines.values().any(Timeline::is_running)
    }

    /// Iterate over timelines in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (TimelineKey, &Timeline)> {
        self.order
            .iter()
            .filter_map(move |key| self.timelines.get(*key).map(|tl| (*key, tl)))
    }

    /// Get the number of timelines in the scheduler
    pub fn timeline_count(&self) -> usize {
        self.timelines.len()
    }
}

impl Default for TimelineScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, TargetId};
    use crate::composition::CompositionRegistry;
    use crate::position::Position;
    use crate::timeline::{AnimationParams, Defaults, TimelineConfig};

    fn timeline(registry: &crate::SharedRegistry, autoplay: bool) -> Timeline {
        let mut tl = Timeline::new(
            registry,
            TimelineConfig::new()
                .autoplay(autoplay)
                .defaults(Defaults::default().duration(100.0)),
        );
        tl.add(TargetId(1), AnimationParams::new().prop("x", 100.0), Position::Append)
            .unwrap();
        tl
    }

    #[test]
    fn test_tick_skips_idle_timelines() {
        let registry = CompositionRegistry::shared(MemoryBackend::new());
        let mut scheduler = TimelineScheduler::new();
        let running = scheduler.add_timeline(timeline(&registry, true));
        let idle = scheduler.add_timeline(timeline(&registry, false));

        scheduler.tick(40.0);
        assert_eq!(scheduler.get(running).unwrap().elapsed(), 40.0);
        assert_eq!(scheduler.get(idle).unwrap().elapsed(), 0.0);
        assert!(scheduler.has_active_timelines());
    }

    #[test]
    fn test_completed_timelines_are_not_active() {
        let registry = CompositionRegistry::shared(MemoryBackend::new());
        let mut scheduler = TimelineScheduler::new();
        scheduler.add_timeline(timeline(&registry, true));

        scheduler.tick(150.0);
        assert!(!scheduler.has_active_timelines());
    }

    #[test]
    fn test_remove_keeps_order() {
        let registry = CompositionRegistry::shared(MemoryBackend::new());
        let mut scheduler = TimelineScheduler::new();
        let a = scheduler.add_timeline(timeline(&registry, true));
        let b = scheduler.add_timeline(timeline(&registry, true));
        let c = scheduler.add_timeline(timeline(&registry, true));

        assert!(scheduler.remove(b).is_some());
        let keys: Vec<_> = scheduler.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![a, c]);
        assert_eq!(scheduler.timeline_count(), 2);
    }
}
