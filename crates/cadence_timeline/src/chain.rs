//! Tween chains
//!
//! Every (target, property) pair touched by a timeline has a chain. Each child
//! that animates the property contributes one track to the chain; the track
//! holds the child's segments (one per keyframe) in time order. Tracks are kept
//! sorted by absolute start.
//!
//! A new `replace` track cuts earlier `replace` tracks that are still running
//! at its start; they freeze at the value they had there. Earlier `replace`
//! tracks starting at or after it are hidden only while it is active, and
//! render again once it ends.

use std::cmp::Ordering;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::backend::PropertyKey;
use crate::child::{Child, ChildSample};
use crate::composition::CompositionMode;
use crate::easing::Ease;
use crate::keyframe::{lerp, span, Stop};

new_key_type! {
    pub struct SegmentId;
}

/// One keyframe of one property of one child
#[derive(Clone, Debug)]
pub struct TweenSegment {
    pub(crate) child: usize,
    pub(crate) property: PropertyKey,
    pub(crate) rel_start: f64,
    pub(crate) duration: f64,
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) from: f64,
    pub(crate) to: f64,
    pub(crate) ease: Ease,
    pub(crate) composition: CompositionMode,
}

impl TweenSegment {
    /// Insertion index of the owning child
    pub fn child(&self) -> usize {
        self.child
    }

    pub fn property(&self) -> &PropertyKey {
        &self.property
    }

    /// Absolute start (first iteration)
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Absolute end of the segment's first pass
    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn from(&self) -> f64 {
        self.from
    }

    pub fn to(&self) -> f64 {
        self.to
    }

    pub fn ease(&self) -> &Ease {
        &self.ease
    }

    pub fn composition(&self) -> CompositionMode {
        self.composition
    }

    /// Value at an iteration-local time of the owning child
    pub(crate) fn value_at(&self, sample: ChildSample) -> f64 {
        if self.duration <= 0.0 {
            return if sample.started && sample.time >= self.rel_start {
                self.to
            } else {
                self.from
            };
        }
        let progress = ((sample.time - self.rel_start) / self.duration).clamp(0.0, 1.0);
        lerp(self.from, self.to, self.ease.apply(progress))
    }
}

/// A child's contribution to one chain
#[derive(Clone, Debug)]
pub(crate) struct Track {
    pub child: usize,
    pub composition: CompositionMode,
    pub start: f64,
    pub end: f64,
    /// Set when a later `replace` track starts while this one is running
    pub cutoff: Option<f64>,
    pub segments: SmallVec<[SegmentId; 4]>,
}

impl Track {
    pub fn effective_end(&self) -> f64 {
        self.cutoff.map_or(self.end, |cut| cut.min(self.end))
    }

    fn is_active(&self, time: f64) -> bool {
        time >= self.start && time < self.effective_end()
    }

    /// Value of the track at a parent-local time
    fn value_at(
        &self,
        time: f64,
        segments: &SlotMap<SegmentId, TweenSegment>,
        children: &[Child],
    ) -> f64 {
        let time = self.cutoff.map_or(time, |cut| time.min(cut));
        let sample = children[self.child].sample(time);

        let mut current = &segments[self.segments[0]];
        for id in &self.segments[1..] {
            let segment = &segments[*id];
            if segment.rel_start > sample.time {
                break;
            }
            current = segment;
        }
        current.value_at(sample)
    }

    fn first_from(&self, segments: &SlotMap<SegmentId, TweenSegment>) -> f64 {
        segments[self.segments[0]].from
    }
}

/// A `replace` track is hidden while a later-added `replace` track that
/// started no later than it is active
fn is_hidden(tracks: &[Track], track: &Track, time: f64) -> bool {
    track.composition == CompositionMode::Replace
        && tracks.iter().any(|other| {
            other.child > track.child
                && other.composition == CompositionMode::Replace
                && other.start <= track.start
                && other.is_active(time)
        })
}

/// How the local winner of a chain was chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// A replace track is running; it claims the property
    ActiveReplace,
    /// A none track is running and no replace track is
    ActiveNone,
    /// Nothing runs; the track that finished last holds its value
    Holding,
    /// Nothing has started; the earliest track shows its start value
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Winner {
    pub value: f64,
    pub outcome: Outcome,
    pub segment: SegmentId,
}

/// Local resolution of one chain at one time
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Resolution {
    pub base: Option<Winner>,
    /// Sum of blend deltas, `None` when the chain has no blend track
    pub blend: Option<f64>,
}

impl Resolution {
    /// Value the chain shows on its own, ignoring other timelines
    pub fn local_value(&self) -> Option<f64> {
        self.base
            .map(|winner| winner.value + self.blend.unwrap_or(0.0))
    }
}

/// All chains of a timeline plus the segment arena
#[derive(Debug, Default)]
pub(crate) struct TweenChains {
    segments: SlotMap<SegmentId, TweenSegment>,
    chains: IndexMap<PropertyKey, Vec<Track>>,
}

impl TweenChains {
    pub fn segment(&self, id: SegmentId) -> Option<&TweenSegment> {
        self.segments.get(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.chains.keys()
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.chains.contains_key(key)
    }

    /// Number of (target, property) chains
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Lay a child's stops for one property into its chain.
    ///
    /// `fallback_from` is the start value used when the first stop has no
    /// explicit `from` and the chain has nothing to show at that time.
    pub fn insert(
        &mut self,
        key: PropertyKey,
        child_index: usize,
        child: &Child,
        children: &[Child],
        stops: &[Stop],
        fallback_from: f64,
    ) -> SmallVec<[SegmentId; 4]> {
        let start = child.start() + stops[0].rel_start;
        let end = if child.repeat.iteration_count() > 1.0 {
            child.end()
        } else {
            child.start() + span(stops)
        };

        let mut previous_to = self
            .resolve(&key, start, children)
            .local_value()
            .unwrap_or(fallback_from);

        let mut ids = SmallVec::new();
        for stop in stops {
            let from = stop.from.unwrap_or(previous_to);
            let segment_start = child.start() + stop.rel_start;
            ids.push(self.segments.insert(TweenSegment {
                child: child_index,
                property: key.clone(),
                rel_start: stop.rel_start,
                duration: stop.duration,
                start: segment_start,
                end: segment_start + stop.duration,
                from,
                to: stop.to,
                ease: stop.ease.clone(),
                composition: child.composition,
            }));
            previous_to = stop.to;
        }

        let tracks = self.chains.entry(key).or_default();
        if child.composition == CompositionMode::Replace {
            for track in tracks.iter_mut() {
                if track.composition != CompositionMode::Replace {
                    continue;
                }
                if track.start < start && track.effective_end() > start {
                    track.cutoff = Some(start);
                }
            }
        }

        let at = tracks.partition_point(|track| track.start <= start);
        tracks.insert(
            at,
            Track {
                child: child_index,
                composition: child.composition,
                start,
                end,
                cutoff: None,
                segments: ids.clone(),
            },
        );

        ids
    }

    /// Resolve the chain's local winner at a parent-local time
    pub fn resolve(&self, key: &PropertyKey, time: f64, children: &[Child]) -> Resolution {
        let Some(tracks) = self.chains.get(key) else {
            return Resolution::default();
        };

        let live = || tracks.iter().filter(|track| !is_hidden(tracks, track, time));
        let order = |track: &Track| (track.start, track.child);

        let mut blend = None;
        for track in live().filter(|t| t.composition == CompositionMode::Blend) {
            let delta = track.value_at(time, &self.segments, children)
                - track.first_from(&self.segments);
            *blend.get_or_insert(0.0) += delta;
        }

        let base_tracks = || live().filter(|t| t.composition != CompositionMode::Blend);
        let latest_active = |mode: CompositionMode| {
            base_tracks()
                .filter(|t| t.composition == mode && t.is_active(time))
                .max_by(|a, b| order(a).partial_cmp(&order(b)).unwrap_or(Ordering::Equal))
        };

        let chosen = if let Some(track) = latest_active(CompositionMode::Replace) {
            Some((track, Outcome::ActiveReplace))
        } else if let Some(track) = latest_active(CompositionMode::None) {
            Some((track, Outcome::ActiveNone))
        } else if let Some(track) = base_tracks()
            .filter(|t| time >= t.start)
            .max_by(|a, b| {
                (a.effective_end(), a.child)
                    .partial_cmp(&(b.effective_end(), b.child))
                    .unwrap_or(Ordering::Equal)
            })
        {
            Some((track, Outcome::Holding))
        } else {
            base_tracks()
                .min_by(|a, b| order(a).partial_cmp(&order(b)).unwrap_or(Ordering::Equal))
                .map(|track| (track, Outcome::Pending))
        };

        let base = chosen.map(|(track, outcome)| Winner {
            value: track.value_at(time, &self.segments, children),
            outcome,
            segment: track.segments[0],
        });

        Resolution { base, blend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TargetId;
    use crate::child::{ChildCallbacks, ChildKind};
    use crate::param::Repeat;

    fn child(offset: f64, composition: CompositionMode) -> Child {
        Child {
            kind: ChildKind::Animation,
            target: Some(TargetId(1)),
            offset,
            delay: 0.0,
            duration: 100.0,
            repeat: Repeat::Once,
            alternate: false,
            reversed: false,
            ease: Ease::Linear,
            composition,
            segments: Vec::new(),
            callbacks: ChildCallbacks::default(),
        }
    }

    fn stop(from: Option<f64>, to: f64) -> Stop {
        Stop {
            rel_start: 0.0,
            duration: 100.0,
            from,
            to,
            ease: Ease::Linear,
        }
    }

    fn key() -> PropertyKey {
        PropertyKey::new(TargetId(1), "x")
    }

    /// Build chains from `(offset, composition, from, to)` tuples in add order
    fn build(specs: &[(f64, CompositionMode, Option<f64>, f64)]) -> (TweenChains, Vec<Child>) {
        let mut chains = TweenChains::default();
        let mut children = Vec::new();
        for (index, (offset, composition, from, to)) in specs.iter().enumerate() {
            children.push(child(*offset, *composition));
            let stops = [stop(*from, *to)];
            chains.insert(key(), index, &children[index], &children, &stops, 0.0);
        }
        (chains, children)
    }

    #[test]
    fn test_replace_cuts_running_track() {
        use CompositionMode::Replace;
        let (chains, children) =
            build(&[(0.0, Replace, Some(0.0), 100.0), (50.0, Replace, None, 200.0)]);

        let early = chains.resolve(&key(), 25.0, &children).base.unwrap();
        assert_eq!(early.outcome, Outcome::ActiveReplace);
        assert_eq!(early.value, 25.0);

        // second track picks up the value the first one had at its start
        let late = chains.resolve(&key(), 75.0, &children).base.unwrap();
        assert_eq!(late.value, 87.5);

        let after = chains.resolve(&key(), 200.0, &children).base.unwrap();
        assert_eq!(after.outcome, Outcome::Holding);
        assert_eq!(after.value, 200.0);
    }

    #[test]
    fn test_earlier_added_track_renders_outside_overlap() {
        use CompositionMode::Replace;
        let (chains, children) =
            build(&[(100.0, Replace, Some(0.0), 500.0), (0.0, Replace, None, 50.0)]);

        let winner = chains.resolve(&key(), 150.0, &children).base.unwrap();
        assert_eq!(winner.outcome, Outcome::ActiveReplace);
        assert_eq!(winner.value, 250.0);
    }

    #[test]
    fn test_later_added_track_hides_only_while_active() {
        use CompositionMode::Replace;
        let (chains, children) =
            build(&[(100.0, Replace, Some(0.0), 500.0), (50.0, Replace, None, 50.0)]);

        // inside the later track's window it wins over the one it overlaps
        assert_eq!(chains.resolve(&key(), 120.0, &children).local_value(), Some(35.0));
        assert_eq!(chains.resolve(&key(), 170.0, &children).local_value(), Some(350.0));
        assert_eq!(chains.resolve(&key(), 300.0, &children).local_value(), Some(500.0));
    }

    #[test]
    fn test_blend_adds_delta_on_base() {
        let (chains, children) = build(&[
            (0.0, CompositionMode::Replace, Some(0.0), 100.0),
            (0.0, CompositionMode::Blend, Some(0.0), 30.0),
        ]);

        let resolution = chains.resolve(&key(), 50.0, &children);
        assert_eq!(resolution.blend, Some(15.0));
        assert_eq!(resolution.local_value(), Some(65.0));
    }

    #[test]
    fn test_pending_track_shows_start_value() {
        let (chains, children) = build(&[(50.0, CompositionMode::Replace, Some(10.0), 20.0)]);

        let winner = chains.resolve(&key(), 0.0, &children).base.unwrap();
        assert_eq!(winner.outcome, Outcome::Pending);
        assert_eq!(winner.value, 10.0);
        let other = PropertyKey::new(TargetId(2), "x");
        assert!(chains.resolve(&other, 0.0, &children).base.is_none());
    }
}
