//! Timeline orchestration
//!
//! A timeline places children at resolved offsets, builds the tween chains of
//! every (target, property) they animate, and renders those chains at any
//! requested time through the shared composition registry.
//!
//! Building happens once per `add`; rendering never re-resolves an offset.
//! `seek` depends only on the requested time and the built structure, so
//! seeking back and forth always produces the same values.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::backend::{PropertyKey, TargetId, Targets};
use crate::chain::{TweenChains, TweenSegment};
use crate::child::{
    Child, ChildCallback, ChildCallbacks, ChildEvent, ChildEventKind, ChildKind,
};
use crate::composition::{CompositionMode, SharedRegistry, TimelineId};
use crate::easing::Ease;
use crate::error::Result;
use crate::keyframe::{check_non_negative, span, Stop, TweenValue};
use crate::param::{Param, Repeat};
use crate::position::{OffsetResolver, Position, Span};

/// Duration used when neither the child nor the timeline defaults set one
pub const DEFAULT_DURATION: f64 = 1000.0;

/// Callback receiving the timeline itself, dispatched after rendering
pub type TimelineCallback = Box<dyn FnMut(&mut Timeline)>;

/// Parameters inherited by every child that does not set its own
#[derive(Clone, Debug)]
pub struct Defaults {
    pub(crate) duration: Param<f64>,
    pub(crate) delay: Param<f64>,
    pub(crate) ease: Param<Ease>,
    pub(crate) repeat: Param<Repeat>,
    pub(crate) alternate: Param<bool>,
    pub(crate) reversed: Param<bool>,
    pub(crate) composition: Param<CompositionMode>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION.into(),
            delay: 0.0.into(),
            ease: Ease::default().into(),
            repeat: Repeat::Once.into(),
            alternate: false.into(),
            reversed: false.into(),
            composition: CompositionMode::Replace.into(),
        }
    }
}

impl Defaults {
    /// Builder: set the duration of one iteration, in milliseconds
    pub fn duration(mut self, duration: impl Into<Param<f64>>) -> Self {
        self.duration = duration.into();
        self
    }

    /// Builder: set the delay before each child starts
    pub fn delay(mut self, delay: impl Into<Param<f64>>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Builder: set the easing curve
    pub fn ease(mut self, ease: impl Into<Param<Ease>>) -> Self {
        self.ease = ease.into();
        self
    }

    /// Builder: set how many extra iterations each child plays
    pub fn repeat(mut self, repeat: impl Into<Param<Repeat>>) -> Self {
        self.repeat = repeat.into();
        self
    }

    /// Builder: flip direction on every other child iteration
    pub fn alternate(mut self, alternate: impl Into<Param<bool>>) -> Self {
        self.alternate = alternate.into();
        self
    }

    /// Builder: play children backwards
    pub fn reversed(mut self, reversed: impl Into<Param<bool>>) -> Self {
        self.reversed = reversed.into();
        self
    }

    /// Builder: set how children combine with other writers
    pub fn composition(mut self, composition: impl Into<Param<CompositionMode>>) -> Self {
        self.composition = composition.into();
        self
    }
}

/// Timing parameters a child may set over the timeline defaults
#[derive(Clone, Debug, Default)]
struct Overrides {
    duration: Option<Param<f64>>,
    delay: Option<Param<f64>>,
    ease: Option<Param<Ease>>,
    repeat: Option<Param<Repeat>>,
    alternate: Option<Param<bool>>,
    reversed: Option<Param<bool>>,
    composition: Option<Param<CompositionMode>>,
}

/// Timing of one child, resolved for one target
#[derive(Clone, Debug)]
struct Timing {
    duration: f64,
    delay: f64,
    ease: Ease,
    repeat: Repeat,
    alternate: bool,
    reversed: bool,
    composition: CompositionMode,
}

/// Properties and parameters of an animation child
#[derive(Clone, Debug, Default)]
pub struct AnimationParams {
    properties: Vec<(String, Param<TweenValue>)>,
    overrides: Overrides,
    callbacks: ChildCallbacks,
}

impl AnimationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate `property` towards a value, a `[from, to]` pair or keyframes
    pub fn prop(mut self, property: impl Into<String>, value: impl Into<TweenValue>) -> Self {
        self.properties
            .push((property.into(), Param::Constant(value.into())));
        self
    }

    /// Animate `property` with a value computed per matched target
    pub fn prop_fn(
        mut self,
        property: impl Into<String>,
        value: impl Fn(TargetId, usize, usize) -> TweenValue + 'static,
    ) -> Self {
        self.properties
            .push((property.into(), Param::function(value)));
        self
    }

    /// Builder: override the duration of one iteration
    pub fn duration(mut self, duration: impl Into<Param<f64>>) -> Self {
        self.overrides.duration = Some(duration.into());
        self
    }

    /// Builder: override the delay added after the resolved position
    pub fn delay(mut self, delay: impl Into<Param<f64>>) -> Self {
        self.overrides.delay = Some(delay.into());
        self
    }

    /// Builder: override the easing curve
    pub fn ease(mut self, ease: impl Into<Param<Ease>>) -> Self {
        self.overrides.ease = Some(ease.into());
        self
    }

    /// Builder: override the extra iteration count
    pub fn repeat(mut self, repeat: impl Into<Param<Repeat>>) -> Self {
        self.overrides.repeat = Some(repeat.into());
        self
    }

    /// Builder: override alternation
    pub fn alternate(mut self, alternate: impl Into<Param<bool>>) -> Self {
        self.overrides.alternate = Some(alternate.into());
        self
    }

    /// Builder: override reversal
    pub fn reversed(mut self, reversed: impl Into<Param<bool>>) -> Self {
        self.overrides.reversed = Some(reversed.into());
        self
    }

    /// Builder: override the composition mode
    pub fn composition(mut self, composition: impl Into<Param<CompositionMode>>) -> Self {
        self.overrides.composition = Some(composition.into());
        self
    }

    /// Builder: called when the child starts
    pub fn on_begin(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_begin = Some(callback(f));
        self
    }

    /// Builder: called on every render while the child is in its window
    pub fn on_update(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_update = Some(callback(f));
        self
    }

    /// Builder: called when the child enters a new iteration
    pub fn on_loop(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_loop = Some(callback(f));
        self
    }

    /// Builder: called when the child finishes its last iteration
    pub fn on_complete(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_complete = Some(callback(f));
        self
    }
}

/// Parameters of a bare timer child
#[derive(Clone, Debug, Default)]
pub struct TimerParams {
    overrides: Overrides,
    callbacks: ChildCallbacks,
}

impl TimerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the timer duration
    pub fn duration(mut self, duration: f64) -> Self {
        self.overrides.duration = Some(duration.into());
        self
    }

    /// Builder: set the delay added after the resolved position
    pub fn delay(mut self, delay: f64) -> Self {
        self.overrides.delay = Some(delay.into());
        self
    }

    /// Builder: set the extra iteration count
    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.overrides.repeat = Some(Param::Constant(repeat.into()));
        self
    }

    /// Builder: flip direction on every other iteration
    pub fn alternate(mut self, alternate: bool) -> Self {
        self.overrides.alternate = Some(alternate.into());
        self
    }

    /// Builder: run backwards
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.overrides.reversed = Some(reversed.into());
        self
    }

    /// Builder: called when the timer starts
    pub fn on_begin(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_begin = Some(callback(f));
        self
    }

    /// Builder: called on every tick while the timer runs
    pub fn on_update(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_update = Some(callback(f));
        self
    }

    /// Builder: called when the timer enters a new iteration
    pub fn on_loop(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_loop = Some(callback(f));
        self
    }

    /// Builder: called when the timer finishes
    pub fn on_complete(mut self, f: impl Fn(&ChildEvent) + 'static) -> Self {
        self.callbacks.on_complete = Some(callback(f));
        self
    }
}

fn callback(f: impl Fn(&ChildEvent) + 'static) -> ChildCallback {
    Rc::new(f)
}

/// Timeline configuration
pub struct TimelineConfig {
    pub id: Option<String>,
    pub defaults: Defaults,
    /// Extra passes of the whole timeline; not inherited by children
    pub repeat: Repeat,
    pub alternate: bool,
    pub reversed: bool,
    /// Start in [`PlaybackState::Running`]
    pub autoplay: bool,
    on_update: Option<TimelineCallback>,
    on_loop: Option<TimelineCallback>,
    on_complete: Option<TimelineCallback>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            id: None,
            defaults: Defaults::default(),
            repeat: Repeat::Once,
            alternate: false,
            reversed: false,
            autoplay: true,
            on_update: None,
            on_loop: None,
            on_complete: None,
        }
    }
}

impl TimelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.repeat = repeat.into();
        self
    }

    pub fn alternate(mut self, alternate: bool) -> Self {
        self.alternate = alternate;
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&mut Timeline) + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_loop(mut self, f: impl FnMut(&mut Timeline) + 'static) -> Self {
        self.on_loop = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut(&mut Timeline) + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for TimelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineConfig")
            .field("id", &self.id)
            .field("defaults", &self.defaults)
            .field("repeat", &self.repeat)
            .field("alternate", &self.alternate)
            .field("reversed", &self.reversed)
            .field("autoplay", &self.autoplay)
            .finish_non_exhaustive()
    }
}

/// Playback state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Clone, Copy, Debug)]
enum TimelineEvent {
    Update,
    Loop,
    Complete,
}

#[derive(Default)]
struct TimelineCallbacks {
    on_update: Option<TimelineCallback>,
    on_loop: Option<TimelineCallback>,
    on_complete: Option<TimelineCallback>,
}

impl TimelineCallbacks {
    fn slot(&mut self, event: TimelineEvent) -> &mut Option<TimelineCallback> {
        match event {
            TimelineEvent::Update => &mut self.on_update,
            TimelineEvent::Loop => &mut self.on_loop,
            TimelineEvent::Complete => &mut self.on_complete,
        }
    }
}

/// Lifecycle bookkeeping of one child within the current timeline iteration
#[derive(Clone, Copy, Debug, Default)]
struct ChildProgress {
    began: bool,
    completed: bool,
    iteration: u64,
}

/// A timeline of animation and timer children
pub struct Timeline {
    id: TimelineId,
    name: Option<String>,
    registry: SharedRegistry,
    defaults: Defaults,
    repeat: Repeat,
    alternate: bool,
    reversed: bool,
    children: Vec<Child>,
    progress: Vec<ChildProgress>,
    chains: TweenChains,
    labels: IndexMap<String, f64>,
    resolver: OffsetResolver,
    iteration_duration: f64,
    duration: f64,
    state: PlaybackState,
    elapsed: f64,
    callbacks: TimelineCallbacks,
}

impl Timeline {
    /// Create a timeline writing through `registry`.
    ///
    /// Each timeline gets a higher composition priority than every timeline
    /// created before it on the same registry.
    pub fn new(registry: &SharedRegistry, config: TimelineConfig) -> Self {
        let id = registry.borrow_mut().register_timeline();
        debug!(timeline = id.0, name = ?config.id, "timeline created");

        Self {
            id,
            name: config.id,
            registry: registry.clone(),
            defaults: config.defaults,
            repeat: config.repeat,
            alternate: config.alternate,
            reversed: config.reversed,
            children: Vec::new(),
            progress: Vec::new(),
            chains: TweenChains::default(),
            labels: IndexMap::new(),
            resolver: OffsetResolver::default(),
            iteration_duration: 0.0,
            duration: 0.0,
            state: if config.autoplay {
                PlaybackState::Running
            } else {
                PlaybackState::Idle
            },
            elapsed: 0.0,
            callbacks: TimelineCallbacks {
                on_update: config.on_update,
                on_loop: config.on_loop,
                on_complete: config.on_complete,
            },
        }
    }

    /// Add an animation child per matched target.
    ///
    /// All children of one call share the resolved offset; their per-target
    /// parameters see the target, its index and the number of targets. A
    /// selector that matches nothing still produces one child without
    /// properties so positions after it stay stable.
    pub fn add(
        &mut self,
        targets: impl Into<Targets>,
        params: AnimationParams,
        position: impl Into<Position>,
    ) -> Result<&mut Self> {
        let offset = self.resolver.resolve(&position.into(), &self.labels)?;
        let targets = self.resolve_targets(targets.into());

        let total = targets.len();
        let mut planned = Vec::with_capacity(total.max(1));
        let mut failure = None;

        if targets.is_empty() {
            let timing = self.resolve_timing(&params.overrides, TargetId::DETACHED, 0, 1)?;
            planned.push((None, timing, SmallVec::new()));
        }

        for (index, &target) in targets.iter().enumerate() {
            let timing = self.resolve_timing(&params.overrides, target, index, total)?;
            let mut properties: SmallVec<[(&str, SmallVec<[Stop; 4]>); 4]> = SmallVec::new();

            for (property, value) in &params.properties {
                let value = value.resolve(target, index, total);
                match value.stops(property, timing.duration, &timing.ease) {
                    Ok(stops) => properties.push((property.as_str(), stops)),
                    Err(err) => {
                        warn!(
                            target_id = target.0,
                            property = %property,
                            error = %err,
                            "property skipped"
                        );
                        failure.get_or_insert(err);
                    }
                }
            }
            planned.push((Some(target), timing, properties));
        }

        let mut group: Option<Span> = None;
        for (target, timing, properties) in planned {
            let index = self.push_child(
                ChildKind::Animation,
                target,
                offset,
                timing,
                &properties,
                params.callbacks.clone(),
            );
            let child = &self.children[index];
            group = Some(match group {
                Some(span) => Span {
                    start: span.start.min(child.start()),
                    end: span.end.max(child.end()),
                },
                None => Span {
                    start: child.start(),
                    end: child.end(),
                },
            });
        }

        if let Some(span) = group {
            self.resolver.record(span);
        }
        self.update_duration();

        match failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Place zero-duration linear tweens; each property jumps to its value at
    /// the resolved offset.
    pub fn set<K, V>(
        &mut self,
        targets: impl Into<Targets>,
        values: impl IntoIterator<Item = (K, V)>,
        position: impl Into<Position>,
    ) -> Result<&mut Self>
    where
        K: Into<String>,
        V: Into<TweenValue>,
    {
        let params = values.into_iter().fold(
            AnimationParams::new()
                .duration(0.0)
                .delay(0.0)
                .ease(Ease::Linear)
                .repeat(Repeat::Once)
                .alternate(false)
                .reversed(false),
            |params, (property, value)| params.prop(property, value),
        );
        self.add(targets, params, position)
    }

    /// Add a bare timer child; it writes nothing but receives callbacks
    pub fn add_timer(
        &mut self,
        params: TimerParams,
        position: impl Into<Position>,
    ) -> Result<&mut Self> {
        let offset = self.resolver.resolve(&position.into(), &self.labels)?;
        let timing = self.resolve_timing(&params.overrides, TargetId::DETACHED, 0, 1)?;

        let index = self.push_child(ChildKind::Timer, None, offset, timing, &[], params.callbacks);
        let child = &self.children[index];
        let span = Span {
            start: child.start(),
            end: child.end(),
        };
        self.resolver.record(span);
        self.update_duration();
        Ok(self)
    }

    /// Record a label. The cursor does not move.
    pub fn add_label(
        &mut self,
        name: impl Into<String>,
        position: impl Into<Position>,
    ) -> Result<&mut Self> {
        let name = name.into();
        let offset = self.resolver.resolve(&position.into(), &self.labels)?;
        debug!(timeline = self.id.0, label = %name, offset, "label added");
        self.labels.insert(name, offset);
        Ok(self)
    }

    fn resolve_targets(&self, targets: Targets) -> Vec<TargetId> {
        let resolved = match targets {
            Targets::One(target) => vec![target],
            Targets::Many(targets) => targets,
            Targets::Selector(selector) => {
                let found = self.registry.borrow().backend().query(&selector);
                if found.is_empty() {
                    warn!(timeline = self.id.0, selector = %selector, "selector matched no target");
                }
                found
            }
        };
        if resolved.is_empty() {
            warn!(timeline = self.id.0, "child added without targets");
        }
        resolved
    }

    fn resolve_timing(
        &self,
        overrides: &Overrides,
        target: TargetId,
        index: usize,
        total: usize,
    ) -> Result<Timing> {
        let defaults = &self.defaults;
        let duration = overrides
            .duration
            .as_ref()
            .unwrap_or(&defaults.duration)
            .resolve(target, index, total);
        let delay = overrides
            .delay
            .as_ref()
            .unwrap_or(&defaults.delay)
            .resolve(target, index, total);
        check_non_negative("duration", duration)?;
        check_non_negative("delay", delay)?;

        Ok(Timing {
            duration,
            delay,
            ease: overrides
                .ease
                .as_ref()
                .unwrap_or(&defaults.ease)
                .resolve(target, index, total),
            repeat: overrides
                .repeat
                .as_ref()
                .unwrap_or(&defaults.repeat)
                .resolve(target, index, total),
            alternate: overrides
                .alternate
                .as_ref()
                .unwrap_or(&defaults.alternate)
                .resolve(target, index, total),
            reversed: overrides
                .reversed
                .as_ref()
                .unwrap_or(&defaults.reversed)
                .resolve(target, index, total),
            composition: overrides
                .composition
                .as_ref()
                .unwrap_or(&defaults.composition)
                .resolve(target, index, total),
        })
    }

    /// Create a child, lay its stops into the chains and return its index
    fn push_child(
        &mut self,
        kind: ChildKind,
        target: Option<TargetId>,
        offset: f64,
        timing: Timing,
        properties: &[(&str, SmallVec<[Stop; 4]>)],
        callbacks: ChildCallbacks,
    ) -> usize {
        // a child lasts as long as its longest keyframe layout
        let duration = if properties.is_empty() {
            timing.duration
        } else {
            properties
                .iter()
                .map(|(_, stops)| span(stops))
                .fold(0.0, f64::max)
        };

        let index = self.children.len();
        let mut child = Child {
            kind,
            target,
            offset,
            delay: timing.delay,
            duration,
            repeat: timing.repeat,
            alternate: timing.alternate,
            reversed: timing.reversed,
            ease: timing.ease,
            composition: timing.composition,
            segments: Vec::new(),
            callbacks,
        };

        if let Some(target) = target {
            for (property, stops) in properties {
                let key = PropertyKey::new(target, *property);
                let fallback = self.registry.borrow().starting_value(&key);
                let ids = self
                    .chains
                    .insert(key, index, &child, &self.children, stops, fallback);
                child.segments.extend(ids);
            }
        }

        debug!(
            timeline = self.id.0,
            child = index,
            kind = ?kind,
            offset,
            delay = child.delay,
            duration = child.duration,
            end = child.end(),
            "child added"
        );

        self.children.push(child);
        self.progress.push(ChildProgress::default());
        index
    }

    fn update_duration(&mut self) {
        self.iteration_duration = self
            .children
            .iter()
            .map(Child::end)
            .fold(0.0, f64::max);
        self.duration = if self.iteration_duration > 0.0 {
            self.iteration_duration * self.repeat.iteration_count()
        } else {
            0.0
        };
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Render the timeline at `time` (clamped to `[0, duration]`).
    ///
    /// Fires `on_update` of the children whose window contains the time, then
    /// the timeline's own `on_update`. Playback state is left untouched.
    pub fn seek(&mut self, time: f64) -> &mut Self {
        let time = self.clamp(time);
        self.elapsed = time;

        let local = self.local_time(time);
        self.render(local);
        self.sync_progress(time);

        let (iteration, _) = self.iteration_at(time);
        let events: Vec<ChildEvent> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| local >= child.start() && local <= child.end())
            .map(|(index, child)| ChildEvent {
                child: index,
                kind: ChildEventKind::Update,
                time,
                iteration: child.iteration(local),
            })
            .collect();
        trace!(timeline = self.id.0, time, iteration, local, "seek");

        self.dispatch(&events);
        self.fire(TimelineEvent::Update);
        self
    }

    /// Move a running timeline forward by `delta` and emit lifecycle events.
    ///
    /// When the tick crosses an iteration boundary, `on_loop` sees the end
    /// state of the finished iteration. The new iteration is rendered after
    /// it, unless the callback paused or moved the playhead.
    pub fn advance(&mut self, delta: f64) -> &mut Self {
        if self.state != PlaybackState::Running {
            return self;
        }

        let from = self.elapsed;
        let to = self.clamp(from + delta);
        self.elapsed = to;

        let mut events = Vec::new();
        let mut loops = 0;
        let mut finished_iteration = None;
        if to > from {
            let (first, _) = self.iteration_at(from);
            let (last, _) = self.iteration_at(to);
            for iteration in first..=last {
                if iteration > first {
                    loops += 1;
                    finished_iteration = Some(iteration - 1);
                    self.progress.fill(ChildProgress::default());
                }
                let base = if iteration == 0 {
                    0.0
                } else {
                    iteration as f64 * self.iteration_duration
                };
                let reached = if iteration == last {
                    (to - base).min(self.iteration_duration)
                } else {
                    self.iteration_duration
                };
                self.collect_events(iteration, base, reached, &mut events);
            }
        }
        events.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.child.cmp(&b.child))
        });

        let finished = self.duration.is_finite() && to >= self.duration;
        if finished {
            self.state = PlaybackState::Completed;
            debug!(timeline = self.id.0, duration = self.duration, "timeline completed");
        }

        match finished_iteration {
            Some(iteration) => {
                let end = if self.is_backward(iteration) {
                    0.0
                } else {
                    self.iteration_duration
                };
                self.render(end);
            }
            None => self.render(self.local_time(to)),
        }

        self.dispatch(&events);
        let state = self.state;
        for _ in 0..loops {
            self.fire(TimelineEvent::Loop);
        }
        if finished_iteration.is_some() && self.state == state && self.elapsed == to {
            self.render(self.local_time(to));
        }
        self.fire(TimelineEvent::Update);
        if finished {
            self.fire(TimelineEvent::Complete);
        }
        self
    }

    pub fn pause(&mut self) -> &mut Self {
        if self.state == PlaybackState::Running {
            self.state = PlaybackState::Paused;
        }
        self
    }

    /// Resume playback; a completed timeline starts over
    pub fn resume(&mut self) -> &mut Self {
        match self.state {
            PlaybackState::Completed => return self.restart(),
            PlaybackState::Idle | PlaybackState::Paused => self.state = PlaybackState::Running,
            PlaybackState::Running => {}
        }
        self
    }

    pub fn play(&mut self) -> &mut Self {
        self.resume()
    }

    /// Rewind to zero and run
    pub fn restart(&mut self) -> &mut Self {
        self.elapsed = 0.0;
        self.progress.fill(ChildProgress::default());
        self.render(self.local_time(0.0));
        self.state = PlaybackState::Running;
        self
    }

    fn clamp(&self, time: f64) -> f64 {
        time.max(0.0).min(self.duration)
    }

    /// Outer iteration at `time` and the time elapsed inside it
    fn iteration_at(&self, time: f64) -> (u64, f64) {
        let span = self.iteration_duration;
        if span <= 0.0 || span.is_infinite() {
            return (0, time.min(span.max(0.0)));
        }
        if time >= self.duration {
            let last = (self.repeat.iteration_count() - 1.0).max(0.0);
            return (last as u64, span);
        }
        let iteration = (time / span).floor();
        (iteration as u64, time - iteration * span)
    }

    fn is_backward(&self, iteration: u64) -> bool {
        (self.alternate && iteration % 2 == 1) != self.reversed
    }

    /// Map timeline time to time inside the current iteration, direction applied
    fn local_time(&self, time: f64) -> f64 {
        let (iteration, local) = self.iteration_at(time);
        if self.iteration_duration.is_finite() && self.is_backward(iteration) {
            self.iteration_duration - local
        } else {
            local
        }
    }

    fn render(&self, local: f64) {
        let mut registry = self.registry.borrow_mut();
        for key in self.chains.keys() {
            let resolution = self.chains.resolve(key, local, &self.children);
            registry.commit(self.id, key, &resolution);
        }
        trace!(timeline = self.id.0, local, chains = self.chains.len(), "rendered");
    }

    /// Bring child bookkeeping in line with a sought time without firing
    fn sync_progress(&mut self, time: f64) {
        let (iteration, reached) = self.iteration_at(time);
        let span = self.iteration_duration;
        let backward = span.is_finite() && self.is_backward(iteration);

        for (child, progress) in self.children.iter().zip(self.progress.iter_mut()) {
            let (start, end) = directed_window(child, span, backward);
            let local = if backward { span - reached } else { reached };
            progress.began = reached > start;
            progress.completed = progress.began && reached >= end;
            progress.iteration = child.iteration(local);
        }
    }

    fn collect_events(
        &mut self,
        iteration: u64,
        base: f64,
        reached: f64,
        events: &mut Vec<ChildEvent>,
    ) {
        let span = self.iteration_duration;
        let backward = span.is_finite() && self.is_backward(iteration);
        let local = if backward { span - reached } else { reached };

        let children = self.children.iter().zip(self.progress.iter_mut());
        for (index, (child, progress)) in children.enumerate() {
            let (start, end) = directed_window(child, span, backward);
            if reached < start {
                continue;
            }

            let current = child.iteration(local);
            let mut push = |kind: ChildEventKind, at: f64| {
                events.push(ChildEvent {
                    child: index,
                    kind,
                    time: base + at,
                    iteration: current,
                });
            };

            if !progress.began {
                progress.began = true;
                progress.iteration = current;
                push(ChildEventKind::Begin, start);
            }
            if progress.completed {
                continue;
            }
            if current != progress.iteration {
                progress.iteration = current;
                push(ChildEventKind::Loop, reached.min(end));
            }
            push(ChildEventKind::Update, reached.min(end));
            if reached >= end {
                progress.completed = true;
                push(ChildEventKind::Complete, end);
            }
        }
    }

    fn dispatch(&self, events: &[ChildEvent]) {
        for event in events {
            if let Some(callback) = self.children[event.child].callbacks.get(event.kind) {
                callback(event);
            }
        }
    }

    fn fire(&mut self, event: TimelineEvent) {
        if let Some(mut callback) = self.callbacks.slot(event).take() {
            callback(self);
            let slot = self.callbacks.slot(event);
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Composition priority of this timeline
    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == PlaybackState::Completed
    }

    /// Current playhead, in `[0, duration]`
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Total duration, all timeline iterations included
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Duration of one timeline iteration
    pub fn iteration_duration(&self) -> f64 {
        self.iteration_duration
    }

    /// Build cursor: where the next appended child goes
    pub fn cursor(&self) -> f64 {
        self.resolver.cursor()
    }

    pub fn labels(&self) -> &IndexMap<String, f64> {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<f64> {
        self.labels.get(name).copied()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Child> {
        self.children.get(index)
    }

    /// First segment owned by a child
    pub fn head(&self, index: usize) -> Option<&TweenSegment> {
        let id = *self.children.get(index)?.segments.first()?;
        self.chains.segment(id)
    }

    /// Segments owned by a child, in creation order
    pub fn segments(&self, index: usize) -> impl Iterator<Item = &TweenSegment> {
        self.children
            .get(index)
            .into_iter()
            .flat_map(|child| child.segments.iter())
            .filter_map(move |id| self.chains.segment(*id))
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Whether the timeline animates this (target, property)
    pub fn animates(&self, target: TargetId, property: &str) -> bool {
        self.chains.contains(&PropertyKey::new(target, property))
    }
}

/// A child's window in play direction. Going backward, the child's end is
/// reached first.
fn directed_window(child: &Child, span: f64, backward: bool) -> (f64, f64) {
    if backward {
        (span - child.end(), span - child.start())
    } else {
        (child.start(), child.end())
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.release(self.id);
        }
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("duration", &self.duration)
            .field("state", &self.state)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}
