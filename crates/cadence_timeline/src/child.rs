//! Timeline children and their timing
//!
//! A child owns its placement on the parent timeline and its own iteration
//! parameters. Mapping a parent-local time to the child's iteration-local time
//! happens here; the segments the child owns are evaluated against that.

use std::fmt;
use std::rc::Rc;

use crate::backend::TargetId;
use crate::chain::SegmentId;
use crate::composition::CompositionMode;
use crate::easing::Ease;
use crate::param::Repeat;

/// Animation-bearing child or bare timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    Animation,
    Timer,
}

/// Lifecycle event delivered to child callbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildEventKind {
    Begin,
    Update,
    Loop,
    Complete,
}

/// Payload passed to child callbacks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChildEvent {
    /// Insertion index of the child in its timeline
    pub child: usize,
    pub kind: ChildEventKind,
    /// Timeline-local time the event is attributed to
    pub time: f64,
    /// Iteration of the child at `time`
    pub iteration: u64,
}

/// Child callback
pub type ChildCallback = Rc<dyn Fn(&ChildEvent)>;

/// Optional callbacks attached to a child
#[derive(Clone, Default)]
pub struct ChildCallbacks {
    pub on_begin: Option<ChildCallback>,
    pub on_update: Option<ChildCallback>,
    pub on_loop: Option<ChildCallback>,
    pub on_complete: Option<ChildCallback>,
}

impl ChildCallbacks {
    pub(crate) fn get(&self, kind: ChildEventKind) -> Option<&ChildCallback> {
        match kind {
            ChildEventKind::Begin => self.on_begin.as_ref(),
            ChildEventKind::Update => self.on_update.as_ref(),
            ChildEventKind::Loop => self.on_loop.as_ref(),
            ChildEventKind::Complete => self.on_complete.as_ref(),
        }
    }
}

impl fmt::Debug for ChildCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCallbacks")
            .field("on_begin", &self.on_begin.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_loop", &self.on_loop.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Iteration-local time of a child
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ChildSample {
    /// Time within the current iteration, direction already applied
    pub time: f64,
    /// Whether the parent time has reached the child's start
    pub started: bool,
}

/// A child of a timeline
#[derive(Debug)]
pub struct Child {
    pub(crate) kind: ChildKind,
    pub(crate) target: Option<TargetId>,
    pub(crate) offset: f64,
    pub(crate) delay: f64,
    pub(crate) duration: f64,
    pub(crate) repeat: Repeat,
    pub(crate) alternate: bool,
    pub(crate) reversed: bool,
    pub(crate) ease: Ease,
    pub(crate) composition: CompositionMode,
    pub(crate) segments: Vec<SegmentId>,
    pub(crate) callbacks: ChildCallbacks,
}

impl Child {
    pub fn kind(&self) -> ChildKind {
        self.kind
    }

    /// Target this child animates, `None` for timers and unmatched selectors
    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    /// Absolute offset on the parent timeline, fixed at add-time
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Duration of one iteration
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    pub fn alternate(&self) -> bool {
        self.alternate
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn ease(&self) -> &Ease {
        &self.ease
    }

    pub fn composition(&self) -> CompositionMode {
        self.composition
    }

    /// Segments owned by this child, in creation order
    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    /// Absolute start of motion (`offset + delay`)
    pub fn start(&self) -> f64 {
        self.offset + self.delay
    }

    /// Duration across all iterations; alternation does not change it
    pub fn effective_duration(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        self.duration * self.repeat.iteration_count()
    }

    /// Absolute end (`offset + delay + effective duration`)
    pub fn end(&self) -> f64 {
        self.start() + self.effective_duration()
    }

    fn iteration_at(&self, elapsed: f64) -> (u64, f64) {
        let total = self.effective_duration();
        if elapsed >= total {
            let last = (self.repeat.iteration_count() - 1.0).max(0.0);
            return (last as u64, self.duration);
        }
        let iteration = (elapsed / self.duration).floor();
        (iteration as u64, elapsed - iteration * self.duration)
    }

    /// Map a parent-local time to this child's iteration-local time
    pub(crate) fn sample(&self, time: f64) -> ChildSample {
        let started = time >= self.start();
        if self.duration <= 0.0 {
            return ChildSample { time: 0.0, started };
        }

        let elapsed = (time - self.start()).max(0.0);
        let (iteration, mut local) = self.iteration_at(elapsed);

        if self.alternate && iteration % 2 == 1 {
            local = self.duration - local;
        }
        if self.reversed {
            local = self.duration - local;
        }

        ChildSample {
            time: local,
            started,
        }
    }

    /// Iteration index at `time`, clamped to the child's window
    pub(crate) fn iteration(&self, time: f64) -> u64 {
        if self.duration <= 0.0 {
            return 0;
        }
        self.iteration_at((time - self.start()).max(0.0)).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(offset: f64, delay: f64, duration: f64, repeat: Repeat) -> Child {
        Child {
            kind: ChildKind::Animation,
            target: None,
            offset,
            delay,
            duration,
            repeat,
            alternate: false,
            reversed: false,
            ease: Ease::Linear,
            composition: CompositionMode::Replace,
            segments: Vec::new(),
            callbacks: ChildCallbacks::default(),
        }
    }

    #[test]
    fn test_end_includes_delay_and_iterations() {
        let c = child(100.0, 20.0, 10.0, Repeat::Count(3));
        assert_eq!(c.start(), 120.0);
        assert_eq!(c.effective_duration(), 40.0);
        assert_eq!(c.end(), 160.0);
    }

    #[test]
    fn test_alternate_does_not_change_duration() {
        let mut c = child(0.0, 0.0, 10.0, Repeat::Count(1));
        let before = c.end();
        c.alternate = true;
        assert_eq!(c.end(), before);
    }

    #[test]
    fn test_sample_loops_and_alternates() {
        let mut c = child(0.0, 0.0, 10.0, Repeat::Count(2));
        assert_eq!(c.sample(5.0).time, 5.0);
        assert_eq!(c.sample(15.0).time, 5.0);
        assert_eq!(c.sample(30.0).time, 10.0);

        c.alternate = true;
        assert_eq!(c.sample(12.0).time, 8.0);
        assert_eq!(c.sample(25.0).time, 5.0);
        assert_eq!(c.sample(30.0).time, 10.0);
    }

    #[test]
    fn test_sample_before_start_is_clamped() {
        let mut c = child(50.0, 0.0, 10.0, Repeat::Once);
        let s = c.sample(0.0);
        assert_eq!(s.time, 0.0);
        assert!(!s.started);

        c.reversed = true;
        assert_eq!(c.sample(0.0).time, 10.0);
        assert_eq!(c.sample(60.0).time, 0.0);
    }

    #[test]
    fn test_iteration_is_clamped_to_window() {
        let c = child(10.0, 0.0, 10.0, Repeat::Count(1));
        assert_eq!(c.iteration(5.0), 0);
        assert_eq!(c.iteration(12.0), 0);
        assert_eq!(c.iteration(25.0), 1);
        assert_eq!(c.iteration(90.0), 1);
    }

    #[test]
    fn test_infinite_repeat_never_ends() {
        let c = child(0.0, 0.0, 10.0, Repeat::Infinite);
        assert!(c.end().is_infinite());
        assert_eq!(c.iteration(1e6 + 5.0), 100_000);
        assert_eq!(c.sample(1e6 + 5.0).time, 5.0);
    }

    #[test]
    fn test_zero_duration_child() {
        let c = child(2000.0, 0.0, 0.0, Repeat::Count(3));
        assert_eq!(c.end(), 2000.0);
        assert!(c.sample(2000.0).started);
        assert!(!c.sample(1999.0).started);
        assert_eq!(c.iteration(2500.0), 0);
    }
}
