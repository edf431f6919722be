//! Tween values and keyframes
//!
//! A property's value in an `add` call is either a single target, an explicit
//! `[from, to]` pair, or an ordered list of keyframes. Each keyframe becomes one
//! tween segment laid out back to back inside the child's iteration.

use smallvec::SmallVec;

use crate::easing::Ease;
use crate::error::{Result, TimelineError};

/// A single keyframe stop
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Target value at the end of this stop
    pub to: f64,
    /// Explicit start value; defaults to the previous stop's `to`
    pub from: Option<f64>,
    /// Duration of this stop; defaults to the child duration split evenly
    pub duration: Option<f64>,
    /// Pause before this stop starts, relative to the previous stop's end
    pub delay: f64,
    /// Easing for this stop; defaults to the child's ease
    pub ease: Option<Ease>,
}

impl Keyframe {
    /// Keyframe heading to `value`
    pub fn to(value: f64) -> Self {
        Self {
            to: value,
            from: None,
            duration: None,
            delay: 0.0,
            ease: None,
        }
    }

    /// Builder: set explicit start value
    pub fn from(mut self, value: f64) -> Self {
        self.from = Some(value);
        self
    }

    /// Builder: set duration
    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Builder: set delay
    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Builder: set easing
    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = Some(ease);
        self
    }
}

/// Value given to a property in an `add` call
#[derive(Clone, Debug, PartialEq)]
pub enum TweenValue {
    To(f64),
    FromTo(f64, f64),
    Keyframes(SmallVec<[Keyframe; 4]>),
}

impl From<f64> for TweenValue {
    fn from(to: f64) -> Self {
        TweenValue::To(to)
    }
}

impl From<[f64; 2]> for TweenValue {
    fn from([from, to]: [f64; 2]) -> Self {
        TweenValue::FromTo(from, to)
    }
}

impl From<Vec<Keyframe>> for TweenValue {
    fn from(keyframes: Vec<Keyframe>) -> Self {
        TweenValue::Keyframes(keyframes.into())
    }
}

/// A keyframe laid out inside one iteration of its child
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Stop {
    /// Start relative to the child's iteration start
    pub rel_start: f64,
    pub duration: f64,
    pub from: Option<f64>,
    pub to: f64,
    pub ease: Ease,
}

impl TweenValue {
    /// Lay the value out as stops. `duration` and `ease` are the child's.
    pub(crate) fn stops(
        &self,
        property: &str,
        duration: f64,
        ease: &Ease,
    ) -> Result<SmallVec<[Stop; 4]>> {
        let single = |from: Option<f64>, to: f64| Stop {
            rel_start: 0.0,
            duration,
            from,
            to,
            ease: ease.clone(),
        };

        match self {
            TweenValue::To(to) => Ok(smallvec::smallvec![single(None, *to)]),
            TweenValue::FromTo(from, to) => Ok(smallvec::smallvec![single(Some(*from), *to)]),
            TweenValue::Keyframes(keyframes) if keyframes.is_empty() => {
                Err(TimelineError::EmptyKeyframes {
                    property: property.to_string(),
                })
            }
            TweenValue::Keyframes(keyframes) => {
                let split = duration / keyframes.len() as f64;
                let mut cursor = 0.0;
                let mut stops = SmallVec::with_capacity(keyframes.len());

                for keyframe in keyframes {
                    let stop_duration = keyframe.duration.unwrap_or(split);
                    check_non_negative("keyframe duration", stop_duration)?;
                    check_non_negative("keyframe delay", keyframe.delay)?;

                    let rel_start = cursor + keyframe.delay;
                    stops.push(Stop {
                        rel_start,
                        duration: stop_duration,
                        from: keyframe.from,
                        to: keyframe.to,
                        ease: keyframe.ease.clone().unwrap_or_else(|| ease.clone()),
                    });
                    cursor = rel_start + stop_duration;
                }

                Ok(stops)
            }
        }
    }
}

/// Length of the stop layout, from the iteration start to the last stop's end
pub(crate) fn span(stops: &[Stop]) -> f64 {
    stops
        .last()
        .map_or(0.0, |stop| stop.rel_start + stop.duration)
}

pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TimelineError::InvalidDuration { field, value })
    }
}

/// Linear interpolation between two numbers
#[inline]
pub fn lerp(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress
}
