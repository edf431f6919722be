//! Per-target parameters
//!
//! Defaults and tween parameters can be fixed values or functions of the matched
//! target, its index among the call's targets, and the number of targets. They
//! are resolved once per target when the child is added.

use std::fmt;
use std::rc::Rc;

use crate::backend::TargetId;

/// A parameter that is either a constant or computed per matched target
pub enum Param<T> {
    Constant(T),
    FunctionOf(Rc<dyn Fn(TargetId, usize, usize) -> T>),
}

impl<T: Clone> Param<T> {
    /// Build a parameter from `(target, index, total) -> value`
    pub fn function(f: impl Fn(TargetId, usize, usize) -> T + 'static) -> Self {
        Param::FunctionOf(Rc::new(f))
    }

    /// Resolve the value for one matched target
    pub fn resolve(&self, target: TargetId, index: usize, total: usize) -> T {
        match self {
            Param::Constant(value) => value.clone(),
            Param::FunctionOf(f) => f(target, index, total),
        }
    }
}

impl<T: Clone> Clone for Param<T> {
    fn clone(&self) -> Self {
        match self {
            Param::Constant(value) => Param::Constant(value.clone()),
            Param::FunctionOf(f) => Param::FunctionOf(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Param::FunctionOf(_) => f.write_str("FunctionOf(..)"),
        }
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Constant(value)
    }
}

/// Delay (or any numeric parameter) growing by `step` per target index
pub fn stagger(step: f64) -> Param<f64> {
    stagger_from(0.0, step)
}

/// Like [`stagger`], starting at `start` for the first target
pub fn stagger_from(start: f64, step: f64) -> Param<f64> {
    Param::function(move |_, index, _| start + step * index as f64)
}

/// How many extra iterations a child or timeline plays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeat {
    /// Play `n` additional times after the first pass
    Count(u32),
    /// Single pass
    #[default]
    Once,
    /// Never stop
    Infinite,
}

impl Repeat {
    /// Total number of iterations, including the first
    pub fn iteration_count(self) -> f64 {
        match self {
            Repeat::Once => 1.0,
            Repeat::Count(n) => f64::from(n) + 1.0,
            Repeat::Infinite => f64::INFINITY,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Repeat::Infinite)
    }
}

impl From<u32> for Repeat {
    fn from(n: u32) -> Self {
        if n == 0 {
            Repeat::Once
        } else {
            Repeat::Count(n)
        }
    }
}

impl From<bool> for Repeat {
    fn from(forever: bool) -> Self {
        if forever {
            Repeat::Infinite
        } else {
            Repeat::Once
        }
    }
}

impl From<u32> for Param<Repeat> {
    fn from(n: u32) -> Self {
        Param::Constant(Repeat::from(n))
    }
}

impl From<bool> for Param<Repeat> {
    fn from(forever: bool) -> Self {
        Param::Constant(Repeat::from(forever))
    }
}
