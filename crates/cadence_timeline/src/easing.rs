//! Easing functions for tweens
//!
//! Easing is consumed by the engine as a pure `progress -> value` mapping. The
//! catalog here is small on purpose; anything else can be plugged in through
//! [`Ease::custom`].

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::TimelineError;

/// Power used by the unparameterised `in`/`out`/`inOut`/`outIn` names.
const DEFAULT_POWER: f64 = 2.0;

/// A user supplied easing curve.
#[derive(Clone)]
pub struct EaseFn(Rc<dyn Fn(f64) -> f64>);

impl fmt::Debug for EaseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EaseFn(..)")
    }
}

impl PartialEq for EaseFn {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Easing function type
#[derive(Clone, Debug, PartialEq)]
pub enum Ease {
    Linear,
    /// `t^p`
    In(f64),
    /// `1 - (1 - t)^p`
    Out(f64),
    /// Accelerate through the first half, decelerate through the second
    InOut(f64),
    /// Decelerate through the first half, accelerate through the second
    OutIn(f64),
    InSine,
    OutSine,
    InOutSine,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    CubicBezier(f64, f64, f64, f64),
    Custom(EaseFn),
}

impl Default for Ease {
    fn default() -> Self {
        Ease::Out(DEFAULT_POWER)
    }
}

impl Ease {
    /// Wrap an arbitrary curve
    pub fn custom(f: impl Fn(f64) -> f64 + 'static) -> Self {
        Ease::Custom(EaseFn(Rc::new(f)))
    }

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Ease::Linear => t,
            Ease::In(p) => t.powf(*p),
            Ease::Out(p) => 1.0 - (1.0 - t).powf(*p),
            Ease::InOut(p) => {
                if t < 0.5 {
                    (2.0 * t).powf(*p) / 2.0
                } else {
                    1.0 - (2.0 - 2.0 * t).powf(*p) / 2.0
                }
            }
            Ease::OutIn(p) => {
                if t < 0.5 {
                    (1.0 - (1.0 - 2.0 * t).powf(*p)) / 2.0
                } else {
                    ((2.0 * t - 1.0).powf(*p) + 1.0) / 2.0
                }
            }
            Ease::InSine => 1.0 - (t * std::f64::consts::FRAC_PI_2).cos(),
            Ease::OutSine => (t * std::f64::consts::FRAC_PI_2).sin(),
            Ease::InOutSine => -((std::f64::consts::PI * t).cos() - 1.0) / 2.0,
            Ease::InExpo => {
                if t <= 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * t - 10.0)
                }
            }
            Ease::OutExpo => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
            Ease::InOutExpo => {
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else if t < 0.5 {
                    2f64.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f64.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Ease::InCirc => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Ease::OutCirc => (1.0 - (t - 1.0).powi(2)).max(0.0).sqrt(),
            Ease::InOutCirc => {
                if t < 0.5 {
                    (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Ease::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
            Ease::Custom(f) => (f.0)(t),
        }
    }
}

impl FromStr for Ease {
    type Err = TimelineError;

    /// Parses names such as `linear`, `inOut`, `out(3)`, `outExpo` or
    /// `cubicBezier(0.25, 0.1, 0.25, 1)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TimelineError::UnknownEase(s.to_string());
        let trimmed = s.trim();

        let (name, args) = match trimmed.find('(') {
            Some(open) => {
                let close = trimmed.strip_suffix(')').ok_or_else(unknown)?;
                let args = close[open + 1..]
                    .split(',')
                    .map(|a| a.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| unknown())?;
                (&trimmed[..open], args)
            }
            None => (trimmed, Vec::new()),
        };

        let power = |fallback: f64| match args.as_slice() {
            [] => Ok(fallback),
            [p] => Ok(*p),
            _ => Err(unknown()),
        };

        let ease = match name {
            "linear" | "none" => Ease::Linear,
            "in" => Ease::In(power(DEFAULT_POWER)?),
            "out" => Ease::Out(power(DEFAULT_POWER)?),
            "inOut" => Ease::InOut(power(DEFAULT_POWER)?),
            "outIn" => Ease::OutIn(power(DEFAULT_POWER)?),
            "inQuad" => Ease::In(2.0),
            "outQuad" => Ease::Out(2.0),
            "inOutQuad" => Ease::InOut(2.0),
            "inCubic" => Ease::In(3.0),
            "outCubic" => Ease::Out(3.0),
            "inOutCubic" => Ease::InOut(3.0),
            "inQuart" => Ease::In(4.0),
            "outQuart" => Ease::Out(4.0),
            "inOutQuart" => Ease::InOut(4.0),
            "inQuint" => Ease::In(5.0),
            "outQuint" => Ease::Out(5.0),
            "inOutQuint" => Ease::InOut(5.0),
            "inSine" => Ease::InSine,
            "outSine" => Ease::OutSine,
            "inOutSine" => Ease::InOutSine,
            "inExpo" => Ease::InExpo,
            "outExpo" => Ease::OutExpo,
            "inOutExpo" => Ease::InOutExpo,
            "inCirc" => Ease::InCirc,
            "outCirc" => Ease::OutCirc,
            "inOutCirc" => Ease::InOutCirc,
            "cubicBezier" => match args.as_slice() {
                [x1, y1, x2, y2] => Ease::CubicBezier(*x1, *y1, *x2, *y2),
                _ => return Err(unknown()),
            },
            _ => return Err(unknown()),
        };

        let parameterised = matches!(name, "in" | "out" | "inOut" | "outIn" | "cubicBezier");
        if !parameterised && !args.is_empty() {
            return Err(unknown());
        }

        Ok(ease)
    }
}

/// Cubic bezier easing calculation (matches CSS `cubic-bezier()` timing functions).
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
fn cubic_bezier_ease(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let mut p = t;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - t;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    // Binary search fallback (always converges)
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = t;
    for _ in 0..20 {
        let val = bezier_sample(p, x1, x2);
        if (val - t).abs() < 1e-7 {
            break;
        }
        if val < t {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2)
}

/// Evaluate cubic bezier at parameter t: B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

/// Derivative of cubic bezier
#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}
