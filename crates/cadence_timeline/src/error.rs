//! Timeline error types

use thiserror::Error;

/// Configuration errors reported while a timeline is being built.
///
/// Resolution problems (a selector matching nothing) and composition conflicts are
/// never surfaced through this type; they degrade to "no writes".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// A position token could not be parsed
    #[error("Invalid position specifier: {0:?}")]
    InvalidPosition(String),

    /// A position referenced a label that has not been added yet
    #[error("Unknown label: {0:?}")]
    UnknownLabel(String),

    /// A property was given an empty keyframe list
    #[error("Empty keyframe list for property {property:?}")]
    EmptyKeyframes {
        /// The property the list was attached to
        property: String,
    },

    /// A duration or delay resolved to a negative or non-finite value
    #[error("Invalid duration {value} for {field}")]
    InvalidDuration {
        /// Which parameter carried the value
        field: &'static str,
        /// The offending value
        value: f64,
    },

    /// An easing name was not recognised
    #[error("Unknown easing function: {0:?}")]
    UnknownEase(String),

    /// A composition mode name was not recognised
    #[error("Unknown composition mode: {0:?}")]
    UnknownComposition(String),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
