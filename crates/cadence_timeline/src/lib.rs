//! Cadence Timeline
//!
//! Timeline scheduling and composition for property animations.
//!
//! # Features
//!
//! - **Offset resolution**: absolute, relative (`+=`, `-=`, `*=`), label and
//!   previous-child (`<`, `<<`) positions, resolved once at add-time
//! - **Tween chains**: per (target, property) segment chains with keyframes and
//!   replace-mode overriding
//! - **Composition**: `replace`, `blend` and `none` modes arbitrated across
//!   timelines through a shared registry
//! - **Seeking**: idempotent rendering at any time, with looping, alternation
//!   and reversal applied per timeline and per child
//!
//! # Example
//!
//! ```
//! use cadence_timeline::{
//!     AnimationParams, CompositionRegistry, Defaults, Ease, MemoryBackend, TargetId, Timeline,
//!     TimelineConfig,
//! };
//!
//! let registry = CompositionRegistry::shared(MemoryBackend::new());
//! let mut tl = Timeline::new(
//!     &registry,
//!     TimelineConfig::new()
//!         .autoplay(false)
//!         .defaults(Defaults::default().duration(100.0).ease(Ease::Linear)),
//! );
//!
//! let box_id = TargetId(1);
//! tl.add(box_id, AnimationParams::new().prop("x", 100.0), "+=0")?
//!     .add(box_id, AnimationParams::new().prop("x", 200.0), "-=50")?;
//!
//! tl.seek(100.0);
//! assert_eq!(registry.borrow().value(box_id, "x"), Some(125.0));
//! # Ok::<(), cadence_timeline::TimelineError>(())
//! ```

pub mod backend;
pub mod chain;
pub mod child;
pub mod composition;
pub mod easing;
pub mod error;
pub mod keyframe;
pub mod param;
pub mod position;
pub mod scheduler;
pub mod timeline;

pub use backend::{MemoryBackend, NullBackend, PropertyBackend, PropertyKey, TargetId, Targets};
pub use chain::{SegmentId, TweenSegment};
pub use child::{Child, ChildCallbacks, ChildEvent, ChildEventKind, ChildKind};
pub use composition::{
    Claim, CompositionMode, CompositionRecord, CompositionRegistry, SharedRegistry, TimelineId,
};
pub use easing::Ease;
pub use error::{Result, TimelineError};
pub use keyframe::{lerp, Keyframe, TweenValue};
pub use param::{stagger, stagger_from, Param, Repeat};
pub use position::Position;
pub use scheduler::{TimelineKey, TimelineScheduler};
pub use timeline::{
    AnimationParams, Defaults, PlaybackState, Timeline, TimelineCallback, TimelineConfig,
    TimerParams, DEFAULT_DURATION,
};
