//! Timeline Handoff Demo
//!
//! Two timelines animate the same boxes through one shared registry:
//! - A staggered slide-in built from labels and relative positions
//! - A second timeline that takes over `x` halfway through and continues from
//!   wherever the first one left each box
//!
//! Run with: RUST_LOG=cadence_timeline=debug cargo run -p cadence_timeline --example handoff_demo

use cadence_timeline::{
    stagger, AnimationParams, CompositionRegistry, Defaults, Ease, MemoryBackend, Position,
    TargetId, Timeline, TimelineConfig, TimelineScheduler,
};
use tracing_subscriber::EnvFilter;

const FRAME_MS: f64 = 1000.0 / 60.0;

fn main() -> cadence_timeline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let boxes: Vec<TargetId> = (1..=3).map(TargetId).collect();
    let backend = MemoryBackend::new().with_selector(".box", boxes.clone());
    let registry = CompositionRegistry::shared(backend);
    let mut scheduler = TimelineScheduler::new();

    let mut intro = Timeline::new(
        &registry,
        TimelineConfig::new()
            .id("intro")
            .defaults(Defaults::default().duration(400.0).ease(Ease::Out(3.0))),
    );
    intro
        .add(
            ".box",
            AnimationParams::new().prop("x", 300.0).delay(stagger(80.0)),
            Position::Append,
        )?
        .add_label("settled", Position::Append)?
        .add(".box", AnimationParams::new().prop("opacity", [0.0, 1.0]), "<<")?;
    tracing::info!(duration = intro.duration(), "intro built");
    scheduler.add_timeline(intro);

    // let the intro run for a while before the second timeline claims `x`
    for _ in 0..18 {
        scheduler.tick(FRAME_MS);
    }

    let mut outro = Timeline::new(
        &registry,
        TimelineConfig::new()
            .id("outro")
            .defaults(Defaults::default().duration(300.0).ease(Ease::InOutSine)),
    );
    outro.add(".box", AnimationParams::new().prop("x", 0.0), Position::Append)?;
    scheduler.add_timeline(outro);

    while scheduler.has_active_timelines() {
        scheduler.tick(FRAME_MS);
    }

    let registry = registry.borrow();
    for target in boxes {
        tracing::info!(
            ?target,
            x = registry.value(target, "x"),
            opacity = registry.value(target, "opacity"),
            "final"
        );
    }
    Ok(())
}
