//! Integration tests for playback, looping and callbacks
//!
//! These tests verify that:
//! - `advance` moves the playhead, completes, and loops the timeline
//! - Child lifecycle events fire in time order across a tick
//! - Timeline callbacks run after rendering and may re-enter the timeline
//! - The loop callback observes the end of the iteration that just finished
//! - Children loop, alternate and reverse inside their own window

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_timeline::{
    AnimationParams, ChildEvent, ChildEventKind, Defaults, Ease, PlaybackState, Position,
    Timeline, TimelineConfig, TimerParams,
};
use common::{assert_close, paused, registry, value, TARGET};

fn linear(duration: f64) -> Defaults {
    Defaults::default().duration(duration).ease(Ease::Linear)
}

/// Test that alternating children render correctly when sought after the end
#[test]
fn test_alternate_children_seek_after_completion() {
    let registry = registry();
    let seen = Rc::new(Cell::new(f64::NAN));

    let seen_in_callback = seen.clone();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .repeat(2u32)
            .alternate(true)
            .on_complete(move |tl| {
                tl.seek(40.0);
                let x = tl.registry().borrow().value(TARGET, "translateX");
                seen_in_callback.set(x.unwrap_or(f64::NAN));
            }),
    );
    let child = |to: f64| {
        AnimationParams::new()
            .prop("translateX", to)
            .duration(10.0)
            .repeat(2u32)
            .alternate(true)
            .ease(Ease::Linear)
    };
    tl.add(TARGET, child(-100.0), Position::Append)
        .unwrap()
        .add(TARGET, child(400.0), "-=5")
        .unwrap();

    assert_eq!(tl.iteration_duration(), 55.0);
    assert_eq!(tl.duration(), 165.0);

    while !tl.is_completed() {
        tl.advance(16.0);
    }
    assert_close(Some(seen.get()), 175.0);
}

/// Test that timers receive updates before the timeline completes
#[test]
fn test_timers_update_before_completion() {
    let registry = registry();
    let log = Rc::new(RefCell::new(Vec::new()));

    let completed_log = log.clone();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new().on_complete(move |_| completed_log.borrow_mut().push("timeline")),
    );
    let first = log.clone();
    let second = log.clone();
    tl.add_timer(
        TimerParams::new()
            .duration(30.0)
            .on_update(move |_| first.borrow_mut().push("timer 1")),
        Position::Append,
    )
    .unwrap()
    .add_timer(
        TimerParams::new()
            .duration(30.0)
            .on_update(move |_| second.borrow_mut().push("timer 2")),
        20.0,
    )
    .unwrap();

    assert_eq!(tl.duration(), 50.0);
    while !tl.is_completed() {
        tl.advance(10.0);
    }

    let log = log.borrow();
    assert!(log.contains(&"timer 1"));
    assert!(log.contains(&"timer 2"));
    assert_eq!(log.last(), Some(&"timeline"));
    assert_eq!(log.iter().filter(|entry| **entry == "timeline").count(), 1);
}

/// Test that child events of one tick are ordered by time, then by child
#[test]
fn test_child_events_are_time_ordered() {
    let (_registry, mut tl) = paused(linear(10.0));
    let events: Rc<RefCell<Vec<(usize, ChildEventKind)>>> = Rc::default();

    let record = |events: &Rc<RefCell<Vec<(usize, ChildEventKind)>>>| {
        let events = events.clone();
        move |event: &ChildEvent| events.borrow_mut().push((event.child, event.kind))
    };
    tl.add_timer(
        TimerParams::new()
            .duration(20.0)
            .on_begin(record(&events))
            .on_complete(record(&events)),
        0.0,
    )
    .unwrap()
    .add_timer(
        TimerParams::new()
            .duration(5.0)
            .on_begin(record(&events))
            .on_complete(record(&events)),
        10.0,
    )
    .unwrap()
    .add_timer(
        TimerParams::new()
            .duration(5.0)
            .on_begin(record(&events))
            .on_complete(record(&events)),
        0.0,
    )
    .unwrap();

    tl.play().advance(100.0);

    use ChildEventKind::*;
    assert_eq!(
        *events.borrow(),
        vec![
            (0, Begin),
            (2, Begin),
            (2, Complete),
            (1, Begin),
            (1, Complete),
            (0, Complete),
        ]
    );
}

/// Test that a looping child reports its iterations
#[test]
fn test_child_loop_events() {
    let (_registry, mut tl) = paused(linear(10.0));
    let iterations = Rc::new(RefCell::new(Vec::new()));

    let seen = iterations.clone();
    tl.add(
        TARGET,
        AnimationParams::new()
            .prop("x", 1.0)
            .repeat(2u32)
            .on_loop(move |event| seen.borrow_mut().push(event.iteration)),
        Position::Append,
    )
    .unwrap();
    assert_eq!(tl.duration(), 30.0);

    tl.play();
    for _ in 0..6 {
        tl.advance(5.0);
    }
    assert_eq!(*iterations.borrow(), vec![1, 2]);
    assert!(tl.is_completed());
}

/// Test that the timeline loop callback fires once per iteration boundary
#[test]
fn test_timeline_loops() {
    let registry = registry();
    let loops = Rc::new(Cell::new(0));

    let counter = loops.clone();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .repeat(3u32)
            .defaults(linear(10.0))
            .on_loop(move |_| counter.set(counter.get() + 1)),
    );
    tl.add(TARGET, AnimationParams::new().prop("x", 100.0), Position::Append)
        .unwrap();

    tl.advance(25.0);
    assert_eq!(loops.get(), 2);
    assert_close(value(&registry, TARGET, "x"), 50.0);

    tl.advance(100.0);
    assert_eq!(loops.get(), 3);
    assert_eq!(tl.elapsed(), 40.0);
    assert!(tl.is_completed());
}

/// Test that the loop callback sees the finished iteration, not the next one
#[test]
fn test_loop_callback_sees_finished_iteration() {
    let registry = registry();
    let seen = Rc::new(Cell::new(f64::NAN));

    let seen_in_callback = seen.clone();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new().repeat(3u32).on_loop(move |tl| {
            tl.pause();
            let y = tl.registry().borrow().value(TARGET, "translateY");
            seen_in_callback.set(y.unwrap_or(f64::NAN));
        }),
    );
    tl.add(
        TARGET,
        AnimationParams::new().prop("translateY", -100.0).duration(100.0),
        Position::Append,
    )
    .unwrap()
    .add(
        TARGET,
        AnimationParams::new().prop("translateY", 50.0).duration(100.0),
        Position::Append,
    )
    .unwrap();

    while tl.is_running() {
        tl.advance(16.0);
    }
    assert_eq!(tl.state(), PlaybackState::Paused);
    assert!(seen.get() > 39.0, "loop callback saw {}", seen.get());
    // paused inside the callback, so the next iteration was never drawn
    assert_close(value(&registry, TARGET, "translateY"), 50.0);
}

/// Test that an alternating timeline plays odd iterations backwards
#[test]
fn test_alternate_timeline() {
    let registry = registry();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .autoplay(false)
            .repeat(1u32)
            .alternate(true)
            .defaults(linear(100.0)),
    );
    tl.add(TARGET, AnimationParams::new().prop("x", [0.0, 100.0]), Position::Append)
        .unwrap();

    tl.seek(25.0);
    assert_close(value(&registry, TARGET, "x"), 25.0);
    tl.seek(125.0);
    assert_close(value(&registry, TARGET, "x"), 75.0);
    tl.seek(200.0);
    assert_close(value(&registry, TARGET, "x"), 0.0);
}

#[test]
fn test_reversed_timeline_starts_at_the_end() {
    let registry = registry();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .autoplay(false)
            .reversed(true)
            .defaults(linear(100.0)),
    );
    tl.add(TARGET, AnimationParams::new().prop("x", [0.0, 100.0]), Position::Append)
        .unwrap();

    tl.seek(0.0);
    assert_close(value(&registry, TARGET, "x"), 100.0);
    tl.seek(30.0);
    assert_close(value(&registry, TARGET, "x"), 70.0);
}

/// Test that a reversed child runs backwards inside its own window
#[test]
fn test_reversed_child() {
    let (registry, mut tl) = paused(linear(100.0));
    tl.add(
        TARGET,
        AnimationParams::new().prop("x", [0.0, 100.0]).reversed(true),
        Position::Append,
    )
    .unwrap();

    tl.seek(0.0);
    assert_close(value(&registry, TARGET, "x"), 100.0);
    tl.seek(100.0);
    assert_close(value(&registry, TARGET, "x"), 0.0);
}

/// Test that seek only updates children whose window contains the time
#[test]
fn test_seek_updates_active_children() {
    let (_registry, mut tl) = paused(linear(10.0));
    let updated = Rc::new(RefCell::new(Vec::new()));
    let timeline_updates = Rc::new(Cell::new(0));

    for offset in [0.0, 20.0] {
        let updated = updated.clone();
        tl.add(
            TARGET,
            AnimationParams::new()
                .prop("x", offset)
                .on_update(move |event| updated.borrow_mut().push(event.child)),
            offset,
        )
        .unwrap();
    }

    tl.seek(5.0);
    tl.seek(25.0);
    tl.seek(15.0);
    assert_eq!(*updated.borrow(), vec![0, 1]);

    let counter = timeline_updates.clone();
    let registry = tl.registry().clone();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .autoplay(false)
            .on_update(move |_| counter.set(counter.get() + 1)),
    );
    tl.seek(0.0).seek(0.0);
    assert_eq!(timeline_updates.get(), 2);
}

/// Test that pausing stops rendering and resuming continues from the playhead
#[test]
fn test_pause_stops_writes() {
    let registry = registry();
    let mut tl = Timeline::new(&registry, TimelineConfig::new().defaults(linear(100.0)));
    tl.add(TARGET, AnimationParams::new().prop("x", 100.0), Position::Append)
        .unwrap();
    assert_eq!(tl.state(), PlaybackState::Running);

    tl.advance(40.0).pause().advance(40.0);
    assert_close(value(&registry, TARGET, "x"), 40.0);
    assert_eq!(tl.state(), PlaybackState::Paused);

    tl.resume().advance(10.0);
    assert_close(value(&registry, TARGET, "x"), 50.0);
}

/// Test that a callback can pause the timeline it is attached to
#[test]
fn test_callback_reenters_timeline() {
    let registry = registry();
    let mut tl = Timeline::new(
        &registry,
        TimelineConfig::new()
            .defaults(linear(100.0))
            .on_update(|tl| {
                if tl.elapsed() >= 30.0 {
                    tl.pause();
                }
            }),
    );
    tl.add(TARGET, AnimationParams::new().prop("x", 100.0), Position::Append)
        .unwrap();

    for _ in 0..10 {
        tl.advance(10.0);
    }
    assert_eq!(tl.elapsed(), 30.0);
    assert!(!tl.is_running());
}

#[test]
fn test_restart_replays_begin_events() {
    let (registry, mut tl) = paused(linear(10.0));
    let begins = Rc::new(Cell::new(0));

    let counter = begins.clone();
    tl.add(
        TARGET,
        AnimationParams::new()
            .prop("x", 10.0)
            .on_begin(move |_| counter.set(counter.get() + 1)),
        Position::Append,
    )
    .unwrap();

    tl.play().advance(20.0);
    assert!(tl.is_completed());
    tl.restart().advance(5.0);

    assert_eq!(begins.get(), 2);
    assert_close(value(&registry, TARGET, "x"), 5.0);
}
