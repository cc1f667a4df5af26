//! Integration tests for tweens driven by the scheduler
//!
//! These tests verify that:
//! - Values interpolate on the expected curve and capture start values lazily
//! - The last tween to bind a field owns it
//! - Lifecycle callbacks fire the expected number of times
//! - Infinite repeats loop without completing
//! - The scheduler sleeps when idle and wakes with a single frame request

use blinc_tween::{
    Clock, EngineConfig, ManualClock, Object, PendingFrames, Scheduler, Target, TweenConfig, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scheduler stepped by hand with `update(Some(dt))`
fn manual_scheduler() -> Scheduler {
    init_tracing();
    Scheduler::with_config(
        EngineConfig::default().auto_update(false),
        ManualClock::new(),
        PendingFrames::new(),
    )
}

fn counter() -> (Rc<Cell<u32>>, impl FnMut(&[Target]) + 'static) {
    let count = Rc::new(Cell::new(0));
    let seen = count.clone();
    (count, move |_: &[Target]| seen.set(seen.get() + 1))
}

#[test]
fn test_linear_interpolation() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    scheduler
        .to(&target, 2.0, TweenConfig::new().to("x", 1.0))
        .unwrap();

    let mut t = 0.0;
    for _ in 0..8 {
        scheduler.update(Some(0.25));
        t += 0.25;
        let x = target.number("x").unwrap();
        assert!((x - t / 2.0).abs() < 1e-4, "x = {x} at t = {t}");
    }
    assert_eq!(target.number("x"), Some(1.0));
}

#[test]
fn test_from_captures_value_at_bind_time() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 1.0));
    scheduler
        .from(&target, 1.0, TweenConfig::new().from("x", 0.0))
        .unwrap();

    // Untouched until the first evaluated tick
    assert_eq!(target.number("x"), Some(1.0));

    // The end value is whatever the field holds when the tween binds
    target.set("x", 4.0);
    scheduler.update(Some(0.5));
    assert!((target.number("x").unwrap() - 2.0).abs() < 1e-9);

    scheduler.update(Some(0.5));
    assert_eq!(target.number("x"), Some(4.0));
}

#[test]
fn test_last_bound_tween_owns_field() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0).with("y", 0.0));
    let a = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 10.0))
        .unwrap();
    let b = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", -10.0).to("y", 1.0))
        .unwrap();

    scheduler.update(Some(0.1));
    assert_eq!(scheduler.owner_of(&target, "x"), Some(b));

    // A's binding is gone, only B writes x from here on
    scheduler.update(Some(0.1));
    let x = target.number("x").unwrap();
    assert!((x - (1.0 - 11.0 * 0.2)).abs() < 1e-9, "x = {x}");
    assert!(scheduler.get_tween(a).is_none());
    assert_eq!(scheduler.tween_count(), 1);
}

#[test]
fn test_partial_override_keeps_other_fields() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0).with("y", 0.0));
    let a = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0).to("y", 1.0))
        .unwrap();
    scheduler.update(Some(0.5));

    let b = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 0.0))
        .unwrap();
    scheduler.update(Some(0.25));

    assert_eq!(scheduler.owner_of(&target, "y"), Some(a));
    assert_eq!(scheduler.owner_of(&target, "x"), Some(b));
    assert_eq!(target.number("y"), Some(0.75));

    // A drops its displaced binding at its next evaluation and keeps y
    scheduler.update(Some(0.1));
    assert_eq!(scheduler.get_tween(a).map(|t| t.property_count()), Some(1));
    assert!((target.number("y").unwrap() - 0.85).abs() < 1e-9);
}

#[test]
fn test_on_complete_fires_once() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let (completions, on_complete) = counter();
    let id = scheduler
        .create(
            &target,
            1.0,
            TweenConfig::new()
                .to("x", 1.0)
                .keep_alive(true)
                .on_complete(on_complete),
        )
        .unwrap();

    for _ in 0..30 {
        scheduler.update(Some(0.1));
    }
    assert_eq!(completions.get(), 1);
    assert!(scheduler.get_tween(id).is_some());

    // A restart re-arms the notification
    scheduler.tween(id).unwrap().restart(true, false);
    for _ in 0..30 {
        scheduler.update(Some(0.1));
    }
    assert_eq!(completions.get(), 2);
}

#[test]
fn test_lifecycle_callbacks() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let (starts, on_start) = counter();
    let (repeats, on_repeat) = counter();
    let (updates, on_update) = counter();
    scheduler
        .create(
            &target,
            0.5,
            TweenConfig::new()
                .to("x", 1.0)
                .delay(0.25)
                .repeat(2)
                .on_start(on_start)
                .on_repeat(on_repeat)
                .on_update(on_update),
        )
        .unwrap();

    scheduler.update(Some(0.2));
    assert_eq!(starts.get(), 0);
    assert_eq!(updates.get(), 0);

    for _ in 0..10 {
        scheduler.update(Some(0.2));
    }
    assert_eq!(starts.get(), 1);
    assert_eq!(repeats.get(), 2);
    assert!(updates.get() >= 7);
    assert_eq!(target.number("x"), Some(1.0));
}

#[test]
fn test_yoyo_lap_parity() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let id = scheduler
        .create(
            &target,
            1.0,
            TweenConfig::new().to("x", 1.0).repeat(2).yoyo(true),
        )
        .unwrap();

    scheduler.update(Some(0.5));
    assert!((target.number("x").unwrap() - 0.5).abs() < 1e-9);

    scheduler.update(Some(0.75));
    assert!((target.number("x").unwrap() - 0.75).abs() < 1e-9);

    scheduler.tween(id).unwrap().time(2.25, false);
    assert!((target.number("x").unwrap() - 0.25).abs() < 1e-9);
}

#[test]
fn test_progress_is_idempotent() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(
        Object::new()
            .with("x", 0.0)
            .with("color", "#102030")
            .with("path", vec![0.0, 0.0]),
    );
    let id = scheduler
        .create(
            &target,
            1.0,
            TweenConfig::new()
                .to("x", 100.0)
                .to("color", "#ffeedd")
                .to("path", vec![3.0, 7.0])
                .ease("easeInOutCubic")
                .auto_start(false),
        )
        .unwrap();

    scheduler.tween(id).unwrap().progress(0.3, false);
    let first = (
        target.number("x").unwrap().to_bits(),
        target.get("color"),
        target.get("path"),
    );

    scheduler.tween(id).unwrap().progress(0.3, false);
    let second = (
        target.number("x").unwrap().to_bits(),
        target.get("color"),
        target.get("path"),
    );
    assert_eq!(first, second);
    assert_ne!(target.number("x"), Some(0.0));
}

#[test]
fn test_color_and_waypoints() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("color", "#000000").with("x", 0.0));
    scheduler
        .create(
            &target,
            1.0,
            TweenConfig::new()
                .to("color", "#ffffff")
                .to("x", vec![10.0, 0.0]),
        )
        .unwrap();

    scheduler.update(Some(0.5));
    assert_eq!(target.get("color"), Some(Value::from("#808080")));
    assert_eq!(target.number("x"), Some(10.0));

    scheduler.update(Some(0.5));
    assert_eq!(target.get("color"), Some(Value::from("#ffffff")));
    assert_eq!(target.number("x"), Some(0.0));
}

#[test]
fn test_multiple_targets() {
    let mut scheduler = manual_scheduler();
    let a = Target::new(Object::new().with("x", 0.0));
    let b = Target::new(Object::new().with("x", 10.0));
    scheduler
        .create([a.clone(), b.clone()], 1.0, TweenConfig::new().to("x", 20.0))
        .unwrap();

    scheduler.update(Some(0.5));
    assert_eq!(a.number("x"), Some(10.0));
    assert_eq!(b.number("x"), Some(15.0));
}

#[test]
fn test_empty_targets_is_an_error() {
    let mut scheduler = manual_scheduler();
    let result = scheduler.create(Vec::<Target>::new(), 1.0, TweenConfig::new().to("x", 1.0));
    assert!(result.is_err());
    assert_eq!(scheduler.tween_count(), 0);
}

#[test]
fn test_panicking_callback_does_not_stop_engine() {
    let mut scheduler = manual_scheduler();
    let a = Target::new(Object::new().with("x", 0.0));
    let b = Target::new(Object::new().with("x", 0.0));
    scheduler
        .create(
            &a,
            1.0,
            TweenConfig::new()
                .to("x", 1.0)
                .on_update(|_| panic!("handler failure")),
        )
        .unwrap();
    scheduler
        .create(&b, 1.0, TweenConfig::new().to("x", 1.0))
        .unwrap();

    scheduler.update(Some(0.5));
    scheduler.update(Some(0.25));
    assert_eq!(a.number("x"), Some(0.75));
    assert_eq!(b.number("x"), Some(0.75));
}

#[test]
fn test_pause_resume_and_clear_all() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0).with("y", 0.0));
    scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0))
        .unwrap();
    scheduler
        .create(&target, 1.0, TweenConfig::new().to("y", 1.0))
        .unwrap();

    scheduler.update(Some(0.25));
    scheduler.pause_all();
    scheduler.update(Some(0.25));
    assert_eq!(target.number("x"), Some(0.25));
    assert_eq!(scheduler.queued_count(), 0);
    assert_eq!(scheduler.tween_count(), 2);

    scheduler.resume_all();
    scheduler.update(Some(0.25));
    assert_eq!(target.number("x"), Some(0.5));
    assert_eq!(target.number("y"), Some(0.5));

    scheduler.clear_all();
    scheduler.update(Some(0.25));
    assert_eq!(target.number("x"), Some(0.5));
    assert_eq!(scheduler.tween_count(), 0);
    assert!(scheduler.registry().is_empty());
}

#[test]
fn test_resume_all_skips_unstarted_tweens() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0).with("y", 0.0));
    let paused = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0))
        .unwrap();
    let idle = scheduler
        .create(&target, 1.0, TweenConfig::new().to("y", 1.0).auto_start(false))
        .unwrap();

    scheduler.update(Some(0.25));
    scheduler.tween(paused).unwrap().pause();
    assert!(scheduler.get_tween(paused).is_some_and(|t| t.is_paused()));
    assert!(scheduler.get_tween(idle).is_some_and(|t| !t.is_paused()));

    scheduler.resume_all();
    scheduler.update(Some(0.25));
    assert_eq!(target.number("x"), Some(0.5));
    assert_eq!(target.number("y"), Some(0.0));
    assert!(!scheduler.tween(idle).unwrap().is_running());
    assert_eq!(scheduler.queued_count(), 1);
}

#[test]
fn test_infinite_repeat_never_completes() {
    for yoyo in [true, false] {
        let mut scheduler = manual_scheduler();
        let target = Target::new(Object::new().with("x", 0.0));
        let (starts, on_start) = counter();
        let (repeats, on_repeat) = counter();
        let (completions, on_complete) = counter();
        scheduler
            .create(
                &target,
                1.0,
                TweenConfig::new()
                    .to("x", 1.0)
                    .repeat(-1)
                    .yoyo(yoyo)
                    .on_start(on_start)
                    .on_repeat(on_repeat)
                    .on_complete(on_complete),
            )
            .unwrap();

        let mut xs = Vec::new();
        for _ in 0..20 {
            scheduler.update(Some(0.25));
            xs.push(target.number("x").unwrap());
        }

        // Five laps, well past the two-lap nominal period
        assert_eq!(starts.get(), 1);
        assert_eq!(repeats.get(), 5);
        assert_eq!(completions.get(), 0);
        assert_eq!(scheduler.tween_count(), 1);
        assert_eq!(scheduler.queued_count(), 1);
        assert!(!scheduler.is_sleeping());

        // 3.25s into lap 3, 4.25s into lap 4
        let (odd, even) = if yoyo { (0.75, 0.25) } else { (0.25, 0.25) };
        assert!((xs[12] - odd).abs() < 1e-9, "yoyo {yoyo}: x = {}", xs[12]);
        assert!((xs[16] - even).abs() < 1e-9, "yoyo {yoyo}: x = {}", xs[16]);
    }
}

#[test]
fn test_keep_alive_reverse_after_completion() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let id = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0).keep_alive(true))
        .unwrap();

    scheduler.update(Some(0.5));
    scheduler.update(Some(0.5));
    assert_eq!(target.number("x"), Some(1.0));
    assert!(scheduler.get_tween(id).is_some_and(|t| t.is_cleared()));

    scheduler.tween(id).unwrap().reverse();
    scheduler.update(Some(0.5));
    assert_eq!(target.number("x"), Some(0.5));
    assert_eq!(scheduler.owner_of(&target, "x"), Some(id));

    scheduler.tween(id).unwrap().progress(0.3, false);
    assert!((target.number("x").unwrap() - 0.3).abs() < 1e-9);
}

#[test]
fn test_progress_after_completion_keeps_end_values() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let id = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0).keep_alive(true))
        .unwrap();

    scheduler.update(Some(1.0));
    scheduler.tween(id).unwrap().progress(0.3, false);
    assert!((target.number("x").unwrap() - 0.3).abs() < 1e-9);
}

#[test]
fn test_handle_chain() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0));
    let id = scheduler
        .create(&target, 1.0, TweenConfig::new().to("x", 1.0))
        .unwrap();

    scheduler.tween(id).unwrap().time_scale(2.0).delay(0.5);
    scheduler.update(Some(0.5));
    assert_eq!(target.number("x"), Some(0.5));

    scheduler.tween(id).unwrap().pause();
    scheduler.update(Some(0.5));
    assert_eq!(target.number("x"), Some(0.5));

    scheduler.tween(id).unwrap().resume().reverse();
    scheduler.update(Some(0.125));
    assert_eq!(target.number("x"), Some(0.25));
}

#[test]
fn test_tween_from_toml_config() {
    let mut scheduler = manual_scheduler();
    let target = Target::new(Object::new().with("x", 0.0).with("fill", "#000000"));
    let config = TweenConfig::from_toml_str(
        r##"
        ease = [0.0, 0.0, 1.0, 1.0]
        delay = 0.5

        [to]
        x = 8.0
        fill = "#ff0000"
        "##,
    )
    .unwrap();
    scheduler.create(&target, 1.0, config).unwrap();

    scheduler.update(Some(1.0));
    assert!((target.number("x").unwrap() - 4.0).abs() < 1e-6);
    assert_eq!(target.get("fill"), Some(Value::from("#800000")));
}

#[test]
fn test_sleep_and_wake() {
    init_tracing();
    let clock = ManualClock::new();
    let frames = PendingFrames::new();
    let mut scheduler = Scheduler::with_config(
        EngineConfig::default().fps(20),
        clock.clone(),
        frames.clone(),
    );
    let target = Target::new(Object::new().with("x", 0.0));
    let log = Rc::new(RefCell::new(Vec::new()));
    let seen = log.clone();
    scheduler
        .create(
            &target,
            0.2,
            TweenConfig::new()
                .to("x", 1.0)
                .on_complete(move |_| seen.borrow_mut().push("done")),
        )
        .unwrap();
    assert_eq!(frames.request_count(), 1);

    while frames.take().is_some() {
        scheduler.frame(clock.now_ms());
        clock.advance(50.0);
    }
    assert!(scheduler.is_sleeping());
    assert_eq!(*log.borrow(), vec!["done"]);
    let requests = frames.request_count();

    // Queueing again wakes with exactly one request and no synchronous tick
    scheduler
        .create(&target, 0.2, TweenConfig::new().to("x", 0.0))
        .unwrap();
    assert!(!scheduler.is_sleeping());
    assert_eq!(frames.request_count(), requests + 1);
    assert_eq!(target.number("x"), Some(1.0));
}
