//! Supervisor behavior: error isolation, control operations, and the two
//! loops.

mod common;

use common::*;
use minicortex_core::prelude::*;
use minicortex_engine::{BufferedSink, Frame};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn failing_node_stops_the_tick_and_is_reported() {
    let (engine, _dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine.register_class(adder_class()).unwrap();
    engine.register_class(failing_class()).unwrap();

    let (a, _) = engine
        .create_instance("int_source", Position::default())
        .unwrap();
    let a = a.node_id;
    let (b, _) = engine
        .create_instance("adder", Position::new(100.0, 0.0))
        .unwrap();
    let b = b.node_id;
    engine.connect(&a, "out", &b, "x").unwrap();
    engine.step().unwrap();
    assert_eq!(display_value(&engine, &b, "sum"), json!(10.0));

    // Wire in the failing node; the connect probe already trips it, which is
    // reported but does not fail the connect.
    let (f, _) = engine
        .create_instance("failing", Position::new(200.0, 0.0))
        .unwrap();
    let f = f.node_id;
    engine.connect(&a, "out", &f, "x").unwrap();
    engine.start();
    assert!(engine.last_error().is_none());
    engine.stop();

    let sink = Arc::new(BufferedSink::new(8));
    engine.subscribe(sink.clone());
    engine.step().unwrap();

    // Error frame naming the node, then a state frame with running = false.
    let frames = sink.drain();
    assert_eq!(frames.len(), 2);
    let Frame::Error(error) = &frames[0] else {
        panic!("expected an error frame first");
    };
    assert_eq!(error.error.node_id, f);
    assert_eq!(error.error.node_name, "failing");
    assert!(error.error.message.contains("intentional test failure"));
    let Frame::State(state) = &frames[1] else {
        panic!("expected a state frame second");
    };
    assert!(!state.network.running);

    // The supervisor error state is set; other nodes kept their output.
    let last = engine.last_error().unwrap();
    assert_eq!(last.node_id, f);
    assert_eq!(display_value(&engine, &b, "sum"), json!(10.0));

    // The failed tick did not advance the counter past the abort.
    // (`step` counted only the earlier successful tick.)
    assert_eq!(engine.network_status().step, 1);

    // Start clears the error state and resumes.
    let status = engine.start();
    assert!(status.running);
    assert!(engine.last_error().is_none());
}

#[test]
fn step_is_rejected_while_running() {
    let (engine, _dir) = test_engine();
    engine.start();
    let err = engine.step().unwrap_err();
    assert_eq!(err.code(), "validation");
    engine.stop();
    engine.step().unwrap();
    assert_eq!(engine.network_status().step, 1);
}

#[test]
fn speed_is_clamped_to_bounds() {
    let (engine, _dir) = test_engine();
    assert_eq!(engine.set_speed(1000.0).speed, 300.0);
    assert_eq!(engine.set_speed(0.25).speed, 1.0);
    assert_eq!(engine.set_speed(60.0).speed, 60.0);
    // Non-finite requests are ignored.
    assert_eq!(engine.set_speed(f64::NAN).speed, 60.0);
}

#[test]
fn property_writes_land_on_the_next_tick() {
    let (engine, _dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine.register_class(adder_class()).unwrap();
    let (a, _) = engine
        .create_instance("int_source", Position::default())
        .unwrap();
    let a = a.node_id;
    let (b, _) = engine
        .create_instance("adder", Position::new(100.0, 0.0))
        .unwrap();
    let b = b.node_id;
    engine.connect(&a, "out", &b, "x").unwrap();

    engine.step().unwrap();
    assert_eq!(display_value(&engine, &b, "sum"), json!(10.0));

    let coerced = engine.set_property(&b, "bias", &Value::Int(5)).unwrap();
    assert_eq!(coerced, Value::Int(5));
    engine.step().unwrap();
    assert_eq!(display_value(&engine, &b, "sum"), json!(12.0));
}

#[test]
fn loops_tick_and_broadcast() {
    let (engine, _dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine
        .create_instance("int_source", Position::default())
        .unwrap();

    let sink = Arc::new(BufferedSink::new(64));
    engine.subscribe(sink.clone());

    engine.start_loops();
    engine.set_speed(100.0);
    engine.start();
    std::thread::sleep(Duration::from_millis(250));
    let status = engine.stop();

    assert!(status.step >= 2, "expected paced ticks, got {}", status.step);
    assert!(status.actual_hz > 0.0);

    let frames = sink.drain();
    assert!(!frames.is_empty(), "broadcast loop emitted no frames");
    assert!(frames.iter().any(|f| matches!(
        f,
        Frame::State(state) if state.network.running
    )));

    engine.shutdown();
}

#[test]
fn viewport_updates_are_clamped() {
    let (engine, _dir) = test_engine();
    engine.set_viewport(Position::new(10.0, 20.0), 9.0).unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.viewport.zoom, 3.0);
    assert_eq!(snapshot.viewport.pan.x, 10.0);
    assert_eq!(
        engine
            .set_viewport(Position::new(f64::NAN, 0.0), 1.0)
            .unwrap_err()
            .code(),
        "validation"
    );
}
