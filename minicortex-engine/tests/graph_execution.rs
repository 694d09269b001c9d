//! Tick execution over feedforward and feedback topologies.

mod common;

use common::*;
use minicortex_core::prelude::*;
use minicortex_engine::{BufferedSink, Frame, build_order};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn two_node_feedforward() {
    let (engine, _dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine.register_class(adder_class()).unwrap();

    let (a, _) = engine
        .create_instance("int_source", Position::default())
        .unwrap();
    let a = a.node_id;
    let (b, _) = engine
        .create_instance("adder", Position::new(200.0, 0.0))
        .unwrap();
    let b = b.node_id;
    engine.connect(&a, "out", &b, "x").unwrap();

    // The probing ticks refreshed displays without starting the clock.
    assert_eq!(engine.network_status().step, 0);
    assert_eq!(display_value(&engine, &b, "sum"), json!(10.0));

    engine.step().unwrap();
    assert_eq!(engine.network_status().step, 1);
    assert_eq!(display_value(&engine, &a, "reading"), json!(7.0));
    assert_eq!(display_value(&engine, &b, "sum"), json!(10.0));

    // The broadcast frame carries both displays.
    let sink = Arc::new(BufferedSink::new(4));
    engine.subscribe(sink.clone());
    engine.emit_state();
    let frames = sink.drain();
    assert_eq!(frames.len(), 1);
    let Frame::State(state) = &frames[0] else {
        panic!("expected a state frame");
    };
    assert_eq!(state.nodes[&a].outputs["reading"], json!(7.0));
    assert_eq!(state.nodes[&b].outputs["sum"], json!(10.0));
    assert_eq!(state.network.step, 1);
    assert!(!state.network.running);
}

#[test]
fn self_loop_counts_one_per_step() {
    let (engine, _dir) = test_engine();
    engine.register_class(loop_counter_class()).unwrap();
    let (c, _) = engine
        .create_instance("loop_counter", Position::default())
        .unwrap();
    let c = c.node_id;
    engine.connect(&c, "curr", &c, "prev").unwrap();

    for expected in 1..=6 {
        engine.step().unwrap();
        assert_eq!(display_value(&engine, &c, "count"), json!(expected as f64));
    }
    assert_eq!(engine.network_status().step, 6);
}

#[test]
fn two_cycle_runs_with_one_tick_lag() {
    let (engine, _dir) = test_engine();
    engine.register_class(relay_class()).unwrap();
    let (x, _) = engine.create_instance("relay", Position::default()).unwrap();
    let x = x.node_id;
    let (y, _) = engine
        .create_instance("relay", Position::new(100.0, 0.0))
        .unwrap();
    let y = y.node_id;

    engine.connect(&x, "out", &y, "in").unwrap();
    engine.connect(&y, "out", &x, "in").unwrap();

    // Exactly one of the two edges is classified feedback.
    let order = build_order(
        &[(x.clone(), 0), (y.clone(), 1)],
        &[
            Connection::new(x.clone(), "out", y.clone(), "in"),
            Connection::new(y.clone(), "out", x.clone(), "in"),
        ],
    );
    assert_eq!(order.feedback, HashSet::from([1]));

    // x runs first: its input lags one tick behind y's output.
    engine.step().unwrap();
    assert_eq!(display_value(&engine, &x, "val"), json!(1.0));
    assert_eq!(display_value(&engine, &y, "val"), json!(2.0));

    engine.step().unwrap();
    assert_eq!(display_value(&engine, &x, "val"), json!(3.0));
    assert_eq!(display_value(&engine, &y, "val"), json!(4.0));
}

#[test]
fn unconnected_input_leaves_node_quiet() {
    let (engine, _dir) = test_engine();
    engine.register_class(adder_class()).unwrap();
    let (b, _) = engine.create_instance("adder", Position::default()).unwrap();
    let b = b.node_id;

    engine.step().unwrap();
    // Adder returned early; its display still holds the numeric default.
    assert_eq!(display_value(&engine, &b, "sum"), json!(0.0));
}

#[test]
fn disabled_displays_are_omitted_from_frames() {
    let (engine, _dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    let (a, _) = engine
        .create_instance("int_source", Position::default())
        .unwrap();
    let a = a.node_id;
    engine.step().unwrap();

    engine.set_display_enabled(&a, "reading", false).unwrap();
    let sink = Arc::new(BufferedSink::new(4));
    engine.subscribe(sink.clone());
    engine.emit_state();

    let Frame::State(state) = &sink.drain()[0] else {
        panic!("expected a state frame");
    };
    assert!(!state.nodes[&a].outputs.contains_key("reading"));
}
