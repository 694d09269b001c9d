//! Workspace persistence: lossless round-trips and staging semantics.

mod common;

use common::*;
use minicortex_core::prelude::*;
use ndarray::array;

fn sample_tensor() -> Tensor {
    Tensor::from(
        array![[0.5f32, 1.5, 2.5], [3.5, 4.5, 5.5], [6.5, 7.5, 8.5]].into_dyn(),
    )
}

#[test]
fn float32_array_survives_save_clear_load() {
    let (engine, _dir) = test_engine();
    engine.register_class(matrix_class()).unwrap();
    let (m, _) = engine
        .create_instance("matrix_store", Position::default())
        .unwrap();
    let m = m.node_id;

    engine
        .set_store(&m, "matrix", Value::Array(sample_tensor()))
        .unwrap();
    engine.save_workspace("matrices").unwrap();

    engine.clear_workspace();
    assert!(engine.list_instances().is_empty());
    assert_eq!(engine.current_workspace(), None);

    let stats = engine.load_workspace("matrices").unwrap();
    assert_eq!(stats.nodes, 1);
    assert_eq!(engine.current_workspace(), Some("matrices".to_string()));

    let restored = engine.store_value(&m, "matrix").unwrap();
    let Value::Array(tensor) = restored else {
        panic!("store did not restore to a tensor");
    };
    assert_eq!(tensor.dtype(), DType::F32);
    assert_eq!(tensor.shape(), [3, 3]);
    assert_eq!(tensor, sample_tensor());
}

#[test]
fn load_then_save_is_semantically_identical() {
    let (engine, dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine.register_class(adder_class()).unwrap();

    let (a, _) = engine
        .create_instance("int_source", Position::new(10.0, 20.0))
        .unwrap();
    let a = a.node_id;
    let (b, _) = engine
        .create_instance("adder", Position::new(300.0, 40.0))
        .unwrap();
    let b = b.node_id;
    engine.connect(&a, "out", &b, "x").unwrap();
    engine.set_property(&b, "bias", &Value::Int(5)).unwrap();
    engine.set_display_enabled(&b, "sum", false).unwrap();
    engine.set_viewport(Position::new(-50.0, 12.5), 1.75).unwrap();

    engine.save_workspace("one").unwrap();
    engine.load_workspace("one").unwrap();
    engine.save_workspace("two").unwrap();

    let store = WorkspaceStore::new(dir.path());
    let one = serde_json::to_value(store.load("one").unwrap()).unwrap();
    let two = serde_json::to_value(store.load("two").unwrap()).unwrap();
    assert_eq!(one, two);
}

#[test]
fn loaded_ids_and_connections_are_kept_verbatim() {
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
    engine.save_workspace("graph").unwrap();

    engine.clear_workspace();
    engine.load_workspace("graph").unwrap();

    let ids: Vec<String> = engine
        .list_instances()
        .into_iter()
        .map(|i| i.id.to_string())
        .collect();
    assert_eq!(ids, ["int_source_0", "adder_1"]);
    assert_eq!(engine.snapshot().connections.len(), 1);

    // New instances never collide with restored IDs.
    let (c, _) = engine
        .create_instance("int_source", Position::default())
        .unwrap();
    assert_eq!(c.node_id.as_str(), "int_source_2");
}

#[test]
fn init_runs_again_after_load() {
    let (engine, _dir) = test_engine();
    engine.register_class(init_counter_class()).unwrap();
    let (n, _) = engine
        .create_instance("init_counter", Position::default())
        .unwrap();
    let n = n.node_id;
    assert_eq!(engine.store_value(&n, "inits").unwrap(), Value::Int(1));

    engine.save_workspace("inits").unwrap();
    engine.load_workspace("inits").unwrap();
    // The restored value was 1; init ran once more on top of it.
    assert_eq!(engine.store_value(&n, "inits").unwrap(), Value::Int(2));
}

#[test]
fn failed_load_leaves_the_registry_untouched() {
    let (engine, dir) = test_engine();
    engine.register_class(int_source_class()).unwrap();
    engine
        .create_instance("int_source", Position::default())
        .unwrap();
    engine.save_workspace("good").unwrap();

    std::fs::write(dir.path().join("mangled.json"), "{\"version\": 1,").unwrap();
    let err = engine.load_workspace("mangled").unwrap_err();
    assert_eq!(err.code(), "load_failed");

    assert_eq!(engine.list_instances().len(), 1);
    assert_eq!(engine.current_workspace(), Some("good".to_string()));
}

#[test]
fn unknown_names_and_missing_files() {
    let (engine, _dir) = test_engine();
    assert_eq!(
        engine.load_workspace("nope").unwrap_err().code(),
        "load_failed"
    );
    assert_eq!(
        engine.delete_workspace("nope").unwrap_err().code(),
        "not_found"
    );
    assert!(engine.list_workspaces().unwrap().is_empty());
}

#[test]
fn list_and_delete_track_files() {
    let (engine, _dir) = test_engine();
    engine.save_workspace("alpha").unwrap();
    engine.save_workspace("beta").unwrap();
    assert_eq!(engine.list_workspaces().unwrap(), ["alpha", "beta"]);

    engine.delete_workspace("alpha").unwrap();
    assert_eq!(engine.list_workspaces().unwrap(), ["beta"]);
}
