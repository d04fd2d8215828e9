//! Round-trip tests for the persisted registry format
//!
//! The contract under test: `load(save(r))` reproduces `r` exactly (keys,
//! locators, metadata, schema, order) and `save(load(save(r)))` is
//! byte-identical to `save(r)`, for registries of zero, one and many
//! records with scalar-only and mixed scalar/set columns.

use std::collections::HashMap;

use dfcat::{persist, CellValue, Registry, Scalar};

fn saved_bytes(registry: &Registry) -> Vec<u8> {
    let mut buffer = Vec::new();
    persist::save(registry, &mut buffer).expect("save should succeed");
    buffer
}

fn reload(registry: &Registry) -> Registry {
    let bytes = saved_bytes(registry);
    persist::load(&mut bytes.as_slice()).expect("load should succeed")
}

fn assert_round_trip(registry: &Registry) {
    let reloaded = reload(registry);
    assert_eq!(&reloaded, registry);
    assert_eq!(saved_bytes(&reloaded), saved_bytes(registry));
}

fn meta(entries: Vec<(&str, CellValue)>) -> HashMap<String, CellValue> {
    entries
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

#[test]
fn test_empty_registry_round_trips() {
    assert_round_trip(&Registry::new());
}

#[test]
fn test_single_record_scalar_only() {
    let mut registry = Registry::new();
    registry
        .add(
            "ocean",
            "catalogs/ocean.json",
            meta(vec![
                ("frequency", CellValue::scalar("daily")),
                ("resolution", CellValue::scalar(0.25)),
                ("active", CellValue::scalar(true)),
                ("members", CellValue::scalar(12i64)),
            ]),
            false,
        )
        .unwrap();
    assert_round_trip(&registry);
}

#[test]
fn test_many_records_mixed_columns() {
    let mut registry = Registry::new();
    registry
        .add(
            "ocean",
            "catalogs/ocean.json",
            meta(vec![
                ("model", CellValue::set(vec!["ACCESS-OM2", "MOM6"])),
                ("variable", CellValue::set(vec!["temp", "salt"])),
                ("frequency", CellValue::scalar("daily")),
            ]),
            false,
        )
        .unwrap();
    registry
        .add(
            "atmos",
            "catalogs/atmos.json",
            meta(vec![
                ("model", CellValue::set(vec!["UM"])),
                ("frequency", CellValue::scalar("monthly")),
            ]),
            false,
        )
        .unwrap();
    registry
        .add("bare", "catalogs/bare.json", meta(vec![]), false)
        .unwrap();

    let reloaded = reload(&registry);
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["ocean", "atmos", "bare"]);
    assert_eq!(reloaded.columns(), registry.columns());
    assert_round_trip(&registry);
}

#[test]
fn test_awkward_values_round_trip() {
    let mut registry = Registry::new();
    registry
        .add(
            "tricky, key",
            "path with \"quotes\".json",
            meta(vec![
                ("notes", CellValue::scalar("line\nbreak, and \"quotes\"")),
                ("tags", CellValue::set(vec!["a;b", "c\\d", "plain"])),
                ("mixed", CellValue::set(vec![Scalar::Int(7), Scalar::Float(7.5)])),
            ]),
            false,
        )
        .unwrap();
    // Mixed-family sets arise from unioning differently-typed adds
    registry
        .add(
            "tricky, key",
            "path with \"quotes\".json",
            meta(vec![("mixed", CellValue::set(vec![Scalar::Text("7".to_string())]))]),
            false,
        )
        .unwrap();
    registry
        .add(
            "tricky, key",
            "path with \"quotes\".json",
            meta(vec![("mixed", CellValue::set(vec![Scalar::Bool(false)]))]),
            false,
        )
        .unwrap();

    let cell = registry.get("tricky, key").unwrap().get("mixed").unwrap();
    assert_eq!(cell.as_set().unwrap().len(), 4);
    assert_round_trip(&registry);
}

#[test]
fn test_absent_cell_differs_from_empty_string() {
    let mut registry = Registry::new();
    registry
        .add(
            "a",
            "cat/a.json",
            meta(vec![("comment", CellValue::scalar(""))]),
            false,
        )
        .unwrap();
    registry.add("b", "cat/b.json", meta(vec![]), false).unwrap();

    let reloaded = reload(&registry);
    assert_eq!(
        reloaded.get("a").unwrap().get("comment"),
        Some(&CellValue::scalar(""))
    );
    assert!(reloaded.get("b").unwrap().get("comment").is_none());
    assert_round_trip(&registry);
}

#[test]
fn test_int_and_float_stay_distinct() {
    let mut registry = Registry::new();
    registry
        .add(
            "a",
            "cat/a.json",
            meta(vec![("levels", CellValue::set(vec![Scalar::Int(2), Scalar::Float(2.0)]))]),
            false,
        )
        .unwrap();

    let reloaded = reload(&registry);
    let cell = reloaded.get("a").unwrap().get("levels").unwrap();
    assert_eq!(cell.as_set().unwrap().len(), 2);
    assert_round_trip(&registry);
}

#[test]
fn test_loaded_registry_has_no_retained_query() {
    let mut registry = Registry::new();
    registry
        .add(
            "a",
            "cat/a.json",
            meta(vec![("variable", CellValue::scalar("T"))]),
            false,
        )
        .unwrap();
    let hits = registry
        .search(
            &dfcat::Query::new().with("variable", vec!["T"]),
            dfcat::MatchMode::Exact,
        )
        .unwrap();
    assert!(hits.retained_query().is_some());

    let reloaded = reload(&hits);
    assert!(reloaded.retained_query().is_none());
}

#[test]
fn test_save_and_load_via_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("registry.dfcat");

    let mut registry = Registry::new();
    registry
        .add(
            "ocean",
            "catalogs/ocean.json",
            meta(vec![("model", CellValue::set(vec!["ACCESS-OM2"]))]),
            false,
        )
        .unwrap();

    persist::save_path(&registry, &path).unwrap();
    let reloaded = persist::load_path(&path).unwrap();
    assert_eq!(reloaded, registry);
}

#[test]
fn test_builtin_driver_reads_saved_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("registry.dfcat");

    let mut registry = Registry::new();
    registry
        .add("a", "cat/a.json", meta(vec![]), false)
        .unwrap();
    persist::save_path(&registry, &path).unwrap();

    let reloaded = dfcat::open_with_driver(dfcat::BUILTIN_DRIVER, &path).unwrap();
    assert_eq!(reloaded, registry);
}
