//! Integration tests for warning-tolerant source resolution
//!
//! Scenario from the design contract: of three matched entries, two
//! sub-catalog sources lack filter capability. Resolution must return all
//! three handles, exactly two warnings, and the capable source's handle
//! filtered - never aborting the overall operation.

use std::collections::HashMap;

use dfcat::{
    resolve, CellValue, MatchMode, Query, Registry, SourceError, SubCatalogSource,
};

/// A stand-in sub-catalog: the locator it was opened from and whether the
/// registry query was applied to it.
#[derive(Debug, PartialEq)]
struct FakeSubCatalog {
    locator: String,
    filtered: bool,
}

/// Source that can only filter sub-catalogs whose locator says so
struct PartiallyCapableSource;

impl SubCatalogSource for PartiallyCapableSource {
    type Handle = FakeSubCatalog;

    fn open(&self, locator: &str) -> Result<FakeSubCatalog, SourceError> {
        Ok(FakeSubCatalog {
            locator: locator.to_string(),
            filtered: false,
        })
    }

    fn filter(
        &self,
        handle: &FakeSubCatalog,
        _query: &Query,
        _mode: MatchMode,
    ) -> Result<FakeSubCatalog, SourceError> {
        if !handle.locator.contains("capable") {
            return Err(SourceError::Unsupported);
        }
        Ok(FakeSubCatalog {
            locator: handle.locator.clone(),
            filtered: true,
        })
    }
}

fn searched_registry() -> Registry {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut registry = Registry::new();
    for (key, locator) in [
        ("first", "cat/first.json"),
        ("second", "cat/capable.json"),
        ("third", "cat/third.json"),
    ] {
        let mut meta = HashMap::new();
        meta.insert("variable".to_string(), CellValue::scalar("temp"));
        registry.add(key, locator, meta, false).unwrap();
    }
    registry
        .search(&Query::new().with("variable", vec!["temp"]), MatchMode::Exact)
        .unwrap()
}

#[test]
fn test_partial_filter_failures_collect_warnings() {
    let registry = searched_registry();
    assert_eq!(registry.len(), 3);

    let resolution = resolve(&registry, &PartiallyCapableSource, true).unwrap();

    assert_eq!(resolution.len(), 3);
    assert_eq!(resolution.warnings().len(), 2);

    let warned: Vec<&str> = resolution
        .warnings()
        .iter()
        .map(|warning| warning.key.as_str())
        .collect();
    assert_eq!(warned, vec!["first", "third"]);

    assert!(resolution.get("second").unwrap().filtered);
    assert!(!resolution.get("first").unwrap().filtered);
    assert!(!resolution.get("third").unwrap().filtered);
}

#[test]
fn test_warning_order_matches_iteration_order() {
    let registry = searched_registry();
    let resolution = resolve(&registry, &PartiallyCapableSource, true).unwrap();

    let keys: Vec<&str> = resolution
        .handles()
        .iter()
        .map(|(key, _)| key.as_str())
        .collect();
    assert_eq!(keys, vec!["first", "second", "third"]);
}

#[test]
fn test_pass_query_false_never_filters() {
    let registry = searched_registry();
    let resolution = resolve(&registry, &PartiallyCapableSource, false).unwrap();

    assert!(resolution.warnings().is_empty());
    assert!(resolution
        .handles()
        .iter()
        .all(|(_, handle)| !handle.filtered));
}
