// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory registry of sub-catalog references
//!
//! This module provides:
//! - `Record`: one entry (key, locator, metadata) describing a sub-catalog
//! - `Registry`: the ordered key → record store with its column schema
//! - The merge engine applied when an add targets an existing key or when
//!   two registries are combined
//!
//! A column's kind (scalar or set) is inferred from the first value
//! observed for it and is immutable for the lifetime of the registry.
//! Insertion order of keys is preserved for deterministic iteration and
//! search-result ordering.

use std::collections::{BTreeMap, HashMap};

use crate::error::{CatalogError, CatalogResult};
use crate::search::{MatchMode, Query};
use crate::value::{union, CellValue, ColumnKind, Scalar};

/// Whether an [`Registry::add`] call created a new entry or merged into an
/// existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The key was new; a record was inserted
    Created,
    /// The key existed; the incoming record was merged in
    Merged,
}

impl AddOutcome {
    /// True if the call inserted a new record
    pub fn is_created(&self) -> bool {
        matches!(self, AddOutcome::Created)
    }
}

/// One registry entry: a unique key, an opaque locator used to later open
/// the referenced sub-catalog, and searchable metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    locator: String,
    metadata: HashMap<String, CellValue>,
}

impl Record {
    pub(crate) fn from_parts(
        key: String,
        locator: String,
        metadata: HashMap<String, CellValue>,
    ) -> Self {
        Self {
            key,
            locator,
            metadata,
        }
    }

    /// Unique key of the entry
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Opaque locator for the referenced sub-catalog
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// All metadata cells
    pub fn metadata(&self) -> &HashMap<String, CellValue> {
        &self.metadata
    }

    /// Look up one metadata cell; `None` means the column is absent on
    /// this record
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.metadata.get(column)
    }
}

/// Ordered mapping from unique key to [`Record`], together with the column
/// schema and, for search results, the query that produced them.
///
/// Created empty with [`Registry::new`] or reconstructed from a file via
/// [`load`](crate::persist::load); mutated only through [`Registry::add`]
/// and [`Registry::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    records: HashMap<String, Record>,
    order: Vec<String>,
    schema: HashMap<String, ColumnKind>,
    schema_order: Vec<String>,
    retained: Option<(Query, MatchMode)>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// True if an entry with this key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().map(|key| &self.records[key])
    }

    /// Metadata column names in schema-establishment order
    pub fn columns(&self) -> &[String] {
        &self.schema_order
    }

    /// The established kind of a column, if the column has been observed
    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.schema.get(column).copied()
    }

    /// The query and mode that produced this registry, if it is the result
    /// of a [`search`](Registry::search)
    pub fn retained_query(&self) -> Option<(&Query, MatchMode)> {
        self.retained.as_ref().map(|(query, mode)| (query, *mode))
    }

    /// Add an entry, or merge into the existing entry with the same key.
    ///
    /// New columns are classified from the shape of their value (bare
    /// primitive → scalar, collection → set) and that kind is enforced for
    /// the lifetime of the registry. When several new columns appear in
    /// one call they are recorded in name order.
    ///
    /// Merging an existing key unions set-kind columns and keeps one-sided
    /// values; unequal scalar values (the locator included) fail with
    /// [`CatalogError::Conflict`] unless `overwrite` is set, in which case
    /// the incoming value wins.
    ///
    /// The call is atomic: on any error the registry is left exactly as it
    /// was.
    pub fn add(
        &mut self,
        key: &str,
        locator: &str,
        metadata: HashMap<String, CellValue>,
        overwrite: bool,
    ) -> CatalogResult<AddOutcome> {
        if key.is_empty() {
            return Err(CatalogError::Validation(
                "entry key must be a non-empty string".to_string(),
            ));
        }
        for (column, value) in &metadata {
            if column.is_empty() {
                return Err(CatalogError::Validation(
                    "metadata column names must be non-empty".to_string(),
                ));
            }
            if matches!(value, CellValue::Set(vs) if vs.is_empty()) {
                return Err(CatalogError::Validation(format!(
                    "column '{}': a set cell must contain at least one value",
                    column
                )));
            }
            for element in value.elements() {
                if !element.is_storable() {
                    return Err(CatalogError::Validation(format!(
                        "column '{}': non-finite numbers cannot be stored",
                        column
                    )));
                }
            }
            if let CellValue::Set(elements) = value {
                if elements
                    .windows(2)
                    .any(|pair| pair[0].type_rank() != pair[1].type_rank())
                {
                    return Err(CatalogError::Validation(format!(
                        "column '{}': collection elements must share one primitive type",
                        column
                    )));
                }
            }
        }

        // Classify before mutating anything so a later failure cannot
        // leave a half-applied schema.
        let mut new_columns: Vec<(String, ColumnKind)> = Vec::new();
        for (column, value) in &metadata {
            match self.schema.get(column) {
                Some(kind) if *kind != value.kind() => {
                    return Err(CatalogError::TypeKindConflict {
                        column: column.clone(),
                        expected: *kind,
                        found: value.kind(),
                    });
                }
                Some(_) => {}
                None => new_columns.push((column.clone(), value.kind())),
            }
        }
        new_columns.sort_by(|a, b| a.0.cmp(&b.0));

        let metadata: HashMap<String, CellValue> = metadata
            .into_iter()
            .map(|(column, value)| (column, value.canonicalized()))
            .collect();

        let (record, outcome) = match self.records.get(key) {
            Some(existing) => (
                merge_record(existing, locator, &metadata, overwrite)?,
                AddOutcome::Merged,
            ),
            None => (
                Record::from_parts(key.to_string(), locator.to_string(), metadata),
                AddOutcome::Created,
            ),
        };

        // Nothing can fail past this point; apply schema and record.
        for (column, kind) in new_columns {
            self.schema.insert(column.clone(), kind);
            self.schema_order.push(column);
        }
        if outcome.is_created() {
            self.order.push(key.to_string());
        }
        log::debug!(
            "{} entry '{}' ({} metadata columns)",
            if outcome.is_created() { "created" } else { "merged" },
            key,
            record.metadata.len()
        );
        self.records.insert(key.to_string(), record);

        Ok(outcome)
    }

    /// Combine two registries into a new one.
    ///
    /// Fails with [`CatalogError::TypeKindConflict`] if the registries
    /// disagree on a column's kind. Otherwise every record of `other` is
    /// added into a copy of `self`, in `other`'s iteration order, under
    /// the usual per-record merge rule (without overwrite). The result
    /// keeps `self`'s retained query, if any.
    pub fn merge(&self, other: &Registry) -> CatalogResult<Registry> {
        for column in &other.schema_order {
            let kind = other.schema[column];
            if let Some(existing) = self.schema.get(column) {
                if *existing != kind {
                    return Err(CatalogError::TypeKindConflict {
                        column: column.clone(),
                        expected: *existing,
                        found: kind,
                    });
                }
            }
        }

        let mut merged = self.clone();
        for column in &other.schema_order {
            merged.adopt_column(column, other.schema[column]);
        }
        for record in other.iter() {
            merged.add(&record.key, &record.locator, record.metadata.clone(), false)?;
        }
        log::debug!(
            "merged registries: {} + {} entries -> {}",
            self.len(),
            other.len(),
            merged.len()
        );
        Ok(merged)
    }

    /// Distinct values per metadata column, in canonical order.
    ///
    /// Set cells contribute their elements; records missing a column
    /// contribute nothing. Every schema column appears in the result, with
    /// an empty list when no record carries it.
    pub fn unique(&self) -> BTreeMap<String, Vec<Scalar>> {
        let mut collected: BTreeMap<String, Vec<Scalar>> = self
            .schema_order
            .iter()
            .map(|column| (column.clone(), Vec::new()))
            .collect();
        for record in self.iter() {
            for (column, cell) in &record.metadata {
                if let Some(values) = collected.get_mut(column) {
                    values.extend(cell.elements().cloned());
                }
            }
        }
        collected
            .into_iter()
            .map(|(column, values)| (column, crate::value::canonicalize(values)))
            .collect()
    }

    /// Number of distinct values per metadata column
    pub fn nunique(&self) -> BTreeMap<String, usize> {
        self.unique()
            .into_iter()
            .map(|(column, values)| (column, values.len()))
            .collect()
    }

    /// Record a schema column if absent; used when rebuilding a registry
    /// from a descriptor or copying a schema into a search result.
    pub(crate) fn adopt_column(&mut self, column: &str, kind: ColumnKind) {
        if !self.schema.contains_key(column) {
            self.schema.insert(column.to_string(), kind);
            self.schema_order.push(column.to_string());
        }
    }

    /// Append a fully-built record; returns false if the key is taken.
    /// Callers are responsible for schema consistency.
    pub(crate) fn insert_record(&mut self, record: Record) -> bool {
        if self.records.contains_key(&record.key) {
            return false;
        }
        self.order.push(record.key.clone());
        self.records.insert(record.key.clone(), record);
        true
    }

    pub(crate) fn set_retained_query(&mut self, query: Query, mode: MatchMode) {
        self.retained = Some((query, mode));
    }
}

/// Merge an incoming add into an existing record, producing the merged
/// record without touching the registry.
fn merge_record(
    existing: &Record,
    locator: &str,
    incoming: &HashMap<String, CellValue>,
    overwrite: bool,
) -> CatalogResult<Record> {
    // The locator is a scalar column under the same conflict rule.
    let locator = if existing.locator == locator || overwrite {
        locator.to_string()
    } else {
        return Err(CatalogError::Conflict {
            key: existing.key.clone(),
            column: "locator".to_string(),
            existing: existing.locator.clone(),
            incoming: locator.to_string(),
        });
    };

    let mut metadata = existing.metadata.clone();
    for (column, value) in incoming {
        match metadata.get(column) {
            None => {
                metadata.insert(column.clone(), value.clone());
            }
            Some(CellValue::Set(current)) => {
                let unioned = match value {
                    CellValue::Set(added) => union(current, added),
                    // Shapes were validated against the schema upstream
                    CellValue::Scalar(_) => unreachable!("kind mismatch survived validation"),
                };
                metadata.insert(column.clone(), CellValue::Set(unioned));
            }
            Some(CellValue::Scalar(current)) => {
                let added = match value {
                    CellValue::Scalar(added) => added,
                    CellValue::Set(_) => unreachable!("kind mismatch survived validation"),
                };
                if current != added {
                    if !overwrite {
                        return Err(CatalogError::Conflict {
                            key: existing.key.clone(),
                            column: column.clone(),
                            existing: current.to_string(),
                            incoming: added.to_string(),
                        });
                    }
                    metadata.insert(column.clone(), value.clone());
                }
            }
        }
    }

    Ok(Record::from_parts(existing.key.clone(), locator, metadata))
}
