// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Multi-column, multi-value search over a registry
//!
//! A query maps column names to one-or-more patterns. A record matches a
//! queried column if ANY pattern matches ANY element of the cell (a scalar
//! cell is treated as a one-element set), and matches the whole query only
//! if EVERY queried column matches: AND across columns, OR within a
//! column's pattern list. [`Registry::search_all`] tightens the within-column
//! rule for set-kind columns: every pattern must be satisfied by some
//! element, so querying `variable = ["a", "b"]` returns only entries that
//! carry both.
//!
//! Querying a column the registry's schema has never seen matches nothing
//! for that clause rather than erroring. This keeps one query usable
//! across registries built from heterogeneous sub-catalog schemas.

use regex::Regex;

use crate::error::{CatalogError, CatalogResult};
use crate::registry::Registry;
use crate::value::{CellValue, ColumnKind, Scalar};

/// How query patterns are evaluated against cell elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Pattern equals element, type-aware: numerics compare numerically,
    /// everything else by exact case-sensitive value
    Exact,
    /// Pattern is a regular expression, matched unanchored against the
    /// textual form of the element
    Regex,
}

/// An ordered mapping from column name to a non-empty pattern list.
///
/// In regex mode patterns are read through their textual form, so `Text`
/// patterns are the usual choice there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<(String, Vec<Scalar>)>,
}

impl Query {
    /// Create an empty query (matches every record)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause for `column` with one-or-more patterns; builder-style
    pub fn with<I, T>(mut self, column: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        self.push(column, patterns);
        self
    }

    /// Add a clause for `column` with one-or-more patterns
    pub fn push<I, T>(&mut self, column: &str, patterns: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        self.clauses
            .push((column.to_string(), patterns.into_iter().map(Into::into).collect()));
    }

    /// True if the query has no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterate `(column, patterns)` clauses in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Scalar])> {
        self.clauses
            .iter()
            .map(|(column, patterns)| (column.as_str(), patterns.as_slice()))
    }
}

/// A query clause with its patterns prepared for the selected mode
enum CompiledClause<'a> {
    Exact(&'a str, &'a [Scalar]),
    Regex(&'a str, Vec<Regex>),
}

impl CompiledClause<'_> {
    fn column(&self) -> &str {
        match self {
            CompiledClause::Exact(column, _) => column,
            CompiledClause::Regex(column, _) => column,
        }
    }

    /// ANY pattern matches ANY element of the cell
    fn matches_any(&self, cell: &CellValue) -> bool {
        match self {
            CompiledClause::Exact(_, patterns) => cell.elements().any(|element| {
                patterns.iter().any(|pattern| pattern.matches_exact(element))
            }),
            CompiledClause::Regex(_, patterns) => cell.elements().any(|element| {
                let text = element.to_string();
                patterns.iter().any(|pattern| pattern.is_match(&text))
            }),
        }
    }

    /// EVERY pattern matches at least one element of the cell
    fn matches_all(&self, cell: &CellValue) -> bool {
        match self {
            CompiledClause::Exact(_, patterns) => patterns.iter().all(|pattern| {
                cell.elements().any(|element| pattern.matches_exact(element))
            }),
            CompiledClause::Regex(_, patterns) => patterns.iter().all(|pattern| {
                cell.elements()
                    .any(|element| pattern.is_match(&element.to_string()))
            }),
        }
    }
}

impl Registry {
    /// Evaluate `query` against the registry, producing a new independent
    /// registry of the matching records in their original relative order.
    ///
    /// The result carries the full column schema and is annotated with the
    /// exact query and mode (see [`Registry::retained_query`]), which the
    /// source binder can re-issue to each resolved sub-catalog. An empty
    /// query matches everything. Patterns that clause a column absent from
    /// the schema match nothing; an invalid regex pattern fails with
    /// [`CatalogError::Validation`].
    pub fn search(&self, query: &Query, mode: MatchMode) -> CatalogResult<Registry> {
        self.search_impl(query, mode, false)
    }

    /// Like [`Registry::search`], but a set-kind column matches only when
    /// EVERY pattern of its clause matches some element of the cell.
    ///
    /// Querying `variable = ["a", "b"]` in exact mode thus returns only
    /// entries whose variable set contains both `"a"` and `"b"`. Scalar-kind
    /// columns are unaffected: a scalar cell holds one value, so a
    /// multi-pattern clause keeps its any-of reading there.
    pub fn search_all(&self, query: &Query, mode: MatchMode) -> CatalogResult<Registry> {
        self.search_impl(query, mode, true)
    }

    fn search_impl(
        &self,
        query: &Query,
        mode: MatchMode,
        require_all: bool,
    ) -> CatalogResult<Registry> {
        let mut empty_pattern_lists = query
            .iter()
            .filter(|(_, patterns)| patterns.is_empty())
            .map(|(column, _)| column);
        if let Some(column) = empty_pattern_lists.next() {
            return Err(CatalogError::Validation(format!(
                "query clause for column '{}' has no patterns",
                column
            )));
        }

        let clauses: Vec<CompiledClause<'_>> = match mode {
            MatchMode::Exact => query
                .iter()
                .map(|(column, patterns)| CompiledClause::Exact(column, patterns))
                .collect(),
            MatchMode::Regex => query
                .iter()
                .map(|(column, patterns)| {
                    let compiled = patterns
                        .iter()
                        .map(|pattern| {
                            let text = pattern.to_string();
                            Regex::new(&text).map_err(|e| {
                                CatalogError::Validation(format!(
                                    "invalid regex pattern '{}': {}",
                                    text, e
                                ))
                            })
                        })
                        .collect::<CatalogResult<Vec<Regex>>>()?;
                    Ok(CompiledClause::Regex(column, compiled))
                })
                .collect::<CatalogResult<Vec<_>>>()?,
        };

        let mut results = Registry::new();
        for (column, kind) in self.columns().iter().map(|c| (c, self.column_kind(c))) {
            if let Some(kind) = kind {
                results.adopt_column(column, kind);
            }
        }

        for record in self.iter() {
            let matched = clauses.iter().all(|clause| {
                record.get(clause.column()).is_some_and(|cell| {
                    if require_all && cell.kind() == ColumnKind::Set {
                        clause.matches_all(cell)
                    } else {
                        clause.matches_any(cell)
                    }
                })
            });
            if matched {
                results.insert_record(record.clone());
            }
        }

        log::debug!(
            "search matched {} of {} entries ({} clauses, {:?} mode)",
            results.len(),
            self.len(),
            query.clauses.len(),
            mode
        );
        results.set_retained_query(query.clone(), mode);
        Ok(results)
    }
}
