// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for registry cells
//!
//! This module provides:
//! - `Scalar`: the primitive value type stored in registry cells
//! - `CellValue`: a tagged scalar/set variant for mixed-cardinality columns
//! - `ColumnKind`: the per-column classification established on first use
//!
//! Set cells are always kept canonical: deduplicated and sorted under a
//! fixed total order over `Scalar`, so that equality and the persisted
//! representation are deterministic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A primitive cell value: text, integer, float or boolean.
///
/// `Int` and `Float` are distinct values even when numerically equal (both
/// can live in the same set, and persistence preserves which one was
/// stored), but exact-mode search compares them numerically via
/// [`Scalar::matches_exact`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float; non-finite values are rejected at the API boundary
    Float(f64),
    /// UTF-8 text
    Text(String),
}

impl Scalar {
    /// Return the text content if this is a `Text` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the numeric value of an `Int` or `Float`
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Return the boolean value if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Human-readable type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
        }
    }

    /// Whether the value can be stored and round-tripped.
    ///
    /// Only non-finite floats are unrepresentable: the persisted format
    /// encodes primitives as JSON, which has no NaN/Inf.
    pub fn is_storable(&self) -> bool {
        match self {
            Scalar::Float(x) => x.is_finite(),
            _ => true,
        }
    }

    /// Type-aware equality for exact-mode search: numerics compare
    /// numerically (`Int(2)` matches `Float(2.0)`), everything else by
    /// exact value, case-sensitive.
    pub fn matches_exact(&self, other: &Scalar) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Family used for ordering and for the uniform-collection rule:
    /// booleans, numerics (`Int` and `Float` together) and text.
    pub(crate) fn type_rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Int(_) | Scalar::Float(_) => 1,
            Scalar::Text(_) => 2,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    /// Canonical total order: `Bool < numeric < Text`; `false < true`;
    /// numerics by value with `Int` ordered before a numerically-equal
    /// `Float`; text byte-wise.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.type_rank().cmp(&other.type_rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::Int(a), Scalar::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Scalar::Float(a), Scalar::Int(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            _ => unreachable!("type ranks already compared"),
        }
    }
}

impl fmt::Display for Scalar {
    /// Textual form used for regex matching: text is unquoted, numbers and
    /// booleans print in their natural form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Classification of a metadata column, established the first time the
/// column is observed and immutable for the lifetime of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Cells hold a single primitive
    Scalar,
    /// Cells hold a canonicalized collection of primitives
    Set,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Scalar => "scalar",
            ColumnKind::Set => "set",
        };
        write!(f, "{}", name)
    }
}

/// One metadata cell: either a bare primitive or a canonical set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Single primitive value
    Scalar(Scalar),
    /// Deduplicated collection, sorted in the canonical `Scalar` order
    Set(Vec<Scalar>),
}

impl CellValue {
    /// Build a scalar cell
    pub fn scalar(value: impl Into<Scalar>) -> Self {
        CellValue::Scalar(value.into())
    }

    /// Build a set cell, canonicalizing the supplied values
    pub fn set<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        CellValue::Set(canonicalize(values.into_iter().map(Into::into).collect()))
    }

    /// The column kind implied by this cell's shape
    pub fn kind(&self) -> ColumnKind {
        match self {
            CellValue::Scalar(_) => ColumnKind::Scalar,
            CellValue::Set(_) => ColumnKind::Set,
        }
    }

    /// Iterate the cell's elements; a scalar cell is a one-element set
    pub fn elements(&self) -> impl Iterator<Item = &Scalar> {
        match self {
            CellValue::Scalar(v) => std::slice::from_ref(v).iter(),
            CellValue::Set(vs) => vs.iter(),
        }
    }

    /// Return the inner value if this is a scalar cell
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            CellValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Return the inner values if this is a set cell
    pub fn as_set(&self) -> Option<&[Scalar]> {
        match self {
            CellValue::Set(vs) => Some(vs),
            _ => None,
        }
    }

    /// Re-canonicalize in place; cheap when already canonical
    pub(crate) fn canonicalized(self) -> Self {
        match self {
            CellValue::Set(vs) => CellValue::Set(canonicalize(vs)),
            scalar => scalar,
        }
    }
}

/// Sort into the canonical order and drop duplicates
pub(crate) fn canonicalize(mut values: Vec<Scalar>) -> Vec<Scalar> {
    values.sort();
    values.dedup();
    values
}

/// Canonical union of two already-canonical sets
pub(crate) fn union(a: &[Scalar], b: &[Scalar]) -> Vec<Scalar> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    merged.extend_from_slice(a);
    merged.extend_from_slice(b);
    canonicalize(merged)
}
