// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for registry operations

use crate::value::ColumnKind;
use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Main error type for catalog operations.
///
/// All mutation and read operations fail atomically on the first
/// violation; only [`resolve`](crate::source::resolve) tolerates
/// per-record failures, and it reports those as
/// [`ResolutionWarning`](crate::source::ResolutionWarning)s rather than
/// through this type.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Malformed key, metadata shape, query or cardinality
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value's shape disagrees with the column's established kind
    #[error("Column '{column}' is {expected}-kind but received a {found} value")]
    TypeKindConflict {
        /// Column whose kind was violated
        column: String,
        /// Kind established when the column was first observed
        expected: ColumnKind,
        /// Kind implied by the offending value
        found: ColumnKind,
    },

    /// Scalar-column values disagree on merge without overwrite
    #[error(
        "Conflicting values for scalar column '{column}' of entry '{key}': \
         existing {existing}, incoming {incoming} (pass overwrite=true to replace)"
    )]
    Conflict {
        /// Key of the entry being merged into
        key: String,
        /// Scalar column with disagreeing values
        column: String,
        /// Value already stored
        existing: String,
        /// Value being added
        incoming: String,
    },

    /// Persisted data is structurally invalid
    #[error("Format error: {0}")]
    Format(String),

    /// A collaborator failed to open a locator
    #[error("Source error: {0}")]
    Source(String),

    /// Driver name already registered
    #[error("Driver '{0}' is already registered")]
    DuplicateDriver(String),

    /// Driver name not registered
    #[error("Unknown driver '{0}'")]
    UnknownDriver(String),

    /// Internal invariant failure (poisoned lock)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
