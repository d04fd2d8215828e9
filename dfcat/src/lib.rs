// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! dfcat - a tabular registry of sub-catalog references
//!
//! A registry holds one record per independently-loadable sub-catalog:
//! a unique key, an opaque locator, and searchable metadata whose columns
//! may be scalar or multi-valued. Its job is discovery - given many
//! sub-catalogs, find which ones match criteria (say, "contains field X
//! and variable Y") without loading the sub-catalogs themselves.
//!
//! Core pieces:
//! - [`Registry`]: the ordered in-memory record store with its column
//!   schema and merge semantics
//! - [`Query`]/[`MatchMode`] and [`Registry::search`]: multi-column,
//!   multi-value filtering that remembers its query
//! - [`persist::save`]/[`persist::load`]: lossless delimited-text
//!   persistence with a JSON schema descriptor
//! - [`SubCatalogSource`] and [`resolve`]: sequential, warning-tolerant
//!   binding of matched records to live sub-catalog handles
//! - [`driver`]: a local name → constructor table replacing
//!   host-framework plugin discovery
//!
//! Single-threaded by design: concurrent mutation of one registry needs
//! external serialization by the caller.

pub mod driver;
pub mod error;
pub mod persist;
pub mod registry;
pub mod search;
pub mod source;
pub mod value;

pub use driver::{open_with_driver, register_driver, CatalogDriver, BUILTIN_DRIVER};
pub use error::{CatalogError, CatalogResult};
pub use registry::{AddOutcome, Record, Registry};
pub use search::{MatchMode, Query};
pub use source::{resolve, resolve_one, Resolution, ResolutionWarning, SourceError, SubCatalogSource};
pub use value::{CellValue, ColumnKind, Scalar};
