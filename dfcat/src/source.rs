// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Binding registry entries to live sub-catalog handles
//!
//! The registry stores only locators; an external collaborator turns a
//! locator into a usable sub-catalog handle and may optionally filter that
//! handle with the registry's retained search query. Resolution is
//! strictly sequential in registry iteration order so that warning order
//! is deterministic and per-record accounting is unambiguous.
//!
//! Filter failures are deliberately non-fatal: a registry commonly spans
//! sub-catalogs with differing internal schemas, and a query that is
//! meaningless for one of them must not abort the rest. Such failures are
//! collected as [`ResolutionWarning`]s while the unfiltered handle is
//! kept. A failure to *open* a locator, by contrast, is fatal.

use thiserror::Error;

use crate::error::{CatalogError, CatalogResult};
use crate::registry::Registry;
use crate::search::{MatchMode, Query};

/// Error surface of a [`SubCatalogSource`] collaborator
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source has no filter capability
    #[error("filtering is not supported by this source")]
    Unsupported,
    /// The operation failed; the message is collaborator-defined
    #[error("{0}")]
    Failed(String),
}

/// The external collaborator that opens locators into sub-catalog handles.
///
/// `filter` is optional: the default implementation reports
/// [`SourceError::Unsupported`], which [`resolve`] downgrades to a
/// warning. A filtering source returns a *new* handle built from the
/// borrowed one, so the unfiltered handle survives a failed attempt.
pub trait SubCatalogSource {
    /// The sub-catalog handle type produced by this source
    type Handle;

    /// Open a locator into a sub-catalog handle
    fn open(&self, locator: &str) -> Result<Self::Handle, SourceError>;

    /// Apply a registry-level query to an open handle, producing a
    /// filtered handle
    fn filter(
        &self,
        handle: &Self::Handle,
        query: &Query,
        mode: MatchMode,
    ) -> Result<Self::Handle, SourceError> {
        let _ = (handle, query, mode);
        Err(SourceError::Unsupported)
    }
}

/// Non-fatal per-entry diagnostic collected during [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    /// Key of the entry whose filter attempt failed
    pub key: String,
    /// Collaborator-reported reason
    pub reason: String,
}

/// The outcome of [`resolve`]: one handle per registry entry, in registry
/// iteration order, plus the warnings collected along the way.
#[derive(Debug)]
pub struct Resolution<H> {
    handles: Vec<(String, H)>,
    warnings: Vec<ResolutionWarning>,
}

impl<H> Resolution<H> {
    /// Key/handle pairs in registry iteration order
    pub fn handles(&self) -> &[(String, H)] {
        &self.handles
    }

    /// Consume the resolution, yielding the key/handle pairs
    pub fn into_handles(self) -> Vec<(String, H)> {
        self.handles
    }

    /// Warnings collected for entries whose filter attempt failed
    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    /// Look up the handle for one key
    pub fn get(&self, key: &str) -> Option<&H> {
        self.handles
            .iter()
            .find(|(handle_key, _)| handle_key == key)
            .map(|(_, handle)| handle)
    }

    /// Number of resolved handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Open every entry of `registry` through `source`, sequentially.
///
/// When `pass_query` is set and the registry retains a query from a prior
/// [`search`](Registry::search), the query is re-issued to each opened
/// handle via the source's filter capability. A missing capability or a
/// failing filter produces a [`ResolutionWarning`] and keeps the
/// unfiltered handle; an `open` failure aborts with
/// [`CatalogError::Source`].
pub fn resolve<S: SubCatalogSource>(
    registry: &Registry,
    source: &S,
    pass_query: bool,
) -> CatalogResult<Resolution<S::Handle>> {
    let mut handles = Vec::with_capacity(registry.len());
    let mut warnings = Vec::new();

    for record in registry.iter() {
        let mut handle = source.open(record.locator()).map_err(|e| {
            CatalogError::Source(format!(
                "failed to open entry '{}' from '{}': {}",
                record.key(),
                record.locator(),
                e
            ))
        })?;

        if pass_query {
            if let Some((query, mode)) = registry.retained_query() {
                match source.filter(&handle, query, mode) {
                    Ok(filtered) => handle = filtered,
                    Err(e) => {
                        log::warn!(
                            "could not filter sub-catalog '{}': {}; keeping it unfiltered",
                            record.key(),
                            e
                        );
                        warnings.push(ResolutionWarning {
                            key: record.key().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        handles.push((record.key().to_string(), handle));
    }

    Ok(Resolution { handles, warnings })
}

/// Resolve a registry that is expected to contain exactly one entry,
/// yielding that entry's handle directly.
///
/// Fails with [`CatalogError::Validation`] naming the actual entry count
/// otherwise; refine the search first or use [`resolve`].
pub fn resolve_one<S: SubCatalogSource>(
    registry: &Registry,
    source: &S,
    pass_query: bool,
) -> CatalogResult<(S::Handle, Vec<ResolutionWarning>)> {
    if registry.len() != 1 {
        return Err(CatalogError::Validation(format!(
            "expected exactly one entry to resolve, found {}",
            registry.len()
        )));
    }
    let resolution = resolve(registry, source, pass_query)?;
    let Resolution {
        mut handles,
        warnings,
    } = resolution;
    match handles.pop() {
        Some((_, handle)) => Ok((handle, warnings)),
        None => Err(CatalogError::Internal(
            "resolution of a one-entry registry produced no handle".to_string(),
        )),
    }
}
