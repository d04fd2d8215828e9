// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Local driver factory registry
//!
//! Maps string driver names to constructors that open a path into a
//! [`Registry`]. This is an explicit, in-process replacement for
//! host-framework plugin discovery: embedders register their own drivers
//! and look them up by name, with no dynamic loading involved.
//!
//! The built-in `"dfcat"` driver reads the persisted registry format and
//! is registered automatically on first use of [`open_with_driver`].

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{CatalogError, CatalogResult};
use crate::persist;
use crate::registry::Registry;

/// Name under which the persisted-format driver registers itself
pub const BUILTIN_DRIVER: &str = "dfcat";

/// A named constructor turning a path into a loaded [`Registry`]
pub trait CatalogDriver: Send + Sync {
    /// Open the registry stored at `path`
    fn open(&self, path: &Path) -> CatalogResult<Registry>;
}

lazy_static! {
    /// Global registry of catalog drivers
    /// Maps driver name -> driver instance
    static ref DRIVER_REGISTRY: RwLock<HashMap<String, Arc<dyn CatalogDriver>>> =
        RwLock::new(HashMap::new());
}

/// The built-in driver for the persisted registry format
struct FileDriver;

impl CatalogDriver for FileDriver {
    fn open(&self, path: &Path) -> CatalogResult<Registry> {
        persist::load_path(path)
    }
}

/// Register a driver under a name
pub fn register_driver(name: &str, driver: Arc<dyn CatalogDriver>) -> CatalogResult<()> {
    let mut registry = DRIVER_REGISTRY
        .write()
        .map_err(|e| CatalogError::Internal(format!("failed to acquire write lock: {}", e)))?;

    if registry.contains_key(name) {
        return Err(CatalogError::DuplicateDriver(name.to_string()));
    }

    registry.insert(name.to_string(), driver);
    Ok(())
}

/// Remove a driver from the registry; returns whether it existed
pub fn unregister_driver(name: &str) -> CatalogResult<bool> {
    let mut registry = DRIVER_REGISTRY
        .write()
        .map_err(|e| CatalogError::Internal(format!("failed to acquire write lock: {}", e)))?;

    Ok(registry.remove(name).is_some())
}

/// Check if a driver is registered
pub fn driver_exists(name: &str) -> CatalogResult<bool> {
    let registry = DRIVER_REGISTRY
        .read()
        .map_err(|e| CatalogError::Internal(format!("failed to acquire read lock: {}", e)))?;

    Ok(registry.contains_key(name))
}

/// List all registered driver names
pub fn list_drivers() -> CatalogResult<Vec<String>> {
    let registry = DRIVER_REGISTRY
        .read()
        .map_err(|e| CatalogError::Internal(format!("failed to acquire read lock: {}", e)))?;

    Ok(registry.keys().cloned().collect())
}

/// Open a registry through a named driver
pub fn open_with_driver<P: AsRef<Path>>(name: &str, path: P) -> CatalogResult<Registry> {
    ensure_builtin()?;

    let driver = {
        let registry = DRIVER_REGISTRY
            .read()
            .map_err(|e| CatalogError::Internal(format!("failed to acquire read lock: {}", e)))?;
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownDriver(name.to_string()))?
    };

    // The lock is released before the driver runs; a slow open must not
    // block registration.
    driver.open(path.as_ref())
}

fn ensure_builtin() -> CatalogResult<()> {
    if driver_exists(BUILTIN_DRIVER)? {
        return Ok(());
    }
    match register_driver(BUILTIN_DRIVER, Arc::new(FileDriver)) {
        Ok(()) | Err(CatalogError::DuplicateDriver(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EmptyDriver;

    impl CatalogDriver for EmptyDriver {
        fn open(&self, _path: &Path) -> CatalogResult<Registry> {
            Ok(Registry::new())
        }
    }

    #[test]
    #[serial]
    fn test_register_and_open() {
        let _ = unregister_driver("empty");
        register_driver("empty", Arc::new(EmptyDriver)).unwrap();

        let registry = open_with_driver("empty", Path::new("ignored")).unwrap();
        assert!(registry.is_empty());

        assert!(unregister_driver("empty").unwrap());
    }

    #[test]
    #[serial]
    fn test_duplicate_registration() {
        let _ = unregister_driver("dup");
        register_driver("dup", Arc::new(EmptyDriver)).unwrap();

        let err = register_driver("dup", Arc::new(EmptyDriver)).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateDriver(_)));

        let _ = unregister_driver("dup");
    }

    #[test]
    #[serial]
    fn test_unknown_driver() {
        let err = open_with_driver("no-such-driver", Path::new("ignored")).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownDriver(_)));
    }

    #[test]
    #[serial]
    fn test_builtin_driver_is_listed_after_use() {
        let _ = open_with_driver("no-such-driver", Path::new("ignored"));
        assert!(driver_exists(BUILTIN_DRIVER).unwrap());
        assert!(list_drivers().unwrap().contains(&BUILTIN_DRIVER.to_string()));
    }
}
