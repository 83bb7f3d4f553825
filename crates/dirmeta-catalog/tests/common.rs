//! Common test utilities and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use dirmeta_catalog::{
    parse_query, CatalogConfig, DirId, DirectoryTree, MemoryDirectoryTree, MetaValue,
    MetadataCatalog, Query, Selection,
};

/// Directories created by `TestCatalog::standard`.
pub const STANDARD_DIRS: &[&str] = &[
    "/atlas/run1/raw",
    "/atlas/run1/reco",
    "/atlas/run2/raw",
    "/cms/run1",
    "/cms/run3/raw",
];

/// A catalog over an in-memory tree with helpers for building fixtures.
pub struct TestCatalog {
    pub tree: Arc<MemoryDirectoryTree>,
    pub catalog: MetadataCatalog,
}

impl TestCatalog {
    /// Creates an empty catalog with the given configuration.
    pub fn with_config(config: CatalogConfig) -> Self {
        let tree = Arc::new(MemoryDirectoryTree::new());
        let catalog = MetadataCatalog::in_memory(config, tree.clone());
        Self { tree, catalog }
    }

    /// Creates a catalog with `STANDARD_DIRS` and the Color/Size fields.
    pub fn standard() -> Self {
        let fixture = Self::with_config(CatalogConfig::default());
        for path in STANDARD_DIRS {
            fixture.tree.make_dirs(path);
        }
        fixture
            .catalog
            .create_field("Color", "VARCHAR(32)", false)
            .unwrap();
        fixture.catalog.create_field("Size", "INT", false).unwrap();
        fixture
    }

    /// Sets one metadata value, panicking on failure.
    pub fn set(&self, path: &str, field: &str, value: impl Into<MetaValue>) {
        self.catalog
            .set_metadata(path, &assignments(&[(field, value.into())]))
            .unwrap();
    }

    /// Returns the paths selected by a JSON query.
    pub fn find(&self, query: serde_json::Value, scope: &str) -> Vec<String> {
        let query = parse_query(&query).unwrap();
        self.find_query(&query, scope)
    }

    /// Returns the paths selected by a typed query. Unconstrained
    /// selections are expanded to every directory in scope.
    pub fn find_query(&self, query: &Query, scope: &str) -> Vec<String> {
        match self.catalog.find_directories(query, scope).unwrap().selection {
            Selection::Unconstrained => {
                let all = self.tree.all_directories().unwrap();
                self.tree.paths(&all).unwrap().into_values().collect()
            }
            Selection::Directories(dirs) => dirs.into_values().collect(),
        }
    }

    /// Returns the paths of every directory below `scope`, itself included.
    pub fn subtree_paths(&self, scope: &str) -> Vec<String> {
        let dir = self.dir(scope);
        let ids = self.tree.subtree_ids(dir, true).unwrap();
        self.tree.paths(&ids).unwrap().into_values().collect()
    }

    /// Resolves a path.
    pub fn dir(&self, path: &str) -> DirId {
        self.tree.find_directory(path).unwrap()
    }
}

/// Builds an assignment map.
pub fn assignments(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
