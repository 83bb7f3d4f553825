//! High-level catalog combining all components.
//!
//! `MetadataCatalog` is the entry point for service layers. It wires the
//! registry, set store, directory metadata, queries, facets and
//! maintenance over one storage backend and one directory tree, and
//! records metrics for every call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use crate::config::CatalogConfig;
use crate::dirmeta::{DirectoryMetadata, DirectoryMetadataStore, RemovalReport, SetOutcome};
use crate::error::{CatalogError, CatalogResult};
use crate::facet::FacetAnalyzer;
use crate::kvstore::{KvStore, MemoryKvStore};
use crate::locking::FieldLocks;
use crate::maintenance::{FieldCreation, MaintenanceOps, PromotionReport};
use crate::metaset::MetadataSetStore;
use crate::metrics::{CatalogOp, MetricsCollector};
use crate::query::{DirectoryQueryResult, Query, QueryEngine};
use crate::registry::FieldRegistry;
use crate::tables::TableStore;
use crate::tree::DirectoryTree;
use crate::types::{Credentials, DirId, FieldValue, MetaValue, SetId};

/// The directory metadata catalog.
pub struct MetadataCatalog {
    config: CatalogConfig,
    registry: Arc<FieldRegistry>,
    sets: Arc<MetadataSetStore>,
    dirmeta: Arc<DirectoryMetadataStore>,
    query: Arc<QueryEngine>,
    facets: FacetAnalyzer,
    maintenance: MaintenanceOps,
    metrics: MetricsCollector,
}

impl MetadataCatalog {
    /// Creates a catalog over the given storage and directory tree.
    pub fn new(config: CatalogConfig, kv: Arc<dyn KvStore>, tree: Arc<dyn DirectoryTree>) -> Self {
        let tables = Arc::new(TableStore::new(kv));
        let locks = Arc::new(FieldLocks::new());
        let registry = Arc::new(FieldRegistry::new(tables.clone(), config.strict_text_length));
        let sets = Arc::new(MetadataSetStore::new(
            tables.clone(),
            registry.clone(),
            config.max_set_depth,
        ));
        let dirmeta = Arc::new(DirectoryMetadataStore::new(
            tables.clone(),
            registry.clone(),
            tree.clone(),
            locks.clone(),
        ));
        let query = Arc::new(QueryEngine::new(
            tables.clone(),
            registry.clone(),
            sets.clone(),
            tree.clone(),
        ));
        let facets = FacetAnalyzer::new(tables.clone(), registry.clone(), query.clone(), tree.clone());
        let maintenance = MaintenanceOps::new(
            tables,
            registry.clone(),
            dirmeta.clone(),
            tree,
            locks,
            config.promote_parameters,
        );

        tracing::info!(
            "Metadata catalog ready (max_set_depth={}, promote_parameters={})",
            config.max_set_depth,
            config.promote_parameters
        );
        Self {
            config,
            registry,
            sets,
            dirmeta,
            query,
            facets,
            maintenance,
            metrics: MetricsCollector::new(),
        }
    }

    /// Creates a catalog with in-memory storage.
    pub fn in_memory(config: CatalogConfig, tree: Arc<dyn DirectoryTree>) -> Self {
        Self::new(config, Arc::new(MemoryKvStore::new()), tree)
    }

    fn timed<T, F>(&self, op: CatalogOp, f: F) -> CatalogResult<T>
    where
        F: FnOnce() -> CatalogResult<T>,
    {
        let _span = tracing::debug_span!("catalog", op = op.as_str()).entered();
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_micros() as u64;
        if let Err(e) = &result {
            if matches!(
                e,
                CatalogError::MetadataConflict { .. } | CatalogError::SetConflict { .. }
            ) {
                self.metrics.record_conflict();
            }
            tracing::debug!("{} failed: {}", op.as_str(), e);
        }
        self.metrics.record_op(op, elapsed, result.is_ok());
        result
    }

    /// The configuration this catalog was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // Fields

    /// Declares a field, promoting matching parameters when it is new.
    pub fn create_field(
        &self,
        name: &str,
        declared_type: &str,
        is_meta_set: bool,
    ) -> CatalogResult<FieldCreation> {
        self.timed(CatalogOp::CreateField, || {
            self.maintenance.create_field(name, declared_type, is_meta_set)
        })
    }

    /// Removes a field together with all its values.
    pub fn delete_field(&self, name: &str) -> CatalogResult<()> {
        self.timed(CatalogOp::DeleteField, || self.maintenance.delete_field(name))
    }

    /// Returns field name to declared type.
    pub fn list_fields(&self) -> CatalogResult<BTreeMap<String, String>> {
        self.timed(CatalogOp::ListFields, || self.registry.list_fields())
    }

    /// Moves the parameters stored under `name` into the field's table.
    pub fn promote_parameter_to_field(&self, name: &str) -> CatalogResult<PromotionReport> {
        self.timed(CatalogOp::Promote, || {
            self.maintenance.promote_parameter_to_field(name)
        })
    }

    // Metadata sets

    /// Creates a metadata set.
    pub fn create_set(
        &self,
        name: &str,
        entries: &BTreeMap<String, MetaValue>,
    ) -> CatalogResult<SetId> {
        self.timed(CatalogOp::CreateSet, || self.sets.create_set(name, entries))
    }

    /// Returns a set's entries, optionally expanded.
    pub fn resolve_set(&self, name: &str, expand: bool) -> CatalogResult<BTreeMap<String, MetaValue>> {
        self.timed(CatalogOp::ResolveSet, || self.sets.resolve_set(name, expand))
    }

    /// Returns set name to set ID.
    pub fn list_sets(&self) -> CatalogResult<BTreeMap<String, SetId>> {
        self.timed(CatalogOp::ListSets, || self.sets.list_sets())
    }

    /// Removes a metadata set.
    pub fn remove_set(&self, name: &str) -> CatalogResult<()> {
        self.timed(CatalogOp::RemoveSet, || self.sets.remove_set(name))
    }

    // Directory metadata

    /// Assigns metadata to a directory.
    pub fn set_metadata(
        &self,
        path: &str,
        assignments: &BTreeMap<String, MetaValue>,
    ) -> CatalogResult<SetOutcome> {
        let outcome = self.timed(CatalogOp::SetMetadata, || {
            self.dirmeta.set_metadata(path, assignments)
        })?;
        self.metrics.record_unsearchable(outcome.warnings.len() as u64);
        Ok(outcome)
    }

    /// Appends a parameter row to a directory.
    pub fn set_parameter(&self, path: &str, key: &str, value: &MetaValue) -> CatalogResult<()> {
        self.timed(CatalogOp::SetParameter, || {
            self.dirmeta.set_parameter(path, key, value)
        })
    }

    /// Returns a directory's metadata.
    pub fn get_directory_metadata(
        &self,
        path: &str,
        inherited: bool,
        include_own: bool,
    ) -> CatalogResult<DirectoryMetadata> {
        self.timed(CatalogOp::GetMetadata, || {
            self.dirmeta.get_directory_metadata(path, inherited, include_own)
        })
    }

    /// Returns only the parameters visible from a directory.
    pub fn get_parameters(
        &self,
        path: &str,
        inherited: bool,
        include_own: bool,
    ) -> CatalogResult<BTreeMap<String, FieldValue>> {
        self.timed(CatalogOp::GetMetadata, || {
            self.dirmeta.get_parameters(path, inherited, include_own)
        })
    }

    /// Removes all metadata of the given directories.
    pub fn remove_metadata_for_directories(
        &self,
        dirs: &BTreeSet<DirId>,
    ) -> CatalogResult<RemovalReport> {
        self.timed(CatalogOp::RemoveMetadata, || {
            self.dirmeta.remove_metadata_for_directories(dirs)
        })
    }

    /// Removes all metadata of a directory and its subtree.
    pub fn remove_metadata_for_subtree(&self, path: &str) -> CatalogResult<RemovalReport> {
        self.timed(CatalogOp::RemoveMetadata, || {
            self.maintenance.remove_metadata_for_subtree(path)
        })
    }

    // Queries

    /// Finds the directories matching `query` below `scope_path`.
    pub fn find_directories(
        &self,
        query: &Query,
        scope_path: &str,
    ) -> CatalogResult<DirectoryQueryResult> {
        self.timed(CatalogOp::FindDirectories, || {
            self.query.find_directories(query, scope_path)
        })
    }

    /// Finds the files in directories matching `query` below `scope_path`.
    pub fn find_files(&self, query: &Query, scope_path: &str) -> CatalogResult<Vec<String>> {
        self.timed(CatalogOp::FindFiles, || self.query.find_files(query, scope_path))
    }

    /// Returns the values of unselected fields compatible with `selection`.
    pub fn compatible_values(
        &self,
        selection: &Query,
        credentials: &Credentials,
    ) -> CatalogResult<BTreeMap<String, Vec<MetaValue>>> {
        self.timed(CatalogOp::CompatibleValues, || {
            self.facets.compatible_values(selection, credentials)
        })
    }
}
