//! Schema maintenance: field creation with parameter promotion, field
//! deletion and subtree cleanup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::dirmeta::{DirectoryMetadataStore, RemovalReport};
use crate::error::{CatalogError, CatalogResult};
use crate::locking::FieldLocks;
use crate::registry::{Declared, FieldRegistry};
use crate::tables::{ParameterRow, TableStore};
use crate::tree::DirectoryTree;
use crate::types::{DirId, MetaValue};

/// Outcome of migrating parameters into a field's table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Directories that received an own value.
    pub promoted: BTreeSet<DirId>,
    /// Directories left out because a descendant is promoted.
    pub dropped_ancestors: BTreeSet<DirId>,
    /// Directories left as parameters, with the reason: the value does
    /// not fit the field type, or an ancestor or descendant already owns
    /// an indexed value.
    pub skipped: BTreeMap<DirId, String>,
    /// Number of parameter rows deleted.
    pub rows_removed: usize,
}

/// Outcome of `create_field`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldCreation {
    /// Whether the field was created or already existed.
    pub declared: Declared,
    /// Promotion run after creation, if any.
    pub promotion: Option<PromotionReport>,
}

/// Field lifecycle operations.
pub struct MaintenanceOps {
    tables: Arc<TableStore>,
    registry: Arc<FieldRegistry>,
    dirmeta: Arc<DirectoryMetadataStore>,
    tree: Arc<dyn DirectoryTree>,
    locks: Arc<FieldLocks>,
    promote_parameters: bool,
}

impl MaintenanceOps {
    /// Creates the maintenance operations.
    pub fn new(
        tables: Arc<TableStore>,
        registry: Arc<FieldRegistry>,
        dirmeta: Arc<DirectoryMetadataStore>,
        tree: Arc<dyn DirectoryTree>,
        locks: Arc<FieldLocks>,
        promote_parameters: bool,
    ) -> Self {
        Self {
            tables,
            registry,
            dirmeta,
            tree,
            locks,
            promote_parameters,
        }
    }

    /// Declares a field under its exclusive lock. A newly created field
    /// picks up existing parameters with the same key when promotion is
    /// enabled.
    pub fn create_field(
        &self,
        name: &str,
        declared_type: &str,
        is_meta_set: bool,
    ) -> CatalogResult<FieldCreation> {
        let _guard = self.locks.exclusive(name);
        let declared = self.registry.declare_field(name, declared_type, is_meta_set)?;
        let promotion = if declared.is_new() && self.promote_parameters {
            Some(self.promote_locked(name)?)
        } else {
            None
        };
        Ok(FieldCreation {
            declared,
            promotion,
        })
    }

    /// Moves the parameters stored under `name` into the field's table.
    pub fn promote_parameter_to_field(&self, name: &str) -> CatalogResult<PromotionReport> {
        let _guard = self.locks.exclusive(name);
        self.promote_locked(name)
    }

    fn promote_locked(&self, name: &str) -> CatalogResult<PromotionReport> {
        let def = self
            .registry
            .field(name)?
            .ok_or_else(|| CatalogError::FieldNotFound(name.to_string()))?;
        let rows = self.tables.parameter_rows_for_key(name)?;
        let mut report = PromotionReport::default();
        if rows.is_empty() {
            return Ok(report);
        }

        // Rows are oldest first, so the last one per directory wins.
        let mut latest: BTreeMap<DirId, &ParameterRow> = BTreeMap::new();
        for row in &rows {
            latest.insert(row.dir, row);
        }

        // Directories already owning a value, before this promotion.
        let indexed = self.tables.select_dirs(name, |_| true)?;

        let mut candidates: BTreeMap<DirId, MetaValue> = BTreeMap::new();
        for (dir, row) in &latest {
            let value = match self.registry.coerce(&def, &row.value) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Parameter {} of directory {} not promoted: {}", name, dir, e);
                    report.skipped.insert(*dir, e.to_string());
                    continue;
                }
            };
            let chain = self.tree.ancestor_chain_of(*dir)?;
            let ancestors = &chain[..chain.len().saturating_sub(1)];
            if let Some(owner) = ancestors.iter().find(|a| indexed.contains(*a)) {
                report
                    .skipped
                    .insert(*dir, format!("{} is inherited from directory {}", name, owner));
                continue;
            }
            let below = self.tree.subtree_ids(*dir, false)?;
            if let Some(owner) = below.iter().find(|d| indexed.contains(*d)) {
                report
                    .skipped
                    .insert(*dir, format!("{} is owned by descendant directory {}", name, owner));
                continue;
            }
            candidates.insert(*dir, value);
        }

        // A candidate's value stands in for any candidate above it.
        for dir in candidates.keys() {
            let chain = self.tree.ancestor_chain_of(*dir)?;
            for ancestor in &chain[..chain.len().saturating_sub(1)] {
                if candidates.contains_key(ancestor) {
                    report.dropped_ancestors.insert(*ancestor);
                }
            }
        }

        let mut ops = Vec::new();
        for (dir, value) in &candidates {
            if report.dropped_ancestors.contains(dir) {
                continue;
            }
            ops.push(self.tables.upsert_op(name, *dir, value)?);
            report.promoted.insert(*dir);
        }
        self.tables.commit(ops)?;

        let consumed: Vec<ParameterRow> = rows
            .iter()
            .filter(|row| {
                report.promoted.contains(&row.dir) || report.dropped_ancestors.contains(&row.dir)
            })
            .cloned()
            .collect();
        self.tables.commit(self.tables.delete_parameter_ops(&consumed))?;
        report.rows_removed = consumed.len();

        tracing::info!(
            "Promoted {} parameters to field {} ({} ancestors dropped, {} skipped)",
            report.promoted.len(),
            name,
            report.dropped_ancestors.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Removes a field and all its values under its exclusive lock.
    pub fn delete_field(&self, name: &str) -> CatalogResult<()> {
        let _guard = self.locks.exclusive(name);
        self.registry.remove_field(name)
    }

    /// Removes all metadata of a directory and its subtree.
    pub fn remove_metadata_for_subtree(&self, path: &str) -> CatalogResult<RemovalReport> {
        let dir = self.tree.find_directory(path)?;
        let dirs = self.tree.subtree_ids(dir, true)?;
        self.dirmeta.remove_metadata_for_directories(&dirs)
    }
}
