//! Per-directory metadata with inheritance.
//!
//! A directory's effective metadata is resolved over its ancestor chain.
//! At most one directory of the chain may own a value for a field; a
//! second owner makes the read fail instead of picking a winner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult, CatalogWarning, ConflictKind};
use crate::locking::FieldLocks;
use crate::registry::FieldRegistry;
use crate::tables::{ParameterRow, TableStore};
use crate::tree::DirectoryTree;
use crate::types::{DirId, FieldValue, MetaValue, Ownership};

/// Metadata reported for one directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectoryMetadata {
    /// Value per key.
    pub values: BTreeMap<String, FieldValue>,
    /// Origin of each reported value.
    pub owner: BTreeMap<String, Ownership>,
    /// Declared type of every declared field.
    pub types: BTreeMap<String, String>,
}

impl DirectoryMetadata {
    /// Returns the single value reported for `key`.
    pub fn value(&self, key: &str) -> Option<&MetaValue> {
        self.values.get(key).and_then(FieldValue::as_single)
    }

    /// Returns the origin of the value reported for `key`.
    pub fn owner_of(&self, key: &str) -> Option<Ownership> {
        self.owner.get(key).copied()
    }
}

/// Successful result of `set_metadata`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// Soft warnings, one per key stored as a parameter.
    pub warnings: Vec<CatalogWarning>,
}

/// Per-field report of a bulk metadata removal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Fields whose rows were removed.
    pub successful: BTreeSet<String>,
    /// Fields whose removal failed, with the reason.
    pub failed: BTreeMap<String, String>,
    /// Number of parameter rows removed.
    pub parameter_rows: usize,
    /// Why parameter removal failed, if it did.
    pub parameter_failure: Option<String>,
}

impl RemovalReport {
    /// True if every field and the parameters were removed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.parameter_failure.is_none()
    }
}

/// Reads and writes directory metadata and parameters.
pub struct DirectoryMetadataStore {
    tables: Arc<TableStore>,
    registry: Arc<FieldRegistry>,
    tree: Arc<dyn DirectoryTree>,
    locks: Arc<FieldLocks>,
}

impl DirectoryMetadataStore {
    /// Creates a directory metadata store.
    pub fn new(
        tables: Arc<TableStore>,
        registry: Arc<FieldRegistry>,
        tree: Arc<dyn DirectoryTree>,
        locks: Arc<FieldLocks>,
    ) -> Self {
        Self {
            tables,
            registry,
            tree,
            locks,
        }
    }

    /// Assigns metadata to a directory.
    ///
    /// Declared keys become own values; a key already inherited from a
    /// strict ancestor is a `MetadataConflict`. Undeclared keys are stored
    /// as parameters and reported as `NotSearchable`. Nothing is written
    /// unless every key passes.
    pub fn set_metadata(
        &self,
        path: &str,
        assignments: &BTreeMap<String, MetaValue>,
    ) -> CatalogResult<SetOutcome> {
        let dir = self.tree.find_directory(path)?;
        let _guards = self.locks.shared(assignments.keys().map(String::as_str));

        let fields = self.registry.fields()?;
        let mut inherited: Option<DirectoryMetadata> = None;
        let mut outcome = SetOutcome::default();
        let mut ops = Vec::with_capacity(assignments.len());

        for (key, value) in assignments {
            let def = match fields.get(key) {
                Some(def) => def,
                None => {
                    tracing::warn!("{} is not a metadata field, stored as a parameter of {}", key, path);
                    ops.push(self.tables.append_parameter_op(dir, key, value)?);
                    outcome
                        .warnings
                        .push(CatalogWarning::NotSearchable { key: key.clone() });
                    continue;
                }
            };

            if inherited.is_none() {
                inherited = Some(self.get_directory_metadata(path, true, false)?);
            }
            let from_ancestors = inherited
                .as_ref()
                .and_then(|meta| meta.owner_of(key))
                .is_some_and(|owner| owner == Ownership::Inherited);
            if from_ancestors {
                return Err(CatalogError::MetadataConflict {
                    path: path.to_string(),
                    field: key.clone(),
                    kind: ConflictKind::Shadowing,
                });
            }

            let value = self.registry.coerce(def, value)?;
            if def.is_meta_set() {
                let set_name = value.as_text().unwrap_or_default();
                if self.tables.load_set(set_name)?.is_none() {
                    return Err(CatalogError::SetNotFound(set_name.to_string()));
                }
            }
            ops.push(self.tables.upsert_op(key, dir, &value)?);
        }

        self.tables.commit(ops)?;
        tracing::debug!("Set {} metadata keys on {}", assignments.len(), path);
        Ok(outcome)
    }

    /// Appends a parameter row. Existing rows for the key are kept.
    pub fn set_parameter(&self, path: &str, key: &str, value: &MetaValue) -> CatalogResult<()> {
        let dir = self.tree.find_directory(path)?;
        let _guards = self.locks.shared([key]);
        let op = self.tables.append_parameter_op(dir, key, value)?;
        self.tables.commit(vec![op])
    }

    /// Directories of the chain selected by the read flags.
    fn selected_chain(
        &self,
        path: &str,
        inherited: bool,
        include_own: bool,
    ) -> CatalogResult<(DirId, Vec<DirId>)> {
        let mut chain = self.tree.ancestor_chain(path)?;
        let own = *chain
            .last()
            .ok_or_else(|| CatalogError::DirectoryNotFound(path.to_string()))?;
        if !inherited {
            chain = vec![own];
        }
        if !include_own {
            chain.pop();
        }
        Ok((own, chain))
    }

    /// Returns a directory's metadata.
    ///
    /// `inherited` extends the lookup to the ancestors; `include_own=false`
    /// leaves out the directory's own values.
    pub fn get_directory_metadata(
        &self,
        path: &str,
        inherited: bool,
        include_own: bool,
    ) -> CatalogResult<DirectoryMetadata> {
        let (own, chain) = self.selected_chain(path, inherited, include_own)?;
        let dirs: BTreeSet<DirId> = chain.iter().copied().collect();
        let mut meta = DirectoryMetadata::default();

        for (name, def) in self.registry.fields()? {
            meta.types.insert(name.clone(), def.declared_type.clone());
            if dirs.is_empty() {
                continue;
            }
            let mut rows = self.tables.select_values(&name, Some(&dirs))?;
            if rows.len() > 1 {
                return Err(CatalogError::MetadataConflict {
                    path: path.to_string(),
                    field: name,
                    kind: ConflictKind::Ambiguous {
                        owners: rows.into_iter().map(|(dir, _)| dir).collect(),
                    },
                });
            }
            if let Some((dir, value)) = rows.pop() {
                let owner = if dir == own {
                    Ownership::Own
                } else {
                    Ownership::Inherited
                };
                meta.values.insert(name.clone(), FieldValue::Single(value));
                meta.owner.insert(name, owner);
            }
        }

        for (key, value) in group_parameters(self.tables.select_parameters(&chain)?) {
            if meta.values.contains_key(&key) {
                continue;
            }
            meta.values.insert(key.clone(), value);
            meta.owner.insert(key, Ownership::Parameter);
        }
        Ok(meta)
    }

    /// Returns only the parameters visible from a directory.
    pub fn get_parameters(
        &self,
        path: &str,
        inherited: bool,
        include_own: bool,
    ) -> CatalogResult<BTreeMap<String, FieldValue>> {
        let (_, chain) = self.selected_chain(path, inherited, include_own)?;
        Ok(group_parameters(self.tables.select_parameters(&chain)?))
    }

    /// Returns every parameter row stored under `key`, oldest first.
    pub fn parameter_rows(&self, key: &str) -> CatalogResult<Vec<ParameterRow>> {
        self.tables.parameter_rows_for_key(key)
    }

    /// Removes all metadata and parameters of the given directories.
    ///
    /// Each field is removed independently; failures are collected in the
    /// report instead of aborting.
    pub fn remove_metadata_for_directories(
        &self,
        dirs: &BTreeSet<DirId>,
    ) -> CatalogResult<RemovalReport> {
        let mut report = RemovalReport::default();
        for name in self.registry.fields()?.into_keys() {
            let _guard = self.locks.shared([name.as_str()]);
            match self.tables.delete_values(&name, dirs) {
                Ok(rows) => {
                    tracing::debug!("Removed {} values of {}", rows, name);
                    report.successful.insert(name);
                }
                Err(e) => {
                    tracing::warn!("Failed to remove values of {}: {}", name, e);
                    report.failed.insert(name, e.to_string());
                }
            }
        }

        match self.tables.delete_parameters_for_dirs(dirs) {
            Ok(rows) => report.parameter_rows = rows,
            Err(e) => {
                tracing::warn!("Failed to remove parameters: {}", e);
                report.parameter_failure = Some(e.to_string());
            }
        }
        Ok(report)
    }
}

/// Groups parameter rows by key; keys with several rows become lists.
fn group_parameters(rows: Vec<ParameterRow>) -> BTreeMap<String, FieldValue> {
    let mut grouped: BTreeMap<String, Vec<MetaValue>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.key).or_default().push(row.value);
    }
    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                FieldValue::Single(values.remove(0))
            } else {
                FieldValue::List(values)
            };
            (key, value)
        })
        .collect()
}
