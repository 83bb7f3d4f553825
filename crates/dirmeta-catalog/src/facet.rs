//! Faceted narrowing: which values of the unselected fields are still
//! reachable from a partial selection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::CatalogResult;
use crate::query::{FieldCriterion, Predicate, Query, QueryEngine};
use crate::registry::FieldRegistry;
use crate::tables::TableStore;
use crate::tree::DirectoryTree;
use crate::types::{Credentials, DirId, MetaValue};

/// Computes compatible values for faceted search.
pub struct FacetAnalyzer {
    tables: Arc<TableStore>,
    registry: Arc<FieldRegistry>,
    query: Arc<QueryEngine>,
    tree: Arc<dyn DirectoryTree>,
}

impl FacetAnalyzer {
    /// Creates a facet analyzer.
    pub fn new(
        tables: Arc<TableStore>,
        registry: Arc<FieldRegistry>,
        query: Arc<QueryEngine>,
        tree: Arc<dyn DirectoryTree>,
    ) -> Self {
        Self {
            tables,
            registry,
            query,
            tree,
        }
    }

    /// Directories compatible with one selected criterion: the defining
    /// directories, their subtrees and their ancestor chains.
    fn compatibility_set(&self, criterion: &FieldCriterion) -> CatalogResult<BTreeSet<DirId>> {
        if criterion.predicate == Predicate::Missing {
            let all = self.tree.all_directories()?;
            return self.query.missing_set(&criterion.field.name, &all);
        }
        let defining = self.query.matching_own_dirs(criterion)?;
        let mut compatible = BTreeSet::new();
        for dir in &defining {
            compatible.extend(self.tree.ancestor_chain_of(*dir)?);
        }
        compatible.extend(self.query.with_subtrees(defining)?);
        Ok(compatible)
    }

    /// Returns, for every declared field not in `selection`, the sorted
    /// distinct own values found on directories compatible with it.
    pub fn compatible_values(
        &self,
        selection: &Query,
        credentials: &Credentials,
    ) -> CatalogResult<BTreeMap<String, Vec<MetaValue>>> {
        tracing::debug!(
            "Compatible values for {} selected keys (user {:?})",
            selection.len(),
            credentials.user()
        );
        let fields = self.registry.fields()?;
        let expanded = self.query.expand(selection)?;

        let mut from_set: Option<BTreeSet<DirId>> = None;
        let mut exhausted = false;
        for criterion in expanded.criteria.values() {
            let compatible = self.compatibility_set(criterion)?;
            let narrowed: BTreeSet<DirId> = match &from_set {
                Some(current) => current.intersection(&compatible).copied().collect(),
                None => compatible,
            };
            if narrowed.is_empty() {
                exhausted = true;
                break;
            }
            from_set = Some(narrowed);
        }

        let mut result = BTreeMap::new();
        for name in fields.keys() {
            if selection.contains_key(name) || expanded.criteria.contains_key(name) {
                continue;
            }
            let values = if exhausted {
                Vec::new()
            } else {
                self.tables.distinct_values(name, from_set.as_ref())?
            };
            result.insert(name.clone(), values);
        }
        Ok(result)
    }
}
