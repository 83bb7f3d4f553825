//! Named metadata sets.
//!
//! A set bundles field assignments under a name. A MetaSet-typed field
//! takes a set name as its value; expansion replaces it by the set's
//! contents, recursively.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CatalogError, CatalogResult, SetConflictKind};
use crate::registry::FieldRegistry;
use crate::tables::{SetRecord, TableStore, SET_SEQ};
use crate::types::{FieldDef, MetaValue, SetId};

/// Stores and expands metadata sets.
pub struct MetadataSetStore {
    tables: Arc<TableStore>,
    registry: Arc<FieldRegistry>,
    max_depth: usize,
    // Serialises the name check with the insert.
    create_lock: Mutex<()>,
}

impl MetadataSetStore {
    /// Creates a set store.
    pub fn new(tables: Arc<TableStore>, registry: Arc<FieldRegistry>, max_depth: usize) -> Self {
        Self {
            tables,
            registry,
            max_depth,
            create_lock: Mutex::new(()),
        }
    }

    /// Creates a set. Every key must name a declared field.
    pub fn create_set(
        &self,
        name: &str,
        entries: &BTreeMap<String, MetaValue>,
    ) -> CatalogResult<SetId> {
        let fields = self.registry.fields()?;
        let mut coerced = BTreeMap::new();
        for (key, value) in entries {
            let def = fields
                .get(key)
                .ok_or_else(|| CatalogError::UnknownField(key.clone()))?;
            coerced.insert(key.clone(), self.registry.coerce(def, value)?);
        }

        let _guard = self.create_lock.lock();
        if self.tables.load_set(name)?.is_some() {
            return Err(CatalogError::SetExists(name.to_string()));
        }

        let id = SetId::new(self.tables.next_id(SET_SEQ)?);
        self.tables.insert_set(&SetRecord {
            id,
            name: name.to_string(),
            entries: coerced,
        })?;
        tracing::info!("Added metadata set {} with {} entries", name, entries.len());
        Ok(id)
    }

    /// Returns a set's entries, expanding MetaSet-typed entries when `expand`.
    pub fn resolve_set(&self, name: &str, expand: bool) -> CatalogResult<BTreeMap<String, MetaValue>> {
        let fields = self.registry.fields()?;
        if !expand {
            let record = self.load(name)?;
            for key in record.entries.keys() {
                if !fields.contains_key(key) {
                    return Err(CatalogError::UnknownField(key.clone()));
                }
            }
            return Ok(record.entries);
        }

        let mut resolved = BTreeMap::new();
        let mut chain = Vec::new();
        self.expand_into(name, &fields, &mut chain, &mut resolved)?;
        Ok(resolved)
    }

    /// Expands set `name` into `out`. `chain` holds the sets currently
    /// being expanded, outermost first.
    fn expand_into(
        &self,
        name: &str,
        fields: &BTreeMap<String, FieldDef>,
        chain: &mut Vec<String>,
        out: &mut BTreeMap<String, MetaValue>,
    ) -> CatalogResult<()> {
        let root = chain.first().cloned().unwrap_or_else(|| name.to_string());
        if chain.iter().any(|n| n == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(CatalogError::SetConflict {
                set: root,
                kind: SetConflictKind::Cycle { chain: cycle },
            });
        }
        if chain.len() >= self.max_depth {
            return Err(CatalogError::SetConflict {
                set: root,
                kind: SetConflictKind::DepthExceeded {
                    limit: self.max_depth,
                },
            });
        }

        let record = self.load(name)?;
        chain.push(name.to_string());
        for (key, value) in &record.entries {
            let def = fields
                .get(key)
                .ok_or_else(|| CatalogError::UnknownField(key.clone()))?;
            if def.is_meta_set() {
                let child = value.as_text().ok_or_else(|| CatalogError::InvalidValue {
                    field: key.clone(),
                    value: value.to_string(),
                    reason: "not a metadata set name".into(),
                })?;
                self.expand_into(child, fields, chain, out)?;
            } else {
                if out.contains_key(key) {
                    return Err(CatalogError::SetConflict {
                        set: root,
                        kind: SetConflictKind::KeyCollision { key: key.clone() },
                    });
                }
                out.insert(key.clone(), value.clone());
            }
        }
        chain.pop();
        Ok(())
    }

    fn load(&self, name: &str) -> CatalogResult<SetRecord> {
        self.tables
            .load_set(name)?
            .ok_or_else(|| CatalogError::SetNotFound(name.to_string()))
    }

    /// Returns set name to set ID.
    pub fn list_sets(&self) -> CatalogResult<BTreeMap<String, SetId>> {
        Ok(self
            .tables
            .load_sets()?
            .into_iter()
            .map(|record| (record.name, record.id))
            .collect())
    }

    /// Removes a set.
    pub fn remove_set(&self, name: &str) -> CatalogResult<()> {
        if !self.tables.delete_set(name)? {
            return Err(CatalogError::SetNotFound(name.to_string()));
        }
        tracing::info!("Removed metadata set {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::MemoryKvStore;

    fn make_sets() -> (Arc<FieldRegistry>, MetadataSetStore) {
        let tables = Arc::new(TableStore::new(Arc::new(MemoryKvStore::new())));
        let registry = Arc::new(FieldRegistry::new(tables.clone(), true));
        registry.declare_field("Color", "VARCHAR(32)", false).unwrap();
        registry.declare_field("Size", "INT", false).unwrap();
        registry.declare_field("Detector", "VARCHAR(32)", false).unwrap();
        registry.declare_field("Config", "MetaSet", false).unwrap();
        let sets = MetadataSetStore::new(tables, registry.clone(), 8);
        (registry, sets)
    }

    fn entries(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_and_resolve() {
        let (_registry, sets) = make_sets();
        sets.create_set("small_red", &entries(&[("Color", "red".into()), ("Size", "10".into())]))
            .unwrap();
        let resolved = sets.resolve_set("small_red", false).unwrap();
        assert_eq!(resolved["Color"], MetaValue::from("red"));
        assert_eq!(resolved["Size"], MetaValue::Integer(10));
    }

    #[test]
    fn test_create_with_unknown_field() {
        let (_registry, sets) = make_sets();
        match sets.create_set("bad", &entries(&[("Shape", "round".into())])) {
            Err(CatalogError::UnknownField(key)) => assert_eq!(key, "Shape"),
            other => panic!("expected UnknownField, got {:?}", other),
        }
        assert!(sets.list_sets().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_set_name() {
        let (_registry, sets) = make_sets();
        sets.create_set("a", &entries(&[("Color", "red".into())])).unwrap();
        assert!(matches!(
            sets.create_set("a", &entries(&[("Color", "blue".into())])),
            Err(CatalogError::SetExists(_))
        ));
    }

    #[test]
    fn test_nested_expansion() {
        let (_registry, sets) = make_sets();
        sets.create_set("base", &entries(&[("Detector", "ATLAS".into())])).unwrap();
        sets.create_set(
            "run",
            &entries(&[("Config", "base".into()), ("Color", "red".into())]),
        )
        .unwrap();

        let flat = sets.resolve_set("run", false).unwrap();
        assert_eq!(flat["Config"], MetaValue::from("base"));

        let expanded = sets.resolve_set("run", true).unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded["Detector"], MetaValue::from("ATLAS"));
        assert_eq!(expanded["Color"], MetaValue::from("red"));
        assert!(!expanded.contains_key("Config"));
    }

    #[test]
    fn test_expansion_collision() {
        let (_registry, sets) = make_sets();
        sets.create_set("inner", &entries(&[("Color", "blue".into())])).unwrap();
        sets.create_set(
            "outer",
            &entries(&[("Config", "inner".into()), ("Color", "red".into())]),
        )
        .unwrap();

        match sets.resolve_set("outer", true) {
            Err(CatalogError::SetConflict {
                kind: SetConflictKind::KeyCollision { key },
                ..
            }) => assert_eq!(key, "Color"),
            other => panic!("expected KeyCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let (_registry, sets) = make_sets();
        sets.create_set("loop", &entries(&[("Config", "loop".into())])).unwrap();
        match sets.resolve_set("loop", true) {
            Err(CatalogError::SetConflict {
                kind: SetConflictKind::Cycle { chain },
                ..
            }) => assert_eq!(chain, vec!["loop".to_string(), "loop".to_string()]),
            other => panic!("expected Cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_transitive_cycle() {
        let (_registry, sets) = make_sets();
        sets.create_set("a", &entries(&[("Config", "b".into())])).unwrap();
        sets.create_set("b", &entries(&[("Config", "c".into())])).unwrap();
        sets.create_set("c", &entries(&[("Config", "a".into())])).unwrap();
        match sets.resolve_set("a", true) {
            Err(CatalogError::SetConflict {
                set,
                kind: SetConflictKind::Cycle { chain },
            }) => {
                assert_eq!(set, "a");
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected Cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit() {
        let tables = Arc::new(TableStore::new(Arc::new(MemoryKvStore::new())));
        let registry = Arc::new(FieldRegistry::new(tables.clone(), true));
        registry.declare_field("Config", "MetaSet", false).unwrap();
        registry.declare_field("Color", "VARCHAR(32)", false).unwrap();
        let sets = MetadataSetStore::new(tables, registry, 2);
        sets.create_set("s3", &entries(&[("Color", "red".into())])).unwrap();
        sets.create_set("s2", &entries(&[("Config", "s3".into())])).unwrap();
        sets.create_set("s1", &entries(&[("Config", "s2".into())])).unwrap();

        assert!(sets.resolve_set("s2", true).is_ok());
        assert!(matches!(
            sets.resolve_set("s1", true),
            Err(CatalogError::SetConflict {
                kind: SetConflictKind::DepthExceeded { limit: 2 },
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_set() {
        let (_registry, sets) = make_sets();
        assert!(matches!(
            sets.resolve_set("nope", true),
            Err(CatalogError::SetNotFound(_))
        ));
    }

    #[test]
    fn test_removed_field_makes_set_unresolvable() {
        let (registry, sets) = make_sets();
        sets.create_set("s", &entries(&[("Color", "red".into())])).unwrap();
        registry.remove_field("Color").unwrap();
        assert!(matches!(
            sets.resolve_set("s", false),
            Err(CatalogError::UnknownField(_))
        ));
    }

    #[test]
    fn test_remove_set() {
        let (_registry, sets) = make_sets();
        sets.create_set("s", &entries(&[("Color", "red".into())])).unwrap();
        assert_eq!(sets.list_sets().unwrap().len(), 1);
        sets.remove_set("s").unwrap();
        assert!(matches!(sets.remove_set("s"), Err(CatalogError::SetNotFound(_))));
    }

    #[test]
    fn test_concurrent_create_admits_one_winner() {
        let (_registry, sets) = make_sets();
        let results: Vec<CatalogResult<SetId>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let sets = &sets;
                    scope.spawn(move || {
                        sets.create_set("shared", &entries(&[("Size", MetaValue::Integer(i))]))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<SetId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(CatalogError::SetExists(_)))));
        assert_eq!(sets.list_sets().unwrap()["shared"], winners[0]);
    }
}
