//! Metadata queries over the directory tree.
//!
//! A query maps keys to predicates. Declared fields are evaluated into
//! directory sets and intersected; other keys are handed back to the
//! caller as extra criteria.
//!
//! A match on a directory also covers all of its subdirectories. `Any`
//! selects the holders of an own value plus their subtrees, `Missing` the
//! rest of the scope.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{CatalogError, CatalogResult, SetConflictKind};
use crate::metaset::MetadataSetStore;
use crate::registry::FieldRegistry;
use crate::tables::TableStore;
use crate::tree::{is_root_path, join_path, DirectoryTree};
use crate::types::{DirId, FieldDef, MetaValue};

const ANY: &str = "Any";
const MISSING: &str = "Missing";

/// Comparison operator of a condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `in` or `=`
    In,
    /// `nin` or `!=`
    NotIn,
}

impl CompareOp {
    /// Parses an operator token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Ge),
            "<=" => Some(CompareOp::Le),
            "in" | "=" => Some(CompareOp::In),
            "nin" | "!=" => Some(CompareOp::NotIn),
            _ => None,
        }
    }

    /// True for the ordered comparisons, which take a scalar operand.
    pub fn is_ordered(&self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le)
    }
}

/// Operand of a condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// One value.
    Scalar(MetaValue),
    /// Several values, for membership tests.
    List(Vec<MetaValue>),
}

impl Operand {
    fn contains(&self, value: &MetaValue) -> bool {
        match self {
            Operand::Scalar(v) => value_eq(v, value),
            Operand::List(vs) => vs.iter().any(|v| value_eq(v, value)),
        }
    }

    fn map<F>(&self, mut f: F) -> CatalogResult<Operand>
    where
        F: FnMut(&MetaValue) -> CatalogResult<MetaValue>,
    {
        Ok(match self {
            Operand::Scalar(v) => Operand::Scalar(f(v)?),
            Operand::List(vs) => Operand::List(vs.iter().map(f).collect::<CatalogResult<_>>()?),
        })
    }
}

/// One operator and its operand.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    /// The operator.
    pub op: CompareOp,
    /// The operand.
    pub operand: Operand,
}

impl Condition {
    fn holds(&self, value: &MetaValue) -> bool {
        use std::cmp::Ordering::*;
        match (self.op, &self.operand) {
            (CompareOp::In, operand) => operand.contains(value),
            (CompareOp::NotIn, operand) => !operand.contains(value),
            (op, Operand::Scalar(bound)) => {
                let ord = value.total_cmp(bound);
                match op {
                    CompareOp::Gt => ord == Greater,
                    CompareOp::Lt => ord == Less,
                    CompareOp::Ge => ord != Less,
                    CompareOp::Le => ord != Greater,
                    CompareOp::In | CompareOp::NotIn => false,
                }
            }
            (_, Operand::List(_)) => false,
        }
    }
}

/// Predicate applied to one key.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// The directory has some own value.
    Any,
    /// No directory of the scope provides a value.
    Missing,
    /// Own value equals the operand.
    Equals(MetaValue),
    /// Own value is one of the operands.
    OneOf(Vec<MetaValue>),
    /// Own value satisfies every condition.
    Conditions(Vec<Condition>),
}

/// A query: key to predicate.
pub type Query = BTreeMap<String, Predicate>;

fn value_eq(a: &MetaValue, b: &MetaValue) -> bool {
    a.total_cmp(b) == std::cmp::Ordering::Equal
}

fn invalid(field: &str, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidPredicate {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn scalar_from_json(field: &str, value: &JsonValue) -> CatalogResult<MetaValue> {
    match value {
        JsonValue::String(s) => Ok(MetaValue::Text(s.clone())),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(MetaValue::Integer(i)),
            None => n
                .as_f64()
                .map(MetaValue::Float)
                .ok_or_else(|| invalid(field, format!("unrepresentable number {}", n))),
        },
        JsonValue::Null => Err(invalid(field, "null value")),
        JsonValue::Bool(_) => Err(invalid(field, "boolean values are not supported")),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(invalid(field, "nested value")),
    }
}

fn list_from_json(field: &str, items: &[JsonValue]) -> CatalogResult<Vec<MetaValue>> {
    if items.is_empty() {
        return Err(invalid(field, "empty list"));
    }
    items.iter().map(|item| scalar_from_json(field, item)).collect()
}

impl Predicate {
    /// Parses the dictionary form of a predicate: `"Any"`, `"Missing"`, a
    /// scalar, a list, or a map of operator to operand.
    pub fn from_json(field: &str, value: &JsonValue) -> CatalogResult<Self> {
        match value {
            JsonValue::String(s) if s == ANY => Ok(Predicate::Any),
            JsonValue::String(s) if s == MISSING => Ok(Predicate::Missing),
            JsonValue::Array(items) => Ok(Predicate::OneOf(list_from_json(field, items)?)),
            JsonValue::Object(ops) => {
                if ops.is_empty() {
                    return Err(invalid(field, "empty operator map"));
                }
                let mut conditions = Vec::with_capacity(ops.len());
                for (token, operand) in ops {
                    let op = CompareOp::parse(token)
                        .ok_or_else(|| invalid(field, format!("unknown operator '{}'", token)))?;
                    let operand = match operand {
                        JsonValue::Array(_) if op.is_ordered() => {
                            return Err(invalid(field, format!("'{}' takes a single value", token)))
                        }
                        JsonValue::Array(items) => Operand::List(list_from_json(field, items)?),
                        other => Operand::Scalar(scalar_from_json(field, other)?),
                    };
                    conditions.push(Condition { op, operand });
                }
                Ok(Predicate::Conditions(conditions))
            }
            other => Ok(Predicate::Equals(scalar_from_json(field, other)?)),
        }
    }

    /// True if an own value satisfies the predicate. `Any` matches every
    /// value and `Missing` none.
    pub fn matches(&self, value: &MetaValue) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Missing => false,
            Predicate::Equals(v) => value_eq(v, value),
            Predicate::OneOf(vs) => vs.iter().any(|v| value_eq(v, value)),
            Predicate::Conditions(conditions) => conditions.iter().all(|c| c.holds(value)),
        }
    }

    /// Coerces every operand to the field's type.
    fn bind(&self, def: &FieldDef) -> CatalogResult<Predicate> {
        let coerce = |v: &MetaValue| {
            def.value_type
                .coerce(v, false)
                .map_err(|reason| invalid(&def.name, reason))
        };
        Ok(match self {
            Predicate::Any => Predicate::Any,
            Predicate::Missing => Predicate::Missing,
            Predicate::Equals(v) => Predicate::Equals(coerce(v)?),
            Predicate::OneOf(vs) => {
                Predicate::OneOf(vs.iter().map(coerce).collect::<CatalogResult<_>>()?)
            }
            Predicate::Conditions(conditions) => Predicate::Conditions(
                conditions
                    .iter()
                    .map(|c| -> CatalogResult<Condition> {
                        Ok(Condition {
                            op: c.op,
                            operand: c.operand.map(coerce)?,
                        })
                    })
                    .collect::<CatalogResult<_>>()?,
            ),
        })
    }
}

/// Parses a JSON object of key to predicate.
pub fn parse_query(value: &JsonValue) -> CatalogResult<Query> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("", "query must be an object"))?;
    object
        .iter()
        .map(|(key, v)| Ok((key.clone(), Predicate::from_json(key, v)?)))
        .collect()
}

/// A predicate bound to a declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldCriterion {
    /// The field.
    pub field: FieldDef,
    /// Predicate with operands coerced to the field's type.
    pub predicate: Predicate,
}

/// A query with metadata sets expanded and keys classified.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpandedQuery {
    /// Criteria on declared fields.
    pub criteria: BTreeMap<String, FieldCriterion>,
    /// Keys that are not declared fields.
    pub extra: Query,
}

/// Directories selected by a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// No metadata criteria and no scope: every directory.
    Unconstrained,
    /// Directory ID to path; empty when criteria matched nothing.
    Directories(BTreeMap<DirId, String>),
}

impl Selection {
    /// True if nothing constrained the selection.
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Selection::Unconstrained)
    }

    /// The selected directories, unless unconstrained.
    pub fn directories(&self) -> Option<&BTreeMap<DirId, String>> {
        match self {
            Selection::Unconstrained => None,
            Selection::Directories(dirs) => Some(dirs),
        }
    }
}

/// Result of `find_directories`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryQueryResult {
    /// Selected directories.
    pub selection: Selection,
    /// Criteria on keys that are not declared fields.
    pub extra: Query,
}

/// Evaluates queries into directory sets.
pub struct QueryEngine {
    tables: Arc<TableStore>,
    registry: Arc<FieldRegistry>,
    sets: Arc<MetadataSetStore>,
    tree: Arc<dyn DirectoryTree>,
}

impl QueryEngine {
    /// Creates a query engine.
    pub fn new(
        tables: Arc<TableStore>,
        registry: Arc<FieldRegistry>,
        sets: Arc<MetadataSetStore>,
        tree: Arc<dyn DirectoryTree>,
    ) -> Self {
        Self {
            tables,
            registry,
            sets,
            tree,
        }
    }

    /// Classifies keys, binds predicates to field types and expands
    /// metadata-set references.
    ///
    /// A key produced by a set expansion that is also queried directly, or
    /// produced twice, is a `KeyCollision`.
    pub fn expand(&self, query: &Query) -> CatalogResult<ExpandedQuery> {
        let fields = self.registry.fields()?;
        let mut expanded = ExpandedQuery::default();
        let mut set_refs = Vec::new();

        for (key, predicate) in query {
            let def = match fields.get(key) {
                Some(def) => def,
                None => {
                    expanded.extra.insert(key.clone(), predicate.clone());
                    continue;
                }
            };
            match predicate {
                Predicate::Equals(MetaValue::Text(set)) if def.is_meta_set() => {
                    set_refs.push(set.clone());
                }
                _ => {
                    expanded.criteria.insert(
                        key.clone(),
                        FieldCriterion {
                            field: def.clone(),
                            predicate: predicate.bind(def)?,
                        },
                    );
                }
            }
        }

        for set in set_refs {
            for (key, value) in self.sets.resolve_set(&set, true)? {
                if query.contains_key(&key) || expanded.criteria.contains_key(&key) {
                    return Err(CatalogError::SetConflict {
                        set,
                        kind: SetConflictKind::KeyCollision { key },
                    });
                }
                let def = fields
                    .get(&key)
                    .ok_or_else(|| CatalogError::UnknownField(key.clone()))?;
                expanded.criteria.insert(
                    key,
                    FieldCriterion {
                        field: def.clone(),
                        predicate: Predicate::Equals(value),
                    },
                );
            }
        }
        Ok(expanded)
    }

    /// Directories whose own value satisfies the predicate.
    pub fn matching_own_dirs(&self, criterion: &FieldCriterion) -> CatalogResult<BTreeSet<DirId>> {
        self.tables
            .select_dirs(&criterion.field.name, |value| criterion.predicate.matches(value))
    }

    /// `dirs` together with all their subdirectories.
    pub fn with_subtrees(&self, dirs: BTreeSet<DirId>) -> CatalogResult<BTreeSet<DirId>> {
        let mut out = self.tree.subtree_ids_bulk(&dirs)?;
        out.extend(dirs);
        Ok(out)
    }

    /// Holders of an own value for the field, plus their subtrees.
    pub fn any_set(&self, field: &str) -> CatalogResult<BTreeSet<DirId>> {
        let holders = self.tables.select_dirs(field, |_| true)?;
        self.with_subtrees(holders)
    }

    /// Directories of `scope` outside the field's `any_set`.
    pub fn missing_set(&self, field: &str, scope: &BTreeSet<DirId>) -> CatalogResult<BTreeSet<DirId>> {
        let any = self.any_set(field)?;
        Ok(scope.difference(&any).copied().collect())
    }

    /// Directories selected by one criterion within `scope`.
    pub fn criterion_set(
        &self,
        criterion: &FieldCriterion,
        scope: &BTreeSet<DirId>,
    ) -> CatalogResult<BTreeSet<DirId>> {
        match criterion.predicate {
            Predicate::Any => self.any_set(&criterion.field.name),
            Predicate::Missing => self.missing_set(&criterion.field.name, scope),
            _ => self.with_subtrees(self.matching_own_dirs(criterion)?),
        }
    }

    /// Finds the directories matching `query` below `scope_path`.
    pub fn find_directories(
        &self,
        query: &Query,
        scope_path: &str,
    ) -> CatalogResult<DirectoryQueryResult> {
        let scope_dir = self.tree.find_directory(scope_path)?;
        let expanded = self.expand(query)?;
        let rooted = is_root_path(scope_path);
        let scope = if rooted {
            self.tree.all_directories()?
        } else {
            self.tree.subtree_ids(scope_dir, true)?
        };

        if expanded.criteria.is_empty() {
            let selection = if rooted {
                Selection::Unconstrained
            } else {
                Selection::Directories(self.tree.paths(&scope)?)
            };
            return Ok(DirectoryQueryResult {
                selection,
                extra: expanded.extra,
            });
        }

        let mut result = scope;
        for (name, criterion) in &expanded.criteria {
            let matched = self.criterion_set(criterion, &result)?;
            result = result.intersection(&matched).copied().collect();
            tracing::debug!("{} narrowed selection to {} directories", name, result.len());
            if result.is_empty() {
                break;
            }
        }

        Ok(DirectoryQueryResult {
            selection: Selection::Directories(self.tree.paths(&result)?),
            extra: expanded.extra,
        })
    }

    /// Finds the files stored in the directories matching `query`.
    pub fn find_files(&self, query: &Query, scope_path: &str) -> CatalogResult<Vec<String>> {
        let paths = match self.find_directories(query, scope_path)?.selection {
            Selection::Unconstrained => self.tree.paths(&self.tree.all_directories()?)?,
            Selection::Directories(paths) => paths,
        };
        let dirs: BTreeSet<DirId> = paths.keys().copied().collect();

        self.tree
            .list_files(&dirs)?
            .into_iter()
            .map(|file| {
                let dir_path = paths
                    .get(&file.dir)
                    .ok_or(CatalogError::DirectoryIdNotFound(file.dir))?;
                let base = file.name.rsplit('/').next().unwrap_or(&file.name);
                Ok(join_path(dir_path, base))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::MemoryKvStore;
    use crate::tree::MemoryDirectoryTree;
    use serde_json::json;

    struct Fixture {
        tables: Arc<TableStore>,
        sets: Arc<MetadataSetStore>,
        tree: Arc<MemoryDirectoryTree>,
        engine: QueryEngine,
    }

    fn make_fixture() -> Fixture {
        let tables = Arc::new(TableStore::new(Arc::new(MemoryKvStore::new())));
        let registry = Arc::new(FieldRegistry::new(tables.clone(), true));
        let sets = Arc::new(MetadataSetStore::new(tables.clone(), registry.clone(), 8));
        let tree = Arc::new(MemoryDirectoryTree::new());
        for path in ["/a/b/c", "/a/e", "/d/f"] {
            tree.make_dirs(path);
        }
        registry.declare_field("Color", "VARCHAR(32)", false).unwrap();
        registry.declare_field("Size", "INT", false).unwrap();
        registry.declare_field("Config", "MetaSet", false).unwrap();
        let engine = QueryEngine::new(tables.clone(), registry, sets.clone(), tree.clone());
        Fixture {
            tables,
            sets,
            tree,
            engine,
        }
    }

    fn put(fx: &Fixture, field: &str, path: &str, value: MetaValue) {
        let dir = fx.tree.find_directory(path).unwrap();
        fx.tables.upsert_value(field, dir, &value).unwrap();
    }

    fn paths_of(result: &DirectoryQueryResult) -> BTreeSet<String> {
        result
            .selection
            .directories()
            .expect("constrained selection")
            .values()
            .cloned()
            .collect()
    }

    fn set_of(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn query(value: JsonValue) -> Query {
        parse_query(&value).unwrap()
    }

    #[test]
    fn test_parse_forms() {
        let q = query(json!({
            "A": "Any",
            "B": "Missing",
            "C": "red",
            "D": [1, 2],
            "E": {">": 10, "!=": [12, 13]},
            "F": 2.5,
        }));
        assert_eq!(q["A"], Predicate::Any);
        assert_eq!(q["B"], Predicate::Missing);
        assert_eq!(q["C"], Predicate::Equals("red".into()));
        assert_eq!(q["D"], Predicate::OneOf(vec![1.into(), 2.into()]));
        match &q["E"] {
            Predicate::Conditions(conditions) => {
                assert_eq!(conditions.len(), 2);
                assert!(conditions.contains(&Condition {
                    op: CompareOp::Gt,
                    operand: Operand::Scalar(10.into()),
                }));
                assert!(conditions.contains(&Condition {
                    op: CompareOp::NotIn,
                    operand: Operand::List(vec![12.into(), 13.into()]),
                }));
            }
            other => panic!("expected Conditions, got {:?}", other),
        }
        assert_eq!(q["F"], Predicate::Equals(MetaValue::Float(2.5)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            json!({"Size": {"~": 1}}),
            json!({"Size": {">": [1, 2]}}),
            json!({"Size": []}),
            json!({"Size": {}}),
            json!({"Size": null}),
            json!({"Size": [[1]]}),
            json!({"Size": {"in": {"x": 1}}}),
            json!(["Size"]),
        ] {
            assert!(
                matches!(parse_query(&bad), Err(CatalogError::InvalidPredicate { .. })),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_match_covers_subtree() {
        let fx = make_fixture();
        put(&fx, "Color", "/a/b", "red".into());
        let result = fx
            .engine
            .find_directories(&query(json!({"Color": "red"})), "/")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/a/b", "/a/b/c"]));
    }

    #[test]
    fn test_list_is_union() {
        let fx = make_fixture();
        put(&fx, "Color", "/a/b", "red".into());
        put(&fx, "Color", "/d", "blue".into());
        put(&fx, "Color", "/a/e", "green".into());

        let both = fx
            .engine
            .find_directories(&query(json!({"Color": ["red", "blue"]})), "/")
            .unwrap();
        let red = fx
            .engine
            .find_directories(&query(json!({"Color": "red"})), "/")
            .unwrap();
        let blue = fx
            .engine
            .find_directories(&query(json!({"Color": "blue"})), "/")
            .unwrap();
        let union: BTreeSet<String> = paths_of(&red).union(&paths_of(&blue)).cloned().collect();
        assert_eq!(paths_of(&both), union);
        assert_eq!(union, set_of(&["/a/b", "/a/b/c", "/d", "/d/f"]));
    }

    #[test]
    fn test_ordered_comparison_is_numeric() {
        let fx = make_fixture();
        put(&fx, "Size", "/a/b", 9.into());
        put(&fx, "Size", "/a/e", 10.into());
        put(&fx, "Size", "/d", 100.into());

        let result = fx
            .engine
            .find_directories(&query(json!({"Size": {">": "9", "<=": 100}})), "/")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/a/e", "/d", "/d/f"]));

        let result = fx
            .engine
            .find_directories(&query(json!({"Size": {"nin": [10, 100]}})), "/")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/a/b", "/a/b/c"]));
    }

    #[test]
    fn test_operand_must_coerce() {
        let fx = make_fixture();
        assert!(matches!(
            fx.engine
                .find_directories(&query(json!({"Size": {">": "big"}})), "/"),
            Err(CatalogError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_any_and_missing_are_complements() {
        let fx = make_fixture();
        put(&fx, "Color", "/a/b", "red".into());
        let any = fx
            .engine
            .find_directories(&query(json!({"Color": "Any"})), "/a")
            .unwrap();
        let missing = fx
            .engine
            .find_directories(&query(json!({"Color": "Missing"})), "/a")
            .unwrap();
        assert_eq!(paths_of(&any), set_of(&["/a/b", "/a/b/c"]));
        assert_eq!(paths_of(&missing), set_of(&["/a", "/a/e"]));
    }

    #[test]
    fn test_fields_intersect() {
        let fx = make_fixture();
        put(&fx, "Color", "/a", "red".into());
        put(&fx, "Size", "/a/b", 20.into());
        put(&fx, "Size", "/d", 30.into());
        let result = fx
            .engine
            .find_directories(&query(json!({"Color": "red", "Size": {">": 10}})), "/")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/a/b", "/a/b/c"]));
    }

    #[test]
    fn test_unconstrained_versus_empty() {
        let fx = make_fixture();
        let result = fx
            .engine
            .find_directories(&query(json!({"Run": 5})), "/")
            .unwrap();
        assert!(result.selection.is_unconstrained());
        assert_eq!(result.extra["Run"], Predicate::Equals(5.into()));

        let result = fx
            .engine
            .find_directories(&query(json!({"Color": "red"})), "/")
            .unwrap();
        assert_eq!(result.selection, Selection::Directories(BTreeMap::new()));
    }

    #[test]
    fn test_scope_restricts_result() {
        let fx = make_fixture();
        put(&fx, "Color", "/", "red".into());
        let result = fx
            .engine
            .find_directories(&query(json!({"Color": "red"})), "/d")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/d", "/d/f"]));

        let scoped = fx.engine.find_directories(&Query::new(), "/a/b").unwrap();
        assert_eq!(paths_of(&scoped), set_of(&["/a/b", "/a/b/c"]));
    }

    #[test]
    fn test_meta_set_expansion() {
        let fx = make_fixture();
        let entries = [
            ("Color".to_string(), MetaValue::from("red")),
            ("Size".to_string(), MetaValue::from(5)),
        ]
        .into_iter()
        .collect();
        fx.sets.create_set("small_red", &entries).unwrap();
        put(&fx, "Color", "/a", "red".into());
        put(&fx, "Size", "/a/e", 5.into());
        put(&fx, "Size", "/d", 5.into());

        let result = fx
            .engine
            .find_directories(&query(json!({"Config": "small_red"})), "/")
            .unwrap();
        assert_eq!(paths_of(&result), set_of(&["/a/e"]));

        match fx
            .engine
            .find_directories(&query(json!({"Config": "small_red", "Size": 5})), "/")
        {
            Err(CatalogError::SetConflict {
                kind: SetConflictKind::KeyCollision { key },
                ..
            }) => assert_eq!(key, "Size"),
            other => panic!("expected KeyCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_find_files() {
        let fx = make_fixture();
        fx.tree.add_file("/a/b", "x.dat").unwrap();
        fx.tree.add_file("/a/b/c", "sub/y.dat").unwrap();
        fx.tree.add_file("/d", "z.dat").unwrap();
        put(&fx, "Color", "/a/b", "red".into());

        let mut files = fx
            .engine
            .find_files(&query(json!({"Color": "red"})), "/")
            .unwrap();
        files.sort();
        assert_eq!(files, vec!["/a/b/c/y.dat", "/a/b/x.dat"]);

        let all = fx.engine.find_files(&Query::new(), "/").unwrap();
        assert_eq!(all.len(), 3);
    }
}
