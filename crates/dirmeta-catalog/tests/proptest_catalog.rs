//! Property-based tests for dirmeta-catalog using proptest.
//!
//! Random assignments over a fixed tree; every property is checked
//! against the catalog's own query and metadata results.

mod common;

use std::collections::BTreeSet;

use common::{assignments, TestCatalog};
use dirmeta_catalog::{MetaValue, Ownership, Predicate, Query};
use proptest::prelude::*;

const COLORS: &[&str] = &["red", "green", "blue"];

/// Every directory of the standard fixture, root included.
fn all_paths(fx: &TestCatalog) -> Vec<String> {
    fx.subtree_paths("/")
}

/// Strategy for (directory index, color index) assignments.
fn any_assignments() -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((0usize..32, 0usize..COLORS.len()), 0..8)
}

/// Applies assignments in order, skipping directories whose chain or
/// subtree already holds a color so inheritance stays unambiguous.
fn apply(fx: &TestCatalog, picks: &[(usize, usize)]) {
    let paths = all_paths(fx);
    for (dir, color) in picks {
        let path = &paths[dir % paths.len()];
        if !found(fx, &query("Color", Predicate::Any), path).is_empty() {
            continue;
        }
        fx.catalog
            .set_metadata(path, &assignments(&[("Color", COLORS[*color].into())]))
            .unwrap();
    }
}

fn query(field: &str, predicate: Predicate) -> Query {
    [(field.to_string(), predicate)].into_iter().collect()
}

fn found(fx: &TestCatalog, q: &Query, scope: &str) -> BTreeSet<String> {
    fx.find_query(q, scope).into_iter().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_and_missing_are_complements(picks in any_assignments(), scope_idx in 0usize..32) {
        let fx = TestCatalog::standard();
        apply(&fx, &picks);
        let paths = all_paths(&fx);
        let scope = &paths[scope_idx % paths.len()];

        let any = found(&fx, &query("Color", Predicate::Any), scope);
        let missing = found(&fx, &query("Color", Predicate::Missing), scope);
        let expected: BTreeSet<String> = fx.subtree_paths(scope).into_iter().collect();

        prop_assert!(any.is_disjoint(&missing));
        prop_assert_eq!(any.union(&missing).cloned().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn prop_list_is_union_of_scalars(picks in any_assignments()) {
        let fx = TestCatalog::standard();
        apply(&fx, &picks);

        let both = found(
            &fx,
            &query("Color", Predicate::OneOf(vec!["red".into(), "blue".into()])),
            "/",
        );
        let red = found(&fx, &query("Color", Predicate::Equals("red".into())), "/");
        let blue = found(&fx, &query("Color", Predicate::Equals("blue".into())), "/");
        prop_assert_eq!(both, red.union(&blue).cloned().collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_fields_intersect(picks in any_assignments(), sizes in proptest::collection::vec((0usize..32, 0i64..40), 0..6)) {
        let fx = TestCatalog::standard();
        apply(&fx, &picks);
        let paths = all_paths(&fx);
        for (dir, size) in &sizes {
            let path = &paths[dir % paths.len()];
            let _ = fx.catalog.set_metadata(path, &assignments(&[("Size", (*size).into())]));
        }

        let color = query("Color", Predicate::Equals("red".into()));
        let size = query(
            "Size",
            Predicate::Conditions(vec![dirmeta_catalog::Condition {
                op: dirmeta_catalog::CompareOp::Gt,
                operand: dirmeta_catalog::Operand::Scalar(MetaValue::Integer(10)),
            }]),
        );
        let mut combined = color.clone();
        combined.extend(size.clone());

        let expected: BTreeSet<String> = found(&fx, &color, "/")
            .intersection(&found(&fx, &size, "/"))
            .cloned()
            .collect();
        prop_assert_eq!(found(&fx, &combined, "/"), expected);
    }

    #[test]
    fn prop_matches_are_inherited(picks in any_assignments()) {
        let fx = TestCatalog::standard();
        apply(&fx, &picks);

        let holders = found(&fx, &query("Color", Predicate::Any), "/");
        for path in all_paths(&fx) {
            let meta = fx.catalog.get_directory_metadata(&path, true, true).unwrap();
            match meta.owner_of("Color") {
                Some(Ownership::Own) | Some(Ownership::Inherited) => {
                    prop_assert!(holders.contains(&path));
                }
                other => {
                    prop_assert_eq!(other, None);
                    prop_assert!(!holders.contains(&path));
                }
            }
        }
    }
}
