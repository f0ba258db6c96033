// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end query tests against populated fact bases

use std::sync::Arc;

use factql_query::{
    and_, asc, desc, eq, func, ge, gt, in_, lt, ne, not_, or_, output, ph, ph_named,
    ph_named_default, Condition, FixedJoinOrder, JoinOrderStrategy, Params, QueryConfig,
    QueryError, QueryExt, Selection,
};
use factql_store::{Fact, FactBase, FactMap, FieldKind, RecordType, Root, Value};

fn int_type(name: &str, fields: &[&str]) -> Arc<RecordType> {
    fields
        .iter()
        .fold(RecordType::builder(name), |b, f| b.field(*f, FieldKind::Integer))
        .build()
        .unwrap()
}

fn ints(ty: &Arc<RecordType>, values: &[i64]) -> Fact {
    Fact::new(ty, values.iter().map(|v| Value::Int(*v)).collect()).unwrap()
}

fn populated(ty: &Arc<RecordType>, rows: &[&[i64]]) -> FactBase {
    let mut base = FactBase::new();
    for row in rows {
        base.add(ints(ty, row)).unwrap();
    }
    base
}

// ============================================================================
// Ordering, grouping, delete
// ============================================================================

#[test]
fn test_order_by_desc_is_deterministic() {
    let ty = int_type("P", &["a"]);
    let p = Root::new(&ty);
    let base = populated(&ty, &[&[1], &[3], &[2]]);
    let query = base
        .query([p.clone()])
        .unwrap()
        .order_by([desc(p.field("a").unwrap())])
        .unwrap();

    let expected: Vec<Value> = [3, 2, 1].iter().map(|a| Value::Fact(ints(&ty, &[*a]))).collect();
    let first: Vec<Value> = query.all().unwrap().collect();
    let second: Vec<Value> = query.all().unwrap().collect();
    assert_eq!(first, expected);
    assert_eq!(second, first);
}

fn sales(entries: &[(&str, i64)]) -> (FactBase, Root) {
    let ty = RecordType::builder("Sale")
        .field("cat", FieldKind::String)
        .field("v", FieldKind::Integer)
        .build()
        .unwrap();
    let mut base = FactBase::new();
    for (cat, v) in entries {
        base.add(Fact::new(&ty, vec![Value::from(*cat), Value::Int(*v)]).unwrap())
            .unwrap();
    }
    (base, Root::new(&ty))
}

fn grouped_sales(base: &FactBase, sale: &Root) -> Vec<(Value, Vec<Value>)> {
    base.query([sale.clone()])
        .unwrap()
        .group_by([sale.field("cat").unwrap()])
        .unwrap()
        .select([sale.field("v").unwrap()])
        .unwrap()
        .groups()
        .unwrap()
        .collect()
}

#[test]
fn test_grouping_yields_groups_in_key_order() {
    let (base, sale) = sales(&[("x", 10), ("x", 20), ("y", 5)]);
    let expected = vec![
        (Value::from("x"), vec![Value::Int(10), Value::Int(20)]),
        (Value::from("y"), vec![Value::Int(5)]),
    ];
    assert_eq!(grouped_sales(&base, &sale), expected);

    let query = base
        .query([sale.clone()])
        .unwrap()
        .group_by([sale.field("cat").unwrap()])
        .unwrap();
    let counts: Vec<(Value, usize)> = query.group_counts().unwrap().collect();
    assert_eq!(counts, vec![(Value::from("x"), 2), (Value::from("y"), 1)]);

    // Insertion order does not decide group order; members keep theirs.
    let (base, sale) = sales(&[("y", 5), ("x", 20), ("x", 10)]);
    assert_eq!(
        grouped_sales(&base, &sale),
        vec![
            (Value::from("x"), vec![Value::Int(20), Value::Int(10)]),
            (Value::from("y"), vec![Value::Int(5)]),
        ]
    );
}

#[test]
fn test_delete_count_and_remaining_store() {
    let ty = int_type("P", &["a"]);
    let p = Root::new(&ty);
    let mut base = populated(&ty, &[&[1], &[2], &[3]]);

    let removed = base
        .query_mut([p.clone()])
        .unwrap()
        .where_(gt(p.field("a").unwrap(), 1))
        .unwrap()
        .delete()
        .unwrap();
    assert_eq!(removed, 2);
    let remaining: Vec<&Fact> = base.facts("P").unwrap().iter().collect();
    assert_eq!(remaining, vec![&ints(&ty, &[1])]);
}

#[test]
fn test_delete_large_filtered_set() {
    let ty = int_type("P", &["a", "b"]);
    let p = Root::new(&ty);
    let mut base = FactBase::with_indexes([p.field("b").unwrap()]).unwrap();
    for a in 0..40_000 {
        base.add(ints(&ty, &[a, a % 7])).unwrap();
    }

    let removed = base
        .query_mut([p.clone()])
        .unwrap()
        .where_(ge(p.field("a").unwrap(), 100))
        .unwrap()
        .delete()
        .unwrap();
    assert_eq!(removed, 39_900);
    assert_eq!(base.len(), 100);

    let map = base.factmap("P").unwrap();
    let index = map.index(&p.field("b").unwrap()).unwrap();
    assert_eq!(index.len(), 100);
    let remaining: Vec<i64> = map
        .facts()
        .iter()
        .map(|f| f.value(0).and_then(Value::as_int).unwrap())
        .collect();
    assert_eq!(remaining, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_delete_restricted_to_selected_root() {
    let pt = int_type("P", &["id"]);
    let qt = int_type("Q", &["pid"]);
    let (p, q) = (Root::new(&pt), Root::new(&qt));
    let mut base = populated(&pt, &[&[1], &[2]]);
    base.add_all([ints(&qt, &[1]), ints(&qt, &[1]), ints(&qt, &[3])]).unwrap();

    let removed = base
        .query_mut([p.clone(), q.clone()])
        .unwrap()
        .join([eq(p.field("id").unwrap(), q.field("pid").unwrap())])
        .unwrap()
        .select([q.path()])
        .unwrap()
        .delete()
        .unwrap();
    // Q(1) is stored once; sets deduplicate.
    assert_eq!(removed, 1);
    assert_eq!(base.facts("P").unwrap().len(), 2);
    assert_eq!(base.facts("Q").unwrap().len(), 1);
}

#[test]
fn test_delete_rejects_incompatible_options() {
    let ty = int_type("P", &["a"]);
    let p = Root::new(&ty);
    let mut base = populated(&ty, &[&[1]]);
    let err = base
        .query_mut([p.clone()])
        .unwrap()
        .tuple()
        .unwrap()
        .delete()
        .unwrap_err();
    assert!(matches!(err, QueryError::Compatibility(_)));
    assert_eq!(base.len(), 1);
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_join_connectivity_rejection() {
    let (at, bt, ct) = (int_type("A", &["x"]), int_type("B", &["x"]), int_type("C", &["x"]));
    let (a, b, c) = (Root::new(&at), Root::new(&bt), Root::new(&ct));
    let base = FactBase::new();
    let err = base
        .query([a.clone(), b.clone(), c])
        .unwrap()
        .join([eq(a.field("x").unwrap(), b.field("x").unwrap())])
        .unwrap_err();
    assert!(matches!(err, QueryError::Connectivity(_)));
}

#[test]
fn test_multi_root_query_without_joins_fails_at_plan_time() {
    let (at, bt) = (int_type("A", &["x"]), int_type("B", &["x"]));
    let (a, b) = (Root::new(&at), Root::new(&bt));
    let base = FactBase::new();
    let query = base.query([a, b]).unwrap();
    assert!(matches!(query.query_plan(), Err(QueryError::Connectivity(_))));
    assert!(matches!(query.all(), Err(QueryError::Connectivity(_))));
}

#[test]
fn test_three_way_join_with_postjoin_order() {
    let person = int_type("Person", &["id", "age"]);
    let owns = int_type("Owns", &["person", "pet"]);
    let pet = int_type("Pet", &["id", "legs"]);
    let (pr, ow, pt) = (Root::new(&person), Root::new(&owns), Root::new(&pet));

    let mut base = FactBase::with_indexes([ow.field("person").unwrap()]).unwrap();
    base.add_all([ints(&person, &[1, 30]), ints(&person, &[2, 40]), ints(&person, &[3, 50])])
        .unwrap();
    base.add_all([ints(&owns, &[1, 10]), ints(&owns, &[2, 11]), ints(&owns, &[2, 12])])
        .unwrap();
    base.add_all([ints(&pet, &[10, 4]), ints(&pet, &[11, 2]), ints(&pet, &[12, 8])])
        .unwrap();

    let query = base
        .query([pr.clone(), ow.clone(), pt.clone()])
        .unwrap()
        .join([
            eq(pr.field("id").unwrap(), ow.field("person").unwrap()),
            eq(ow.field("pet").unwrap(), pt.field("id").unwrap()),
        ])
        .unwrap()
        .where_(gt(pr.field("age").unwrap(), 35))
        .unwrap()
        .order_by([desc(pt.field("legs").unwrap())])
        .unwrap()
        .select([pr.field("id").unwrap(), pt.field("legs").unwrap()])
        .unwrap();

    let answers: Vec<Value> = query.all().unwrap().collect();
    assert_eq!(
        answers,
        vec![
            Value::Tuple(vec![Value::Int(2), Value::Int(8)]),
            Value::Tuple(vec![Value::Int(2), Value::Int(2)]),
        ]
    );

    let plan = query.query_plan().unwrap();
    assert_eq!(plan.len(), 3);
    assert!(plan.steps().last().unwrap().postjoin_orderbys().is_some());
}

#[test]
fn test_self_join_through_alias() {
    let edge = int_type("Edge", &["src", "dst"]);
    let first = Root::alias(&edge, "e1");
    let second = Root::alias(&edge, "e2");
    let base = populated(&edge, &[&[1, 2], &[2, 3], &[3, 4], &[5, 6]]);

    let paths: Vec<Value> = base
        .query([first.clone(), second.clone()])
        .unwrap()
        .join([eq(first.field("dst").unwrap(), second.field("src").unwrap())])
        .unwrap()
        .order_by([asc(first.field("src").unwrap())])
        .unwrap()
        .select([first.field("src").unwrap(), second.field("dst").unwrap()])
        .unwrap()
        .all()
        .unwrap()
        .collect();
    assert_eq!(
        paths,
        vec![
            Value::Tuple(vec![Value::Int(1), Value::Int(3)]),
            Value::Tuple(vec![Value::Int(2), Value::Int(4)]),
        ]
    );
}

#[test]
fn test_fixed_and_configured_join_orders_agree() {
    let pt = int_type("P", &["id"]);
    let qt = int_type("Q", &["pid", "n"]);
    let (p, q) = (Root::new(&pt), Root::new(&qt));
    let mut base = populated(&pt, &[&[1], &[2], &[3]]);
    base.add_all([ints(&qt, &[1, 7]), ints(&qt, &[3, 8]), ints(&qt, &[3, 9])]).unwrap();

    let make = || {
        base.query([p.clone(), q.clone()])
            .unwrap()
            .join([eq(p.field("id").unwrap(), q.field("pid").unwrap())])
            .unwrap()
            .select([q.field("n").unwrap()])
            .unwrap()
    };
    let mut fixed: Vec<Value> = make()
        .heuristic(FixedJoinOrder::new([q.clone(), p.clone()]))
        .unwrap()
        .all()
        .unwrap()
        .collect();
    let config = QueryConfig {
        default_join_order: JoinOrderStrategy::Basic,
        temp_index_min_facts: 1,
        ..QueryConfig::default()
    };
    let mut basic: Vec<Value> = make().with_config(config).unwrap().all().unwrap().collect();
    fixed.sort();
    basic.sort();
    assert_eq!(fixed, basic);
    assert_eq!(basic, vec![Value::Int(7), Value::Int(8), Value::Int(9)]);
}

// ============================================================================
// Filters, placeholders, projection
// ============================================================================

#[test]
fn test_index_assisted_equivalence() {
    let ty = int_type("P", &["a", "b"]);
    let p = Root::new(&ty);
    let rows: Vec<Vec<i64>> = (0..40).map(|i| vec![i % 7, i]).collect();

    let mut plain = FactBase::new();
    let mut indexed = FactBase::with_indexes([p.field("a").unwrap()]).unwrap();
    for row in &rows {
        plain.add(ints(&ty, row)).unwrap();
        indexed.add(ints(&ty, row)).unwrap();
    }

    let run = |base: &FactBase| {
        let mut answers: Vec<Value> = base
            .query([p.clone()])
            .unwrap()
            .where_(eq(p.field("a").unwrap(), 5))
            .unwrap()
            .all()
            .unwrap()
            .collect();
        answers.sort();
        answers
    };
    assert_eq!(run(&plain), run(&indexed));
    assert_eq!(run(&plain).len(), 5);

    let plan = indexed
        .query([p.clone()])
        .unwrap()
        .where_(eq(p.field("a").unwrap(), 5))
        .unwrap()
        .query_plan()
        .unwrap();
    assert_eq!(plan.steps()[0].prejoin_key().unwrap().to_string(), "P.a == 5");
}

#[test]
fn test_placeholders_and_defaults() {
    let ty = int_type("P", &["a"]);
    let p = Root::new(&ty);
    let base = populated(&ty, &[&[1], &[2], &[3], &[4]]);
    let a = p.field("a").unwrap();

    let query = base
        .query([p.clone()])
        .unwrap()
        .where_(and_([
            gt(a.clone(), ph(0)),
            lt(a.clone(), ph_named_default("hi", 4)),
            ne(a.clone(), ph_named("skip")),
        ]))
        .unwrap()
        .select([a.clone()])
        .unwrap();

    match query.clone().all() {
        Err(QueryError::Binding { placeholders }) => {
            assert_eq!(placeholders, vec!["ph(0)", "ph(skip)"]);
        }
        other => panic!("expected binding error, got {:?}", other.map(|it| it.count())),
    }

    let answers: Vec<Value> = query
        .bind(Params::new().arg(0).with("skip", 2))
        .unwrap()
        .all()
        .unwrap()
        .collect();
    assert_eq!(answers, vec![Value::Int(1), Value::Int(3)]);
}

#[test]
fn test_function_comparator_with_parameter() {
    let ty = int_type("P", &["a", "b"]);
    let p = Root::new(&ty);
    let base = populated(&ty, &[&[1, 1], &[2, 5], &[3, 3], &[4, 9]]);

    let gap = func("gap", [p.field("a").unwrap(), p.field("b").unwrap()], |args| {
        match (args[0].as_int(), args[1].as_int(), args[2].as_int()) {
            (Some(a), Some(b), Some(min)) => (b - a).abs() >= min,
            _ => false,
        }
    })
    .param("min");

    let query = base.query([p.clone()]).unwrap().where_(gap.clone().into()).unwrap();
    assert!(matches!(query.count(), Err(QueryError::Binding { .. })));

    let wide = query.clone().bind(Params::new().with("min", 3)).unwrap();
    assert_eq!(wide.count().unwrap(), 2);

    let positional = query.clone().bind(Params::new().arg(5)).unwrap();
    assert_eq!(positional.count().unwrap(), 1);

    let inverse = base
        .query([p.clone()])
        .unwrap()
        .where_(not_(gap.into()))
        .unwrap()
        .bind(Params::new().with("min", 3))
        .unwrap();
    assert_eq!(inverse.count().unwrap(), 2);
}

#[test]
fn test_membership_and_disjunction() {
    let ty = int_type("P", &["a", "b"]);
    let p = Root::new(&ty);
    let base = populated(&ty, &[&[1, 0], &[2, 0], &[3, 1], &[4, 1]]);
    let a = p.field("a").unwrap();
    let b = p.field("b").unwrap();

    let count = base
        .query([p.clone()])
        .unwrap()
        .where_(or_([
            in_(a.clone(), vec![Value::Int(1), Value::Int(4)]),
            and_([eq(b.clone(), 1), lt(a.clone(), 4)]),
        ]))
        .unwrap()
        .count()
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_select_output_function_tuple_and_distinct() {
    let ty = int_type("P", &["a", "b"]);
    let p = Root::new(&ty);
    let base = populated(&ty, &[&[1, 2], &[2, 1], &[3, 0]]);
    let (a, b) = (p.field("a").unwrap(), p.field("b").unwrap());

    let sums: Vec<Value> = base
        .query([p.clone()])
        .unwrap()
        .select([output("sum", [a.clone(), b.clone()], |args| {
            Value::Int(args.iter().filter_map(Value::as_int).sum())
        })])
        .unwrap()
        .distinct()
        .unwrap()
        .all()
        .unwrap()
        .collect();
    assert_eq!(sums, vec![Value::Int(3)]);

    let tupled = base
        .query([p.clone()])
        .unwrap()
        .order_by([a.clone()])
        .unwrap()
        .select([Selection::from(b.clone())])
        .unwrap()
        .tuple()
        .unwrap()
        .first()
        .unwrap();
    assert_eq!(tupled, Value::Tuple(vec![Value::Int(2)]));
}

#[test]
fn test_scope_and_cardinality_errors() {
    let pt = int_type("P", &["a"]);
    let qt = int_type("Q", &["a"]);
    let (p, q) = (Root::new(&pt), Root::new(&qt));
    let base = populated(&pt, &[&[1], &[2]]);

    let scope = base.query([p.clone()]).unwrap().where_(eq(q.field("a").unwrap(), 1));
    assert!(matches!(scope, Err(QueryError::Scope(_))));

    for comparator_free in [Condition::And(Vec::new()), Condition::Or(Vec::new())] {
        let filtered = base.query([p.clone()]).unwrap().where_(comparator_free);
        assert!(matches!(filtered, Err(QueryError::Scope(_))));
    }

    let both = base.query([p.clone()]).unwrap().ordered().unwrap().order_by([p.field("a").unwrap()]);
    assert!(matches!(both, Err(QueryError::Compatibility(_))));

    let many = base.query([p.clone()]).unwrap();
    assert!(matches!(many.singleton(), Err(QueryError::Cardinality(_))));
    let empty = base.query([q]).unwrap();
    assert!(matches!(empty.first(), Err(QueryError::Cardinality(_))));
    assert_eq!(empty.count().unwrap(), 0);
}

#[test]
fn test_explain_json_describes_plan() {
    let pt = int_type("P", &["id", "n"]);
    let qt = int_type("Q", &["pid"]);
    let (p, q) = (Root::new(&pt), Root::new(&qt));
    let mut base = FactBase::with_indexes([p.field("n").unwrap()]).unwrap();
    base.add(ints(&pt, &[1, 2])).unwrap();

    let explain = base
        .query([p.clone(), q.clone()])
        .unwrap()
        .join([eq(p.field("id").unwrap(), q.field("pid").unwrap())])
        .unwrap()
        .where_(eq(p.field("n").unwrap(), ph(0)))
        .unwrap()
        .heuristic(FixedJoinOrder::new([p.clone(), q.clone()]))
        .unwrap()
        .query_plan()
        .unwrap()
        .explain();
    assert_eq!(explain.join_order, vec!["P", "Q"]);
    let json = explain.to_json().unwrap();
    assert!(json.contains("\"prejoin_key\": \"P.n == ph(0)\""));
    assert!(json.contains("\"join_key\": \"Q.pid == P.id\""));
}

#[test]
fn test_config_from_json() {
    let config = QueryConfig::from_json(r#"{"default_join_order": "basic"}"#).unwrap();
    assert_eq!(config.default_join_order, JoinOrderStrategy::Basic);
    assert_eq!(config.temp_index_min_facts, QueryConfig::default().temp_index_min_facts);
    assert!(matches!(
        QueryConfig::from_json(r#"{"temp_index_min_facts": 0}"#),
        Err(QueryError::InvalidConfig(_))
    ));
}

#[test]
fn test_factmap_algebra_keeps_indexes() {
    let ty = int_type("P", &["a"]);
    let p = Root::new(&ty);
    let mut left = FactMap::new(&ty, [p.field("a").unwrap()]).unwrap();
    left.add(ints(&ty, &[1])).unwrap();
    left.add(ints(&ty, &[2])).unwrap();
    let mut right = FactMap::new(&ty, []).unwrap();
    right.add(ints(&ty, &[2])).unwrap();
    right.add(ints(&ty, &[3])).unwrap();

    let union = left.union(right.facts()).unwrap();
    assert_eq!(union.len(), 3);
    let index = union.index(&p.field("a").unwrap()).unwrap();
    assert_eq!(index.len(), 3);

    let difference = left.difference(right.facts()).unwrap();
    assert_eq!(difference.facts().iter().collect::<Vec<_>>(), vec![&ints(&ty, &[1])]);
}
