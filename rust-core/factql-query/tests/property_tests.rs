// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for condition normalization and query execution

use std::sync::Arc;

use factql_query::normalize::{extract_clauses, to_cnf, to_nnf};
use factql_query::{and_, in_, not_, or_, Condition, QueryExt, Row, StandardComparator};
use factql_store::{CompareOp, Fact, FactBase, FieldKind, RecordType, Root, Value};
use proptest::prelude::*;

const FIELDS: [&str; 2] = ["a", "b"];

fn record_type() -> Arc<RecordType> {
    RecordType::builder("p")
        .field("a", FieldKind::Integer)
        .field("b", FieldKind::Integer)
        .build()
        .unwrap()
}

/// Condition trees over `p.a`/`p.b`, independent of any particular root.
#[derive(Debug, Clone)]
enum Expr {
    Compare(usize, CompareOp, i64),
    In(usize, Vec<i64>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

fn arb_op() -> impl Strategy<Value = CompareOp> {
    prop::sample::select(vec![
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ])
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (0usize..2, arb_op(), -1i64..4).prop_map(|(f, op, v)| Expr::Compare(f, op, v)),
        (0usize..2, prop::collection::vec(-1i64..4, 0..3)).prop_map(|(f, vs)| Expr::In(f, vs)),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expr::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expr::Or),
            inner.prop_map(|e| Expr::Not(Box::new(e))),
        ]
    })
}

fn to_condition(expr: &Expr, root: &Root) -> Condition {
    match expr {
        Expr::Compare(field, op, value) => {
            StandardComparator::new(*op, root.field(FIELDS[*field]).unwrap(), *value).into()
        }
        Expr::In(field, values) => in_(
            root.field(FIELDS[*field]).unwrap(),
            values.iter().map(|v| Value::Int(*v)).collect::<Vec<_>>(),
        ),
        Expr::And(items) => and_(items.iter().map(|e| to_condition(e, root))),
        Expr::Or(items) => or_(items.iter().map(|e| to_condition(e, root))),
        Expr::Not(inner) => not_(to_condition(inner, root)),
    }
}

fn fact(ty: &Arc<RecordType>, a: i64, b: i64) -> Fact {
    Fact::new(ty, vec![Value::Int(a), Value::Int(b)]).unwrap()
}

proptest! {
    #[test]
    fn test_negation_round_trip(expr in arb_expr(), a in -1i64..4, b in -1i64..4) {
        let ty = record_type();
        let root = Root::new(&ty);
        let condition = to_condition(&expr, &root);
        let f = fact(&ty, a, b);
        let signature = [root.clone()];
        let facts = [f];
        let row = Row::new(&signature, &facts);

        prop_assert_eq!(condition.negate().negate().evaluate(&row), condition.evaluate(&row));
        prop_assert_eq!(condition.negate().evaluate(&row), !condition.evaluate(&row));
    }

    #[test]
    fn test_cnf_soundness(expr in arb_expr(), a in -1i64..4, b in -1i64..4) {
        let ty = record_type();
        let root = Root::new(&ty);
        let condition = to_condition(&expr, &root);
        let f = fact(&ty, a, b);
        let signature = [root.clone()];
        let facts = [f];
        let row = Row::new(&signature, &facts);

        let expected = condition.evaluate(&row);
        prop_assert_eq!(to_nnf(&condition).evaluate(&row), expected);
        let cnf = to_cnf(&condition);
        prop_assert_eq!(cnf.evaluate(&row), expected);
        if let Some(block) = extract_clauses(&cnf) {
            prop_assert_eq!(block.evaluate(&row), expected);
        }
    }

    #[test]
    fn test_index_assisted_equivalence(
        rows in prop::collection::vec((0i64..5, 0i64..5), 0..40),
        op in arb_op(),
        value in 0i64..5,
    ) {
        let ty = record_type();
        let root = Root::new(&ty);
        let a = root.field("a").unwrap();

        let mut plain = FactBase::new();
        let mut indexed = FactBase::with_indexes([a.clone()]).unwrap();
        for (x, y) in &rows {
            plain.add(fact(&ty, *x, *y)).unwrap();
            indexed.add(fact(&ty, *x, *y)).unwrap();
        }

        let run = |base: &FactBase| {
            let condition: Condition = StandardComparator::new(op, a.clone(), value).into();
            let mut answers: Vec<Value> = base
                .query([root.clone()])
                .unwrap()
                .where_(condition)
                .unwrap()
                .all()
                .unwrap()
                .collect();
            answers.sort();
            answers
        };
        prop_assert_eq!(run(&plain), run(&indexed));
    }
}
