// SPDX-License-Identifier: PMPL-1.0-or-later
//! Clausal normalization of filter expressions.
//!
//! A `where` expression is validated against the declared roots, rewritten
//! into negation normal form, distributed into conjunctive normal form and
//! flattened into a [`ClauseBlock`]. The block is then partitioned by the
//! roots each clause references so the planner can apply single-root
//! clauses before the join and the rest as soon as their roots are bound.

use factql_store::Root;
use indexmap::IndexMap;
use tracing::trace;

use crate::clause::{Clause, ClauseBlock};
use crate::condition::{Comparator, Condition};
use crate::error::QueryError;

/// Check that every path in `expr` belongs to one of `roots` and that every
/// leaf is a meaningful filter.
pub fn validate_where(expr: &Condition, roots: &[Root]) -> Result<(), QueryError> {
    let comparators = expr.comparators();
    if comparators.is_empty() {
        return Err(QueryError::Scope(format!(
            "'{}' has no comparisons and is not a meaningful filter",
            expr
        )));
    }
    for comparator in comparators {
        match comparator {
            Comparator::Static(_) => {
                return Err(QueryError::Scope(
                    "a static condition is not a meaningful filter".to_string(),
                ))
            }
            Comparator::Cross(..) => {
                return Err(QueryError::Scope(format!(
                    "'{}' is only valid in a join",
                    comparator
                )))
            }
            Comparator::Standard(_) | Comparator::Function(_) => {}
        }
        let paths = comparator.paths();
        if paths.is_empty() {
            return Err(QueryError::Scope(format!(
                "'{}' references no field path",
                comparator
            )));
        }
        for path in paths {
            if !roots.contains(path.root()) {
                return Err(QueryError::Scope(format!(
                    "'{}' references '{}', which is not a declared root",
                    comparator,
                    path.root()
                )));
            }
        }
    }
    Ok(())
}

/// Push negation down to the comparators.
///
/// Empty conjunctions and disjunctions become their static literals.
pub fn to_nnf(expr: &Condition) -> Condition {
    nnf(expr, false)
}

fn nnf(expr: &Condition, negated: bool) -> Condition {
    match expr {
        Condition::Compare(c) if negated => Condition::Compare(c.negate()),
        Condition::Compare(c) => Condition::Compare(c.clone()),
        Condition::Not(inner) => nnf(inner, !negated),
        Condition::And(cs) | Condition::Or(cs) if cs.is_empty() => {
            let value = matches!(expr, Condition::And(_)) != negated;
            Condition::Compare(Comparator::Static(value))
        }
        Condition::And(cs) => {
            let children = cs.iter().map(|c| nnf(c, negated)).collect();
            if negated {
                Condition::Or(children)
            } else {
                Condition::And(children)
            }
        }
        Condition::Or(cs) => {
            let children = cs.iter().map(|c| nnf(c, negated)).collect();
            if negated {
                Condition::And(children)
            } else {
                Condition::Or(children)
            }
        }
    }
}

/// Distribute disjunction over conjunction.
///
/// The result is an `And` of `Or`s of comparators. `expr` must already be
/// in negation normal form.
pub fn to_cnf(expr: &Condition) -> Condition {
    Condition::And(
        cnf_clauses(expr)
            .into_iter()
            .map(|clause| Condition::Or(clause.into_iter().map(Condition::Compare).collect()))
            .collect(),
    )
}

/// The clauses of `expr` as lists of comparators.
fn cnf_clauses(expr: &Condition) -> Vec<Vec<Comparator>> {
    match expr {
        Condition::Compare(c) => vec![vec![c.clone()]],
        Condition::And(cs) => cs.iter().flat_map(cnf_clauses).collect(),
        Condition::Or(cs) => {
            let mut product: Vec<Vec<Comparator>> = vec![Vec::new()];
            for child in cs {
                let child_clauses = cnf_clauses(child);
                product = product
                    .iter()
                    .flat_map(|prefix| {
                        child_clauses.iter().map(move |clause| {
                            let mut combined = prefix.clone();
                            combined.extend(clause.iter().cloned());
                            combined
                        })
                    })
                    .collect();
            }
            product
        }
        Condition::Not(inner) => cnf_clauses(&nnf(inner, true)),
    }
}

/// Flatten a CNF expression into a clause block.
///
/// Each `Or` becomes one clause; an empty disjunction becomes the clause
/// `false`. Returns `None` for an empty conjunction.
pub fn extract_clauses(cnf: &Condition) -> Option<ClauseBlock> {
    let mut clauses = Vec::new();
    collect_clauses(cnf, &mut clauses);
    ClauseBlock::new(clauses)
}

fn collect_clauses(expr: &Condition, clauses: &mut Vec<Clause>) {
    match expr {
        Condition::And(cs) => {
            for c in cs {
                collect_clauses(c, clauses);
            }
        }
        other => {
            let comparators: Vec<Comparator> = other.comparators().into_iter().cloned().collect();
            let clause = Clause::new(comparators)
                .or_else(|| Clause::new(vec![Comparator::Static(false)]));
            clauses.extend(clause);
        }
    }
}

/// Validate a filter and normalize it into a clause block.
pub fn process_where(expr: &Condition, roots: &[Root]) -> Result<Option<ClauseBlock>, QueryError> {
    validate_where(expr, roots)?;
    let nnf = to_nnf(expr);
    let cnf = to_cnf(&nnf);
    let block = extract_clauses(&cnf);
    trace!(
        clauses = block.as_ref().map_or(0, ClauseBlock::len),
        "Normalized where expression"
    );
    Ok(block)
}

/// Clauses split by the roots they reference.
#[derive(Debug, Clone, Default)]
pub struct PartitionedClauses {
    /// Clauses over exactly one root, keyed by that root.
    pub per_root: IndexMap<Root, ClauseBlock>,
    /// Clauses over zero or several roots.
    pub catch_all: Option<ClauseBlock>,
}

pub fn partition_clauses(block: Option<&ClauseBlock>) -> PartitionedClauses {
    let mut per_root: IndexMap<Root, Vec<Clause>> = IndexMap::new();
    let mut catch_all = Vec::new();
    for clause in block.map(ClauseBlock::clauses).unwrap_or(&[]) {
        match clause.roots().as_slice() {
            [root] => per_root.entry(root.clone()).or_default().push(clause.clone()),
            _ => catch_all.push(clause.clone()),
        }
    }
    PartitionedClauses {
        per_root: per_root
            .into_iter()
            .filter_map(|(root, clauses)| Some((root, ClauseBlock::new(clauses)?)))
            .collect(),
        catch_all: ClauseBlock::new(catch_all),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{and_, cross, eq, func, gt, lt, ne, not_, or_, Row};
    use factql_store::{Fact, FieldKind, RecordType, Value};
    use std::sync::Arc;

    fn types() -> (Arc<RecordType>, Arc<RecordType>) {
        let p = RecordType::builder("p")
            .field("a", FieldKind::Integer)
            .field("b", FieldKind::Integer)
            .build()
            .unwrap();
        let q = RecordType::builder("q")
            .field("a", FieldKind::Integer)
            .build()
            .unwrap();
        (p, q)
    }

    #[test]
    fn test_validate_rejects_out_of_scope() {
        let (p, q) = types();
        let pr = Root::new(&p);
        let qa = Root::new(&q).field("a").unwrap();
        let err = process_where(&eq(qa, 1), &[pr.clone()]).unwrap_err();
        assert!(matches!(err, QueryError::Scope(_)));

        let static_only = Condition::Compare(Comparator::Static(true));
        assert!(process_where(&static_only, &[pr.clone()]).is_err());

        let no_path = eq(1, 2);
        assert!(process_where(&no_path, &[pr.clone()]).is_err());

        let marker = cross(&pr, &Root::new(&q));
        assert!(process_where(&marker, &[pr]).is_err());
    }

    #[test]
    fn test_validate_rejects_comparator_free_combinations() {
        let (p, _) = types();
        let root = Root::new(&p);
        for expr in [
            Condition::And(Vec::new()),
            Condition::Or(Vec::new()),
            not_(Condition::Or(vec![Condition::And(Vec::new())])),
        ] {
            let err = process_where(&expr, std::slice::from_ref(&root)).unwrap_err();
            assert!(matches!(err, QueryError::Scope(_)), "{expr}");
        }
    }

    #[test]
    fn test_cnf_distributes_or_over_and() {
        let (p, _) = types();
        let root = Root::new(&p);
        let a = root.field("a").unwrap();
        let b = root.field("b").unwrap();
        // a == 1 | (b == 2 & b == 3)  =>  (a == 1 | b == 2) & (a == 1 | b == 3)
        let expr = or_([eq(a.clone(), 1), and_([eq(b.clone(), 2), eq(b, 3)])]);
        let block = process_where(&expr, &[root]).unwrap().unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.to_string(), "(p.a == 1 | p.b == 2) & (p.a == 1 | p.b == 3)");
    }

    #[test]
    fn test_nnf_applies_de_morgan() {
        let (p, _) = types();
        let root = Root::new(&p);
        let a = root.field("a").unwrap();
        let expr = not_(and_([gt(a.clone(), 1), lt(a, 5)]));
        let block = process_where(&expr, &[root]).unwrap().unwrap();
        assert_eq!(block.to_string(), "(p.a <= 1 | p.a >= 5)");
    }

    #[test]
    fn test_normalized_block_agrees_with_expression() {
        let (p, _) = types();
        let root = Root::new(&p);
        let a = root.field("a").unwrap();
        let b = root.field("b").unwrap();
        let expr = not_(or_([
            and_([gt(a.clone(), 1), ne(b.clone(), 2)]),
            not_(or_([eq(a.clone(), 3), lt(b.clone(), 0)])),
        ]));
        let block = process_where(&expr, std::slice::from_ref(&root)).unwrap().unwrap();
        for x in -1..5 {
            for y in -1..4 {
                let fact = Fact::new(&p, vec![Value::Int(x), Value::Int(y)]).unwrap();
                let row = Row::new(std::slice::from_ref(&root), std::slice::from_ref(&fact));
                assert_eq!(expr.evaluate(&row), block.evaluate(&row), "p({x},{y})");
            }
        }
    }

    #[test]
    fn test_empty_disjunction_is_false() {
        let (p, _) = types();
        let root = Root::new(&p);
        let a = root.field("a").unwrap();
        let expr = Condition::And(vec![eq(a, 1), Condition::Or(Vec::new())]);
        let block = process_where(&expr, std::slice::from_ref(&root)).unwrap().unwrap();
        let fact = Fact::new(&p, vec![Value::Int(1), Value::Int(0)]).unwrap();
        let row = Row::new(std::slice::from_ref(&root), std::slice::from_ref(&fact));
        assert!(!block.evaluate(&row));
    }

    #[test]
    fn test_partition_by_root() {
        let (p, q) = types();
        let pr = Root::new(&p);
        let qr = Root::new(&q);
        let pa = pr.field("a").unwrap();
        let qa = qr.field("a").unwrap();
        let same = func("same", [pa.clone(), qa.clone()], |args: &[Value]| args[0] == args[1]);
        let expr = and_([
            eq(pa.clone(), 1),
            or_([eq(qa.clone(), 2), eq(qa, 3)]),
            or_([eq(pa, 4), Condition::from(same)]),
        ]);
        let block = process_where(&expr, &[pr.clone(), qr.clone()]).unwrap();
        let parts = partition_clauses(block.as_ref());
        assert_eq!(parts.per_root.len(), 2);
        assert_eq!(parts.per_root[&pr].len(), 1);
        assert_eq!(parts.per_root[&qr].len(), 1);
        assert_eq!(parts.catch_all.map(|b| b.len()), Some(1));
    }
}
