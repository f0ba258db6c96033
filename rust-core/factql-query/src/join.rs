// SPDX-License-Identifier: PMPL-1.0-or-later
//! Join graph validation.

use std::collections::HashSet;

use factql_store::Root;

use crate::condition::{Comparator, Condition};
use crate::error::QueryError;

/// Validate join conditions against the declared roots.
///
/// Every join must be a standard comparison between paths of two distinct
/// declared roots, or a cross-product marker between two such roots. The
/// graph with roots as nodes and joins as edges must be connected. Returns
/// the join comparators, markers included; the planner drops the markers.
pub fn validate_join_expression(
    joins: &[Condition],
    roots: &[Root],
) -> Result<Vec<Comparator>, QueryError> {
    let mut comparators = Vec::with_capacity(joins.len());
    for join in joins {
        let comparator = match join {
            Condition::Compare(c @ Comparator::Standard(s)) => {
                if s.paths().len() != 2 {
                    return Err(QueryError::Connectivity(format!(
                        "join '{}' must compare two field paths",
                        s
                    )));
                }
                c.clone()
            }
            Condition::Compare(c @ Comparator::Cross(..)) => c.clone(),
            other => {
                return Err(QueryError::Connectivity(format!(
                    "join '{}' is not a comparison between two roots",
                    other
                )))
            }
        };
        let join_roots = comparator.roots();
        for root in &join_roots {
            if !roots.contains(root) {
                return Err(QueryError::Scope(format!(
                    "join '{}' references '{}', which is not a declared root",
                    comparator, root
                )));
            }
        }
        if join_roots.len() != 2 {
            return Err(QueryError::Connectivity(format!(
                "join '{}' must connect exactly two distinct roots",
                comparator
            )));
        }
        comparators.push(comparator);
    }
    check_connected(roots, &comparators)?;
    Ok(comparators)
}

/// Check that `joins` connect every root in `roots`.
pub fn check_connected(roots: &[Root], joins: &[Comparator]) -> Result<(), QueryError> {
    if roots.len() < 2 {
        return Ok(());
    }
    let edges: Vec<(Root, Root)> = joins
        .iter()
        .filter_map(|join| match join.roots().as_slice() {
            [a, b] => Some((a.clone(), b.clone())),
            _ => None,
        })
        .collect();

    for root in roots {
        if !edges.iter().any(|(a, b)| a == root || b == root) {
            return Err(QueryError::Connectivity(format!(
                "root '{}' is not joined to any other root",
                root
            )));
        }
    }

    let mut visited: HashSet<&Root> = HashSet::new();
    let mut stack = vec![&roots[0]];
    while let Some(root) = stack.pop() {
        if !visited.insert(root) {
            continue;
        }
        for (a, b) in &edges {
            if a == root && !visited.contains(b) {
                stack.push(b);
            } else if b == root && !visited.contains(a) {
                stack.push(a);
            }
        }
    }

    if let Some(unreached) = roots.iter().find(|r| !visited.contains(r)) {
        return Err(QueryError::Connectivity(format!(
            "join graph is disconnected: '{}' is unreachable from '{}'",
            unreached, roots[0]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{cross, eq, lt};
    use factql_store::{FieldKind, RecordType};

    fn roots() -> (Root, Root, Root) {
        let make = |name: &str| {
            let ty = RecordType::builder(name)
                .field("id", FieldKind::Integer)
                .build()
                .unwrap();
            Root::new(&ty)
        };
        (make("a"), make("b"), make("c"))
    }

    #[test]
    fn test_connected_chain() {
        let (a, b, c) = roots();
        let joins = [
            eq(a.field("id").unwrap(), b.field("id").unwrap()),
            lt(b.field("id").unwrap(), c.field("id").unwrap()),
        ];
        let validated = validate_join_expression(&joins, &[a, b, c]).unwrap();
        assert_eq!(validated.len(), 2);
    }

    #[test]
    fn test_unreachable_root() {
        let (a, b, c) = roots();
        let joins = [eq(a.field("id").unwrap(), b.field("id").unwrap())];
        let err = validate_join_expression(&joins, &[a, b, c]).unwrap_err();
        assert!(matches!(err, QueryError::Connectivity(_)));
    }

    #[test]
    fn test_disconnected_components() {
        let (a, b, c) = roots();
        let ty = RecordType::builder("d")
            .field("id", FieldKind::Integer)
            .build()
            .unwrap();
        let d = Root::new(&ty);
        let joins = [
            eq(a.field("id").unwrap(), b.field("id").unwrap()),
            eq(c.field("id").unwrap(), d.field("id").unwrap()),
        ];
        let err = validate_join_expression(&joins, &[a, b, c, d]).unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn test_cross_marker_satisfies_connectivity() {
        let (a, b, _) = roots();
        let validated = validate_join_expression(&[cross(&a, &b)], &[a, b]).unwrap();
        assert!(matches!(validated[0], Comparator::Cross(..)));
    }

    #[test]
    fn test_rejects_bad_joins() {
        let (a, b, c) = roots();
        let same_root = eq(a.field("id").unwrap(), a.field("id").unwrap());
        assert!(matches!(
            validate_join_expression(&[same_root], &[a.clone(), b.clone()]),
            Err(QueryError::Connectivity(_))
        ));

        let constant = eq(a.field("id").unwrap(), 1);
        assert!(validate_join_expression(&[constant], &[a.clone(), b.clone()]).is_err());

        let undeclared = eq(a.field("id").unwrap(), c.field("id").unwrap());
        assert!(matches!(
            validate_join_expression(&[undeclared], &[a, b]),
            Err(QueryError::Scope(_))
        ));
    }
}
