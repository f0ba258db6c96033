// SPDX-License-Identifier: PMPL-1.0-or-later
//! Join-order heuristics.
//!
//! A heuristic picks the nesting order of the roots: the first root is the
//! outermost loop. Heuristics are structural; they look at the join
//! operators and the available indexes, never at fact counts.

use std::fmt;

use factql_store::{CompareOp, Path, Root};
use indexmap::IndexMap;

use crate::clause::ClauseBlock;
use crate::condition::Comparator;
use crate::error::QueryError;
use crate::plan::make_prejoin_pair;

/// Selectivity rank of a join operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Preference {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Preference {
    pub fn for_op(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => Preference::High,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => Preference::Medium,
            CompareOp::Ne | CompareOp::In | CompareOp::NotIn => Preference::Low,
        }
    }

    /// Rank of a join comparator; cross markers rank lowest.
    pub fn for_comparator(comparator: &Comparator) -> Self {
        match comparator {
            Comparator::Standard(c) => Preference::for_op(c.op()),
            _ => Preference::Low,
        }
    }
}

/// Everything a heuristic may inspect.
#[derive(Debug, Clone, Copy)]
pub struct JoinContext<'a> {
    /// Roots in declaration order.
    pub roots: &'a [Root],
    /// Validated joins, cross markers included.
    pub joins: &'a [Comparator],
    /// Indexed paths of each root, expressed against that root.
    pub indexes: &'a IndexMap<Root, Vec<Path>>,
    /// Single-root where clauses of each root.
    pub prejoin: &'a IndexMap<Root, ClauseBlock>,
}

impl JoinContext<'_> {
    pub fn indexed_paths(&self, root: &Root) -> &[Path] {
        self.indexes.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether some where clause of `root` can be answered from an index.
    pub fn has_keyable_clause(&self, root: &Root) -> bool {
        make_prejoin_pair(self.indexed_paths(root), self.prejoin.get(root))
            .0
            .is_some()
    }
}

/// Chooses the order in which roots are joined.
pub trait JoinOrderHeuristic: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// A permutation of `ctx.roots`.
    fn order(&self, ctx: &JoinContext<'_>) -> Result<Vec<Root>, QueryError>;
}

/// An explicit order that must name exactly the declared roots.
#[derive(Debug, Clone)]
pub struct FixedJoinOrder {
    roots: Vec<Root>,
}

impl FixedJoinOrder {
    pub fn new(roots: impl IntoIterator<Item = Root>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }
}

impl JoinOrderHeuristic for FixedJoinOrder {
    fn name(&self) -> &str {
        "fixed"
    }

    fn order(&self, ctx: &JoinContext<'_>) -> Result<Vec<Root>, QueryError> {
        let matches = self.roots.len() == ctx.roots.len()
            && ctx.roots.iter().all(|r| self.roots.contains(r));
        if !matches {
            let names: Vec<String> = self.roots.iter().map(Root::to_string).collect();
            return Err(QueryError::Scope(format!(
                "fixed join order [{}] does not match the declared roots",
                names.join(", ")
            )));
        }
        Ok(self.roots.clone())
    }
}

/// Declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicJoinOrder;

impl JoinOrderHeuristic for BasicJoinOrder {
    fn name(&self) -> &str {
        "basic"
    }

    fn order(&self, ctx: &JoinContext<'_>) -> Result<Vec<Root>, QueryError> {
        Ok(ctx.roots.to_vec())
    }
}

/// Operator preference.
///
/// Each root accumulates the [`Preference`] of every join touching it.
/// Roots are ordered by descending total, then by whether a where clause
/// of theirs can use an index, then by declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpPrefJoinOrder;

impl JoinOrderHeuristic for OpPrefJoinOrder {
    fn name(&self) -> &str {
        "oppref"
    }

    fn order(&self, ctx: &JoinContext<'_>) -> Result<Vec<Root>, QueryError> {
        let mut ranked: Vec<(u32, bool, usize, &Root)> = ctx
            .roots
            .iter()
            .enumerate()
            .map(|(position, root)| {
                let score: u32 = ctx
                    .joins
                    .iter()
                    .filter(|join| join.roots().contains(root))
                    .map(|join| Preference::for_comparator(join) as u32)
                    .sum();
                (score, ctx.has_keyable_clause(root), position, root)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        Ok(ranked.into_iter().map(|(_, _, _, root)| root.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{eq, ne, Condition};
    use crate::join::validate_join_expression;
    use crate::normalize::{partition_clauses, process_where};
    use factql_store::{FieldKind, RecordType};

    fn root(name: &str) -> Root {
        let ty = RecordType::builder(name)
            .field("id", FieldKind::Integer)
            .field("v", FieldKind::Integer)
            .build()
            .unwrap();
        Root::new(&ty)
    }

    fn order_with(
        heuristic: &dyn JoinOrderHeuristic,
        roots: &[Root],
        joins: &[Condition],
        indexes: IndexMap<Root, Vec<Path>>,
        filter: Option<Condition>,
    ) -> Result<Vec<Root>, QueryError> {
        let joins = validate_join_expression(joins, roots).unwrap();
        let block = filter.and_then(|f| process_where(&f, roots).unwrap());
        let parts = partition_clauses(block.as_ref());
        let ctx = JoinContext {
            roots,
            joins: &joins,
            indexes: &indexes,
            prejoin: &parts.per_root,
        };
        heuristic.order(&ctx)
    }

    #[test]
    fn test_basic_keeps_declaration_order() {
        let (a, b) = (root("a"), root("b"));
        let joins = [ne(a.field("id").unwrap(), b.field("id").unwrap())];
        let order = order_with(&BasicJoinOrder, &[a.clone(), b.clone()], &joins, IndexMap::new(), None)
            .unwrap();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn test_oppref_puts_selective_roots_first() {
        let (a, b, c) = (root("a"), root("b"), root("c"));
        let joins = [
            ne(a.field("id").unwrap(), b.field("id").unwrap()),
            eq(b.field("v").unwrap(), c.field("v").unwrap()),
        ];
        let order = order_with(
            &OpPrefJoinOrder,
            &[a.clone(), b.clone(), c.clone()],
            &joins,
            IndexMap::new(),
            None,
        )
        .unwrap();
        // b: low + high, c: high, a: low
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn test_oppref_tie_broken_by_keyable_clause() {
        let (a, b) = (root("a"), root("b"));
        let joins = [eq(a.field("id").unwrap(), b.field("id").unwrap())];
        let bv = b.field("v").unwrap();
        let mut indexes = IndexMap::new();
        indexes.insert(b.clone(), vec![bv.clone()]);
        let order = order_with(
            &OpPrefJoinOrder,
            &[a.clone(), b.clone()],
            &joins,
            indexes,
            Some(eq(bv, 3)),
        )
        .unwrap();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_fixed_must_match_roots() {
        let (a, b) = (root("a"), root("b"));
        let joins = [eq(a.field("id").unwrap(), b.field("id").unwrap())];
        let roots = [a.clone(), b.clone()];

        let fixed = FixedJoinOrder::new([b.clone(), a.clone()]);
        let order = order_with(&fixed, &roots, &joins, IndexMap::new(), None).unwrap();
        assert_eq!(order, vec![b, a.clone()]);

        let wrong = FixedJoinOrder::new([a]);
        assert!(order_with(&wrong, &roots, &joins, IndexMap::new(), None).is_err());
    }
}
