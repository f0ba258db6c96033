// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query plan construction.
//!
//! A [`QueryPlan`] is a sequence of [`JoinQueryPlan`]s, one per root in join
//! order. Each step describes how to fetch the facts of its root (index key
//! clause, residual filter, ordering), how to link them to the roots bound
//! by earlier steps (join key), and which clauses to check once they are
//! linked.

use std::fmt;
use std::sync::Arc;

use factql_store::{CompareOp, Path, Root};
use indexmap::IndexMap;
use tracing::debug;

use crate::clause::{Clause, ClauseBlock};
use crate::condition::{binding_result, Comparator, KeyedComparison, Operand, Params, StandardComparator};
use crate::config::{JoinOrderStrategy, QueryConfig};
use crate::error::QueryError;
use crate::explain::ExplainOutput;
use crate::heuristic::{BasicJoinOrder, JoinContext, JoinOrderHeuristic, OpPrefJoinOrder, Preference};
use crate::join::check_connected;
use crate::normalize::partition_clauses;
use crate::orderby::OrderByBlock;
use crate::query_spec::QuerySpec;

/// One step of a [`QueryPlan`].
#[derive(Debug, Clone)]
pub struct JoinQueryPlan {
    input_signature: Vec<Root>,
    root: Root,
    indexes: Vec<Path>,
    prejoin_key: Option<Clause>,
    prejoin_clauses: Option<ClauseBlock>,
    prejoin_orderbys: Option<OrderByBlock>,
    join_key: Option<StandardComparator>,
    postjoin_clauses: Option<ClauseBlock>,
    postjoin_orderbys: Option<OrderByBlock>,
}

impl JoinQueryPlan {
    /// Roots bound by earlier steps, in join order.
    pub fn input_signature(&self) -> &[Root] {
        &self.input_signature
    }

    /// The root this step binds.
    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn output_signature(&self) -> Vec<Root> {
        let mut signature = self.input_signature.clone();
        signature.push(self.root.clone());
        signature
    }

    /// Indexed paths of the root.
    pub fn indexes(&self) -> &[Path] {
        &self.indexes
    }

    /// Clause answered by index lookup before the join.
    pub fn prejoin_key(&self) -> Option<&Clause> {
        self.prejoin_key.as_ref()
    }

    /// Residual single-root filter applied before the join.
    pub fn prejoin_clauses(&self) -> Option<&ClauseBlock> {
        self.prejoin_clauses.as_ref()
    }

    pub fn prejoin_orderbys(&self) -> Option<&OrderByBlock> {
        self.prejoin_orderbys.as_ref()
    }

    /// Comparison linking this root to an earlier one, oriented with this
    /// root's path as the left argument.
    pub fn join_key(&self) -> Option<&StandardComparator> {
        self.join_key.as_ref()
    }

    pub fn postjoin_clauses(&self) -> Option<&ClauseBlock> {
        self.postjoin_clauses.as_ref()
    }

    pub fn postjoin_orderbys(&self) -> Option<&OrderByBlock> {
        self.postjoin_orderbys.as_ref()
    }

    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(key) = &self.prejoin_key {
            names.extend(key.placeholders());
        }
        if let Some(block) = &self.prejoin_clauses {
            names.extend(block.placeholders());
        }
        if let Some(key) = &self.join_key {
            names.extend(key.placeholders());
        }
        if let Some(block) = &self.postjoin_clauses {
            names.extend(block.placeholders());
        }
        names
    }

    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        Self {
            prejoin_key: self.prejoin_key.as_ref().map(|c| c.bind(params, missing)),
            prejoin_clauses: self.prejoin_clauses.as_ref().map(|b| b.bind(params, missing)),
            join_key: self.join_key.as_ref().map(|c| c.bind(params, missing)),
            postjoin_clauses: self.postjoin_clauses.as_ref().map(|b| b.bind(params, missing)),
            ..self.clone()
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for JoinQueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root: {}", self.root)?;
        if !self.input_signature.is_empty() {
            writeln!(f, "    input: {}", join_display(&self.input_signature))?;
        }
        if self.indexes.is_empty() {
            writeln!(f, "    indexes: none")?;
        } else {
            writeln!(f, "    indexes: {}", join_display(&self.indexes))?;
        }
        if let Some(key) = &self.prejoin_key {
            writeln!(f, "    prejoin key: {}", key)?;
        }
        if let Some(block) = &self.prejoin_clauses {
            writeln!(f, "    prejoin filter: {}", block)?;
        }
        if let Some(order) = &self.prejoin_orderbys {
            writeln!(f, "    prejoin order: {}", order)?;
        }
        if let Some(key) = &self.join_key {
            writeln!(f, "    join key: {}", key)?;
        }
        if let Some(block) = &self.postjoin_clauses {
            writeln!(f, "    postjoin filter: {}", block)?;
        }
        if let Some(order) = &self.postjoin_orderbys {
            writeln!(f, "    postjoin order: {}", order)?;
        }
        Ok(())
    }
}

/// An ordered sequence of join steps; the output signature grows by one
/// root per step.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    steps: Vec<JoinQueryPlan>,
}

impl QueryPlan {
    pub fn steps(&self) -> &[JoinQueryPlan] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All roots in join order.
    pub fn output_signature(&self) -> Vec<Root> {
        self.steps.iter().map(|s| s.root.clone()).collect()
    }

    /// Names of the unbound placeholders, in plan order.
    pub fn placeholders(&self) -> Vec<String> {
        self.steps.iter().flat_map(JoinQueryPlan::placeholders).collect()
    }

    /// A copy with every placeholder replaced by its bound value.
    pub fn ground(&self, params: &Params) -> Result<QueryPlan, QueryError> {
        let mut missing = Vec::new();
        let steps = self
            .steps
            .iter()
            .map(|step| step.bind(params, &mut missing))
            .collect();
        binding_result(QueryPlan { steps }, missing)
    }

    pub fn explain(&self) -> ExplainOutput {
        ExplainOutput::from_query_plan(self)
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "QueryPlan [{}]", join_display(&self.output_signature()))?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "  [{}] {}", i + 1, step)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// The comparisons of `clause` as index lookups on a single path, if every
/// comparator keys on the same indexed path against a value or placeholder.
pub(crate) fn keyed_clause(indexable: &[Path], clause: &Clause) -> Option<Vec<KeyedComparison>> {
    let mut keyed: Vec<KeyedComparison> = Vec::with_capacity(clause.len());
    for comparator in clause.comparators() {
        let Comparator::Standard(standard) = comparator else {
            return None;
        };
        let key = standard.keyable(indexable)?;
        if matches!(key.operand, Operand::Path(_)) {
            return None;
        }
        if keyed.first().is_some_and(|first| first.path != key.path) {
            return None;
        }
        keyed.push(key);
    }
    Some(keyed)
}

/// Split the single-root clauses of a root into at most one index key
/// clause and the residual block.
///
/// A clause qualifies as key when all its comparators key on the same
/// indexed path; a clause of pure equalities is preferred over range or
/// membership clauses. The first qualifying clause wins ties.
pub fn make_prejoin_pair(
    indexable: &[Path],
    block: Option<&ClauseBlock>,
) -> (Option<Clause>, Option<ClauseBlock>) {
    let Some(block) = block else {
        return (None, None);
    };
    let mut best: Option<(usize, bool)> = None;
    for (i, clause) in block.clauses().iter().enumerate() {
        let Some(keyed) = keyed_clause(indexable, clause) else {
            continue;
        };
        let equality = keyed.iter().all(|k| k.op == CompareOp::Eq);
        match best {
            None => best = Some((i, equality)),
            Some((_, false)) if equality => best = Some((i, equality)),
            _ => {}
        }
    }
    let Some((chosen, _)) = best else {
        return (None, Some(block.clone()));
    };
    let mut rest = Vec::with_capacity(block.len() - 1);
    let mut key = None;
    for (i, clause) in block.clauses().iter().enumerate() {
        if i == chosen {
            key = Some(clause.clone());
        } else {
            rest.push(clause.clone());
        }
    }
    (key, ClauseBlock::new(rest))
}

/// Pick the join comparator linking `target` to the `visited` roots.
///
/// Candidates are ranked by operator [`Preference`], then by whether the
/// target side is indexed, then by whether the target side is the leading
/// sort key. The winner is returned oriented with the target path on the
/// left; every other join that becomes evaluable at this step is returned
/// as a residual.
pub fn make_join_pair(
    target: &Root,
    visited: &[Root],
    joins: &[StandardComparator],
    indexable: &[Path],
    orderbys: Option<&OrderByBlock>,
) -> (Option<StandardComparator>, Vec<StandardComparator>) {
    let applicable: Vec<&StandardComparator> = joins
        .iter()
        .filter(|join| {
            let roots = join.roots();
            roots.contains(target) && roots.iter().all(|r| r == target || visited.contains(r))
        })
        .collect();

    let leading = orderbys.and_then(|block| block.orderbys().first()).map(|ob| ob.path());
    let mut best: Option<(usize, StandardComparator, (Preference, bool, bool))> = None;
    for (i, join) in applicable.iter().enumerate() {
        let oriented = match join.args()[0].as_path() {
            Some(path) if path.root() == target => Some((*join).clone()),
            _ => join.swap(),
        };
        let Some(oriented) = oriented else {
            continue;
        };
        let Some(target_path) = oriented.args()[0].as_path() else {
            continue;
        };
        let rank = (
            Preference::for_op(oriented.op()),
            indexable.contains(target_path),
            leading == Some(target_path),
        );
        if best.as_ref().map_or(true, |(_, _, r)| rank > *r) {
            best = Some((i, oriented, rank));
        }
    }

    match best {
        Some((chosen, key, _)) => {
            let rest = applicable
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != chosen)
                .map(|(_, join)| (*join).clone())
                .collect();
            (Some(key), rest)
        }
        None => (None, applicable.into_iter().cloned().collect()),
    }
}

/// Split the effective ordering between the first and the last step.
///
/// When every sort path belongs to the first root in join order, sorting
/// that root's facts before the join yields ordered output, since the
/// nested loops preserve the outer order. Otherwise the whole joined
/// stream is sorted after the last step.
fn partition_orderbys(
    order: &[Root],
    orderbys: Option<OrderByBlock>,
) -> (Option<OrderByBlock>, Option<OrderByBlock>) {
    match orderbys {
        Some(block) if block.roots().iter().all(|r| Some(r) == order.first()) => (Some(block), None),
        Some(block) => (None, Some(block)),
        None => (None, None),
    }
}

/// Build the plan for `spec` given the indexed paths of each root.
pub fn make_query_plan(
    spec: &QuerySpec,
    indexes: &IndexMap<Root, Vec<Path>>,
    config: &QueryConfig,
) -> Result<QueryPlan, QueryError> {
    let roots = spec.roots();
    check_connected(roots, spec.joins())?;
    let parts = partition_clauses(spec.where_clauses());

    let heuristic: Arc<dyn JoinOrderHeuristic> = match spec.heuristic() {
        Some(h) => Arc::clone(h),
        None => match config.default_join_order {
            JoinOrderStrategy::Basic => Arc::new(BasicJoinOrder),
            JoinOrderStrategy::OpPref => Arc::new(OpPrefJoinOrder),
        },
    };
    let ctx = JoinContext {
        roots,
        joins: spec.joins(),
        indexes,
        prejoin: &parts.per_root,
    };
    let order = heuristic.order(&ctx)?;
    if order.len() != roots.len() || !roots.iter().all(|r| order.contains(r)) {
        return Err(QueryError::Scope(format!(
            "join order from '{}' is not a permutation of the declared roots",
            heuristic.name()
        )));
    }

    let joins: Vec<StandardComparator> = spec
        .joins()
        .iter()
        .filter_map(|join| match join {
            Comparator::Standard(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    let orderbys = OrderByBlock::new(spec.effective_order_by());
    let (mut prejoin_order, mut postjoin_order) = partition_orderbys(&order, orderbys.clone());

    let mut pending: Vec<Clause> = parts
        .catch_all
        .as_ref()
        .map(|block| block.clauses().to_vec())
        .unwrap_or_default();
    let mut steps = Vec::with_capacity(order.len());
    for (i, root) in order.iter().enumerate() {
        let visited = &order[..i];
        let available = &order[..=i];
        let indexable = ctx.indexed_paths(root).to_vec();

        let (prejoin_key, prejoin_clauses) = make_prejoin_pair(&indexable, parts.per_root.get(root));
        let (join_key, residual_joins) =
            make_join_pair(root, visited, &joins, &indexable, orderbys.as_ref());

        let (ready, waiting): (Vec<Clause>, Vec<Clause>) = pending
            .into_iter()
            .partition(|clause| clause.roots().iter().all(|r| available.contains(r)));
        pending = waiting;
        let mut postjoin: Vec<Clause> = residual_joins
            .into_iter()
            .filter_map(|join| Clause::new(vec![Comparator::Standard(join)]))
            .collect();
        postjoin.extend(ready);

        let last = i + 1 == order.len();
        steps.push(JoinQueryPlan {
            input_signature: visited.to_vec(),
            root: root.clone(),
            indexes: indexable,
            prejoin_key,
            prejoin_clauses,
            prejoin_orderbys: if i == 0 { prejoin_order.take() } else { None },
            join_key,
            postjoin_clauses: ClauseBlock::new(postjoin),
            postjoin_orderbys: if last { postjoin_order.take() } else { None },
        });
    }

    let plan = QueryPlan { steps };
    let names: Vec<String> = order.iter().map(Root::to_string).collect();
    debug!(
        roots = ?names,
        steps = plan.len(),
        heuristic = heuristic.name(),
        "Built query plan"
    );
    if config.trace_plans {
        debug!(plan = %plan, "Query plan");
    }
    Ok(plan)
}
