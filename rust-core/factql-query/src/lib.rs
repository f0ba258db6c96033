// SPDX-License-Identifier: PMPL-1.0-or-later
//! FactQL Query
//!
//! Declarative queries over a [`FactBase`](factql_store::FactBase).
//!
//! A query names one or more roots, joins them with comparisons, filters
//! them with an arbitrary boolean condition, and orders, groups, projects
//! or deletes the result. Compilation normalizes the filter to conjunctive
//! normal form, picks a join order with a [`JoinOrderHeuristic`], and
//! builds a [`QueryPlan`] of nested-loop join steps that use the fact
//! base's indexes where it can. Plans can be inspected as text or as
//! serializable [`ExplainOutput`].

pub mod clause;
pub mod condition;
pub mod config;
pub mod error;
mod exec;
pub mod explain;
pub mod heuristic;
pub mod join;
pub mod normalize;
pub mod orderby;
pub mod plan;
pub mod query;
pub mod query_spec;

pub use clause::{Clause, ClauseBlock};
pub use condition::{
    and_, cross, eq, func, ge, gt, in_, le, lt, ne, not_, notin_, or_, ph, ph_named,
    ph_named_default, Comparator, Condition, FunctionComparator, Operand, Params, Placeholder,
    Row, StandardComparator,
};
pub use config::{JoinOrderStrategy, QueryConfig};
pub use error::QueryError;
pub use exec::{Answers, Groups};
pub use explain::{ExplainOutput, ExplainStep};
pub use heuristic::{
    BasicJoinOrder, FixedJoinOrder, JoinContext, JoinOrderHeuristic, OpPrefJoinOrder, Preference,
};
pub use orderby::{asc, desc, OrderBy, OrderByBlock};
pub use plan::{JoinQueryPlan, QueryPlan};
pub use query::{Query, QueryExt};
pub use query_spec::{output, QuerySpec, Selection, SpecField};
