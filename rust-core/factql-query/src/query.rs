// SPDX-License-Identifier: PMPL-1.0-or-later
//! The query builder.
//!
//! A [`Query`] couples a [`QuerySpec`] with the fact base it runs against.
//! Builder methods consume the query and return a new one, so a partially
//! built query can be cloned and specialized. Results are produced lazily
//! by [`all`](Query::all) and [`groups`](Query::groups); the remaining
//! terminals are conveniences over them.
//!
//! ```ignore
//! let answers: Vec<Value> = base
//!     .query([p.clone(), q.clone()])?
//!     .join([eq(p.field("id")?, q.field("pid")?)])?
//!     .where_(gt(p.field("n")?, ph(0)))?
//!     .order_by([desc(q.field("tag")?)])?
//!     .bind(Params::new().arg(10))?
//!     .all()?
//!     .collect();
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use factql_store::{Fact, FactBase, Path, Root, Value};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::condition::{Condition, Params, Row};
use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::exec::{execute, Answers, Groups, Outputter, RowIter};
use crate::heuristic::JoinOrderHeuristic;
use crate::orderby::OrderBy;
use crate::plan::{make_query_plan, QueryPlan};
use crate::query_spec::{QuerySpec, Selection, SpecField};

/// A query over a fact base.
///
/// `B` is any handle to a [`FactBase`]: a shared reference for reading, a
/// mutable reference when the query is used to [`delete`](Query::delete).
#[derive(Debug, Clone)]
pub struct Query<B> {
    base: B,
    spec: QuerySpec,
    config: QueryConfig,
}

impl<B: Deref<Target = FactBase>> Query<B> {
    pub fn new(base: B, roots: impl IntoIterator<Item = Root>) -> Result<Self, QueryError> {
        Ok(Self {
            base,
            spec: QuerySpec::new(roots)?,
            config: QueryConfig::default(),
        })
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn with_spec(self, spec: QuerySpec) -> Self {
        Self { spec, ..self }
    }

    pub fn join(self, joins: impl IntoIterator<Item = Condition>) -> Result<Self, QueryError> {
        let spec = self.spec.with_join(joins.into_iter().collect())?;
        Ok(self.with_spec(spec))
    }

    pub fn where_(self, condition: Condition) -> Result<Self, QueryError> {
        let spec = self.spec.with_where(condition)?;
        Ok(self.with_spec(spec))
    }

    pub fn order_by<O: Into<OrderBy>>(self, keys: impl IntoIterator<Item = O>) -> Result<Self, QueryError> {
        let spec = self.spec.with_order_by(keys.into_iter().map(Into::into).collect())?;
        Ok(self.with_spec(spec))
    }

    /// Order by the whole facts of every root.
    pub fn ordered(self) -> Result<Self, QueryError> {
        let spec = self.spec.with_ordered()?;
        Ok(self.with_spec(spec))
    }

    pub fn group_by<O: Into<OrderBy>>(self, keys: impl IntoIterator<Item = O>) -> Result<Self, QueryError> {
        let spec = self.spec.with_group_by(keys.into_iter().map(Into::into).collect())?;
        Ok(self.with_spec(spec))
    }

    pub fn select<S: Into<Selection>>(self, selection: impl IntoIterator<Item = S>) -> Result<Self, QueryError> {
        let spec = self.spec.with_select(selection.into_iter().map(Into::into).collect())?;
        Ok(self.with_spec(spec))
    }

    /// Drop repeated answers. Requires `select`, which may still be set
    /// after this call, so a missing selection is reported by the terminal.
    pub fn distinct(self) -> Result<Self, QueryError> {
        let spec = self.spec.with_distinct()?;
        Ok(self.with_spec(spec))
    }

    /// Always return tuples, even for a single selected element.
    pub fn tuple(self) -> Result<Self, QueryError> {
        let spec = self.spec.with_tuple()?;
        Ok(self.with_spec(spec))
    }

    pub fn bind(self, params: Params) -> Result<Self, QueryError> {
        let spec = self.spec.with_bind(params)?;
        Ok(self.with_spec(spec))
    }

    pub fn heuristic(self, heuristic: impl JoinOrderHeuristic + 'static) -> Result<Self, QueryError> {
        let spec = self.spec.with_heuristic(Arc::new(heuristic))?;
        Ok(self.with_spec(spec))
    }

    pub fn with_config(self, config: QueryConfig) -> Result<Self, QueryError> {
        config.validate()?;
        Ok(Self { config, ..self })
    }

    /// The same query with `field` unset.
    pub fn without(self, field: SpecField) -> Self {
        let spec = self.spec.without(field);
        self.with_spec(spec)
    }

    /// Indexed paths of each root, re-anchored at that root.
    fn indexes(&self) -> IndexMap<Root, Vec<Path>> {
        self.spec
            .roots()
            .iter()
            .map(|root| {
                let paths = self
                    .base
                    .factmap(root.type_name())
                    .map(|map| map.index_paths().map(|p| p.with_root(root)).collect())
                    .unwrap_or_default();
                (root.clone(), paths)
            })
            .collect()
    }

    /// The plan this query would run, placeholders unbound.
    pub fn query_plan(&self) -> Result<QueryPlan, QueryError> {
        make_query_plan(&self.spec, &self.indexes(), &self.config)
    }

    fn grounded_plan(&self) -> Result<QueryPlan, QueryError> {
        let plan = self.query_plan()?;
        match self.spec.params() {
            Some(params) => plan.ground(params),
            None => plan.ground(&Params::new()),
        }
    }

    fn rows(&self) -> Result<(RowIter<'_>, Vec<Root>), QueryError> {
        let plan = self.grounded_plan()?;
        let signature = plan.output_signature();
        debug!(roots = ?signature.iter().map(Root::to_string).collect::<Vec<_>>(), "Executing query");
        Ok((execute(&self.base, &plan, &self.config), signature))
    }

    fn check_distinct(&self) -> Result<(), QueryError> {
        if self.spec.is_distinct() && self.spec.select().is_none() {
            return Err(QueryError::Compatibility("distinct requires select".to_string()));
        }
        Ok(())
    }

    /// All answers, in result order.
    pub fn all(&self) -> Result<Answers<'_>, QueryError> {
        if self.spec.group_by().is_some() {
            return Err(QueryError::Compatibility(
                "group_by queries are read with groups()".to_string(),
            ));
        }
        self.check_distinct()?;
        let (rows, signature) = self.rows()?;
        let outputter = Outputter::new(signature, &self.spec);
        Ok(Answers::new(rows, outputter, self.spec.is_distinct()))
    }

    /// The first answer.
    pub fn first(&self) -> Result<Value, QueryError> {
        self.all()?
            .next()
            .ok_or_else(|| QueryError::Cardinality("query returned no results".to_string()))
    }

    /// The only answer.
    pub fn singleton(&self) -> Result<Value, QueryError> {
        let mut answers = self.all()?;
        let first = answers
            .next()
            .ok_or_else(|| QueryError::Cardinality("query returned no results".to_string()))?;
        if answers.next().is_some() {
            return Err(QueryError::Cardinality(
                "query returned more than one result".to_string(),
            ));
        }
        Ok(first)
    }

    pub fn count(&self) -> Result<usize, QueryError> {
        Ok(self.all()?.count())
    }

    /// Answers grouped by the `group_by` keys.
    pub fn groups(&self) -> Result<Groups<'_>, QueryError> {
        let Some(group_by) = self.spec.group_by() else {
            return Err(QueryError::Compatibility("groups() requires group_by".to_string()));
        };
        self.check_distinct()?;
        let (rows, signature) = self.rows()?;
        let outputter = Outputter::new(signature.clone(), &self.spec);
        Ok(Groups::new(rows, signature, group_by, outputter, self.spec.is_distinct()))
    }

    /// Number of answers per group.
    pub fn group_counts(&self) -> Result<impl Iterator<Item = (Value, usize)> + '_, QueryError> {
        Ok(self.groups()?.map(|(key, answers)| (key, answers.len())))
    }
}

impl<B: DerefMut<Target = FactBase>> Query<B> {
    /// Remove the facts matched by this query and return how many were
    /// removed.
    ///
    /// Without `select` every root's fact of each matching row is removed;
    /// `select` may narrow that to some of the roots by naming their whole
    /// fact paths.
    pub fn delete(mut self) -> Result<usize, QueryError> {
        if self.spec.group_by().is_some() || self.spec.is_distinct() || self.spec.is_tuple() {
            return Err(QueryError::Compatibility(
                "delete cannot be combined with group_by, distinct or tuple".to_string(),
            ));
        }
        let targets: Vec<Root> = match self.spec.select() {
            None => self.spec.roots().to_vec(),
            Some(selection) => selection
                .iter()
                .map(|s| match s {
                    Selection::Path(path) if path.is_root_path() => Ok(path.root().clone()),
                    other => Err(QueryError::Compatibility(format!(
                        "delete can only select whole roots, not '{}'",
                        other
                    ))),
                })
                .collect::<Result<_, _>>()?,
        };

        let roots = self.spec.roots();
        if roots.len() == 1 && self.spec.where_clauses().is_none() {
            let type_name = roots[0].type_name().to_string();
            let removed = match self.base.factmap_mut(&type_name) {
                Some(map) => {
                    let removed = map.len();
                    map.clear();
                    removed
                }
                None => 0,
            };
            debug!(record_type = %type_name, removed, "Cleared fact map");
            return Ok(removed);
        }

        let mut doomed: IndexSet<Fact> = IndexSet::new();
        {
            let (rows, signature) = self.rows()?;
            for row in rows {
                let row = Row::new(&signature, &row);
                doomed.extend(targets.iter().filter_map(|t| row.fact(t)).cloned());
            }
        }
        let removed = doomed.iter().filter(|fact| self.base.discard(fact)).count();
        debug!(removed, "Deleted matching facts");
        Ok(removed)
    }
}

/// Entry points for querying a [`FactBase`].
pub trait QueryExt {
    fn query(&self, roots: impl IntoIterator<Item = Root>) -> Result<Query<&FactBase>, QueryError>;

    fn query_mut(
        &mut self,
        roots: impl IntoIterator<Item = Root>,
    ) -> Result<Query<&mut FactBase>, QueryError>;
}

impl QueryExt for FactBase {
    fn query(&self, roots: impl IntoIterator<Item = Root>) -> Result<Query<&FactBase>, QueryError> {
        Query::new(self, roots)
    }

    fn query_mut(
        &mut self,
        roots: impl IntoIterator<Item = Root>,
    ) -> Result<Query<&mut FactBase>, QueryError> {
        Query::new(self, roots)
    }
}
