// SPDX-License-Identifier: PMPL-1.0-or-later
//! Plan execution.
//!
//! Each plan step becomes a [`Stage`] that extends every incoming row by
//! the matching facts of its root. The stages are chained into a lazy
//! nested-loop pipeline; only the post-join ordering of the last step
//! materializes the stream.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::iter::{self, Peekable};

use factql_store::{Fact, FactBase, FactIndex, FactMap, Path, Root, Value};
use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::condition::{Operand, Row};
use crate::config::QueryConfig;
use crate::orderby::{OrderBy, OrderByBlock};
use crate::plan::{keyed_clause, JoinQueryPlan, QueryPlan};
use crate::query_spec::{QuerySpec, Selection};

pub(crate) type RowIter<'a> = Box<dyn Iterator<Item = Vec<Fact>> + 'a>;

/// Where a stage fetches its facts from.
enum StageSource<'a> {
    /// The root's own index on the join key path. Prejoin filters still
    /// apply to every match.
    Index(&'a FactIndex),
    /// Index over the prefiltered candidates, keyed on the join key path.
    TempIndex(FactIndex),
    /// Prefiltered candidates.
    Scan(Vec<Fact>),
}

struct Stage<'a> {
    base: &'a FactBase,
    plan: JoinQueryPlan,
    output_signature: Vec<Root>,
    temp_index_min_facts: usize,
    source: OnceCell<StageSource<'a>>,
}

impl<'a> Stage<'a> {
    fn new(base: &'a FactBase, plan: JoinQueryPlan, config: &QueryConfig) -> Self {
        Self {
            base,
            output_signature: plan.output_signature(),
            plan,
            temp_index_min_facts: config.temp_index_min_facts,
            source: OnceCell::new(),
        }
    }

    fn join_path(&self) -> Option<&Path> {
        self.plan.join_key().and_then(|key| key.args()[0].as_path())
    }

    fn passes_prejoin(&self, fact: &Fact, check_key: bool) -> bool {
        let signature = std::slice::from_ref(self.plan.root());
        let row = Row::new(signature, std::slice::from_ref(fact));
        let key_ok = !check_key || self.plan.prejoin_key().map_or(true, |c| c.evaluate(&row));
        key_ok && self.plan.prejoin_clauses().map_or(true, |b| b.evaluate(&row))
    }

    fn scan(&self, map: &FactMap) -> Vec<Fact> {
        map.facts()
            .iter()
            .filter(|fact| self.passes_prejoin(fact, true))
            .cloned()
            .collect()
    }

    /// Facts of the root passing the prejoin filters, fetched through the
    /// key clause's index when there is one.
    fn candidates(&self, map: &FactMap) -> Vec<Fact> {
        let keyed = self.plan.prejoin_key().and_then(|clause| {
            let indexable: Vec<Path> = map.index_paths().map(|p| p.with_root(self.plan.root())).collect();
            keyed_clause(&indexable, clause)
        });
        let Some(keyed) = keyed else {
            return self.scan(map);
        };

        let lookups = keyed
            .iter()
            .map(|key| match &key.operand {
                Operand::Value(value) => Some((map.index(&key.path)?, key.op, value)),
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        let Some(lookups) = lookups else {
            return self.scan(map);
        };

        let mut found: IndexSet<Fact> = IndexSet::new();
        for (index, op, value) in lookups {
            found.extend(index.find(op, value, false).cloned());
        }
        trace!(root = %self.plan.root(), matched = found.len(), "Prejoin index lookup");
        found
            .into_iter()
            .filter(|fact| self.passes_prejoin(fact, false))
            .collect()
    }

    fn build_source(&self) -> StageSource<'a> {
        let base: &'a FactBase = self.base;
        let Some(map) = base.factmap(self.plan.root().type_name()) else {
            return StageSource::Scan(Vec::new());
        };
        let join_path = self.join_path();
        if let Some(index) = join_path.and_then(|path| map.index(path)) {
            return StageSource::Index(index);
        }
        let candidates = self.candidates(map);
        match join_path {
            Some(path) if candidates.len() >= self.temp_index_min_facts => {
                debug!(
                    root = %self.plan.root(),
                    path = %path,
                    facts = candidates.len(),
                    "Built temporary join index"
                );
                StageSource::TempIndex(FactIndex::from_facts(path.clone(), candidates.iter()))
            }
            _ => StageSource::Scan(candidates),
        }
    }

    /// Facts of this stage's root that match the join key for `input`.
    fn matches(&self, input: &Row<'_>) -> Vec<Fact> {
        let source = self.source.get_or_init(|| self.build_source());
        let Some(key) = self.plan.join_key() else {
            return match source {
                StageSource::Index(index) => index
                    .iter()
                    .filter(|fact| self.passes_prejoin(fact, true))
                    .cloned()
                    .collect(),
                StageSource::TempIndex(index) => index.iter().cloned().collect(),
                StageSource::Scan(facts) => facts.clone(),
            };
        };
        let Some(value) = resolve_operand(input, &key.args()[1]) else {
            return Vec::new();
        };
        let op = key.op();
        match source {
            StageSource::Index(index) => index
                .find(op, &value, false)
                .filter(|fact| self.passes_prejoin(fact, true))
                .cloned()
                .collect(),
            StageSource::TempIndex(index) => index.find(op, &value, false).cloned().collect(),
            StageSource::Scan(facts) => {
                let Some(path) = self.join_path() else {
                    return Vec::new();
                };
                facts
                    .iter()
                    .filter(|fact| path.resolve(fact).is_some_and(|v| op.evaluate(&v, &value)))
                    .cloned()
                    .collect()
            }
        }
    }

    fn extend(&self, row: Vec<Fact>) -> Vec<Vec<Fact>> {
        let input_signature = self.plan.input_signature();
        let mut matched = self.matches(&Row::new(input_signature, &row));
        if let Some(orderbys) = self.plan.prejoin_orderbys() {
            matched = orderbys.sort_facts(self.plan.root(), matched);
        }
        matched
            .into_iter()
            .filter_map(|fact| {
                let mut extended = Vec::with_capacity(row.len() + 1);
                extended.extend(row.iter().cloned());
                extended.push(fact);
                let keep = self
                    .plan
                    .postjoin_clauses()
                    .map_or(true, |b| b.evaluate(&Row::new(&self.output_signature, &extended)));
                keep.then_some(extended)
            })
            .collect()
    }
}

fn resolve_operand(row: &Row<'_>, operand: &Operand) -> Option<Value> {
    match operand {
        Operand::Path(path) => row.resolve(path).map(|v| v.into_owned()),
        Operand::Value(value) => Some(value.clone()),
        Operand::Placeholder(_) => None,
    }
}

/// Sort the whole stream once it is first pulled.
fn sorted_lazily<'a>(rows: RowIter<'a>, orderbys: OrderByBlock, signature: Vec<Root>) -> RowIter<'a> {
    let mut pending = Some(rows);
    Box::new(iter::once(()).flat_map(move |()| {
        let rows: Vec<Vec<Fact>> = pending.take().map(|rows| rows.collect()).unwrap_or_default();
        orderbys.sort_rows(&signature, rows)
    }))
}

/// Run a grounded plan. Rows come out aligned with the plan's output
/// signature.
pub(crate) fn execute<'a>(base: &'a FactBase, plan: &QueryPlan, config: &QueryConfig) -> RowIter<'a> {
    let mut rows: RowIter<'a> = Box::new(iter::once(Vec::new()));
    for step in plan.steps() {
        let stage = Stage::new(base, step.clone(), config);
        rows = Box::new(rows.flat_map(move |row| stage.extend(row)));
        if let Some(orderbys) = step.postjoin_orderbys() {
            rows = sorted_lazily(rows, orderbys.clone(), step.output_signature());
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Turns joined rows into answers.
pub(crate) struct Outputter {
    signature: Vec<Root>,
    selection: Vec<Selection>,
    unwrap_single: bool,
}

impl Outputter {
    pub(crate) fn new(signature: Vec<Root>, spec: &QuerySpec) -> Self {
        let selection: Vec<Selection> = match spec.select() {
            Some(selection) => selection.to_vec(),
            None => spec.roots().iter().map(Selection::from).collect(),
        };
        let unwrap_single = !spec.is_tuple() && selection.len() == 1;
        Self {
            signature,
            selection,
            unwrap_single,
        }
    }

    /// `None` when a selected path does not resolve in the row.
    pub(crate) fn output(&self, row: &[Fact]) -> Option<Value> {
        let row = Row::new(&self.signature, row);
        let mut values = self
            .selection
            .iter()
            .map(|s| s.evaluate(&row))
            .collect::<Option<Vec<Value>>>()?;
        if self.unwrap_single {
            values.pop()
        } else {
            Some(Value::Tuple(values))
        }
    }
}

/// Answers of a query, in result order.
pub struct Answers<'a> {
    inner: Box<dyn Iterator<Item = Value> + 'a>,
}

impl<'a> Answers<'a> {
    pub(crate) fn new(rows: RowIter<'a>, outputter: Outputter, distinct: bool) -> Self {
        let values = rows.filter_map(move |row| outputter.output(&row));
        let inner: Box<dyn Iterator<Item = Value> + 'a> = if distinct {
            let mut seen = HashSet::new();
            Box::new(values.filter(move |v| seen.insert(v.clone())))
        } else {
            Box::new(values)
        };
        Self { inner }
    }
}

impl Iterator for Answers<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.inner.next()
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

type KeyedRows<'a> = Box<dyn Iterator<Item = (Value, Vec<Fact>)> + 'a>;

/// Consecutive runs of rows with equal group key.
///
/// Yields `(key, answers)`; the key is the value of the single group path,
/// or a tuple of values when there are several.
pub struct Groups<'a> {
    rows: Peekable<KeyedRows<'a>>,
    outputter: Outputter,
    distinct: bool,
}

impl<'a> Groups<'a> {
    pub(crate) fn new(
        rows: RowIter<'a>,
        signature: Vec<Root>,
        group_by: &[OrderBy],
        outputter: Outputter,
        distinct: bool,
    ) -> Self {
        let paths: Vec<Path> = group_by.iter().map(|ob| ob.path().clone()).collect();
        let keyed: KeyedRows<'a> = Box::new(rows.filter_map(move |row| {
            let key = group_key(&signature, &paths, &row)?;
            Some((key, row))
        }));
        Self {
            rows: keyed.peekable(),
            outputter,
            distinct,
        }
    }
}

fn group_key(signature: &[Root], paths: &[Path], row: &[Fact]) -> Option<Value> {
    let row = Row::new(signature, row);
    let mut values = paths
        .iter()
        .map(|p| row.resolve(p).map(|v| v.into_owned()))
        .collect::<Option<Vec<Value>>>()?;
    if values.len() == 1 {
        values.pop()
    } else {
        Some(Value::Tuple(values))
    }
}

impl Iterator for Groups<'_> {
    type Item = (Value, Vec<Value>);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, first) = self.rows.next()?;
        let mut members = vec![first];
        while let Some((_, row)) = self.rows.next_if(|(k, _)| *k == key) {
            members.push(row);
        }
        let mut seen = HashSet::new();
        let answers = members
            .iter()
            .filter_map(|row| self.outputter.output(row))
            .filter(|v| !self.distinct || seen.insert(v.clone()))
            .collect();
        Some((key, answers))
    }
}
