// SPDX-License-Identifier: PMPL-1.0-or-later
//! Declarative query specifications.

use std::fmt;
use std::sync::Arc;

use factql_store::{Path, Root, Value};

use crate::clause::ClauseBlock;
use crate::condition::{Comparator, Condition, Params, Row};
use crate::error::QueryError;
use crate::heuristic::JoinOrderHeuristic;
use crate::join::validate_join_expression;
use crate::normalize::process_where;
use crate::orderby::{asc, OrderBy};

type OutputFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A computed output column.
#[derive(Clone)]
pub struct OutputFunc {
    name: Arc<str>,
    func: Arc<OutputFn>,
    paths: Vec<Path>,
}

impl OutputFunc {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }
}

impl fmt::Debug for OutputFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFunc")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .finish()
    }
}

/// One element of a `select` signature.
#[derive(Debug, Clone)]
pub enum Selection {
    /// A field value, or the whole fact for a root path.
    Path(Path),
    /// A function of the values of several paths.
    Output(OutputFunc),
}

/// Select the result of `f` applied to the values of `paths`.
pub fn output<F>(name: &str, paths: impl IntoIterator<Item = Path>, f: F) -> Selection
where
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
{
    Selection::Output(OutputFunc {
        name: Arc::from(name),
        func: Arc::new(f),
        paths: paths.into_iter().collect(),
    })
}

impl Selection {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Selection::Path(p) => vec![p],
            Selection::Output(o) => o.paths.iter().collect(),
        }
    }

    /// The selected value in `row`, or `None` if a path does not resolve.
    pub fn evaluate(&self, row: &Row<'_>) -> Option<Value> {
        match self {
            Selection::Path(p) => row.resolve(p).map(|v| v.into_owned()),
            Selection::Output(o) => {
                let args = o
                    .paths
                    .iter()
                    .map(|p| row.resolve(p).map(|v| v.into_owned()))
                    .collect::<Option<Vec<Value>>>()?;
                Some((o.func)(&args))
            }
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Path(p) => write!(f, "{}", p),
            Selection::Output(o) => {
                let paths: Vec<String> = o.paths.iter().map(Path::to_string).collect();
                write!(f, "{}({})", o.name, paths.join(", "))
            }
        }
    }
}

impl From<Path> for Selection {
    fn from(path: Path) -> Self {
        Selection::Path(path)
    }
}

impl From<&Path> for Selection {
    fn from(path: &Path) -> Self {
        Selection::Path(path.clone())
    }
}

impl From<&Root> for Selection {
    fn from(root: &Root) -> Self {
        Selection::Path(root.path())
    }
}

/// A settable part of a [`QuerySpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecField {
    Join,
    Where,
    OrderBy,
    Ordered,
    GroupBy,
    Select,
    Distinct,
    Tuple,
    Bind,
    Heuristic,
}

impl fmt::Display for SpecField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecField::Join => "join",
            SpecField::Where => "where",
            SpecField::OrderBy => "order_by",
            SpecField::Ordered => "ordered",
            SpecField::GroupBy => "group_by",
            SpecField::Select => "select",
            SpecField::Distinct => "distinct",
            SpecField::Tuple => "tuple",
            SpecField::Bind => "bind",
            SpecField::Heuristic => "heuristic",
        };
        f.write_str(name)
    }
}

/// The declarative parts of a query.
///
/// Each part may be set once; setting it again is a compatibility error
/// unless it was removed with [`without`](Self::without) first. Setters
/// validate eagerly and return a new spec.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    roots: Vec<Root>,
    join: Option<Vec<Comparator>>,
    where_: Option<Condition>,
    where_clauses: Option<ClauseBlock>,
    order_by: Option<Vec<OrderBy>>,
    ordered: bool,
    group_by: Option<Vec<OrderBy>>,
    select: Option<Vec<Selection>>,
    distinct: bool,
    tuple: bool,
    bind: Option<Params>,
    heuristic: Option<Arc<dyn JoinOrderHeuristic>>,
}

impl QuerySpec {
    /// A spec over `roots`, which must be non-empty and distinct.
    pub fn new(roots: impl IntoIterator<Item = Root>) -> Result<Self, QueryError> {
        let roots: Vec<Root> = roots.into_iter().collect();
        if roots.is_empty() {
            return Err(QueryError::Scope("a query needs at least one root".to_string()));
        }
        for (i, root) in roots.iter().enumerate() {
            if roots[..i].contains(root) {
                return Err(QueryError::Scope(format!("root '{}' is declared twice", root)));
            }
        }
        Ok(Self {
            roots,
            join: None,
            where_: None,
            where_clauses: None,
            order_by: None,
            ordered: false,
            group_by: None,
            select: None,
            distinct: false,
            tuple: false,
            bind: None,
            heuristic: None,
        })
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    /// Validated joins, cross markers included.
    pub fn joins(&self) -> &[Comparator] {
        self.join.as_deref().unwrap_or(&[])
    }

    pub fn where_condition(&self) -> Option<&Condition> {
        self.where_.as_ref()
    }

    /// The where expression in clausal form.
    pub fn where_clauses(&self) -> Option<&ClauseBlock> {
        self.where_clauses.as_ref()
    }

    pub fn order_by(&self) -> Option<&[OrderBy]> {
        self.order_by.as_deref()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn group_by(&self) -> Option<&[OrderBy]> {
        self.group_by.as_deref()
    }

    pub fn select(&self) -> Option<&[Selection]> {
        self.select.as_deref()
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_tuple(&self) -> bool {
        self.tuple
    }

    pub fn params(&self) -> Option<&Params> {
        self.bind.as_ref()
    }

    pub fn heuristic(&self) -> Option<&Arc<dyn JoinOrderHeuristic>> {
        self.heuristic.as_ref()
    }

    pub fn is_set(&self, field: SpecField) -> bool {
        match field {
            SpecField::Join => self.join.is_some(),
            SpecField::Where => self.where_.is_some(),
            SpecField::OrderBy => self.order_by.is_some(),
            SpecField::Ordered => self.ordered,
            SpecField::GroupBy => self.group_by.is_some(),
            SpecField::Select => self.select.is_some(),
            SpecField::Distinct => self.distinct,
            SpecField::Tuple => self.tuple,
            SpecField::Bind => self.bind.is_some(),
            SpecField::Heuristic => self.heuristic.is_some(),
        }
    }

    /// A copy with `field` unset.
    pub fn without(&self, field: SpecField) -> Self {
        let mut spec = self.clone();
        match field {
            SpecField::Join => spec.join = None,
            SpecField::Where => {
                spec.where_ = None;
                spec.where_clauses = None;
            }
            SpecField::OrderBy => spec.order_by = None,
            SpecField::Ordered => spec.ordered = false,
            SpecField::GroupBy => spec.group_by = None,
            SpecField::Select => spec.select = None,
            SpecField::Distinct => spec.distinct = false,
            SpecField::Tuple => spec.tuple = false,
            SpecField::Bind => spec.bind = None,
            SpecField::Heuristic => spec.heuristic = None,
        }
        spec
    }

    pub fn with_join(&self, joins: Vec<Condition>) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Join)?;
        let validated = validate_join_expression(&joins, &self.roots)?;
        let mut spec = self.clone();
        spec.join = Some(validated);
        Ok(spec)
    }

    pub fn with_where(&self, condition: Condition) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Where)?;
        let clauses = process_where(&condition, &self.roots)?;
        let mut spec = self.clone();
        spec.where_ = Some(condition);
        spec.where_clauses = clauses;
        Ok(spec)
    }

    pub fn with_order_by(&self, orderbys: Vec<OrderBy>) -> Result<Self, QueryError> {
        self.check_unset(SpecField::OrderBy)?;
        if self.ordered {
            return Err(QueryError::Compatibility(
                "order_by cannot be combined with ordered".to_string(),
            ));
        }
        self.check_paths(orderbys.iter().map(OrderBy::path), "order_by")?;
        let mut spec = self.clone();
        spec.order_by = Some(orderbys);
        Ok(spec)
    }

    /// Order by every root's whole fact, in declaration order.
    pub fn with_ordered(&self) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Ordered)?;
        if self.order_by.is_some() {
            return Err(QueryError::Compatibility(
                "ordered cannot be combined with order_by".to_string(),
            ));
        }
        let mut spec = self.clone();
        spec.ordered = true;
        Ok(spec)
    }

    pub fn with_group_by(&self, orderbys: Vec<OrderBy>) -> Result<Self, QueryError> {
        self.check_unset(SpecField::GroupBy)?;
        if orderbys.is_empty() {
            return Err(QueryError::Compatibility("group_by needs at least one key".to_string()));
        }
        self.check_paths(orderbys.iter().map(OrderBy::path), "group_by")?;
        let mut spec = self.clone();
        spec.group_by = Some(orderbys);
        Ok(spec)
    }

    pub fn with_select(&self, selection: Vec<Selection>) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Select)?;
        if selection.is_empty() {
            return Err(QueryError::Compatibility("select needs at least one element".to_string()));
        }
        self.check_paths(selection.iter().flat_map(Selection::paths), "select")?;
        let mut spec = self.clone();
        spec.select = Some(selection);
        Ok(spec)
    }

    /// Mark the spec distinct. The pairing with `select` is checked when the
    /// query runs, since builders may be called in any order.
    pub fn with_distinct(&self) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Distinct)?;
        let mut spec = self.clone();
        spec.distinct = true;
        Ok(spec)
    }

    pub fn with_tuple(&self) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Tuple)?;
        let mut spec = self.clone();
        spec.tuple = true;
        Ok(spec)
    }

    pub fn with_bind(&self, params: Params) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Bind)?;
        let mut spec = self.clone();
        spec.bind = Some(params);
        Ok(spec)
    }

    pub fn with_heuristic(&self, heuristic: Arc<dyn JoinOrderHeuristic>) -> Result<Self, QueryError> {
        self.check_unset(SpecField::Heuristic)?;
        let mut spec = self.clone();
        spec.heuristic = Some(heuristic);
        Ok(spec)
    }

    /// Sort keys the executor applies: group keys first, then `order_by`
    /// or the implicit keys of `ordered`.
    pub fn effective_order_by(&self) -> Vec<OrderBy> {
        let mut orderbys: Vec<OrderBy> = self.group_by.clone().unwrap_or_default();
        match &self.order_by {
            Some(explicit) => orderbys.extend(explicit.iter().cloned()),
            None if self.ordered => orderbys.extend(self.roots.iter().map(|r| asc(r.path()))),
            None => {}
        }
        orderbys
    }

    fn check_unset(&self, field: SpecField) -> Result<(), QueryError> {
        if self.is_set(field) {
            return Err(QueryError::Compatibility(format!(
                "'{}' is already specified",
                field
            )));
        }
        Ok(())
    }

    fn check_paths<'p>(
        &self,
        paths: impl IntoIterator<Item = &'p Path>,
        context: &str,
    ) -> Result<(), QueryError> {
        for path in paths {
            if !self.roots.contains(path.root()) {
                return Err(QueryError::Scope(format!(
                    "{} path '{}' is not under a declared root",
                    context, path
                )));
            }
        }
        Ok(())
    }
}
