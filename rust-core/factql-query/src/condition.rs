// SPDX-License-Identifier: PMPL-1.0-or-later
//! Condition model.
//!
//! A [`Condition`] is a tree of boolean combinators over [`Comparator`]
//! leaves. Comparators are either standard binary comparisons between
//! operands (paths, values, placeholders), calls of user functions over a
//! tuple of paths, boolean literals, or cross-product markers used only in
//! joins. Conditions are built with the free functions of this module
//! (`eq`, `lt`, `and_`, ...) rather than operator overloading.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use factql_store::{CompareOp, Fact, Path, Root, Value};
use indexmap::IndexMap;

use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Placeholders and parameters
// ---------------------------------------------------------------------------

/// A parameter bound to a concrete value when the query runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Index into the positional parameters.
    Positional(usize),
    /// A named parameter with an optional fallback.
    Named { name: String, default: Option<Value> },
}

impl Placeholder {
    /// Look the placeholder up in `params`, falling back to its default.
    pub fn resolve(&self, params: &Params) -> Option<Value> {
        match self {
            Placeholder::Positional(i) => params.positional(*i).cloned(),
            Placeholder::Named { name, default } => {
                params.named(name).or(default.as_ref()).cloned()
            }
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Positional(i) => write!(f, "ph({})", i),
            Placeholder::Named { name, .. } => write!(f, "ph({})", name),
        }
    }
}

/// Positional placeholder `ph(i)`.
pub fn ph(index: usize) -> Placeholder {
    Placeholder::Positional(index)
}

/// Named placeholder without a default.
pub fn ph_named(name: impl Into<String>) -> Placeholder {
    Placeholder::Named {
        name: name.into(),
        default: None,
    }
}

/// Named placeholder that falls back to `default` when not bound.
pub fn ph_named_default(name: impl Into<String>, default: impl Into<Value>) -> Placeholder {
    Placeholder::Named {
        name: name.into(),
        default: Some(default.into()),
    }
}

/// Values supplied for placeholders at execution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Turn a list of unbound placeholder names into a [`QueryError::Binding`].
pub(crate) fn binding_result<T>(value: T, mut missing: Vec<String>) -> Result<T, QueryError> {
    if missing.is_empty() {
        return Ok(value);
    }
    let mut seen = std::collections::HashSet::new();
    missing.retain(|name| seen.insert(name.clone()));
    Err(QueryError::Binding {
        placeholders: missing,
    })
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A tuple of facts aligned with a root signature.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    signature: &'a [Root],
    facts: &'a [Fact],
}

impl<'a> Row<'a> {
    pub fn new(signature: &'a [Root], facts: &'a [Fact]) -> Self {
        Self { signature, facts }
    }

    /// The fact bound to `root`.
    pub fn fact(&self, root: &Root) -> Option<&'a Fact> {
        let position = self.signature.iter().position(|r| r == root)?;
        self.facts.get(position)
    }

    /// Value of `path` in this row.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'a, Value>> {
        path.resolve(self.fact(path.root())?)
    }
}

// ---------------------------------------------------------------------------
// Operands and standard comparators
// ---------------------------------------------------------------------------

/// One argument of a standard comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Path(Path),
    Value(Value),
    Placeholder(Placeholder),
}

impl Operand {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Operand::Path(p) => Some(p),
            _ => None,
        }
    }

    fn resolve<'a>(&'a self, row: &Row<'a>) -> Option<Cow<'a, Value>> {
        match self {
            Operand::Path(p) => row.resolve(p),
            Operand::Value(v) => Some(Cow::Borrowed(v)),
            Operand::Placeholder(_) => None,
        }
    }

    fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Operand {
        match self {
            Operand::Placeholder(ph) => match ph.resolve(params) {
                Some(value) => Operand::Value(value),
                None => {
                    missing.push(ph.to_string());
                    self.clone()
                }
            },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Path(p) => write!(f, "{}", p),
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Placeholder(ph) => write!(f, "{}", ph),
        }
    }
}

impl From<Path> for Operand {
    fn from(path: Path) -> Self {
        Operand::Path(path)
    }
}

impl From<&Path> for Operand {
    fn from(path: &Path) -> Self {
        Operand::Path(path.clone())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Placeholder> for Operand {
    fn from(ph: Placeholder) -> Self {
        Operand::Placeholder(ph)
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Self {
        Operand::Value(Value::Int(i))
    }
}

impl From<i32> for Operand {
    fn from(i: i32) -> Self {
        Operand::Value(Value::from(i))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<Fact> for Operand {
    fn from(fact: Fact) -> Self {
        Operand::Value(Value::Fact(fact))
    }
}

impl From<Vec<Value>> for Operand {
    fn from(items: Vec<Value>) -> Self {
        Operand::Value(Value::Tuple(items))
    }
}

/// A binary comparison `args[0] op args[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StandardComparator {
    op: CompareOp,
    args: [Operand; 2],
}

/// Result of [`StandardComparator::keyable`]: `path op operand`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedComparison {
    pub path: Path,
    pub op: CompareOp,
    pub operand: Operand,
}

impl StandardComparator {
    pub fn new(op: CompareOp, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self {
            op,
            args: [left.into(), right.into()],
        }
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn args(&self) -> &[Operand; 2] {
        &self.args
    }

    /// The complementary comparison.
    pub fn negate(&self) -> Self {
        Self {
            op: self.op.negate(),
            args: self.args.clone(),
        }
    }

    /// The same comparison with its arguments exchanged; `None` for the
    /// membership operators.
    pub fn swap(&self) -> Option<Self> {
        let [a, b] = &self.args;
        Some(Self {
            op: self.op.swap()?,
            args: [b.clone(), a.clone()],
        })
    }

    /// Replace placeholders with bound values.
    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    pub(crate) fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        let [a, b] = &self.args;
        Self {
            op: self.op,
            args: [a.bind(params, missing), b.bind(params, missing)],
        }
    }

    /// Rewrite aliased paths to their canonical form.
    pub fn dealias(&self) -> Self {
        let rewrite = |arg: &Operand| match arg {
            Operand::Path(p) => Operand::Path(p.dealias()),
            other => other.clone(),
        };
        Self {
            op: self.op,
            args: [rewrite(&self.args[0]), rewrite(&self.args[1])],
        }
    }

    /// If one argument is one of `indexable` and the other is not a path of
    /// the same root, return the comparison oriented with that path first.
    pub fn keyable(&self, indexable: &[Path]) -> Option<KeyedComparison> {
        let keyed = |path: &Path, other: &Operand| {
            indexable.contains(path)
                && other.as_path().map_or(true, |o| o.root() != path.root())
        };
        let [a, b] = &self.args;
        if let Operand::Path(path) = a {
            if keyed(path, b) {
                return Some(KeyedComparison {
                    path: path.clone(),
                    op: self.op,
                    operand: b.clone(),
                });
            }
        }
        if let (Operand::Path(path), Some(op)) = (b, self.op.swap()) {
            if keyed(path, a) {
                return Some(KeyedComparison {
                    path: path.clone(),
                    op,
                    operand: a.clone(),
                });
            }
        }
        None
    }

    /// Paths among the arguments, left to right.
    pub fn paths(&self) -> Vec<&Path> {
        self.args.iter().filter_map(Operand::as_path).collect()
    }

    /// Distinct roots referenced by the arguments.
    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for path in self.paths() {
            if !roots.contains(path.root()) {
                roots.push(path.root().clone());
            }
        }
        roots
    }

    pub fn placeholders(&self) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Operand::Placeholder(ph) => Some(ph.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Evaluate against a row. Unbound placeholders and unresolvable paths
    /// make the comparison false.
    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        match (self.args[0].resolve(row), self.args[1].resolve(row)) {
            (Some(a), Some(b)) => self.op.evaluate(&a, &b),
            _ => false,
        }
    }
}

impl fmt::Display for StandardComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.args[0], self.op, self.args[1])
    }
}

// ---------------------------------------------------------------------------
// Function comparators
// ---------------------------------------------------------------------------

type PredicateFn = dyn Fn(&[Value]) -> bool + Send + Sync;

/// A trailing function parameter supplied at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParam {
    name: String,
    default: Option<Value>,
}

/// A boolean function over the values of a tuple of paths.
///
/// The function receives the path values followed by the trailing
/// parameters. Parameters not assigned up front are bound by
/// [`ground`](Self::ground): positionally, then by name, then from their
/// declared default.
#[derive(Clone)]
pub struct FunctionComparator {
    name: Arc<str>,
    func: Arc<PredicateFn>,
    paths: Vec<Path>,
    params: Vec<FunctionParam>,
    assignment: Vec<Option<Value>>,
    negative: bool,
}

/// Build a function comparator named `name` over `paths`.
pub fn func<F>(name: &str, paths: impl IntoIterator<Item = Path>, f: F) -> FunctionComparator
where
    F: Fn(&[Value]) -> bool + Send + Sync + 'static,
{
    FunctionComparator {
        name: Arc::from(name),
        func: Arc::new(f),
        paths: paths.into_iter().collect(),
        params: Vec::new(),
        assignment: Vec::new(),
        negative: false,
    }
}

impl FunctionComparator {
    /// Declare a trailing parameter that must be bound.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(FunctionParam {
            name: name.into(),
            default: None,
        });
        self.assignment.push(None);
        self
    }

    /// Declare a trailing parameter with a fallback value.
    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(FunctionParam {
            name: name.into(),
            default: Some(default.into()),
        });
        self.assignment.push(None);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Whether every trailing parameter has a value.
    pub fn is_grounded(&self) -> bool {
        self.assignment.iter().all(Option::is_some)
    }

    pub fn negate(&self) -> Self {
        Self {
            negative: !self.negative,
            ..self.clone()
        }
    }

    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    pub(crate) fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        let mut next_positional = 0;
        let mut assignment = Vec::with_capacity(self.params.len());
        for (param, assigned) in self.params.iter().zip(&self.assignment) {
            if assigned.is_some() {
                assignment.push(assigned.clone());
                continue;
            }
            let value = params
                .positional(next_positional)
                .or_else(|| params.named(&param.name))
                .or(param.default.as_ref())
                .cloned();
            if params.positional(next_positional).is_some() {
                next_positional += 1;
            }
            if value.is_none() {
                missing.push(format!("{}.{}", self.name, param.name));
            }
            assignment.push(value);
        }
        Self {
            assignment,
            ..self.clone()
        }
    }

    pub fn dealias(&self) -> Self {
        Self {
            paths: self.paths.iter().map(Path::dealias).collect(),
            ..self.clone()
        }
    }

    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for path in &self.paths {
            if !roots.contains(path.root()) {
                roots.push(path.root().clone());
            }
        }
        roots
    }

    pub fn placeholders(&self) -> Vec<String> {
        self.params
            .iter()
            .zip(&self.assignment)
            .filter(|(_, assigned)| assigned.is_none())
            .map(|(param, _)| format!("{}.{}", self.name, param.name))
            .collect()
    }

    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        let mut args = Vec::with_capacity(self.paths.len() + self.assignment.len());
        for path in &self.paths {
            match row.resolve(path) {
                Some(value) => args.push(value.into_owned()),
                None => return false,
            }
        }
        for assigned in &self.assignment {
            match assigned {
                Some(value) => args.push(value.clone()),
                None => return false,
            }
        }
        (self.func)(&args) != self.negative
    }
}

impl fmt::Debug for FunctionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionComparator")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .field("params", &self.params)
            .field("assignment", &self.assignment)
            .field("negative", &self.negative)
            .finish()
    }
}

impl fmt::Display for FunctionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "not ")?;
        }
        write!(f, "{}(", self.name)?;
        let mut first = true;
        for path in &self.paths {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", path)?;
        }
        for (param, assigned) in self.params.iter().zip(&self.assignment) {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match assigned {
                Some(value) => write!(f, "{}={}", param.name, value)?,
                None => write!(f, "{}=?", param.name)?,
            }
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Comparators and conditions
// ---------------------------------------------------------------------------

/// A leaf of a condition tree.
#[derive(Debug, Clone)]
pub enum Comparator {
    Standard(StandardComparator),
    Function(FunctionComparator),
    /// A literal that always evaluates to the given boolean.
    Static(bool),
    /// Marks two roots as joined by their full cross product.
    Cross(Root, Root),
}

impl Comparator {
    pub fn negate(&self) -> Self {
        match self {
            Comparator::Standard(c) => Comparator::Standard(c.negate()),
            Comparator::Function(c) => Comparator::Function(c.negate()),
            Comparator::Static(b) => Comparator::Static(!b),
            Comparator::Cross(a, b) => Comparator::Cross(a.clone(), b.clone()),
        }
    }

    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    pub(crate) fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        match self {
            Comparator::Standard(c) => Comparator::Standard(c.bind(params, missing)),
            Comparator::Function(c) => Comparator::Function(c.bind(params, missing)),
            other => other.clone(),
        }
    }

    pub fn dealias(&self) -> Self {
        match self {
            Comparator::Standard(c) => Comparator::Standard(c.dealias()),
            Comparator::Function(c) => Comparator::Function(c.dealias()),
            Comparator::Static(b) => Comparator::Static(*b),
            Comparator::Cross(a, b) => Comparator::Cross(a.dealias(), b.dealias()),
        }
    }

    pub fn paths(&self) -> Vec<Path> {
        match self {
            Comparator::Standard(c) => c.paths().into_iter().cloned().collect(),
            Comparator::Function(c) => c.paths().to_vec(),
            Comparator::Static(_) => Vec::new(),
            Comparator::Cross(a, b) => vec![a.path(), b.path()],
        }
    }

    pub fn roots(&self) -> Vec<Root> {
        match self {
            Comparator::Standard(c) => c.roots(),
            Comparator::Function(c) => c.roots(),
            Comparator::Static(_) => Vec::new(),
            Comparator::Cross(a, b) if a == b => vec![a.clone()],
            Comparator::Cross(a, b) => vec![a.clone(), b.clone()],
        }
    }

    pub fn placeholders(&self) -> Vec<String> {
        match self {
            Comparator::Standard(c) => c.placeholders(),
            Comparator::Function(c) => c.placeholders(),
            _ => Vec::new(),
        }
    }

    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        match self {
            Comparator::Standard(c) => c.evaluate(row),
            Comparator::Function(c) => c.evaluate(row),
            Comparator::Static(b) => *b,
            Comparator::Cross(..) => true,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Standard(c) => write!(f, "{}", c),
            Comparator::Function(c) => write!(f, "{}", c),
            Comparator::Static(b) => write!(f, "{}", b),
            Comparator::Cross(a, b) => write!(f, "cross({}, {})", a, b),
        }
    }
}

impl From<StandardComparator> for Comparator {
    fn from(c: StandardComparator) -> Self {
        Comparator::Standard(c)
    }
}

impl From<FunctionComparator> for Comparator {
    fn from(c: FunctionComparator) -> Self {
        Comparator::Function(c)
    }
}

/// A boolean expression over comparators.
#[derive(Debug, Clone)]
pub enum Condition {
    Compare(Comparator),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// The literal value of a static condition.
    pub fn as_static(&self) -> Option<bool> {
        match self {
            Condition::Compare(Comparator::Static(b)) => Some(*b),
            _ => None,
        }
    }

    /// The logical complement, with negation pushed down to the leaves.
    pub fn negate(&self) -> Condition {
        match self {
            Condition::Compare(c) => Condition::Compare(c.negate()),
            Condition::And(cs) => Condition::Or(cs.iter().map(Condition::negate).collect()),
            Condition::Or(cs) => Condition::And(cs.iter().map(Condition::negate).collect()),
            Condition::Not(inner) => inner.as_ref().clone(),
        }
    }

    /// Every comparator leaf, left to right.
    pub fn comparators(&self) -> Vec<&Comparator> {
        let mut out = Vec::new();
        self.collect_comparators(&mut out);
        out
    }

    fn collect_comparators<'a>(&'a self, out: &mut Vec<&'a Comparator>) {
        match self {
            Condition::Compare(c) => out.push(c),
            Condition::And(cs) | Condition::Or(cs) => {
                for c in cs {
                    c.collect_comparators(out);
                }
            }
            Condition::Not(inner) => inner.collect_comparators(out),
        }
    }

    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for comparator in self.comparators() {
            for root in comparator.roots() {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }

    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        match self {
            Condition::Compare(c) => c.evaluate(row),
            Condition::And(cs) => cs.iter().all(|c| c.evaluate(row)),
            Condition::Or(cs) => cs.iter().any(|c| c.evaluate(row)),
            Condition::Not(inner) => !inner.evaluate(row),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, cs: &[Condition], sep: &str| {
            write!(f, "(")?;
            for (i, c) in cs.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, ")")
        };
        match self {
            Condition::Compare(c) => write!(f, "{}", c),
            Condition::And(cs) => join(f, cs, "&"),
            Condition::Or(cs) => join(f, cs, "|"),
            Condition::Not(inner) => write!(f, "~{}", inner),
        }
    }
}

impl From<Comparator> for Condition {
    fn from(c: Comparator) -> Self {
        Condition::Compare(c)
    }
}

impl From<StandardComparator> for Condition {
    fn from(c: StandardComparator) -> Self {
        Condition::Compare(Comparator::Standard(c))
    }
}

impl From<FunctionComparator> for Condition {
    fn from(c: FunctionComparator) -> Self {
        Condition::Compare(Comparator::Function(c))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn compare(op: CompareOp, a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    Condition::Compare(Comparator::Standard(StandardComparator::new(op, a, b)))
}

pub fn eq(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Eq, a, b)
}

pub fn ne(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Ne, a, b)
}

pub fn lt(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Lt, a, b)
}

pub fn le(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Le, a, b)
}

pub fn gt(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Gt, a, b)
}

pub fn ge(a: impl Into<Operand>, b: impl Into<Operand>) -> Condition {
    compare(CompareOp::Ge, a, b)
}

/// `a` is an element of the tuple `collection`.
pub fn in_(a: impl Into<Operand>, collection: impl Into<Operand>) -> Condition {
    compare(CompareOp::In, a, collection)
}

/// `a` is not an element of the tuple `collection`.
pub fn notin_(a: impl Into<Operand>, collection: impl Into<Operand>) -> Condition {
    compare(CompareOp::NotIn, a, collection)
}

/// Conjunction. Empty or fully static input folds to a static literal.
pub fn and_(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    let conditions: Vec<Condition> = conditions.into_iter().collect();
    if conditions.iter().all(|c| c.as_static().is_some()) {
        let value = conditions.iter().all(|c| c.as_static() == Some(true));
        return Condition::Compare(Comparator::Static(value));
    }
    if conditions.len() == 1 {
        return conditions.into_iter().next().unwrap_or(Condition::And(Vec::new()));
    }
    Condition::And(conditions)
}

/// Disjunction. Empty or fully static input folds to a static literal.
pub fn or_(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    let conditions: Vec<Condition> = conditions.into_iter().collect();
    if conditions.iter().all(|c| c.as_static().is_some()) {
        let value = conditions.iter().any(|c| c.as_static() == Some(true));
        return Condition::Compare(Comparator::Static(value));
    }
    if conditions.len() == 1 {
        return conditions.into_iter().next().unwrap_or(Condition::Or(Vec::new()));
    }
    Condition::Or(conditions)
}

pub fn not_(condition: Condition) -> Condition {
    match condition.as_static() {
        Some(b) => Condition::Compare(Comparator::Static(!b)),
        None => Condition::Not(Box::new(condition)),
    }
}

/// Join two roots by their cross product. Only meaningful in `join`.
pub fn cross(a: &Root, b: &Root) -> Condition {
    Condition::Compare(Comparator::Cross(a.clone(), b.clone()))
}
