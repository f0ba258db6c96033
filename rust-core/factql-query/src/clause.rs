// SPDX-License-Identifier: PMPL-1.0-or-later
//! Clauses and clause blocks: the conjunctive normal form of a filter.

use std::fmt;

use factql_store::{Path, Root};

use crate::condition::{binding_result, Comparator, Params, Row};
use crate::error::QueryError;

/// A non-empty disjunction of comparators.
#[derive(Debug, Clone)]
pub struct Clause {
    comparators: Vec<Comparator>,
}

impl Clause {
    /// `None` when `comparators` is empty.
    pub fn new(comparators: Vec<Comparator>) -> Option<Self> {
        if comparators.is_empty() {
            None
        } else {
            Some(Self { comparators })
        }
    }

    pub fn comparators(&self) -> &[Comparator] {
        &self.comparators
    }

    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }

    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for comparator in &self.comparators {
            for root in comparator.roots() {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }

    pub fn paths(&self) -> Vec<Path> {
        self.comparators.iter().flat_map(Comparator::paths).collect()
    }

    pub fn placeholders(&self) -> Vec<String> {
        self.comparators
            .iter()
            .flat_map(Comparator::placeholders)
            .collect()
    }

    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    pub(crate) fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        Self {
            comparators: self
                .comparators
                .iter()
                .map(|c| c.bind(params, missing))
                .collect(),
        }
    }

    pub fn dealias(&self) -> Self {
        Self {
            comparators: self.comparators.iter().map(Comparator::dealias).collect(),
        }
    }

    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        self.comparators.iter().any(|c| c.evaluate(row))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.comparators.as_slice() {
            return write!(f, "{}", single);
        }
        write!(f, "(")?;
        for (i, comparator) in self.comparators.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", comparator)?;
        }
        write!(f, ")")
    }
}

/// A non-empty conjunction of clauses.
#[derive(Debug, Clone)]
pub struct ClauseBlock {
    clauses: Vec<Clause>,
}

impl ClauseBlock {
    /// `None` when `clauses` is empty.
    pub fn new(clauses: Vec<Clause>) -> Option<Self> {
        if clauses.is_empty() {
            None
        } else {
            Some(Self { clauses })
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for clause in &self.clauses {
            for root in clause.roots() {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }

    pub fn placeholders(&self) -> Vec<String> {
        self.clauses.iter().flat_map(Clause::placeholders).collect()
    }

    /// A block holding the clauses of `self` followed by those of `other`.
    pub fn concat(&self, other: &ClauseBlock) -> ClauseBlock {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        ClauseBlock { clauses }
    }

    pub fn ground(&self, params: &Params) -> Result<Self, QueryError> {
        let mut missing = Vec::new();
        let grounded = self.bind(params, &mut missing);
        binding_result(grounded, missing)
    }

    pub(crate) fn bind(&self, params: &Params, missing: &mut Vec<String>) -> Self {
        Self {
            clauses: self.clauses.iter().map(|c| c.bind(params, missing)).collect(),
        }
    }

    pub fn dealias(&self) -> Self {
        Self {
            clauses: self.clauses.iter().map(Clause::dealias).collect(),
        }
    }

    pub fn evaluate(&self, row: &Row<'_>) -> bool {
        self.clauses.iter().all(|c| c.evaluate(row))
    }
}

impl fmt::Display for ClauseBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ph, StandardComparator};
    use factql_store::{CompareOp, Fact, FieldKind, RecordType, Value};

    fn setup() -> (Root, Path, Fact) {
        let ty = RecordType::builder("p")
            .field("a", FieldKind::Integer)
            .build()
            .unwrap();
        let fact = Fact::new(&ty, vec![Value::Int(2)]).unwrap();
        let root = Root::new(&ty);
        let a = root.field("a").unwrap();
        (root, a, fact)
    }

    fn cmp(op: CompareOp, path: &Path, value: i64) -> Comparator {
        Comparator::Standard(StandardComparator::new(op, path, value))
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(Clause::new(Vec::new()).is_none());
        assert!(ClauseBlock::new(Vec::new()).is_none());
    }

    #[test]
    fn test_or_and_semantics() {
        let (root, a, fact) = setup();
        let row = Row::new(std::slice::from_ref(&root), std::slice::from_ref(&fact));
        let either = Clause::new(vec![cmp(CompareOp::Eq, &a, 1), cmp(CompareOp::Eq, &a, 2)]).unwrap();
        let never = Clause::new(vec![cmp(CompareOp::Gt, &a, 5)]).unwrap();
        assert!(either.evaluate(&row));
        assert_eq!(either.to_string(), "(p.a == 1 | p.a == 2)");

        let block = ClauseBlock::new(vec![either.clone()]).unwrap();
        assert!(block.evaluate(&row));
        let both = block.concat(&ClauseBlock::new(vec![never]).unwrap());
        assert_eq!(both.len(), 2);
        assert!(!both.evaluate(&row));
        assert_eq!(both.roots(), vec![root]);
    }

    #[test]
    fn test_ground_collects_all_missing() {
        let (_, a, _) = setup();
        let clause = Clause::new(vec![
            Comparator::Standard(StandardComparator::new(CompareOp::Eq, &a, ph(0))),
            Comparator::Standard(StandardComparator::new(CompareOp::Eq, &a, ph(1))),
        ])
        .unwrap();
        let block = ClauseBlock::new(vec![clause]).unwrap();
        match block.ground(&Params::new()) {
            Err(QueryError::Binding { placeholders }) => {
                assert_eq!(placeholders, vec!["ph(0)", "ph(1)"])
            }
            other => panic!("expected binding error, got {:?}", other),
        }
        assert!(block.ground(&Params::new().arg(1).arg(2)).is_ok());
    }
}
