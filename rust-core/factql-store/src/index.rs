// SPDX-License-Identifier: PMPL-1.0-or-later
//! Sorted field indexes.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::StoreError;
use crate::fact::Fact;
use crate::factset::FactSet;
use crate::op::CompareOp;
use crate::path::Path;
use crate::value::Value;

/// A sorted-key multimap from the value at one path to the facts holding it.
///
/// Keys are kept in ascending order; each key maps to an insertion-ordered set
/// of facts. A key is dropped as soon as its last fact is removed, so the key
/// set and the fact sets never disagree.
#[derive(Debug, Clone)]
pub struct FactIndex {
    path: Path,
    entries: BTreeMap<Value, FactSet>,
    len: usize,
}

impl FactIndex {
    pub fn new(path: Path) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
            len: 0,
        }
    }

    /// Build an index over `facts`.
    pub fn from_facts<'a>(path: Path, facts: impl IntoIterator<Item = &'a Fact>) -> Self {
        let mut index = Self::new(path);
        for fact in facts {
            index.add(fact.clone());
        }
        index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a fact under its key. Returns `false` if it was already indexed
    /// or the path does not resolve in it.
    pub fn add(&mut self, fact: Fact) -> bool {
        let Some(key) = self.path.resolve(&fact).map(|k| k.into_owned()) else {
            return false;
        };
        let inserted = self.entries.entry(key).or_default().add(fact);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Remove a fact, failing with [`StoreError::NotFound`] if it is not indexed.
    pub fn remove(&mut self, fact: &Fact) -> Result<(), StoreError> {
        if self.discard(fact) {
            Ok(())
        } else {
            Err(StoreError::NotFound(fact.to_string()))
        }
    }

    /// Remove a fact. Returns whether it was indexed.
    pub fn discard(&mut self, fact: &Fact) -> bool {
        let Some(key) = self.path.resolve(fact) else {
            return false;
        };
        let Some(facts) = self.entries.get_mut(key.as_ref()) else {
            return false;
        };
        let removed = facts.discard(fact);
        if facts.is_empty() {
            self.entries.remove(key.as_ref());
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Keep only the facts for which `keep` returns `true`, dropping keys
    /// left empty.
    pub fn retain(&mut self, mut keep: impl FnMut(&Fact) -> bool) {
        self.entries.retain(|_, facts| {
            facts.retain(&mut keep);
            !facts.is_empty()
        });
        self.len = self.entries.values().map(FactSet::len).sum();
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.path
            .resolve(fact)
            .and_then(|key| self.entries.get(key.as_ref()))
            .is_some_and(|facts| facts.contains(fact))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }

    /// Number of indexed facts.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Distinct keys in ascending order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Value> + '_ {
        self.entries.keys()
    }

    /// All indexed facts in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> + '_ {
        self.entries.values().flat_map(|facts| facts.iter())
    }

    /// Facts whose key satisfies `key op value`, key by key in ascending
    /// order, or descending when `reverse` is set. Facts sharing a key come
    /// out in insertion order.
    ///
    /// For `In`/`NotIn`, `value` must be a tuple of candidate keys; any other
    /// value is treated as an empty collection.
    pub fn find<'a>(
        &'a self,
        op: CompareOp,
        value: &Value,
        reverse: bool,
    ) -> impl Iterator<Item = &'a Fact> + 'a {
        let mut matched = self.matching(op, value);
        if reverse {
            matched.reverse();
        }
        matched.into_iter().flat_map(|facts| facts.iter())
    }

    fn matching(&self, op: CompareOp, value: &Value) -> Vec<&FactSet> {
        use Bound::{Excluded, Included, Unbounded};

        match op {
            CompareOp::Eq => self.entries.get(value).into_iter().collect(),
            CompareOp::Ne => self
                .entries
                .iter()
                .filter(|(key, _)| *key != value)
                .map(|(_, facts)| facts)
                .collect(),
            CompareOp::Lt => self.range(Unbounded, Excluded(value)),
            CompareOp::Le => self.range(Unbounded, Included(value)),
            CompareOp::Gt => self.range(Excluded(value), Unbounded),
            CompareOp::Ge => self.range(Included(value), Unbounded),
            CompareOp::In => {
                let mut wanted: Vec<&Value> = value.as_tuple().unwrap_or(&[]).iter().collect();
                wanted.sort();
                wanted.dedup();
                wanted
                    .into_iter()
                    .filter_map(|key| self.entries.get(key))
                    .collect()
            }
            CompareOp::NotIn => {
                let excluded = value.as_tuple().unwrap_or(&[]);
                self.entries
                    .iter()
                    .filter(|(key, _)| !excluded.contains(*key))
                    .map(|(_, facts)| facts)
                    .collect()
            }
        }
    }

    fn range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> Vec<&FactSet> {
        self.entries
            .range::<Value, _>((lower, upper))
            .map(|(_, facts)| facts)
            .collect()
    }
}
