// SPDX-License-Identifier: PMPL-1.0-or-later
//! Per-record-type fact storage.

use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::fact::Fact;
use crate::factset::FactSet;
use crate::index::FactIndex;
use crate::path::Path;
use crate::schema::RecordType;

/// The facts of one record type together with their field indexes.
///
/// Every fact in the set is present in every index and vice versa; all
/// mutating operations update the set and the indexes together.
#[derive(Debug, Clone)]
pub struct FactMap {
    record_type: Arc<RecordType>,
    facts: FactSet,
    indexes: Vec<FactIndex>,
}

impl FactMap {
    /// Create an empty map indexing the given paths.
    ///
    /// Paths are stored in canonical (unaliased) form; duplicates collapse.
    pub fn new(
        record_type: &Arc<RecordType>,
        index_paths: impl IntoIterator<Item = Path>,
    ) -> Result<Self, StoreError> {
        let mut map = Self {
            record_type: Arc::clone(record_type),
            facts: FactSet::new(),
            indexes: Vec::new(),
        };
        for path in index_paths {
            map.add_index(path)?;
        }
        Ok(map)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn indexes(&self) -> &[FactIndex] {
        &self.indexes
    }

    /// Canonical paths of the maintained indexes.
    pub fn index_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.indexes.iter().map(FactIndex::path)
    }

    /// The index over `path`, if one is maintained.
    pub fn index(&self, path: &Path) -> Option<&FactIndex> {
        let path = path.dealias();
        self.indexes.iter().find(|index| *index.path() == path)
    }

    /// Start maintaining an index over `path`, populated from the current facts.
    /// Returns `false` if the index already existed.
    pub fn add_index(&mut self, path: Path) -> Result<bool, StoreError> {
        let path = path.dealias();
        if path.root().type_name() != self.record_type.name() {
            return Err(StoreError::TypeMismatch {
                expected: self.record_type.name().to_string(),
                found: path.root().type_name().to_string(),
            });
        }
        if self.index(&path).is_some() {
            return Ok(false);
        }
        debug!(path = %path, facts = self.facts.len(), "Building fact index");
        self.indexes.push(FactIndex::from_facts(path, self.facts.iter()));
        Ok(true)
    }

    /// Insert a fact. Returns `false` if it was already present.
    pub fn add(&mut self, fact: Fact) -> Result<bool, StoreError> {
        self.check_type(&fact)?;
        if !self.facts.add(fact.clone()) {
            return Ok(false);
        }
        for index in &mut self.indexes {
            index.add(fact.clone());
        }
        Ok(true)
    }

    /// Remove a fact, failing with [`StoreError::NotFound`] if it is absent.
    pub fn remove(&mut self, fact: &Fact) -> Result<(), StoreError> {
        self.facts.remove(fact)?;
        for index in &mut self.indexes {
            index.discard(fact);
        }
        Ok(())
    }

    /// Remove a fact if present. Returns whether it was present.
    pub fn discard(&mut self, fact: &Fact) -> bool {
        if !self.facts.discard(fact) {
            return false;
        }
        for index in &mut self.indexes {
            index.discard(fact);
        }
        true
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.facts.contains(fact)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Keep only the facts for which `keep` returns `true`. One pass over the
    /// set and one over each index.
    pub fn retain(&mut self, mut keep: impl FnMut(&Fact) -> bool) {
        self.facts.retain(&mut keep);
        let facts = &self.facts;
        for index in &mut self.indexes {
            index.retain(|f| facts.contains(f));
        }
    }

    /// Drop every fact; indexes stay declared.
    pub fn clear(&mut self) {
        self.facts.clear();
        for index in &mut self.indexes {
            index.clear();
        }
    }

    pub fn union(&self, other: &FactSet) -> Result<FactMap, StoreError> {
        self.check_all(other)?;
        self.rebuilt(self.facts.union(other))
    }

    pub fn intersection(&self, other: &FactSet) -> Result<FactMap, StoreError> {
        self.rebuilt(self.facts.intersection(other))
    }

    pub fn difference(&self, other: &FactSet) -> Result<FactMap, StoreError> {
        self.rebuilt(self.facts.difference(other))
    }

    pub fn symmetric_difference(&self, other: &FactSet) -> Result<FactMap, StoreError> {
        self.check_all(other)?;
        self.rebuilt(self.facts.symmetric_difference(other))
    }

    pub fn union_update(&mut self, other: &FactSet) -> Result<(), StoreError> {
        self.check_all(other)?;
        for fact in other {
            self.add(fact.clone())?;
        }
        Ok(())
    }

    pub fn intersection_update(&mut self, other: &FactSet) {
        self.retain(|f| other.contains(f));
    }

    pub fn difference_update(&mut self, other: &FactSet) {
        for fact in other {
            self.discard(fact);
        }
    }

    pub fn symmetric_difference_update(&mut self, other: &FactSet) -> Result<(), StoreError> {
        self.check_all(other)?;
        for fact in other {
            if !self.discard(fact) {
                self.add(fact.clone())?;
            }
        }
        Ok(())
    }

    /// A new map over `facts` declaring the same indexes as this one.
    fn rebuilt(&self, facts: FactSet) -> Result<FactMap, StoreError> {
        let mut map = FactMap::new(&self.record_type, self.index_paths().cloned())?;
        for fact in facts {
            map.add(fact)?;
        }
        Ok(map)
    }

    fn check_type(&self, fact: &Fact) -> Result<(), StoreError> {
        if fact.type_name() != self.record_type.name() {
            return Err(StoreError::TypeMismatch {
                expected: self.record_type.name().to_string(),
                found: fact.type_name().to_string(),
            });
        }
        Ok(())
    }

    fn check_all(&self, facts: &FactSet) -> Result<(), StoreError> {
        facts.iter().try_for_each(|fact| self.check_type(fact))
    }
}
