// SPDX-License-Identifier: PMPL-1.0-or-later
//! The multi-type fact store.
//!
//! A [`FactBase`] keeps one [`FactMap`] per record type, created the first
//! time a fact of that type is inserted. Index paths can be declared up front
//! per type; fields declared with the index flag are always indexed.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::fact::Fact;
use crate::factmap::FactMap;
use crate::factset::FactSet;
use crate::path::{Path, Root};
use crate::schema::RecordType;

#[derive(Debug, Clone, Default)]
pub struct FactBase {
    maps: IndexMap<String, FactMap>,
    declared: HashMap<String, Vec<Path>>,
}

impl FactBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fact base with index paths declared ahead of any insert.
    pub fn with_indexes(paths: impl IntoIterator<Item = Path>) -> Result<Self, StoreError> {
        let mut base = Self::new();
        for path in paths {
            base.declare_index(path)?;
        }
        Ok(base)
    }

    /// Maintain an index over `path` for its record type.
    ///
    /// Applies immediately to an existing map; otherwise it is installed when
    /// the map is created.
    pub fn declare_index(&mut self, path: Path) -> Result<(), StoreError> {
        let path = path.dealias();
        let type_name = path.root().type_name().to_string();
        if let Some(map) = self.maps.get_mut(&type_name) {
            if map.record_type() != path.root().record_type() {
                return Err(StoreError::InvalidSchema(format!(
                    "conflicting declarations of record type '{}'",
                    type_name
                )));
            }
            map.add_index(path.clone())?;
        }
        let declared = self.declared.entry(type_name).or_default();
        if !declared.contains(&path) {
            declared.push(path);
        }
        Ok(())
    }

    /// Insert a fact. Returns `false` if it was already present.
    pub fn add(&mut self, fact: Fact) -> Result<bool, StoreError> {
        let map = self.factmap_for(fact.record_type())?;
        let added = map.add(fact)?;
        trace!(added, "Fact inserted");
        Ok(added)
    }

    /// Insert every fact, returning how many were new.
    pub fn add_all(&mut self, facts: impl IntoIterator<Item = Fact>) -> Result<usize, StoreError> {
        let mut added = 0;
        for fact in facts {
            if self.add(fact)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Remove a fact, failing with [`StoreError::NotFound`] if it is absent.
    pub fn remove(&mut self, fact: &Fact) -> Result<(), StoreError> {
        match self.maps.get_mut(fact.type_name()) {
            Some(map) => map.remove(fact),
            None => Err(StoreError::NotFound(fact.to_string())),
        }
    }

    /// Remove a fact if present. Returns whether it was present.
    pub fn discard(&mut self, fact: &Fact) -> bool {
        self.maps
            .get_mut(fact.type_name())
            .is_some_and(|map| map.discard(fact))
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.maps
            .get(fact.type_name())
            .is_some_and(|map| map.contains(fact))
    }

    /// Drop every fact of every type. Declared indexes are kept.
    pub fn clear(&mut self) {
        for map in self.maps.values_mut() {
            map.clear();
        }
    }

    /// Total number of facts.
    pub fn len(&self) -> usize {
        self.maps.values().map(FactMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.values().all(FactMap::is_empty)
    }

    /// The map holding facts of the named record type.
    pub fn factmap(&self, type_name: &str) -> Option<&FactMap> {
        self.maps.get(type_name)
    }

    pub fn factmap_mut(&mut self, type_name: &str) -> Option<&mut FactMap> {
        self.maps.get_mut(type_name)
    }

    /// Facts of the named record type, or `None` if none were ever inserted.
    pub fn facts(&self, type_name: &str) -> Option<&FactSet> {
        self.maps.get(type_name).map(FactMap::facts)
    }

    /// All facts, grouped by record type in first-insert order.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> + '_ {
        self.maps.values().flat_map(|map| map.facts().iter())
    }

    fn factmap_for(&mut self, record_type: &Arc<RecordType>) -> Result<&mut FactMap, StoreError> {
        let name = record_type.name();
        if let Some(existing) = self.maps.get(name) {
            if existing.record_type() != record_type {
                return Err(StoreError::InvalidSchema(format!(
                    "conflicting declarations of record type '{}'",
                    name
                )));
            }
        } else {
            let root = Root::new(record_type);
            let mut paths: Vec<Path> = self.declared.get(name).cloned().unwrap_or_default();
            for position in record_type.indexed_positions() {
                if let Some(field) = record_type.field(position) {
                    paths.push(root.field(field.name())?);
                }
            }
            let map = FactMap::new(record_type, paths)?;
            debug!(
                record_type = %record_type,
                indexes = map.indexes().len(),
                "Created fact map"
            );
            self.maps.insert(name.to_string(), map);
        }
        self.maps
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

impl<'a> IntoIterator for &'a FactBase {
    type Item = &'a Fact;
    type IntoIter = Box<dyn Iterator<Item = &'a Fact> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
