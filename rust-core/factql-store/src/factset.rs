// SPDX-License-Identifier: PMPL-1.0-or-later
//! Insertion-ordered fact sets.

use std::collections::HashMap;
use std::fmt;
use std::iter::Flatten;

use crate::error::StoreError;
use crate::fact::Fact;

/// Slot vectors shorter than this are never compacted.
const MIN_COMPACT_SLOTS: usize = 32;

/// An insertion-ordered set of facts without duplicates.
///
/// Facts live in a slot vector in insertion order, with a hash map from each
/// fact to its slot. Removal leaves an empty slot behind, and the vector is
/// compacted once empty slots outnumber live ones, so `add`, `remove` and
/// `discard` are O(1) amortized while iteration order is preserved.
///
/// Set algebra returns new sets ordered by the left operand's insertion order,
/// extended by elements only the right operand contributes.
#[derive(Clone, Default)]
pub struct FactSet {
    slots: Vec<Option<Fact>>,
    positions: HashMap<Fact, usize>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact. Returns `false` if it was already present.
    pub fn add(&mut self, fact: Fact) -> bool {
        if self.positions.contains_key(&fact) {
            return false;
        }
        self.positions.insert(fact.clone(), self.slots.len());
        self.slots.push(Some(fact));
        true
    }

    /// Remove a fact, failing with [`StoreError::NotFound`] if it is absent.
    pub fn remove(&mut self, fact: &Fact) -> Result<(), StoreError> {
        if self.discard(fact) {
            Ok(())
        } else {
            Err(StoreError::NotFound(fact.to_string()))
        }
    }

    /// Remove a fact if present. Returns whether it was present.
    pub fn discard(&mut self, fact: &Fact) -> bool {
        let Some(position) = self.positions.remove(fact) else {
            return false;
        };
        if let Some(slot) = self.slots.get_mut(position) {
            *slot = None;
        }
        if self.positions.is_empty() {
            self.slots.clear();
        } else if self.slots.len() >= MIN_COMPACT_SLOTS
            && self.slots.len() > 2 * self.positions.len()
        {
            self.compact();
        }
        true
    }

    /// Keep only the facts for which `keep` returns `true`, in one pass.
    pub fn retain(&mut self, mut keep: impl FnMut(&Fact) -> bool) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|fact| !keep(fact)) {
                if let Some(fact) = slot.take() {
                    self.positions.remove(&fact);
                }
            }
        }
        self.compact();
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.positions.contains_key(fact)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.positions.clear();
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.slots.iter().flatten(),
            remaining: self.positions.len(),
        }
    }

    pub fn union(&self, other: &FactSet) -> FactSet {
        let mut union = self.clone();
        union.union_update(other);
        union
    }

    pub fn intersection(&self, other: &FactSet) -> FactSet {
        self.iter().filter(|f| other.contains(f)).cloned().collect()
    }

    pub fn difference(&self, other: &FactSet) -> FactSet {
        self.iter().filter(|f| !other.contains(f)).cloned().collect()
    }

    pub fn symmetric_difference(&self, other: &FactSet) -> FactSet {
        self.iter()
            .filter(|f| !other.contains(f))
            .chain(other.iter().filter(|f| !self.contains(f)))
            .cloned()
            .collect()
    }

    pub fn union_update(&mut self, other: &FactSet) {
        self.extend(other.iter().cloned());
    }

    pub fn intersection_update(&mut self, other: &FactSet) {
        self.retain(|f| other.contains(f));
    }

    pub fn difference_update(&mut self, other: &FactSet) {
        self.retain(|f| !other.contains(f));
    }

    pub fn symmetric_difference_update(&mut self, other: &FactSet) {
        for fact in other.iter() {
            if !self.discard(fact) {
                self.add(fact.clone());
            }
        }
    }

    /// Drop empty slots and renumber the survivors.
    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (position, fact) in self.slots.iter().flatten().enumerate() {
            if let Some(slot) = self.positions.get_mut(fact) {
                *slot = position;
            }
        }
    }
}

/// Sets are equal when they hold the same facts, in any order.
impl PartialEq for FactSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|f| other.contains(f))
    }
}

impl Eq for FactSet {}

impl fmt::Debug for FactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Borrowing iterator over a [`FactSet`] in insertion order.
#[derive(Clone)]
pub struct Iter<'a> {
    inner: Flatten<std::slice::Iter<'a, Option<Fact>>>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Fact;

    fn next(&mut self) -> Option<Self::Item> {
        let fact = self.inner.next()?;
        self.remaining -= 1;
        Some(fact)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let fact = self.inner.next_back()?;
        self.remaining -= 1;
        Some(fact)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FromIterator<Fact> for FactSet {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        let mut set = FactSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Fact> for FactSet {
    fn extend<I: IntoIterator<Item = Fact>>(&mut self, iter: I) {
        for fact in iter {
            self.add(fact);
        }
    }
}

impl<'a> IntoIterator for &'a FactSet {
    type Item = &'a Fact;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for FactSet {
    type Item = Fact;
    type IntoIter = Flatten<std::vec::IntoIter<Option<Fact>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter().flatten()
    }
}
