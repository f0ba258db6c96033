// SPDX-License-Identifier: PMPL-1.0-or-later
//! Result ordering.

use std::cmp::Ordering;
use std::fmt;

use factql_store::{Fact, Path, Root, Value};

use crate::condition::Row;

/// Sort key: a path and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    path: Path,
    ascending: bool,
}

impl OrderBy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}

pub fn asc(path: Path) -> OrderBy {
    OrderBy {
        path,
        ascending: true,
    }
}

pub fn desc(path: Path) -> OrderBy {
    OrderBy {
        path,
        ascending: false,
    }
}

impl From<Path> for OrderBy {
    fn from(path: Path) -> Self {
        asc(path)
    }
}

impl From<&Path> for OrderBy {
    fn from(path: &Path) -> Self {
        asc(path.clone())
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ascending {
            write!(f, "asc({})", self.path)
        } else {
            write!(f, "desc({})", self.path)
        }
    }
}

/// A non-empty sequence of sort keys, most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByBlock {
    orderbys: Vec<OrderBy>,
}

impl OrderByBlock {
    /// `None` when `orderbys` is empty.
    pub fn new(orderbys: Vec<OrderBy>) -> Option<Self> {
        if orderbys.is_empty() {
            None
        } else {
            Some(Self { orderbys })
        }
    }

    pub fn orderbys(&self) -> &[OrderBy] {
        &self.orderbys
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.orderbys.iter().map(OrderBy::path)
    }

    pub fn roots(&self) -> Vec<Root> {
        let mut roots: Vec<Root> = Vec::new();
        for path in self.paths() {
            if !roots.contains(path.root()) {
                roots.push(path.root().clone());
            }
        }
        roots
    }

    fn key(&self, row: &Row<'_>) -> Vec<Option<Value>> {
        self.orderbys
            .iter()
            .map(|ob| row.resolve(&ob.path).map(|v| v.into_owned()))
            .collect()
    }

    fn compare_keys(&self, a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
        for ((ob, x), y) in self.orderbys.iter().zip(a).zip(b) {
            let ordering = if ob.ascending { x.cmp(y) } else { y.cmp(x) };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable multi-key sort of rows aligned with `signature`.
    pub fn sort_rows(&self, signature: &[Root], rows: Vec<Vec<Fact>>) -> Vec<Vec<Fact>> {
        let mut keyed: Vec<(Vec<Option<Value>>, Vec<Fact>)> = rows
            .into_iter()
            .map(|row| (self.key(&Row::new(signature, &row)), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        keyed.into_iter().map(|(_, row)| row).collect()
    }

    /// Stable multi-key sort of facts of a single root.
    pub fn sort_facts(&self, root: &Root, facts: Vec<Fact>) -> Vec<Fact> {
        let signature = std::slice::from_ref(root);
        let mut keyed: Vec<(Vec<Option<Value>>, Fact)> = facts
            .into_iter()
            .map(|fact| {
                let key = self.key(&Row::new(signature, std::slice::from_ref(&fact)));
                (key, fact)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        keyed.into_iter().map(|(_, fact)| fact).collect()
    }
}

impl fmt::Display for OrderByBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ob) in self.orderbys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ob)?;
        }
        Ok(())
    }
}
