// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query roots and field paths.
//!
//! A [`Root`] names a source of facts in a query: a record type, or an alias
//! of one when the same type participates twice (self-joins). A [`Path`]
//! addresses a value inside the facts of a root: the whole fact, a field, or
//! a field of a nested complex term.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::StoreError;
use crate::fact::Fact;
use crate::schema::{FieldKind, RecordType};
use crate::value::Value;

/// A record type, or an alias of one, used as a query source.
#[derive(Clone)]
pub struct Root {
    record_type: Arc<RecordType>,
    alias: Option<Arc<str>>,
}

impl Root {
    pub fn new(record_type: &Arc<RecordType>) -> Self {
        Self {
            record_type: Arc::clone(record_type),
            alias: None,
        }
    }

    /// A distinct root over the same record type.
    pub fn alias(record_type: &Arc<RecordType>, name: &str) -> Self {
        Self {
            record_type: Arc::clone(record_type),
            alias: Some(Arc::from(name)),
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn type_name(&self) -> &str {
        self.record_type.name()
    }

    /// The alias name, or the record type name for a canonical root.
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.record_type.name())
    }

    pub fn is_alias(&self) -> bool {
        self.alias.is_some()
    }

    /// The canonical (unaliased) root of the same record type.
    pub fn dealias(&self) -> Root {
        Root::new(&self.record_type)
    }

    /// Path to the whole fact.
    pub fn path(&self) -> Path {
        Path {
            root: self.clone(),
            steps: Vec::new(),
        }
    }

    /// Path to a named field.
    pub fn field(&self, name: &str) -> Result<Path, StoreError> {
        self.path().field(name)
    }

    fn key(&self) -> (&str, Option<&str>) {
        (self.record_type.name(), self.alias.as_deref())
    }
}

impl PartialEq for Root {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Root {}

impl Hash for Root {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Root {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Root {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}@{}", self.record_type.name(), alias),
            None => write!(f, "{}", self.record_type.name()),
        }
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A root plus a sequence of field positions.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    root: Root,
    steps: Vec<usize>,
}

impl Path {
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Field positions from the root fact downwards.
    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    /// Whether the path denotes the whole fact of its root.
    pub fn is_root_path(&self) -> bool {
        self.steps.is_empty()
    }

    /// Descend into a named field of the record type this path ends at.
    pub fn field(&self, name: &str) -> Result<Path, StoreError> {
        let ty = self.target_type()?;
        let position = ty.position(name).ok_or_else(|| StoreError::UnknownField {
            record_type: ty.name().to_string(),
            field: name.to_string(),
        })?;
        let mut steps = self.steps.clone();
        steps.push(position);
        Ok(Path {
            root: self.root.clone(),
            steps,
        })
    }

    /// Same path with the root replaced by its canonical root.
    pub fn dealias(&self) -> Path {
        Path {
            root: self.root.dealias(),
            steps: self.steps.clone(),
        }
    }

    /// Same steps anchored at another root of the same record type.
    pub fn with_root(&self, root: &Root) -> Path {
        Path {
            root: root.clone(),
            steps: self.steps.clone(),
        }
    }

    /// Fetch the value this path addresses in `fact`.
    ///
    /// `fact` must be a fact of the path's root type. Returns `None` when a
    /// step does not exist in the fact.
    pub fn resolve<'f>(&self, fact: &'f Fact) -> Option<Cow<'f, Value>> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Some(Cow::Owned(Value::Fact(fact.clone())));
        };
        let mut current = fact.value(*first)?;
        for step in rest {
            current = match current {
                Value::Fact(nested) => nested.value(*step)?,
                _ => return None,
            };
        }
        Some(Cow::Borrowed(current))
    }

    /// The record type whose fields this path can descend into.
    fn target_type(&self) -> Result<Arc<RecordType>, StoreError> {
        let mut ty = Arc::clone(self.root.record_type());
        for step in &self.steps {
            let field = ty.field(*step).ok_or_else(|| {
                StoreError::InvalidSchema(format!("position {} out of range for '{}'", step, ty))
            })?;
            ty = match field.kind() {
                FieldKind::Complex(nested) => Arc::clone(nested),
                _ => {
                    return Err(StoreError::NotComplex {
                        record_type: ty.name().to_string(),
                        field: field.name().to_string(),
                    })
                }
            };
        }
        Ok(ty)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.name())?;
        let mut ty = Some(Arc::clone(self.root.record_type()));
        for step in &self.steps {
            let field = ty.as_ref().and_then(|t| t.field(*step).cloned());
            match field {
                Some(field) => {
                    write!(f, ".{}", field.name())?;
                    ty = match field.kind() {
                        FieldKind::Complex(nested) => Some(Arc::clone(nested)),
                        _ => None,
                    };
                }
                None => {
                    write!(f, ".{}", step)?;
                    ty = None;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
