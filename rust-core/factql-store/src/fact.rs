// SPDX-License-Identifier: PMPL-1.0-or-later
//! Facts: immutable record instances.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::StoreError;
use crate::schema::RecordType;
use crate::value::Value;

/// An immutable instance of a [`RecordType`].
///
/// Facts are value objects: cloning shares the underlying storage, and
/// equality, hashing and ordering only look at the record type name and the
/// field values in declared order.
#[derive(Clone)]
pub struct Fact {
    inner: Arc<FactInner>,
}

struct FactInner {
    record_type: Arc<RecordType>,
    values: Vec<Value>,
}

impl Fact {
    /// Create a fact from positional values.
    pub fn new(record_type: &Arc<RecordType>, values: Vec<Value>) -> Result<Self, StoreError> {
        if values.len() != record_type.arity() {
            return Err(StoreError::ArityMismatch {
                record_type: record_type.name().to_string(),
                expected: record_type.arity(),
                found: values.len(),
            });
        }
        for (field, value) in record_type.fields().iter().zip(&values) {
            if !field.kind().unifies(value) {
                return Err(StoreError::FieldMismatch {
                    record_type: record_type.name().to_string(),
                    field: field.name().to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(Self {
            inner: Arc::new(FactInner {
                record_type: Arc::clone(record_type),
                values,
            }),
        })
    }

    /// Start building a fact by field name.
    pub fn builder(record_type: &Arc<RecordType>) -> FactBuilder {
        FactBuilder {
            record_type: Arc::clone(record_type),
            values: vec![None; record_type.arity()],
            error: None,
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.inner.record_type
    }

    pub fn type_name(&self) -> &str {
        self.inner.record_type.name()
    }

    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    /// Value at a field position.
    pub fn value(&self, position: usize) -> Option<&Value> {
        self.inner.values.get(position)
    }

    /// Value of a named field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.inner
            .record_type
            .position(field)
            .and_then(|i| self.inner.values.get(i))
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.type_name() == other.type_name() && self.values() == other.values())
    }
}

impl Eq for Fact {}

impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name().hash(state);
        self.values().hash(state);
    }
}

impl PartialOrd for Fact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values()
            .cmp(other.values())
            .then_with(|| self.type_name().cmp(other.type_name()))
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())?;
        if self.values().is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, value) in self.values().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Builds a [`Fact`] by field name, falling back to declared defaults.
#[derive(Debug)]
pub struct FactBuilder {
    record_type: Arc<RecordType>,
    values: Vec<Option<Value>>,
    error: Option<StoreError>,
}

impl FactBuilder {
    /// Set a named field. Unknown names surface as an error from [`build`](Self::build).
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        match self.record_type.position(field) {
            Some(i) => self.values[i] = Some(value.into()),
            None => {
                if self.error.is_none() {
                    self.error = Some(StoreError::UnknownField {
                        record_type: self.record_type.name().to_string(),
                        field: field.to_string(),
                    });
                }
            }
        }
        self
    }

    pub fn build(self) -> Result<Fact, StoreError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut values = Vec::with_capacity(self.values.len());
        for (field, value) in self.record_type.fields().iter().zip(self.values) {
            match value.or_else(|| field.default().cloned()) {
                Some(v) => values.push(v),
                None => {
                    return Err(StoreError::MissingField {
                        record_type: self.record_type.name().to_string(),
                        field: field.name().to_string(),
                    })
                }
            }
        }
        Fact::new(&self.record_type, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    fn point() -> Arc<RecordType> {
        RecordType::builder("point")
            .field("x", FieldKind::Integer)
            .field_with_default("y", FieldKind::Integer, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_checks_arity() {
        let err = Fact::new(&point(), vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, StoreError::ArityMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_new_checks_unification() {
        let err = Fact::new(&point(), vec![Value::Int(1), Value::from("a")]).unwrap_err();
        assert!(matches!(err, StoreError::FieldMismatch { .. }));
    }

    #[test]
    fn test_value_equality_and_order() {
        let ty = point();
        let a = Fact::new(&ty, vec![Value::Int(1), Value::Int(2)]).unwrap();
        let b = Fact::new(&ty, vec![Value::Int(1), Value::Int(2)]).unwrap();
        let c = Fact::new(&ty, vec![Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(a.to_string(), "point(1,2)");
    }

    #[test]
    fn test_builder_uses_defaults() {
        let fact = Fact::builder(&point()).set("x", 4).build().unwrap();
        assert_eq!(fact.get("y"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_builder_missing_field() {
        let err = Fact::builder(&point()).set("y", 4).build().unwrap_err();
        assert!(matches!(err, StoreError::MissingField { .. }));
    }

    #[test]
    fn test_builder_unknown_field() {
        let err = Fact::builder(&point()).set("z", 4).build().unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }
}
