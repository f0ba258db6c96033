// SPDX-License-Identifier: PMPL-1.0-or-later
//! Record type descriptors.
//!
//! A record type is declared once through [`RecordTypeBuilder`] and shared
//! behind an `Arc`. Its ordered field list fixes the arity, the positional
//! layout of every fact, and the lexicographic order facts sort by.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::value::Value;

/// The value domain of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    String,
    Symbol,
    Tuple,
    /// Accepts any value.
    Any,
    /// A nested fact of the given record type.
    Complex(Arc<RecordType>),
}

impl FieldKind {
    /// Whether `value` belongs to this field's domain.
    pub fn unifies(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldKind::Integer, Value::Int(_)) => true,
            (FieldKind::String, Value::Str(_)) => true,
            (FieldKind::Symbol, Value::Symbol(_)) => true,
            (FieldKind::Tuple, Value::Tuple(_)) => true,
            (FieldKind::Any, _) => true,
            (FieldKind::Complex(ty), Value::Fact(fact)) => fact.type_name() == ty.name(),
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::String => "string",
            FieldKind::Symbol => "symbol",
            FieldKind::Tuple => "tuple",
            FieldKind::Any => "any",
            FieldKind::Complex(ty) => ty.name(),
        }
    }
}

/// One declared field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
    default: Option<Value>,
    index: bool,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether fact bases index this field automatically.
    pub fn is_indexed(&self) -> bool {
        self.index
    }
}

/// A named, ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDef>,
}

impl RecordType {
    /// Start declaring a record type.
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, position: usize) -> Option<&FieldDef> {
        self.fields.get(position)
    }

    /// Position of the named field.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Positions of the fields declared with the index flag.
    pub fn indexed_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.index)
            .map(|(i, _)| i)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.fields.len())
    }
}

/// Builder for [`RecordType`].
#[derive(Debug, Clone)]
pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl RecordTypeBuilder {
    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, None, false)
    }

    /// Declare a field that fact bases index automatically.
    pub fn indexed_field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, None, true)
    }

    /// Declare a field with a default used by [`crate::FactBuilder`].
    pub fn field_with_default(
        self,
        name: impl Into<String>,
        kind: FieldKind,
        default: impl Into<Value>,
    ) -> Self {
        self.push(name.into(), kind, Some(default.into()), false)
    }

    fn push(mut self, name: String, kind: FieldKind, default: Option<Value>, index: bool) -> Self {
        self.fields.push(FieldDef {
            name,
            kind,
            default,
            index,
        });
        self
    }

    /// Validate and freeze the declaration.
    pub fn build(self) -> Result<Arc<RecordType>, StoreError> {
        if self.name.is_empty() {
            return Err(StoreError::InvalidSchema(
                "record type name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(StoreError::InvalidSchema(format!(
                    "record type '{}' has an unnamed field",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(StoreError::InvalidSchema(format!(
                    "record type '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
            if let Some(default) = &field.default {
                if !field.kind.unifies(default) {
                    return Err(StoreError::FieldMismatch {
                        record_type: self.name.clone(),
                        field: field.name.clone(),
                        value: default.to_string(),
                    });
                }
            }
        }

        Ok(Arc::new(RecordType {
            name: self.name,
            fields: self.fields,
        }))
    }
}
