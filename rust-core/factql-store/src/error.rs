// SPDX-License-Identifier: PMPL-1.0-or-later
//! Store error types.

use thiserror::Error;

/// Errors raised by schema construction and fact collections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("fact not found: {0}")]
    NotFound(String),

    #[error("unknown field '{field}' in record type '{record_type}'")]
    UnknownField { record_type: String, field: String },

    #[error("field '{field}' of record type '{record_type}' is not a complex term")]
    NotComplex { record_type: String, field: String },

    #[error("arity mismatch for '{record_type}': expected {expected} values, got {found}")]
    ArityMismatch {
        record_type: String,
        expected: usize,
        found: usize,
    },

    #[error("value {value} does not unify with field '{field}' of '{record_type}'")]
    FieldMismatch {
        record_type: String,
        field: String,
        value: String,
    },

    #[error("no value and no default for field '{field}' of '{record_type}'")]
    MissingField { record_type: String, field: String },

    #[error("record type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}
