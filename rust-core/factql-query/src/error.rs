// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query error types.

use factql_store::StoreError;
use thiserror::Error;

/// Errors raised while building, planning or running a query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// An expression references a path outside the declared roots, or is
    /// not a meaningful condition in its position.
    #[error("scope error: {0}")]
    Scope(String),

    /// Placeholders left unbound when the query is executed.
    #[error("unbound placeholders: {}", .placeholders.join(", "))]
    Binding { placeholders: Vec<String> },

    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Mutually exclusive or repeated query options.
    #[error("incompatible query options: {0}")]
    Compatibility(String),

    #[error("cardinality error: {0}")]
    Cardinality(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_display_lists_placeholders() {
        let err = QueryError::Binding {
            placeholders: vec!["ph(0)".to_string(), "ph(limit)".to_string()],
        };
        assert_eq!(err.to_string(), "unbound placeholders: ph(0), ph(limit)");
    }

    #[test]
    fn test_store_error_converts() {
        let err: QueryError = StoreError::NotFound("p(1)".to_string()).into();
        assert!(matches!(err, QueryError::Store(StoreError::NotFound(_))));
        assert!(err.to_string().contains("p(1)"));
    }
}
