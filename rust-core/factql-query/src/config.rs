// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query configuration.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Join-order heuristic applied when a query does not set its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOrderStrategy {
    /// Declaration order of the roots.
    Basic,
    /// Operator preference: roots with the most selective joins go outermost.
    OpPref,
}

/// Configuration for query planning and execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub default_join_order: JoinOrderStrategy,
    /// Candidate count from which an unindexed join key gets a temporary
    /// index instead of a scan per input row.
    pub temp_index_min_facts: usize,
    /// Log the full text of every plan at debug level.
    pub trace_plans: bool,
}

impl QueryConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        let config: QueryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.temp_index_min_facts == 0 {
            return Err(QueryError::InvalidConfig(
                "temp_index_min_facts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_join_order: JoinOrderStrategy::OpPref,
            temp_index_min_facts: 8,
            trace_plans: false,
        }
    }
}
