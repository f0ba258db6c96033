// SPDX-License-Identifier: PMPL-1.0-or-later
//! EXPLAIN output for query plans.
//!
//! [`ExplainOutput`] is a serializable snapshot of a [`QueryPlan`]: one
//! [`ExplainStep`] per join step with every clause rendered as text, plus
//! the indented text rendering of the whole plan.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::plan::{JoinQueryPlan, QueryPlan};

// ---------------------------------------------------------------------------
// ExplainStep
// ---------------------------------------------------------------------------

/// Rendered description of one join step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainStep {
    /// Step number, starting at 1.
    pub step: usize,
    /// Root bound by this step.
    pub root: String,
    /// Roots bound by earlier steps.
    pub input_signature: Vec<String>,
    /// Indexed paths available on the root.
    pub indexes: Vec<String>,
    /// Clause answered by index lookup, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prejoin_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prejoin_clauses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prejoin_order: Vec<String>,
    /// Comparison linking the root to earlier roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postjoin_clauses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postjoin_order: Vec<String>,
}

impl ExplainStep {
    fn from_join_plan(step: usize, plan: &JoinQueryPlan) -> Self {
        Self {
            step,
            root: plan.root().to_string(),
            input_signature: plan.input_signature().iter().map(|r| r.to_string()).collect(),
            indexes: plan.indexes().iter().map(|p| p.to_string()).collect(),
            prejoin_key: plan.prejoin_key().map(|c| c.to_string()),
            prejoin_clauses: plan
                .prejoin_clauses()
                .map(|b| b.clauses().iter().map(|c| c.to_string()).collect())
                .unwrap_or_default(),
            prejoin_order: plan
                .prejoin_orderbys()
                .map(|b| b.orderbys().iter().map(|o| o.to_string()).collect())
                .unwrap_or_default(),
            join_key: plan.join_key().map(|c| c.to_string()),
            postjoin_clauses: plan
                .postjoin_clauses()
                .map(|b| b.clauses().iter().map(|c| c.to_string()).collect())
                .unwrap_or_default(),
            postjoin_order: plan
                .postjoin_orderbys()
                .map(|b| b.orderbys().iter().map(|o| o.to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExplainOutput
// ---------------------------------------------------------------------------

/// Serializable description of a whole query plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainOutput {
    /// Roots in join order.
    pub join_order: Vec<String>,
    pub steps: Vec<ExplainStep>,
    /// Indented text rendering, as printed by `Display` on the plan.
    pub text_output: String,
}

impl ExplainOutput {
    pub fn from_query_plan(plan: &QueryPlan) -> Self {
        Self {
            join_order: plan.output_signature().iter().map(|r| r.to_string()).collect(),
            steps: plan
                .steps()
                .iter()
                .enumerate()
                .map(|(i, step)| ExplainStep::from_join_plan(i + 1, step))
                .collect(),
            text_output: plan.to_string(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, QueryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        Ok(serde_json::from_str(json)?)
    }
}
