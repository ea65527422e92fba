//! Data model for the durable cross-run memory document.
//!
//! The persisted record outlives the process and is the single source of
//! truth for what past runs got wrong and right. Derivation of the
//! learning context is pure so it can be tested without touching disk;
//! persistence lives in [`crate::io::memory_store`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One recorded execution failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEntry {
    /// Taxonomy category name (`syntax_error`, `missing_import`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// The classification detail at the time of failure.
    pub context: String,
    /// ISO-8601 insertion time.
    pub timestamp: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
    /// Count of same-type entries including this one, recomputed at
    /// insertion rather than incremented in place. Non-decreasing per type.
    pub frequency: u64,
}

/// One recorded successful code pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessEntry {
    pub pattern: String,
    pub context: String,
    pub timestamp: String,
}

/// Persisted root document.
///
/// `failed_patterns` and `optimization_history` are carried for format
/// parity with the document schema; nothing in this crate writes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub error_history: Vec<ErrorEntry>,
    pub success_patterns: Vec<SuccessEntry>,
    pub failed_patterns: Vec<serde_json::Value>,
    pub optimization_history: Vec<serde_json::Value>,
}

impl MemoryRecord {
    /// Number of failures already recorded with the given type.
    pub fn error_frequency(&self, kind: &str) -> u64 {
        self.error_history
            .iter()
            .filter(|entry| entry.kind == kind)
            .count() as u64
    }
}

/// Aggregated view of the record handed to the generation oracle.
///
/// Derived fresh on each request, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LearningContext {
    /// Per-type failure counts, in deterministic (lexicographic) order.
    pub frequent_errors: BTreeMap<String, u64>,
    /// The last five failures, insertion order preserved.
    pub recent_errors: Vec<ErrorEntry>,
    pub total_errors: usize,
    pub successful_patterns: Vec<SuccessEntry>,
    /// Passthrough of `failed_patterns`.
    pub anti_patterns: Vec<serde_json::Value>,
}

/// Aggregate the record into a [`LearningContext`].
pub fn derive_learning_context(record: &MemoryRecord) -> LearningContext {
    let mut frequent_errors = BTreeMap::new();
    for entry in &record.error_history {
        *frequent_errors.entry(entry.kind.clone()).or_insert(0) += 1;
    }
    let recent_start = record.error_history.len().saturating_sub(5);
    LearningContext {
        frequent_errors,
        recent_errors: record.error_history[recent_start..].to_vec(),
        total_errors: record.error_history.len(),
        successful_patterns: record.success_patterns.clone(),
        anti_patterns: record.failed_patterns.clone(),
    }
}
