//! Shared types for the review loop.

use serde::{Deserialize, Serialize};

/// Captured result of running one candidate program.
///
/// An empty `stderr` marks the execution as clean; the decision oracle is
/// only consulted for clean executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn is_clean(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// Taxonomy of execution failures.
///
/// Serialized names match the `type` strings recorded in the persisted
/// memory document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    SyntaxError,
    MissingImport,
    Timeout,
    EmptyOutput,
    GeneralError,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax_error",
            Self::MissingImport => "missing_import",
            Self::Timeout => "timeout",
            Self::EmptyOutput => "empty_output",
            Self::GeneralError => "general_error",
        }
    }
}

/// A taxonomy category plus the human-readable detail that becomes the
/// next attempt's feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub detail: String,
}

/// Within-run feedback accumulator, reset on every process run.
///
/// Deliberately separate from the durable memory store: this list carries
/// classification details verbatim to the decision oracle, while the store
/// feeds aggregated cross-run history to the generation oracle. The two
/// have different lifetimes and different consumers; keep them apart.
#[derive(Debug, Clone, Default)]
pub struct FeedbackMemory {
    lines: Vec<String>,
}

impl FeedbackMemory {
    pub fn push(&mut self, detail: String) {
        self.lines.push(detail);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_serialize_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::MissingImport).expect("serialize");
        assert_eq!(json, "\"missing_import\"");
        assert_eq!(ErrorCategory::MissingImport.as_str(), "missing_import");
    }

    #[test]
    fn clean_outcome_requires_empty_stderr() {
        let clean = ExecOutcome {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
        };
        assert!(clean.is_clean());

        let failed = ExecOutcome {
            stdout: "partial\n".to_string(),
            stderr: "boom".to_string(),
        };
        assert!(!failed.is_clean());
    }

    #[test]
    fn feedback_memory_preserves_insertion_order() {
        let mut memory = FeedbackMemory::default();
        memory.push("first".to_string());
        memory.push("second".to_string());
        assert_eq!(memory.lines(), ["first", "second"]);
        assert_eq!(memory.len(), 2);
    }
}
