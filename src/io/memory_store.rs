//! Durable cross-run memory persistence.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use jsonschema::Draft;
use serde_json::Value;
use tracing::{debug, warn};

use crate::memory::{
    ErrorEntry, LearningContext, MemoryRecord, SuccessEntry, derive_learning_context,
};

const MEMORY_SCHEMA: &str = include_str!("../../schemas/memory/v1.schema.json");

/// Single-writer store for the persisted memory document.
///
/// Every mutation rewrites the whole document (temp file + rename); there
/// is no batching, no pruning, and no cross-process coordination.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    record: MemoryRecord,
}

impl MemoryStore {
    /// Load the record at `path`, or start from the empty record when the
    /// file does not exist yet. The document is schema-validated on load.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no memory document, starting empty");
            return Ok(Self {
                path: path.to_path_buf(),
                record: MemoryRecord::default(),
            });
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read memory {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse memory {}", path.display()))?;
        validate_memory_document(&value)
            .with_context(|| format!("validate memory {}", path.display()))?;
        let record: MemoryRecord = serde_json::from_value(value)
            .with_context(|| format!("parse memory record {}", path.display()))?;
        debug!(
            errors = record.error_history.len(),
            successes = record.success_patterns.len(),
            "memory loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            record,
        })
    }

    pub fn record(&self) -> &MemoryRecord {
        &self.record
    }

    /// Rewrite the whole document atomically (temp file + rename), logging
    /// the outcome either way.
    pub fn save(&self) -> Result<()> {
        let result = self.write_atomic();
        match &result {
            Ok(()) => debug!(path = %self.path.display(), "memory saved"),
            Err(err) => warn!(path = %self.path.display(), err = %err, "memory save failed"),
        }
        result
    }

    fn write_atomic(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut buf = serde_json::to_string_pretty(&self.record).context("serialize memory")?;
        buf.push('\n');
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("write temp memory {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace memory {}", self.path.display()))?;
        Ok(())
    }

    /// Record a failed execution and persist immediately.
    ///
    /// `frequency` counts same-type entries including this one, recomputed
    /// at insertion rather than incremented in place.
    pub fn add_error(&mut self, kind: &str, context: &str, code_snippet: Option<&str>) -> Result<()> {
        let frequency = self.record.error_frequency(kind) + 1;
        self.record.error_history.push(ErrorEntry {
            kind: kind.to_string(),
            context: context.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            code_snippet: code_snippet.map(str::to_string),
            frequency,
        });
        self.save()
    }

    /// Record a successful code pattern and persist immediately.
    pub fn add_success(&mut self, pattern: &str, context: &str) -> Result<()> {
        self.record.success_patterns.push(SuccessEntry {
            pattern: pattern.to_string(),
            context: context.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
        self.save()
    }

    /// Aggregate the persisted history for the generation oracle. Computed
    /// fresh on every call, never cached.
    pub fn learning_context(&self) -> LearningContext {
        derive_learning_context(&self.record)
    }

    /// Entries of `optimization_history` with `success_rate > 0.7`.
    ///
    /// Nothing in this crate writes `optimization_history`, so this is
    /// empty in practice; the accessor is kept for parity with the
    /// persisted document format.
    pub fn optimization_suggestions(&self) -> Vec<Value> {
        self.record
            .optimization_history
            .iter()
            .filter(|entry| {
                entry
                    .get("success_rate")
                    .and_then(Value::as_f64)
                    .is_some_and(|rate| rate > 0.7)
            })
            .cloned()
            .collect()
    }
}

/// Validate a memory document against the embedded v1 schema
/// (Draft 2020-12).
fn validate_memory_document(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MEMORY_SCHEMA).context("parse memory schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile memory schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
