//! Test-only scripted collaborators for the review loop.
//!
//! Each double returns queued replies in order, repeating the last one
//! when the queue runs dry, and records enough of its inputs for tests to
//! assert on the conversation.

use std::cell::RefCell;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::types::ExecOutcome;
use crate::io::oracle::{ArtifactNamer, DecisionOracle, GenerationOracle};
use crate::io::sandbox::Sandbox;
use crate::memory::LearningContext;

/// A clean execution outcome with the given stdout.
pub fn succeeding(stdout: &str) -> ExecOutcome {
    ExecOutcome {
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// A failed execution outcome with the given stdout/stderr.
pub fn failing(stdout: &str, stderr: &str) -> ExecOutcome {
    ExecOutcome {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn scripted<T: Clone>(queue: &[T], call: usize) -> Result<T> {
    match queue.get(call).or_else(|| queue.last()) {
        Some(item) => Ok(item.clone()),
        None => Err(anyhow!("scripted queue is empty")),
    }
}

/// Generation oracle returning queued code snippets and recording the
/// feedback it was given on each call.
pub struct ScriptedGenerator {
    scripts: Vec<String>,
    feedback_seen: RefCell<Vec<Option<String>>>,
}

impl ScriptedGenerator {
    pub fn new(scripts: Vec<String>) -> Self {
        Self {
            scripts,
            feedback_seen: RefCell::new(Vec::new()),
        }
    }

    /// Feedback argument of each `generate` call, in order.
    pub fn feedback_history(&self) -> Vec<Option<String>> {
        self.feedback_seen.borrow().clone()
    }
}

impl GenerationOracle for ScriptedGenerator {
    fn generate(
        &self,
        _prompt: &str,
        feedback: Option<&str>,
        _learning: &LearningContext,
    ) -> Result<String> {
        let call = self.feedback_seen.borrow().len();
        self.feedback_seen
            .borrow_mut()
            .push(feedback.map(str::to_string));
        scripted(&self.scripts, call)
    }
}

/// Decision oracle returning queued raw replies and recording the
/// ephemeral memory lines it saw last.
pub struct ScriptedDecider {
    replies: Vec<String>,
    calls: RefCell<usize>,
    memory_seen: RefCell<Vec<String>>,
}

impl ScriptedDecider {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            calls: RefCell::new(0),
            memory_seen: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    /// Memory lines passed to the most recent `decide` call.
    pub fn last_memory_lines(&self) -> Vec<String> {
        self.memory_seen.borrow().clone()
    }
}

impl DecisionOracle for ScriptedDecider {
    fn decide(
        &self,
        _output: &str,
        _error: &str,
        _feedback: Option<&str>,
        memory_lines: &[String],
    ) -> Result<String> {
        let call = *self.calls.borrow();
        *self.calls.borrow_mut() += 1;
        *self.memory_seen.borrow_mut() = memory_lines.to_vec();
        scripted(&self.replies, call)
    }
}

/// Namer returning queued suggestions; an empty queue always declines.
pub struct ScriptedNamer {
    suggestions: Vec<Option<String>>,
    calls: RefCell<usize>,
}

impl ScriptedNamer {
    pub fn new(suggestions: Vec<Option<String>>) -> Self {
        Self {
            suggestions,
            calls: RefCell::new(0),
        }
    }
}

impl ArtifactNamer for ScriptedNamer {
    fn suggest_name(&self, _code: &str, _existing: &[String]) -> Result<Option<String>> {
        let call = *self.calls.borrow();
        *self.calls.borrow_mut() += 1;
        if self.suggestions.is_empty() {
            return Ok(None);
        }
        scripted(&self.suggestions, call)
    }
}

/// Sandbox returning queued outcomes without spawning processes, or a
/// scripted error for every call.
pub struct ScriptedSandbox {
    outcomes: Vec<ExecOutcome>,
    error: Option<String>,
    calls: RefCell<usize>,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<ExecOutcome>) -> Self {
        Self {
            outcomes,
            error: None,
            calls: RefCell::new(0),
        }
    }

    /// Sandbox whose every execution fails with the given message.
    pub fn erroring(message: &str) -> Self {
        Self {
            outcomes: Vec::new(),
            error: Some(message.to_string()),
            calls: RefCell::new(0),
        }
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(&self, _code: &str, _timeout: Duration) -> Result<ExecOutcome> {
        let call = *self.calls.borrow();
        *self.calls.borrow_mut() += 1;
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        scripted(&self.outcomes, call)
    }
}
