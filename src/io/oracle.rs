//! Oracle seams and the CLI-agent production backend.
//!
//! The traits decouple the review loop from how oracle exchanges actually
//! happen. Tests use scripted implementations that return predetermined
//! replies without spawning processes.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, instrument};

use crate::io::config::OracleConfig;
use crate::io::process::run_command_with_timeout;
use crate::io::prompt::{render_decision_prompt, render_generation_prompt, render_namer_prompt};
use crate::memory::LearningContext;

/// Produces candidate code for a task.
pub trait GenerationOracle {
    /// Generate code for `prompt`, steered by the previous attempt's
    /// feedback and the aggregated learning context. Implementations must
    /// return bare source text with any code-fence markup removed.
    fn generate(
        &self,
        prompt: &str,
        feedback: Option<&str>,
        learning: &LearningContext,
    ) -> Result<String>;
}

/// Reviews a clean execution and votes to keep or retry.
pub trait DecisionOracle {
    /// Returns the raw reply text; the caller parses the decision label.
    fn decide(
        &self,
        output: &str,
        error: &str,
        feedback: Option<&str>,
        memory_lines: &[String],
    ) -> Result<String>;
}

/// Suggests a descriptive filename for accepted code.
pub trait ArtifactNamer {
    /// `None` when no usable suggestion is available or the name is
    /// already taken; the caller falls back to counter-based naming.
    fn suggest_name(&self, code: &str, existing: &[String]) -> Result<Option<String>>;
}

/// Oracle backend that spawns a CLI agent for each exchange: the rendered
/// prompt goes to stdin, the reply is read from stdout.
pub struct CliOracle {
    config: OracleConfig,
    extension: String,
}

impl CliOracle {
    pub fn new(config: OracleConfig, extension: &str) -> Self {
        Self {
            config,
            extension: extension.to_string(),
        }
    }

    fn exchange(&self, prompt: &str) -> Result<String> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .context("oracle command must not be empty")?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            Duration::from_secs(self.config.timeout_secs),
        )
        .context("run oracle command")?;

        if output.timed_out {
            return Err(anyhow!(
                "oracle exchange timed out after {}s",
                self.config.timeout_secs
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "oracle command failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GenerationOracle for CliOracle {
    #[instrument(skip_all)]
    fn generate(
        &self,
        prompt: &str,
        feedback: Option<&str>,
        learning: &LearningContext,
    ) -> Result<String> {
        let rendered = render_generation_prompt(prompt, feedback, learning)?;
        let reply = self.exchange(&rendered)?;
        let code = strip_code_fences(&reply);
        debug!(bytes = code.len(), "generation oracle returned code");
        Ok(code)
    }
}

impl DecisionOracle for CliOracle {
    #[instrument(skip_all)]
    fn decide(
        &self,
        output: &str,
        error: &str,
        feedback: Option<&str>,
        memory_lines: &[String],
    ) -> Result<String> {
        let rendered = render_decision_prompt(output, error, feedback, memory_lines)?;
        self.exchange(&rendered)
    }
}

impl ArtifactNamer for CliOracle {
    #[instrument(skip_all)]
    fn suggest_name(&self, code: &str, existing: &[String]) -> Result<Option<String>> {
        let rendered = render_namer_prompt(code, existing, &self.extension)?;
        let reply = self.exchange(&rendered)?;
        Ok(sanitize_filename(&reply, &self.extension, existing))
    }
}

/// Remove Markdown code-fence markup from a generation reply.
pub fn strip_code_fences(reply: &str) -> String {
    reply
        .replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

static NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("filename regex should be valid"));

/// Reduce a namer reply to a safe filename with the given extension.
///
/// Returns `None` when nothing usable remains after sanitizing, or when
/// the name collides with an existing one.
pub fn sanitize_filename(reply: &str, extension: &str, existing: &[String]) -> Option<String> {
    let trimmed = reply.trim().trim_matches('`');
    let stem_source = trimmed.strip_suffix(extension).unwrap_or(trimmed);
    let stem = NAME_CHARS.replace_all(stem_source, "");
    if stem.is_empty() {
        return None;
    }
    let name = format!("{stem}{extension}");
    if existing.iter().any(|taken| taken == &name) {
        None
    } else {
        Some(name)
    }
}
