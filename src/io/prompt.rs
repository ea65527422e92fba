//! Prompt rendering for oracle exchanges.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};

use crate::memory::LearningContext;

const GENERATION_TEMPLATE: &str = include_str!("prompts/generation.md");
const DECISION_TEMPLATE: &str = include_str!("prompts/decision.md");
const NAMER_TEMPLATE: &str = include_str!("prompts/namer.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("generation", GENERATION_TEMPLATE)
            .expect("generation template should be valid");
        env.add_template("decision", DECISION_TEMPLATE)
            .expect("decision template should be valid");
        env.add_template("namer", NAMER_TEMPLATE)
            .expect("namer template should be valid");
        Self { env }
    }
}

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(PromptEngine::new);

/// Render the code-generation prompt: task, requirements, previous-attempt
/// feedback, and the aggregated learning context.
pub fn render_generation_prompt(
    task: &str,
    feedback: Option<&str>,
    learning: &LearningContext,
) -> Result<String> {
    let template = ENGINE.env.get_template("generation")?;
    let rendered = template.render(context! {
        task => task.trim(),
        feedback => feedback.map(str::trim).filter(|s| !s.is_empty()),
        frequent_errors => format_frequent_errors(learning),
        success_patterns => format_success_patterns(learning),
    })?;
    Ok(rendered)
}

/// Render the keep-or-retry review prompt, including the ephemeral per-run
/// feedback lines verbatim.
pub fn render_decision_prompt(
    output: &str,
    error: &str,
    feedback: Option<&str>,
    memory_lines: &[String],
) -> Result<String> {
    let template = ENGINE.env.get_template("decision")?;
    let memory = if memory_lines.is_empty() {
        "None".to_string()
    } else {
        memory_lines.join("\n")
    };
    let rendered = template.render(context! {
        output => output,
        error => error,
        feedback => feedback.filter(|s| !s.is_empty()).unwrap_or("None"),
        memory => memory,
    })?;
    Ok(rendered)
}

/// Render the filename-suggestion prompt.
pub fn render_namer_prompt(code: &str, existing: &[String], extension: &str) -> Result<String> {
    let template = ENGINE.env.get_template("namer")?;
    let rendered = template.render(context! {
        code => code,
        existing => (!existing.is_empty()).then(|| existing.join(", ")),
        extension => extension,
    })?;
    Ok(rendered)
}

fn format_frequent_errors(learning: &LearningContext) -> Option<String> {
    if learning.frequent_errors.is_empty() {
        return None;
    }
    let lines: Vec<String> = learning
        .frequent_errors
        .iter()
        .map(|(kind, count)| format!("- {kind}: {count} occurrences"))
        .collect();
    Some(lines.join("\n"))
}

fn format_success_patterns(learning: &LearningContext) -> Option<String> {
    if learning.successful_patterns.is_empty() {
        return None;
    }
    // Only the most recent few patterns; the full list grows without bound.
    let recent_start = learning.successful_patterns.len().saturating_sub(3);
    let lines: Vec<String> = learning.successful_patterns[recent_start..]
        .iter()
        .map(|entry| format!("- {}", entry.pattern))
        .collect();
    Some(lines.join("\n"))
}
