//! Self-correcting code-synthesis CLI.
//!
//! `codeforge run` drives the generate → execute → review loop for one
//! task, persisting accepted programs under the stable directory and
//! failure history in the cross-run memory document.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use codeforge::io::config::{ForgeConfig, load_config};
use codeforge::io::memory_store::MemoryStore;
use codeforge::io::oracle::CliOracle;
use codeforge::io::sandbox::InterpreterSandbox;
use codeforge::io::stable::ArtifactStore;
use codeforge::review::{AttemptOutcome, LoopRequest, run_review_loop};

#[derive(Parser)]
#[command(
    name = "codeforge",
    version,
    about = "Iterative, self-correcting code generation loop"
)]
struct Cli {
    /// Working directory for config, memory, and the stable directory.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate, execute, and review code for a task until accepted.
    Run {
        /// Task description for the generation oracle.
        prompt: String,
        /// Maximum loop attempts (overrides config and tier).
        #[arg(long)]
        attempts: Option<u32>,
        /// Per-execution timeout in seconds (overrides config and tier).
        #[arg(long)]
        timeout: Option<u64>,
        /// Preset bundle for attempts and timeout.
        #[arg(long, value_enum)]
        tier: Option<Tier>,
    },
    /// Print the learning context derived from persisted memory.
    Context,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tier {
    Light,
    Medium,
    Heavy,
}

impl Tier {
    fn attempts(self) -> u32 {
        match self {
            Self::Light => 2,
            Self::Medium => 4,
            Self::Heavy => 6,
        }
    }

    fn timeout_secs(self) -> u64 {
        match self {
            Self::Light => 30,
            Self::Medium => 60,
            Self::Heavy => 300,
        }
    }
}

fn main() {
    codeforge::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.root.join("codeforge.toml"))?;
    match cli.command {
        Command::Run {
            prompt,
            attempts,
            timeout,
            tier,
        } => cmd_run(&cli.root, &cfg, prompt, attempts, timeout, tier),
        Command::Context => cmd_context(&cli.root, &cfg),
    }
}

fn cmd_run(
    root: &Path,
    cfg: &ForgeConfig,
    prompt: String,
    attempts: Option<u32>,
    timeout: Option<u64>,
    tier: Option<Tier>,
) -> Result<()> {
    if prompt.contains("```") {
        eprintln!("Warning: prompt contains Markdown fences; remove ``` to avoid formatting issues.");
    }

    let max_attempts = attempts
        .or(tier.map(Tier::attempts))
        .unwrap_or(cfg.max_attempts);
    let timeout_secs = timeout
        .or(tier.map(Tier::timeout_secs))
        .unwrap_or(cfg.execution_timeout_secs);

    let oracle = CliOracle::new(cfg.oracle.clone(), &cfg.interpreter.extension);
    let sandbox = InterpreterSandbox::new(cfg.interpreter.clone());
    let mut memory = MemoryStore::load(&root.join(&cfg.memory_file))?;
    let store = ArtifactStore::new(&root.join(&cfg.stable_dir), &cfg.interpreter.extension);

    let request = LoopRequest {
        prompt,
        max_attempts,
        execution_timeout: Duration::from_secs(timeout_secs),
    };

    let outcome = run_review_loop(
        &oracle,
        &oracle,
        &oracle,
        &sandbox,
        &mut memory,
        &store,
        &request,
        print_attempt,
    )?;

    match &outcome.accepted {
        Some(accepted) => println!("Code accepted and saved as {}", accepted.filename),
        None => println!("Max attempts reached."),
    }
    println!("Final Output:\n{}", outcome.output);
    Ok(())
}

fn print_attempt(attempt: &AttemptOutcome) {
    println!("Attempt {}", attempt.attempt);
    if !attempt.stdout.is_empty() {
        println!("Output:\n{}", attempt.stdout);
    }
    if !attempt.stderr.is_empty() {
        println!("Error:\n{}", attempt.stderr);
    }
    if let Some(classification) = &attempt.classification {
        println!(
            "[{}] {}",
            classification.category.as_str(),
            classification.detail
        );
    }
    if let Some(decision) = attempt.decision {
        println!("Reviewer decision: {decision:?}");
    }
}

fn cmd_context(root: &Path, cfg: &ForgeConfig) -> Result<()> {
    let memory = MemoryStore::load(&root.join(&cfg.memory_file))?;
    let mut payload = serde_json::to_string_pretty(&memory.learning_context())?;
    payload.push('\n');
    print!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["codeforge", "run", "print hello"]);
        match cli.command {
            Command::Run {
                prompt,
                attempts,
                timeout,
                tier,
            } => {
                assert_eq!(prompt, "print hello");
                assert!(attempts.is_none());
                assert!(timeout.is_none());
                assert!(tier.is_none());
            }
            Command::Context => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_run_with_tier() {
        let cli = Cli::parse_from(["codeforge", "run", "task", "--tier", "heavy"]);
        match cli.command {
            Command::Run { tier, .. } => {
                let tier = tier.expect("tier set");
                assert_eq!(tier.attempts(), 6);
                assert_eq!(tier.timeout_secs(), 300);
            }
            Command::Context => panic!("expected run command"),
        }
    }

    #[test]
    fn explicit_flags_override_tier() {
        let attempts = Some(9u32);
        let tier = Some(Tier::Light);
        assert_eq!(attempts.or(tier.map(Tier::attempts)).unwrap_or(3), 9);
        assert_eq!(
            None::<u32>.or(tier.map(Tier::attempts)).unwrap_or(3),
            2
        );
    }
}
