//! Loop configuration stored in `codeforge.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Loop configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Maximum generate/execute/review iterations per run.
    pub max_attempts: u32,

    /// Per-execution wall-clock budget in seconds.
    pub execution_timeout_secs: u64,

    /// Directory accepted programs are saved under.
    pub stable_dir: PathBuf,

    /// Persisted cross-run memory document.
    pub memory_file: PathBuf,

    pub interpreter: InterpreterConfig,
    pub oracle: OracleConfig,
}

/// How candidate programs are run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Command prefix used to run a candidate source file (e.g. `["python3"]`).
    pub command: Vec<String>,
    /// Source file extension for scratch files and saved artifacts.
    pub extension: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string()],
            extension: ".py".to_string(),
        }
    }
}

/// How oracle exchanges are performed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    /// Command spawned for one exchange; the rendered prompt goes to stdin,
    /// the reply is read from stdout.
    pub command: Vec<String>,
    /// Wall-clock bound for one exchange in seconds.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--skip-git-repo-check".to_string(),
                "-".to_string(),
            ],
            timeout_secs: 600,
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            execution_timeout_secs: 60,
            stable_dir: PathBuf::from("stable"),
            memory_file: PathBuf::from("memory.json"),
            interpreter: InterpreterConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl ForgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.execution_timeout_secs == 0 {
            return Err(anyhow!("execution_timeout_secs must be > 0"));
        }
        if self.interpreter.command.is_empty() || self.interpreter.command[0].trim().is_empty() {
            return Err(anyhow!("interpreter.command must be a non-empty array"));
        }
        if self.interpreter.extension.trim().is_empty() {
            return Err(anyhow!("interpreter.extension must not be empty"));
        }
        if self.oracle.command.is_empty() || self.oracle.command[0].trim().is_empty() {
            return Err(anyhow!("oracle.command must be a non-empty array"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ForgeConfig::default()`.
pub fn load_config(path: &Path) -> Result<ForgeConfig> {
    if !path.exists() {
        let cfg = ForgeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ForgeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ForgeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ForgeConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("codeforge.toml");
        let cfg = ForgeConfig {
            max_attempts: 6,
            execution_timeout_secs: 300,
            ..ForgeConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let cfg = ForgeConfig {
            max_attempts: 0,
            ..ForgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_interpreter_command_is_rejected() {
        let cfg = ForgeConfig {
            interpreter: InterpreterConfig {
                command: Vec::new(),
                extension: ".py".to_string(),
            },
            ..ForgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
