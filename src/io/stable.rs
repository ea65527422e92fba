//! Stable-directory storage for accepted programs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Storage for accepted candidate programs.
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    pub fn new(dir: &Path, extension: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names already present in the stable directory, sorted.
    pub fn existing_names(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("read stable dir {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read stable dir {}", self.dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", entry.path().display()))?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a suggested name against collisions, falling back to the
    /// counter scheme when the suggestion is absent, blank, or taken.
    pub fn resolve_name(&self, suggested: Option<String>, existing: &[String]) -> String {
        match suggested {
            Some(name)
                if !name.trim().is_empty() && !existing.iter().any(|taken| taken == &name) =>
            {
                name
            }
            _ => self.fallback_name(existing),
        }
    }

    /// First free counter-based name: `code_file_<n>` plus the source
    /// extension, counting up from 1.
    pub fn fallback_name(&self, existing: &[String]) -> String {
        let mut counter = 1u32;
        loop {
            let candidate = format!("code_file_{counter}{}", self.extension);
            if !existing.iter().any(|taken| taken == &candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Write accepted code under `filename`, creating the directory if
    /// needed.
    pub fn save(&self, filename: &str, code: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create stable dir {}", self.dir.display()))?;
        let path = self.dir.join(filename);
        fs::write(&path, code).with_context(|| format!("write artifact {}", path.display()))?;
        info!(path = %path.display(), "accepted program saved");
        Ok(path)
    }
}
