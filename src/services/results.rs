use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::errors::AppResult;

/// Line-oriented `KEY=VALUE` file consumed by the surrounding server tooling.
///
/// The orchestrator truncates it at the start of an install; the install steps
/// (including the loader installers) append entries as they learn them.
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh results file, discarding entries from earlier runs.
    pub fn reset(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, b"")?;
        Ok(())
    }

    pub fn append(&self, key: &str, value: &str) -> AppResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{key}={value}")?;
        Ok(())
    }
}
