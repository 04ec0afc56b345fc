use std::path::{Path, PathBuf};

use crate::errors::AppResult;
use crate::models::manifest::InstallManifest;

/// The three content directories under the output root. All of them exist
/// before any download starts.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub root: PathBuf,
    pub mods: PathBuf,
    pub plugins: PathBuf,
    pub saves: PathBuf,
}

impl OutputPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            mods: root.join("mods"),
            plugins: root.join("plugins"),
            saves: root.join("saves"),
        }
    }

    pub fn ensure_created(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.mods)?;
        std::fs::create_dir_all(&self.plugins)?;
        std::fs::create_dir_all(&self.saves)?;
        Ok(())
    }
}

/// A file the installer wrote, with the level it provides when the file is a
/// bundled world selected as the server's level.
#[derive(Debug, Clone)]
pub struct PathWithInfo {
    pub path: PathBuf,
    pub level_name: Option<String>,
}

impl PathWithInfo {
    pub fn plain(path: PathBuf) -> Self {
        Self {
            path,
            level_name: None,
        }
    }
}

/// What an install call produced.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// True when the prior install was still valid and only finalization ran.
    pub reused: bool,
    pub manifest: InstallManifest,
}
