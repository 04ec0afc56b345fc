use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Where the server's level (world save) should come from, when the pack
/// provides one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFrom {
    /// An embedded world directory inside the pack's overrides.
    Overrides,
    /// A world archive referenced by the pack and downloaded from CurseForge.
    WorldFile,
}

impl std::str::FromStr for LevelFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OVERRIDES" => Ok(Self::Overrides),
            "WORLD_FILE" => Ok(Self::WorldFile),
            other => Err(format!("Unknown level-from value: {other}")),
        }
    }
}

/// Timeouts applied to the CurseForge HTTP client.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub response_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub connection_pool_max_idle_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(120),
            tls_handshake_timeout: Duration::from_secs(30),
            connection_pool_max_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Exclude/force-include policy, typically loaded from a JSON file.
///
/// Entries are either numeric project IDs or project slugs; slugs are resolved
/// against the API at install time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExcludeIncludesContent {
    pub global_excludes: Vec<String>,
    pub global_force_includes: Vec<String>,
    pub modpacks: HashMap<String, ExcludeIncludes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExcludeIncludes {
    pub excludes: Vec<String>,
    pub force_includes: Vec<String>,
}

impl ExcludeIncludesContent {
    /// Exclude entries that apply to `slug`: global ones plus the
    /// pack-specific ones.
    pub fn excludes_for(&self, slug: &str) -> Vec<&str> {
        let mut entries: Vec<&str> = self.global_excludes.iter().map(String::as_str).collect();
        if let Some(specific) = self.modpacks.get(slug) {
            entries.extend(specific.excludes.iter().map(String::as_str));
        }
        entries
    }

    /// Force-include entries that apply to `slug`.
    pub fn force_includes_for(&self, slug: &str) -> Vec<&str> {
        let mut entries: Vec<&str> = self
            .global_force_includes
            .iter()
            .map(String::as_str)
            .collect();
        if let Some(specific) = self.modpacks.get(slug) {
            entries.extend(specific.force_includes.iter().map(String::as_str));
        }
        entries
    }
}

/// Everything the installer needs besides the output root and results path.
#[derive(Debug, Clone, Default)]
pub struct InstallerConfig {
    /// CurseForge API key. Without one, only a previously completed install
    /// can be finalized.
    pub api_key: Option<String>,
    /// Override for the API base URL (defaults to the public endpoint).
    pub api_base_url: Option<String>,
    /// Perform a full install even when the prior install already matches.
    pub force_synchronize: bool,
    pub exclude_includes: Option<ExcludeIncludesContent>,
    pub level_from: Option<LevelFrom>,
    /// Leave files already on disk untouched when applying overrides.
    pub overrides_skip_existing: bool,
    pub http: HttpOptions,
}
