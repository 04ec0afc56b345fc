use serde::{Deserialize, Serialize};

/// Record of a completed install, persisted as `curseforge.json` in the
/// output root. `files` is the exhaustive list of everything the installer
/// wrote, output-root-relative with forward slashes; reconciliation of later
/// installs depends on it being complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallManifest {
    pub slug: String,
    pub modpack_name: String,
    pub modpack_version: String,
    pub file_name: String,
    pub mod_id: u32,
    pub file_id: u32,
    pub minecraft_version: String,
    pub mod_loader_id: String,
    pub level_name: Option<String>,
    pub files: Vec<String>,
}

impl InstallManifest {
    /// Drop tracked entries that live inside an embedded world directory.
    ///
    /// Older installs recorded extracted world files; world data must never be
    /// owned by the installer (it would be deleted or overwritten on
    /// re-install). A world directory is recognized by a tracked `level.dat`.
    /// Applying this twice is a no-op.
    pub fn strip_world_entries(&mut self) {
        let world_prefixes: Vec<String> = self
            .files
            .iter()
            .filter_map(|f| {
                let (parent, name) = f.rsplit_once('/')?;
                (name == "level.dat").then(|| format!("{parent}/"))
            })
            .collect();

        if world_prefixes.is_empty() {
            return;
        }

        self.files
            .retain(|f| !world_prefixes.iter().any(|p| f.starts_with(p.as_str())));
    }
}
