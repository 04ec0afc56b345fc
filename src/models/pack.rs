use serde::Deserialize;

use crate::errors::{AppError, AppResult};

/// The only manifest type this installer understands.
pub const MANIFEST_TYPE_MODPACK: &str = "minecraftModpack";

/// The `manifest.json` found inside a CurseForge modpack archive (or shipped
/// as a standalone file). Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CfManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "manifestType")]
    pub manifest_type: String,
    #[serde(default = "default_overrides")]
    pub overrides: String,
    pub minecraft: CfMinecraftInfo,
    #[serde(default)]
    pub files: Vec<CfFileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfMinecraftInfo {
    pub version: String,
    #[serde(rename = "modLoaders")]
    pub mod_loaders: Vec<CfModLoaderInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfModLoaderInfo {
    pub id: String,
    pub primary: bool,
}

/// One project file referenced by the pack, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CfFileRef {
    #[serde(rename = "projectID")]
    pub project_id: u32,
    #[serde(rename = "fileID")]
    pub file_id: u32,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_overrides() -> String {
    "overrides".to_string()
}

fn default_true() -> bool {
    true
}

impl CfManifest {
    /// Reject anything that is not a Minecraft modpack manifest.
    pub fn validate(&self) -> AppResult<()> {
        if self.manifest_type != MANIFEST_TYPE_MODPACK {
            return Err(AppError::InvalidPack(format!(
                "manifest type '{}' is not a Minecraft modpack",
                self.manifest_type
            )));
        }
        Ok(())
    }

    /// The mod loader marked primary in the pack.
    pub fn primary_loader(&self) -> AppResult<&CfModLoaderInfo> {
        self.minecraft
            .mod_loaders
            .iter()
            .find(|l| l.primary)
            .ok_or_else(|| {
                AppError::InvalidPack("no primary mod loader declared in the pack".to_string())
            })
    }

    /// Stand-in mod id for packs installed from a local archive or manifest
    /// file, where no registry-assigned id exists. Stable across runs and
    /// platforms so later installs can recognize the same pack.
    pub fn pseudo_mod_id(&self) -> u32 {
        string_hash32(&self.name).unsigned_abs()
    }

    /// Stand-in file id derived from the referenced files in document order.
    /// Reordering the file list produces a different id on purpose: the list
    /// order is part of the pack's identity.
    pub fn pseudo_file_id(&self) -> u32 {
        self.files
            .iter()
            .fold(7i32, |h, f| {
                h.wrapping_mul(31)
                    .wrapping_add(f.project_id as i32)
                    .wrapping_mul(31)
                    .wrapping_add(f.file_id as i32)
            })
            .unsigned_abs()
    }
}

/// 32-bit wrapping string hash (`h = 31*h + ch`), chosen for stability rather
/// than distribution.
fn string_hash32(s: &str) -> i32 {
    s.chars()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}
