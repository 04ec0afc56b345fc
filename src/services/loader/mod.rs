pub mod fabric;
pub mod forge;

use std::path::Path;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};
use crate::services::results::ResultsFile;

use self::fabric::FabricInstaller;
use self::forge::ForgeInstaller;

/// Seam for installing the mod loader a pack declares. Implemented by
/// `LoaderService` and by mocks in orchestrator tests.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(
        &self,
        mod_loader_id: &str,
        minecraft_version: &str,
        root: &Path,
        results: &ResultsFile,
    ) -> AppResult<()>;
}

/// Dispatches a pack's `<family>-<version>` loader id to the matching
/// installer.
pub struct LoaderService {
    forge: ForgeInstaller,
    fabric: FabricInstaller,
}

impl LoaderService {
    pub fn new() -> Self {
        Self {
            forge: ForgeInstaller::new(),
            fabric: FabricInstaller::new(),
        }
    }
}

impl Default for LoaderService {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a loader id like `forge-47.1.0` into family and version. A missing
/// separator is unusable input, not an unknown family.
pub fn parse_loader_id(mod_loader_id: &str) -> AppResult<(&str, &str)> {
    mod_loader_id.split_once('-').ok_or_else(|| {
        AppError::Config(format!(
            "mod loader id '{mod_loader_id}' is not in <family>-<version> form"
        ))
    })
}

#[async_trait]
impl LoaderInstaller for LoaderService {
    async fn install(
        &self,
        mod_loader_id: &str,
        minecraft_version: &str,
        root: &Path,
        results: &ResultsFile,
    ) -> AppResult<()> {
        let (family, version) = parse_loader_id(mod_loader_id)?;
        match family {
            "forge" => {
                self.forge
                    .install(minecraft_version, version, root, results)
                    .await
            }
            "fabric" => {
                self.fabric
                    .install(minecraft_version, version, root, results)
                    .await
            }
            other => {
                log::warn!("Ignoring unsupported mod loader family '{other}'");
                Ok(())
            }
        }
    }
}
