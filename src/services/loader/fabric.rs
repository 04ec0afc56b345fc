use std::path::Path;

use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::services::results::ResultsFile;

const META_URL: &str = "https://meta.fabricmc.net/v2";

pub struct FabricInstaller {
    client: reqwest::Client,
}

// --- Fabric Meta API response types ---

#[derive(Deserialize)]
struct FabricInstallerEntry {
    version: String,
    stable: bool,
}

impl FabricInstaller {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cursepack/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch the Fabric server launcher for the given Minecraft and loader
    /// versions into the server root and record it under the `SERVER`
    /// results key.
    pub async fn install(
        &self,
        game_version: &str,
        loader_version: &str,
        root: &Path,
        results: &ResultsFile,
    ) -> AppResult<()> {
        let installer_version = self.latest_installer_version().await?;
        let launcher_name = format!(
            "fabric-server-mc.{game_version}-loader.{loader_version}-launcher.{installer_version}.jar"
        );
        let dest = root.join(&launcher_name);

        if dest.exists() {
            log::info!("Fabric server launcher {launcher_name} already present");
        } else {
            let launcher_url = format!(
                "{META_URL}/versions/loader/{game_version}/{loader_version}/{installer_version}/server/jar"
            );

            let response = self.client.get(&launcher_url).send().await?;
            if !response.status().is_success() {
                return Err(AppError::Custom(format!(
                    "Fabric server launcher download failed for {game_version}/{loader_version}: HTTP {}",
                    response.status()
                )));
            }

            let launcher_bytes = response.bytes().await?;
            tokio::fs::create_dir_all(root).await?;
            tokio::fs::write(&dest, &launcher_bytes).await?;
            log::info!("Installed Fabric loader {loader_version} for Minecraft {game_version}");
        }

        results.append("SERVER", &launcher_name)?;
        Ok(())
    }

    /// The newest stable installer version from the Fabric meta service.
    async fn latest_installer_version(&self) -> AppResult<String> {
        let url = format!("{META_URL}/versions/installer");
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Custom(format!(
                "Fabric Meta API failed: HTTP {}",
                response.status()
            )));
        }

        let entries: Vec<FabricInstallerEntry> = response.json().await?;
        entries
            .iter()
            .find(|e| e.stable)
            .or_else(|| entries.first())
            .map(|e| e.version.clone())
            .ok_or_else(|| AppError::Custom("Fabric Meta lists no installer versions".to_string()))
    }
}

impl Default for FabricInstaller {
    fn default() -> Self {
        Self::new()
    }
}
