use std::path::Path;

use crate::errors::{AppError, AppResult};
use crate::services::results::ResultsFile;

const MAVEN_URL: &str = "https://maven.minecraftforge.net";

pub struct ForgeInstaller {
    client: reqwest::Client,
}

impl ForgeInstaller {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cursepack/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch the Forge installer JAR for `<game_version>-<forge_version>`
    /// into the server root and record it under the `SERVER` results key.
    ///
    /// A previously downloaded installer is reused, which keeps re-running a
    /// finalized install cheap.
    pub async fn install(
        &self,
        game_version: &str,
        forge_version: &str,
        root: &Path,
        results: &ResultsFile,
    ) -> AppResult<()> {
        let forge_id = format!("{game_version}-{forge_version}");
        let installer_name = format!("forge-{forge_id}-installer.jar");
        let dest = root.join(&installer_name);

        if dest.exists() {
            log::info!("Forge installer {installer_name} already present");
        } else {
            let installer_url = format!(
                "{MAVEN_URL}/net/minecraftforge/forge/{forge_id}/forge-{forge_id}-installer.jar"
            );

            let response = self.client.get(&installer_url).send().await?;
            if !response.status().is_success() {
                return Err(AppError::Custom(format!(
                    "Forge installer download failed for {forge_id}: HTTP {}",
                    response.status()
                )));
            }

            let installer_bytes = response.bytes().await?;
            tokio::fs::create_dir_all(root).await?;
            tokio::fs::write(&dest, &installer_bytes).await?;
            log::info!("Installed Forge {forge_id} installer");
        }

        results.append("SERVER", &installer_name)?;
        Ok(())
    }
}

impl Default for ForgeInstaller {
    fn default() -> Self {
        Self::new()
    }
}
