use std::path::{Path, PathBuf};
use std::time::Duration;

use cursepack::services::manifests;
use cursepack::{AppError, AppResult, CurseForgeInstaller, ExcludeIncludesContent, InstallerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let root = PathBuf::from(env_var("OUTPUT_DIR").unwrap_or_else(|| ".".to_string()));
    let results_file = env_var("RESULTS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join(".cursepack-results.env"));

    let config = build_config()?;
    let installer = CurseForgeInstaller::new(&root, results_file, config);

    let outcome = if let Some(archive) = env_var("CF_MODPACK_ZIP") {
        let archive = PathBuf::from(archive);
        let slug = env_var("CF_SLUG").unwrap_or_else(|| file_stem(&archive));
        installer.install_from_archive(&archive, &slug).await?
    } else if let Some(manifest) = env_var("CF_MODPACK_MANIFEST") {
        let manifest = PathBuf::from(manifest);
        let slug = env_var("CF_SLUG").unwrap_or_else(|| file_stem(&manifest));
        installer.install_from_manifest_file(&manifest, &slug).await?
    } else if let Some(slug) = env_var("CF_SLUG") {
        let matcher = env_var("CF_FILENAME_MATCHER");
        let file_id = parse_env("CF_FILE_ID")?;
        installer
            .install_from_slug(&slug, matcher.as_deref(), file_id)
            .await?
    } else {
        return Err(AppError::Config(
            "nothing to install: set CF_SLUG, CF_MODPACK_ZIP or CF_MODPACK_MANIFEST".to_string(),
        ));
    };

    log::info!(
        "{} modpack '{}' version {} in {}",
        if outcome.reused { "Finalized" } else { "Installed" },
        outcome.manifest.modpack_name,
        outcome.manifest.modpack_version,
        root.join(manifests::MANIFEST_NAME).display()
    );
    Ok(())
}

fn build_config() -> AppResult<InstallerConfig> {
    let mut config = InstallerConfig {
        api_key: env_var("CF_API_KEY"),
        api_base_url: env_var("CF_BASE_URL"),
        force_synchronize: env_flag("CF_FORCE_SYNCHRONIZE"),
        overrides_skip_existing: env_flag("CF_OVERRIDES_SKIP_EXISTING"),
        ..Default::default()
    };

    if let Some(value) = env_var("CF_LEVEL_FROM") {
        config.level_from = Some(value.parse().map_err(AppError::Config)?);
    }

    if let Some(path) = env_var("CF_EXCLUDE_INCLUDES_FILE") {
        let data = std::fs::read_to_string(&path)?;
        let content: ExcludeIncludesContent = serde_json::from_str(&data)?;
        config.exclude_includes = Some(content);
    }

    if let Some(secs) = parse_env::<u64>("CF_RESPONSE_TIMEOUT")? {
        config.http.response_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_env::<u64>("CF_TLS_HANDSHAKE_TIMEOUT")? {
        config.http.tls_handshake_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_env::<u64>("CF_CONNECTION_POOL_MAX_IDLE_TIMEOUT")? {
        config.http.connection_pool_max_idle_timeout = Duration::from_secs(secs);
    }

    Ok(config)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str) -> bool {
    env_var(name).is_some_and(|v| matches!(v.as_str(), "true" | "TRUE" | "1" | "yes"))
}

fn parse_env<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match env_var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} has an unusable value: {value}"))),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "modpack".to_string())
}
