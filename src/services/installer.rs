use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::models::config::InstallerConfig;
use crate::models::install::{InstallOutcome, OutputPaths};
use crate::models::manifest::InstallManifest;
use crate::models::pack::CfManifest;
use crate::services::curseforge::{
    CategoryInfo, CurseForgeApi, CurseForgeClient, DownloadStatus,
};
use crate::services::excludes;
use crate::services::loader::{LoaderInstaller, LoaderService};
use crate::services::manifests;
use crate::services::mods::ModDownloader;
use crate::services::overrides::{self, OverridesResult};
use crate::services::results::ResultsFile;

/// Content classes whose projects this installer knows where to place.
const CONTENT_CLASS_SLUGS: [&str; 3] = ["mc-mods", "bukkit-plugins", "worlds"];
const PACK_CLASS_SLUG: &str = "modpacks";

/// Installs a CurseForge modpack into a server directory and reconciles it
/// against what a previous run left behind.
pub struct CurseForgeInstaller {
    root: PathBuf,
    results: ResultsFile,
    config: InstallerConfig,
    loaders: Arc<dyn LoaderInstaller>,
    api: Option<Arc<dyn CurseForgeApi>>,
}

/// Everything one install run works with. Owns the API client; dropping the
/// context releases it.
struct InstallContext {
    slug: String,
    api: Arc<dyn CurseForgeApi>,
    categories: CategoryInfo,
    prior: Option<InstallManifest>,
}

enum Prepared {
    Ready(InstallContext),
    /// The install was finalized during preparation (no API key, but a valid
    /// prior installation).
    Finalized(InstallOutcome),
}

enum PackSource {
    Archive(PathBuf),
    /// A standalone manifest file: there is no archive to take overrides from.
    ManifestOnly,
}

impl CurseForgeInstaller {
    pub fn new(
        root: impl Into<PathBuf>,
        results_file: impl Into<PathBuf>,
        config: InstallerConfig,
    ) -> Self {
        Self {
            root: root.into(),
            results: ResultsFile::new(results_file),
            config,
            loaders: Arc::new(LoaderService::new()),
            api: None,
        }
    }

    /// Use a caller-provided API client instead of constructing one from the
    /// configuration.
    pub fn with_api(mut self, api: Arc<dyn CurseForgeApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Use a caller-provided loader installer.
    pub fn with_loader_installer(mut self, loaders: Arc<dyn LoaderInstaller>) -> Self {
        self.loaders = loaders;
        self
    }

    /// Install from a pack archive already on disk.
    pub async fn install_from_archive(
        &self,
        archive_path: &Path,
        slug: &str,
    ) -> AppResult<InstallOutcome> {
        match self.prepare(slug).await? {
            Prepared::Finalized(outcome) => Ok(outcome),
            Prepared::Ready(ctx) => self
                .run_from_archive(
                    &ctx,
                    archive_path.to_path_buf(),
                    None,
                    file_name_of(archive_path),
                )
                .await
                .map_err(rewrite_forbidden),
        }
    }

    /// Install from a standalone pack manifest; override application is a
    /// no-op on this path.
    pub async fn install_from_manifest_file(
        &self,
        manifest_path: &Path,
        slug: &str,
    ) -> AppResult<InstallOutcome> {
        match self.prepare(slug).await? {
            Prepared::Finalized(outcome) => Ok(outcome),
            Prepared::Ready(ctx) => self
                .run_from_manifest(&ctx, manifest_path)
                .await
                .map_err(rewrite_forbidden),
        }
    }

    /// Look the pack up by slug, download its archive and install it.
    pub async fn install_from_slug(
        &self,
        slug: &str,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> AppResult<InstallOutcome> {
        match self.prepare(slug).await? {
            Prepared::Finalized(outcome) => Ok(outcome),
            Prepared::Ready(ctx) => self
                .run_from_slug(&ctx, file_matcher, file_id)
                .await
                .map_err(rewrite_forbidden),
        }
    }

    async fn prepare(&self, slug: &str) -> AppResult<Prepared> {
        let prior = manifests::load(&self.root)?;

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty());
        let Some(api_key) = api_key else {
            if let Some(prior) = prior {
                log::warn!(
                    "No CurseForge API key configured; finalizing the existing installation only"
                );
                return Ok(Prepared::Finalized(self.finalize_existing(prior).await?));
            }
            return Err(AppError::Config(
                "a CurseForge API key is required; set CF_API_KEY".to_string(),
            ));
        };

        let api: Arc<dyn CurseForgeApi> = match &self.api {
            Some(api) => Arc::clone(api),
            None => Arc::new(CurseForgeClient::new(
                api_key,
                self.config.api_base_url.as_deref(),
                &self.config.http,
            )?),
        };

        let categories = api
            .load_category_info(&CONTENT_CLASS_SLUGS, PACK_CLASS_SLUG)
            .await
            .map_err(rewrite_forbidden)?;

        Ok(Prepared::Ready(InstallContext {
            slug: slug.to_string(),
            api,
            categories,
            prior,
        }))
    }

    async fn run_from_slug(
        &self,
        ctx: &InstallContext,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> AppResult<InstallOutcome> {
        let project = ctx.api.search_mod(&ctx.slug, &ctx.categories).await?;
        let pack_file = ctx
            .api
            .resolve_modpack_file(&project, file_matcher, file_id)
            .await?;

        // Decide before downloading anything.
        if let Some(outcome) = self.try_finalize(ctx, project.id, pack_file.id).await? {
            return Ok(outcome);
        }

        if pack_file.download_url.is_none() {
            return Err(AppError::Config(format!(
                "The authors of '{}' do not permit automated downloads of {}; \
                 download it manually and provide it via CF_MODPACK_ZIP",
                ctx.slug, pack_file.file_name
            )));
        }

        let temp = ctx
            .api
            .download_temp(&pack_file, "zip", &log_archive_status)
            .await?;

        let result = self
            .run_from_archive(
                ctx,
                temp.clone(),
                Some((project.id, pack_file.id)),
                pack_file.file_name.clone(),
            )
            .await;

        // The temp archive goes away whether the install worked or not.
        if let Err(e) = std::fs::remove_file(&temp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove temporary archive {}: {e}", temp.display());
            }
        }

        result
    }

    async fn run_from_archive(
        &self,
        ctx: &InstallContext,
        archive_path: PathBuf,
        ids: Option<(u32, u32)>,
        file_name: String,
    ) -> AppResult<InstallOutcome> {
        let pack = read_pack_from_archive(&archive_path)?;
        pack.validate()?;

        // Without registry-assigned ids (local archive), derive stable
        // pseudo ids and apply the same reuse decision. The slug path made
        // its decision before downloading the archive.
        let (mod_id, file_id) = match ids {
            Some(ids) => ids,
            None => {
                let ids = (pack.pseudo_mod_id(), pack.pseudo_file_id());
                if let Some(outcome) = self.try_finalize(ctx, ids.0, ids.1).await? {
                    return Ok(outcome);
                }
                ids
            }
        };

        self.full_install(
            ctx,
            pack,
            PackSource::Archive(archive_path),
            mod_id,
            file_id,
            file_name,
        )
        .await
    }

    async fn run_from_manifest(
        &self,
        ctx: &InstallContext,
        manifest_path: &Path,
    ) -> AppResult<InstallOutcome> {
        let pack = read_pack_manifest_file(manifest_path)?;
        pack.validate()?;

        let (mod_id, file_id) = (pack.pseudo_mod_id(), pack.pseudo_file_id());
        if let Some(outcome) = self.try_finalize(ctx, mod_id, file_id).await? {
            return Ok(outcome);
        }

        self.full_install(
            ctx,
            pack,
            PackSource::ManifestOnly,
            mod_id,
            file_id,
            file_name_of(manifest_path),
        )
        .await
    }

    /// The reuse decision: when the prior installation is the same pack file
    /// and everything it tracks is still on disk, only finalization runs.
    async fn try_finalize(
        &self,
        ctx: &InstallContext,
        mod_id: u32,
        file_id: u32,
    ) -> AppResult<Option<InstallOutcome>> {
        let Some(prior) = &ctx.prior else {
            return Ok(None);
        };
        if !matches_prior(prior, &ctx.slug, mod_id, file_id) {
            return Ok(None);
        }
        if self.config.force_synchronize {
            log::info!("Force synchronize requested; re-installing the full pack");
            return Ok(None);
        }
        if manifests::all_files_present(&self.root, prior) {
            return self.finalize_existing(prior.clone()).await.map(Some);
        }

        log::warn!("Files from the previous installation are missing; re-installing the pack");
        Ok(None)
    }

    /// Re-run the loader installer and emit results for an install that is
    /// already on disk.
    async fn finalize_existing(&self, prior: InstallManifest) -> AppResult<InstallOutcome> {
        log::info!(
            "Modpack {} version {} is already installed",
            prior.modpack_name,
            prior.modpack_version
        );

        self.results.reset()?;
        self.loaders
            .install(
                &prior.mod_loader_id,
                &prior.minecraft_version,
                &self.root,
                &self.results,
            )
            .await?;

        if let Some(level) = &prior.level_name {
            self.results.append("LEVEL", level)?;
        }
        self.results.append("VERSION", &prior.minecraft_version)?;

        Ok(InstallOutcome {
            reused: true,
            manifest: prior,
        })
    }

    async fn full_install(
        &self,
        ctx: &InstallContext,
        pack: CfManifest,
        source: PackSource,
        mod_id: u32,
        file_id: u32,
        file_name: String,
    ) -> AppResult<InstallOutcome> {
        log::info!(
            "Installing modpack '{}' version {} for Minecraft {}",
            pack.name,
            pack.version,
            pack.minecraft.version
        );

        let mod_loader_id = pack.primary_loader()?.id.clone();
        let minecraft_version = pack.minecraft.version.clone();

        let paths = OutputPaths::new(&self.root);
        paths.ensure_created()?;

        let filter = excludes::resolve(
            ctx.api.as_ref(),
            &ctx.categories,
            self.config.exclude_includes.as_ref(),
            &ctx.slug,
        )
        .await?;

        let downloader = ModDownloader::new(
            Arc::clone(&ctx.api),
            ctx.categories.clone(),
            filter,
            paths.clone(),
            self.config.level_from,
        );
        let downloaded = downloader.download_all(&pack.files).await?;

        // Downloads are fully collected before any override is written.
        let overrides_result = match &source {
            PackSource::Archive(archive_path) => overrides::apply_overrides(
                archive_path,
                &pack.overrides,
                &self.root,
                self.config.level_from,
                self.config.overrides_skip_existing,
            )?,
            PackSource::ManifestOnly => OverridesResult::default(),
        };

        let level_name = overrides_result
            .level_name
            .clone()
            .or_else(|| downloaded.iter().find_map(|p| p.level_name.clone()));

        self.results.reset()?;
        self.loaders
            .install(&mod_loader_id, &minecraft_version, &self.root, &self.results)
            .await?;

        let mut written: Vec<PathBuf> = downloaded.into_iter().map(|p| p.path).collect();
        written.extend(overrides_result.paths);

        let new_manifest = InstallManifest {
            slug: ctx.slug.clone(),
            modpack_name: pack.name.clone(),
            modpack_version: pack.version.clone(),
            file_name,
            mod_id,
            file_id,
            minecraft_version: minecraft_version.clone(),
            mod_loader_id,
            level_name: level_name.clone(),
            files: manifests::relativize_all(&self.root, &written),
        };

        if let Some(prior) = &ctx.prior {
            manifests::cleanup(&self.root, prior, &new_manifest);
        }
        manifests::save(&self.root, &new_manifest)?;

        if let Some(level) = &level_name {
            self.results.append("LEVEL", level)?;
        }
        self.results.append("VERSION", &minecraft_version)?;

        log::info!(
            "Installed modpack '{}' version {}",
            new_manifest.modpack_name,
            new_manifest.modpack_version
        );

        Ok(InstallOutcome {
            reused: false,
            manifest: new_manifest,
        })
    }
}

// --- Helpers ---

/// Whether the prior installation refers to the same pack file. Pseudo ids
/// and registry ids are compared the same way; the slug match covers a prior
/// install recorded under a different id source.
fn matches_prior(prior: &InstallManifest, slug: &str, mod_id: u32, file_id: u32) -> bool {
    (prior.mod_id == mod_id || prior.slug == slug) && prior.file_id == file_id
}

/// A 403 means the API key is missing, expired or wrong; surface that as a
/// configuration problem instead of a transport failure.
fn rewrite_forbidden(e: AppError) -> AppError {
    if e.is_forbidden() {
        AppError::Config(
            "CurseForge rejected the request (HTTP 403); \
             check that CF_API_KEY is set to a valid API key"
                .to_string(),
        )
    } else {
        e
    }
}

fn read_pack_from_archive(archive_path: &Path) -> AppResult<CfManifest> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AppError::InvalidPack(format!("failed to open pack archive: {e}")))?;

    let mut entry = match archive.by_name("manifest.json") {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(AppError::InvalidPack(
                "the pack archive does not contain manifest.json".to_string(),
            ))
        }
        Err(e) => {
            return Err(AppError::InvalidPack(format!(
                "failed to read pack archive: {e}"
            )))
        }
    };

    let mut data = String::new();
    entry.read_to_string(&mut data)?;
    Ok(serde_json::from_str(&data)?)
}

fn read_pack_manifest_file(path: &Path) -> AppResult<CfManifest> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn log_archive_status(status: DownloadStatus, path: &Path) {
    match status {
        DownloadStatus::AlreadyPresent => {
            log::info!("Modpack archive {} is already present", path.display())
        }
        DownloadStatus::Downloaded => {
            log::info!("Downloaded modpack archive {}", path.display())
        }
    }
}
