use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::models::config::LevelFrom;
use crate::models::install::{OutputPaths, PathWithInfo};
use crate::models::pack::CfFileRef;
use crate::services::curseforge::{CategoryInfo, CurseForgeApi, DownloadStatus};
use crate::services::excludes::ExcludeIncludeIds;
use crate::services::world;

const MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Downloads the project files a pack references, classifying each one into
/// the right output subtree. References are processed concurrently under a
/// semaphore; the caller gets the completed result set only once every
/// reference has finished.
#[derive(Clone)]
pub struct ModDownloader {
    api: Arc<dyn CurseForgeApi>,
    categories: Arc<CategoryInfo>,
    filter: Arc<ExcludeIncludeIds>,
    paths: OutputPaths,
    level_from: Option<LevelFrom>,
}

impl ModDownloader {
    pub fn new(
        api: Arc<dyn CurseForgeApi>,
        categories: CategoryInfo,
        filter: ExcludeIncludeIds,
        paths: OutputPaths,
        level_from: Option<LevelFrom>,
    ) -> Self {
        Self {
            api,
            categories: Arc::new(categories),
            filter: Arc::new(filter),
            paths,
            level_from,
        }
    }

    /// Run the per-reference pipeline over the whole file list and collect
    /// everything that was written. Any fatal per-reference error aborts the
    /// install.
    pub async fn download_all(&self, refs: &[CfFileRef]) -> AppResult<Vec<PathWithInfo>> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
        let mut handles = Vec::with_capacity(refs.len());

        for file_ref in refs.iter().copied() {
            let sem = Arc::clone(&semaphore);
            let downloader = self.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Custom(format!("semaphore closed: {e}")))?;
                downloader.process_reference(file_ref).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| AppError::Custom(format!("download task panicked: {e}")))??;
            if let Some(written) = outcome {
                results.push(written);
            }
        }

        Ok(results)
    }

    /// Classify and fetch one referenced project file. `Ok(None)` means the
    /// reference was filtered out (not required, excluded, client-only, no
    /// usable category, or not downloadable).
    async fn process_reference(&self, file_ref: CfFileRef) -> AppResult<Option<PathWithInfo>> {
        if !file_ref.required {
            log::debug!("Skipping optional project {}", file_ref.project_id);
            return Ok(None);
        }
        if self.filter.excludes.contains(&file_ref.project_id) {
            log::info!("Excluding project {}", file_ref.project_id);
            return Ok(None);
        }

        let project = self.api.get_mod_info(file_ref.project_id).await?;

        let Some(category) = project
            .class_id
            .and_then(|c| self.categories.content_class_ids.get(&c))
        else {
            log::info!(
                "Skipping project '{}': not a category applicable to servers",
                project.slug
            );
            return Ok(None);
        };

        let (base_dir, is_world) = destination_for(&self.paths, &category.slug)?;

        let Some(file) = self
            .api
            .get_mod_file_info(file_ref.project_id, file_ref.file_id)
            .await?
        else {
            return Err(AppError::Custom(format!(
                "unable to resolve file {} of project '{}'",
                file_ref.file_id, project.slug
            )));
        };

        let forced = self.filter.force_includes.contains(&file_ref.project_id);
        if !forced && !is_server_file(&file.game_versions) {
            log::info!("Skipping client-only file {}", file.file_name);
            return Ok(None);
        }

        if file.download_url.is_none() {
            log::warn!(
                "The authors of '{}' do not allow automated downloads. \
                 Download {} manually and place it in {}",
                project.slug,
                file.file_name,
                base_dir.display()
            );
            return Ok(None);
        }

        let path = self
            .api
            .download(&file, &base_dir, &|status, path| match status {
                DownloadStatus::AlreadyPresent => {
                    log::info!("File {} is already up to date", path.display())
                }
                DownloadStatus::Downloaded => log::info!("Downloaded {}", path.display()),
            })
            .await?;

        if is_world {
            return world::process_world_file(path, &project.slug, &self.paths, self.level_from)
                .map(Some);
        }

        Ok(Some(PathWithInfo::plain(path)))
    }
}

/// Map a content category slug to its output directory; the `worlds` category
/// additionally marks the file as a world archive.
fn destination_for(paths: &OutputPaths, category_slug: &str) -> AppResult<(PathBuf, bool)> {
    if category_slug.ends_with("-mods") {
        Ok((paths.mods.clone(), false))
    } else if category_slug.ends_with("-plugins") {
        Ok((paths.plugins.clone(), false))
    } else if category_slug == "worlds" {
        Ok((paths.saves.clone(), true))
    } else {
        Err(AppError::Custom(format!(
            "category '{category_slug}' does not map to a server directory"
        )))
    }
}

/// Whether a file is usable on a server, going by its `gameVersions` markers:
/// an explicit `Server` wins, an explicit `Client` (without `Server`) loses,
/// and files with neither marker are treated as libraries and accepted.
pub fn is_server_file(game_versions: &[String]) -> bool {
    if game_versions
        .iter()
        .any(|v| v.eq_ignore_ascii_case("server"))
    {
        return true;
    }
    !game_versions
        .iter()
        .any(|v| v.eq_ignore_ascii_case("client"))
}
