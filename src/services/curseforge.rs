use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;

use crate::errors::{AppError, AppResult};
use crate::models::config::HttpOptions;

pub const DEFAULT_BASE_URL: &str = "https://api.curseforge.com";
const MINECRAFT_GAME_ID: u32 = 432;
const MAX_RETRIES: usize = 3;

// --- CurseForge API response types ---

#[derive(Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfMod {
    pub id: u32,
    pub name: String,
    pub slug: String,
    #[serde(rename = "classId")]
    pub class_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfFile {
    pub id: u32,
    #[serde(rename = "modId")]
    pub mod_id: u32,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileLength", default)]
    pub file_length: u64,
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(rename = "gameVersions", default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub hashes: Vec<CfFileHash>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfFileHash {
    pub value: String,
    pub algo: u32, // 1 = sha1, 2 = md5
}

impl CfFile {
    pub fn sha1(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|h| h.algo == 1)
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfCategory {
    pub id: u32,
    pub slug: String,
    #[serde(rename = "classId")]
    pub class_id: Option<u32>,
    #[serde(rename = "isClass", default)]
    pub is_class: bool,
}

/// The registry taxonomy relevant to one install: the class id used to search
/// for modpacks, and the content classes whose projects we know where to put.
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    pub modpack_class_id: u32,
    pub content_class_ids: HashMap<u32, CfCategory>,
}

/// Reported by `download`/`download_temp` so callers can log what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    AlreadyPresent,
}

pub type StatusFn = dyn Fn(DownloadStatus, &Path) + Send + Sync;

// --- API trait ---

/// The CurseForge operations the install engine consumes. Implemented by the
/// HTTP client below and by mocks in tests.
#[async_trait]
pub trait CurseForgeApi: Send + Sync {
    /// Find the modpack project for a slug.
    async fn search_mod(&self, slug: &str, categories: &CategoryInfo) -> AppResult<CfMod>;

    /// Load the category taxonomy for the given content class slugs plus the
    /// class used to search packs.
    async fn load_category_info(
        &self,
        class_slugs: &[&str],
        pack_class_slug: &str,
    ) -> AppResult<CategoryInfo>;

    /// Pick the pack file to install: an explicit file id, a file-name
    /// matcher, or the project's newest file.
    async fn resolve_modpack_file(
        &self,
        project: &CfMod,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> AppResult<CfFile>;

    async fn get_mod_info(&self, project_id: u32) -> AppResult<CfMod>;

    /// `None` when the registry has no such file.
    async fn get_mod_file_info(&self, mod_id: u32, file_id: u32) -> AppResult<Option<CfFile>>;

    /// Resolve a project slug to its numeric id.
    async fn slug_to_id(&self, categories: &CategoryInfo, slug: &str) -> AppResult<u32>;

    /// Download `file` into `base_dir`, skipping work when a byte-identical
    /// copy is already there. Returns the path written (or found).
    async fn download(
        &self,
        file: &CfFile,
        base_dir: &Path,
        status: &StatusFn,
    ) -> AppResult<PathBuf>;

    /// Download `file` to a fresh temporary path with the given extension.
    async fn download_temp(
        &self,
        file: &CfFile,
        ext: &str,
        status: &StatusFn,
    ) -> AppResult<PathBuf>;
}

// --- HTTP client ---

pub struct CurseForgeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CurseForgeClient {
    pub fn new(api_key: &str, base_url: Option<&str>, http: &HttpOptions) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cursepack/", env!("CARGO_PKG_VERSION")))
            .timeout(http.response_timeout)
            .connect_timeout(http.tls_handshake_timeout)
            .pool_idle_timeout(http.connection_pool_max_idle_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Registry {
                status: status.as_u16(),
                message: path.to_string(),
            });
        }

        Ok(response.json::<ApiResponse<T>>().await?.data)
    }

    /// Stream a download URL to `dest`, verifying the SHA1 when one is known.
    async fn fetch_to(&self, url: &str, dest: &Path, expected_sha1: Option<&str>) -> AppResult<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Registry {
                status: status.as_u16(),
                message: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut hasher = Sha1::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if let Some(expected) = expected_sha1 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(AppError::Custom(format!(
                    "SHA1 mismatch for {}: expected {expected}, got {actual}",
                    dest.display()
                )));
            }
        }

        Ok(())
    }

    /// Download with retry: transient transport failures back off and try
    /// again, up to `MAX_RETRIES` attempts.
    async fn fetch_with_retry(&self, file: &CfFile, dest: &Path) -> AppResult<()> {
        let url = file.download_url.as_deref().ok_or_else(|| {
            AppError::Custom(format!("file {} has no download url", file.file_name))
        })?;

        for attempt in 1..=MAX_RETRIES {
            match self.fetch_to(url, dest, file.sha1()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("Download attempt {attempt}/{MAX_RETRIES} failed for {url}: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Custom(format!(
            "Download failed after {MAX_RETRIES} attempts: {url}"
        )))
    }
}

#[async_trait]
impl CurseForgeApi for CurseForgeClient {
    async fn search_mod(&self, slug: &str, categories: &CategoryInfo) -> AppResult<CfMod> {
        let hits: Vec<CfMod> = self
            .get_json(
                "/v1/mods/search",
                &[
                    ("gameId", MINECRAFT_GAME_ID.to_string()),
                    ("classId", categories.modpack_class_id.to_string()),
                    ("slug", slug.to_string()),
                ],
            )
            .await?;

        hits.into_iter()
            .find(|m| m.slug == slug)
            .ok_or_else(|| AppError::Custom(format!("no modpack found for slug '{slug}'")))
    }

    async fn load_category_info(
        &self,
        class_slugs: &[&str],
        pack_class_slug: &str,
    ) -> AppResult<CategoryInfo> {
        let all: Vec<CfCategory> = self
            .get_json(
                "/v1/categories",
                &[
                    ("gameId", MINECRAFT_GAME_ID.to_string()),
                    ("classesOnly", "true".to_string()),
                ],
            )
            .await?;

        let modpack_class_id = all
            .iter()
            .find(|c| c.slug == pack_class_slug)
            .map(|c| c.id)
            .ok_or_else(|| {
                AppError::Custom(format!("registry has no '{pack_class_slug}' class"))
            })?;

        let content_class_ids = all
            .into_iter()
            .filter(|c| class_slugs.contains(&c.slug.as_str()))
            .map(|c| (c.id, c))
            .collect();

        Ok(CategoryInfo {
            modpack_class_id,
            content_class_ids,
        })
    }

    async fn resolve_modpack_file(
        &self,
        project: &CfMod,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> AppResult<CfFile> {
        if let Some(file_id) = file_id {
            return self
                .get_mod_file_info(project.id, file_id)
                .await?
                .ok_or_else(|| {
                    AppError::Custom(format!(
                        "unable to resolve file {file_id} of modpack '{}'",
                        project.slug
                    ))
                });
        }

        // The files endpoint lists newest first.
        let files: Vec<CfFile> = self
            .get_json(&format!("/v1/mods/{}/files", project.id), &[])
            .await?;

        let chosen = match file_matcher {
            Some(matcher) => files.into_iter().find(|f| f.file_name.contains(matcher)),
            None => files.into_iter().next(),
        };

        chosen.ok_or_else(|| {
            AppError::Custom(format!(
                "unable to resolve a pack file for modpack '{}'",
                project.slug
            ))
        })
    }

    async fn get_mod_info(&self, project_id: u32) -> AppResult<CfMod> {
        self.get_json(&format!("/v1/mods/{project_id}"), &[]).await
    }

    async fn get_mod_file_info(&self, mod_id: u32, file_id: u32) -> AppResult<Option<CfFile>> {
        match self
            .get_json(&format!("/v1/mods/{mod_id}/files/{file_id}"), &[])
            .await
        {
            Ok(file) => Ok(Some(file)),
            Err(AppError::Registry { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn slug_to_id(&self, categories: &CategoryInfo, slug: &str) -> AppResult<u32> {
        let hits: Vec<CfMod> = self
            .get_json(
                "/v1/mods/search",
                &[
                    ("gameId", MINECRAFT_GAME_ID.to_string()),
                    ("slug", slug.to_string()),
                ],
            )
            .await?;

        // Prefer a hit in one of the content classes we install from.
        let exact: Vec<CfMod> = hits.into_iter().filter(|m| m.slug == slug).collect();
        exact
            .iter()
            .find(|m| {
                m.class_id
                    .is_some_and(|c| categories.content_class_ids.contains_key(&c))
            })
            .or_else(|| exact.first())
            .map(|m| m.id)
            .ok_or_else(|| AppError::Custom(format!("no project found for slug '{slug}'")))
    }

    async fn download(
        &self,
        file: &CfFile,
        base_dir: &Path,
        status: &StatusFn,
    ) -> AppResult<PathBuf> {
        let dest = base_dir.join(&file.file_name);

        if already_present(&dest, file).await {
            status(DownloadStatus::AlreadyPresent, &dest);
            return Ok(dest);
        }

        self.fetch_with_retry(file, &dest).await?;
        status(DownloadStatus::Downloaded, &dest);
        Ok(dest)
    }

    async fn download_temp(
        &self,
        file: &CfFile,
        ext: &str,
        status: &StatusFn,
    ) -> AppResult<PathBuf> {
        let dest =
            std::env::temp_dir().join(format!("cursepack_{}.{ext}", uuid::Uuid::new_v4()));
        self.fetch_with_retry(file, &dest).await?;
        status(DownloadStatus::Downloaded, &dest);
        Ok(dest)
    }
}

// --- Helpers ---

/// A file on disk counts as already downloaded when its size matches and,
/// if the registry published a SHA1, the hash matches too.
async fn already_present(dest: &Path, file: &CfFile) -> bool {
    let meta = match tokio::fs::metadata(dest).await {
        Ok(m) => m,
        Err(_) => return false,
    };

    if file.file_length > 0 && meta.len() != file.file_length {
        return false;
    }

    if let Some(expected) = file.sha1() {
        let bytes = match tokio::fs::read(dest).await {
            Ok(b) => b,
            Err(_) => return false,
        };
        let actual = format!("{:x}", Sha1::digest(&bytes));
        if !actual.eq_ignore_ascii_case(expected) {
            log::warn!("Checksum mismatch for existing {}, re-downloading", dest.display());
            return false;
        }
    }

    true
}
