use std::collections::HashSet;

use crate::errors::AppResult;
use crate::models::config::ExcludeIncludesContent;
use crate::services::curseforge::{CategoryInfo, CurseForgeApi};

/// Project ids to drop outright and project ids that bypass the client/server
/// filter, resolved once per install.
#[derive(Debug, Clone, Default)]
pub struct ExcludeIncludeIds {
    pub excludes: HashSet<u32>,
    pub force_includes: HashSet<u32>,
}

/// Resolve the configured exclude/force-include policy into numeric project
/// ids. Global entries and the entries specific to `slug` are unioned;
/// non-numeric entries are looked up as project slugs.
pub async fn resolve(
    api: &dyn CurseForgeApi,
    categories: &CategoryInfo,
    content: Option<&ExcludeIncludesContent>,
    slug: &str,
) -> AppResult<ExcludeIncludeIds> {
    let Some(content) = content else {
        return Ok(ExcludeIncludeIds::default());
    };

    Ok(ExcludeIncludeIds {
        excludes: resolve_entries(api, categories, &content.excludes_for(slug)).await?,
        force_includes: resolve_entries(api, categories, &content.force_includes_for(slug))
            .await?,
    })
}

async fn resolve_entries(
    api: &dyn CurseForgeApi,
    categories: &CategoryInfo,
    entries: &[&str],
) -> AppResult<HashSet<u32>> {
    let mut ids = HashSet::with_capacity(entries.len());
    for entry in entries {
        let id = match entry.parse::<u32>() {
            Ok(id) => id,
            Err(_) => api.slug_to_id(categories, entry).await?,
        };
        ids.insert(id);
    }
    Ok(ids)
}
