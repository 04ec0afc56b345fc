use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};
use crate::models::config::LevelFrom;

/// What the overrides pass wrote and, when the level policy points at the
/// overrides, the embedded world directory it found.
#[derive(Debug, Clone, Default)]
pub struct OverridesResult {
    pub paths: Vec<PathBuf>,
    pub level_name: Option<String>,
}

/// Copy the archive's `overrides/` subtree onto the output root.
///
/// An embedded world directory (recognized by a `level.dat` inside it) gets
/// special handling: it is never tracked, and when the directory already
/// exists on disk it is not written at all, so operator world data survives
/// re-installs.
pub fn apply_overrides(
    archive_path: &Path,
    overrides_dir: &str,
    root: &Path,
    level_from: Option<LevelFrom>,
    skip_existing: bool,
) -> AppResult<OverridesResult> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AppError::InvalidPack(format!("failed to open pack archive: {e}")))?;

    let prefix = format!("{overrides_dir}/");

    // First pass: locate an embedded world directory before writing anything.
    let mut level_entry: Option<String> = None;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| AppError::InvalidPack(format!("failed to read pack archive: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let Some(sub) = entry.name().strip_prefix(prefix.as_str()) else {
            continue;
        };
        if let Some(dir) = sub.strip_suffix("/level.dat") {
            if !dir.is_empty() {
                level_entry = Some(dir.to_string());
                break;
            }
        }
    }

    let world_dir_exists = match &level_entry {
        Some(dir) => safe_relative_path(dir)
            .map(|p| root.join(p).exists())
            .unwrap_or(false),
        None => false,
    };
    if world_dir_exists {
        log::info!(
            "World directory '{}' already exists, leaving its data untouched",
            level_entry.as_deref().unwrap_or_default()
        );
    }

    let mut paths = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AppError::InvalidPack(format!("failed to read pack archive: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let Some(sub) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if sub.is_empty() {
            continue;
        }
        let Some(safe) = safe_relative_path(sub) else {
            log::warn!("Skipping override entry with unsafe path: {name}");
            continue;
        };

        let in_world = level_entry
            .as_deref()
            .is_some_and(|dir| sub.starts_with(&format!("{dir}/")));
        if world_dir_exists && in_world {
            continue;
        }

        let out_path = root.join(safe);
        if skip_existing && out_path.exists() {
            log::info!("Keeping existing file {}", out_path.display());
        } else {
            // Archive entries are not guaranteed to list directories first.
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }

        if !in_world {
            paths.push(out_path);
        }
    }

    let level_name = match level_from {
        Some(LevelFrom::Overrides) => level_entry,
        _ => None,
    };

    Ok(OverridesResult { paths, level_name })
}

/// Rebuild an archive-relative path component by component, rejecting
/// anything (absolute paths, `..`) that could escape the output root.
///
/// Returns `None` for malicious or empty paths.
pub(crate) fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let candidate = Path::new(raw);

    if candidate.has_root() {
        return None;
    }

    let mut sanitised = PathBuf::new();
    for component in candidate.components() {
        match component {
            std::path::Component::Normal(seg) => sanitised.push(seg),
            std::path::Component::CurDir => {}
            _ => return None,
        }
    }

    if sanitised.as_os_str().is_empty() {
        return None;
    }

    Some(sanitised)
}
