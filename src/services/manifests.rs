use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::AppResult;
use crate::models::manifest::InstallManifest;

/// File name of the persisted install manifest inside the output root.
pub const MANIFEST_NAME: &str = "curseforge.json";

/// Load the prior install manifest, if any.
///
/// A file that exists but cannot be parsed is treated as absent (with a
/// warning): the worst outcome is a full re-install, which reconciles the
/// directory anyway. Tracked world entries from older versions are stripped
/// on load.
pub fn load(root: &Path) -> AppResult<Option<InstallManifest>> {
    let path = root.join(MANIFEST_NAME);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<InstallManifest>(&data) {
        Ok(mut manifest) => {
            manifest.strip_world_entries();
            Ok(Some(manifest))
        }
        Err(e) => {
            log::warn!("Ignoring unreadable install manifest {}: {e}", path.display());
            Ok(None)
        }
    }
}

/// True iff every file the manifest tracks is still on disk.
pub fn all_files_present(root: &Path, manifest: &InstallManifest) -> bool {
    manifest.files.iter().all(|f| root.join(f).exists())
}

/// Normalize absolute paths to output-root-relative, forward-slash form.
pub fn relativize_all(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let rel = p.strip_prefix(root).unwrap_or(p);
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

/// Delete files tracked by the prior install but not the new one, pruning
/// directories the deletions empty out. Failures to remove a stale file are
/// logged, not fatal: the file will be picked up again on the next install.
pub fn cleanup(root: &Path, prior: &InstallManifest, new: &InstallManifest) {
    let keep: HashSet<&str> = new.files.iter().map(String::as_str).collect();

    for old in &prior.files {
        if keep.contains(old.as_str()) {
            continue;
        }

        let path = root.join(old);
        match std::fs::remove_file(&path) {
            Ok(()) => log::info!("Removed no longer referenced file {old}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                log::warn!("Failed to remove {old}: {e}");
                continue;
            }
        }

        // Walk up removing emptied directories, stopping at the first
        // non-empty one (remove_dir refuses those) or the root.
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == root || std::fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

/// Persist the manifest via a sibling temp file and rename, so a crash never
/// leaves a half-written manifest behind.
pub fn save(root: &Path, manifest: &InstallManifest) -> AppResult<()> {
    let path = root.join(MANIFEST_NAME);
    let tmp = root.join(format!("{MANIFEST_NAME}.tmp"));
    let data = serde_json::to_vec_pretty(manifest)?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}
