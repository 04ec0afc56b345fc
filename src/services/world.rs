use std::path::Path;

use crate::errors::{AppError, AppResult};
use crate::models::config::LevelFrom;
use crate::models::install::{OutputPaths, PathWithInfo};
use crate::services::manifests;
use crate::services::overrides::safe_relative_path;

/// Handle a downloaded world archive.
///
/// Only the `WorldFile` level policy extracts anything; the archive itself is
/// what gets tracked either way. An already-populated `saves/<slug>` directory
/// is left alone so an operator's world survives re-installs.
pub fn process_world_file(
    zip_path: std::path::PathBuf,
    world_slug: &str,
    paths: &OutputPaths,
    level_from: Option<LevelFrom>,
) -> AppResult<PathWithInfo> {
    if level_from != Some(LevelFrom::WorldFile) {
        return Ok(PathWithInfo::plain(zip_path));
    }

    let target = paths.saves.join(world_slug);
    let level_name = manifests::relativize_all(&paths.root, std::slice::from_ref(&target))
        .into_iter()
        .next()
        .unwrap_or_else(|| format!("saves/{world_slug}"));

    if target.exists() {
        log::info!("World {} already extracted", target.display());
        return Ok(PathWithInfo {
            path: zip_path,
            level_name: Some(level_name),
        });
    }

    std::fs::create_dir_all(&target)?;
    extract_world_zip(&zip_path, &target)?;

    Ok(PathWithInfo {
        path: zip_path,
        level_name: Some(level_name),
    })
}

/// Extract a world archive, flattening its single top-level directory into
/// `target`.
fn extract_world_zip(zip_path: &Path, target: &Path) -> AppResult<()> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AppError::InvalidPack(format!("failed to open world archive: {e}")))?;

    if archive.is_empty() {
        return Err(AppError::InvalidPack(
            "world archive is empty".to_string(),
        ));
    }

    let prefix_len = {
        let first = archive
            .by_index(0)
            .map_err(|e| AppError::InvalidPack(format!("failed to read world archive: {e}")))?;
        if !first.is_dir() {
            return Err(AppError::InvalidPack(format!(
                "world archive must start with a directory, found '{}'",
                first.name()
            )));
        }
        first.name().len()
    };

    for i in 1..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AppError::InvalidPack(format!("failed to read world archive: {e}")))?;

        let name = entry.name().to_string();
        let Some(rel) = name.get(prefix_len..) else {
            continue;
        };
        if rel.is_empty() {
            continue;
        }
        let Some(safe) = safe_relative_path(rel) else {
            log::warn!("Skipping world entry with unsafe path: {name}");
            continue;
        };

        let out_path = target.join(safe);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::PathBuf;

    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        let root =
            std::env::temp_dir().join(format!("cursepack_test_{label}_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("temp root should be creatable");
        root
    }

    fn write_world_zip(path: &Path, top_dir: Option<&str>) {
        let file = std::fs::File::create(path).expect("zip file should be creatable");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        if let Some(dir) = top_dir {
            zip.add_directory(dir, options).expect("zip add_directory");
            zip.start_file(format!("{dir}/level.dat"), options)
                .expect("zip start_file");
            zip.write_all(b"level data").expect("zip write");
            zip.add_directory(format!("{dir}/region"), options)
                .expect("zip add_directory");
            zip.start_file(format!("{dir}/region/r.0.0.mca"), options)
                .expect("zip start_file");
            zip.write_all(b"region data").expect("zip write");
        } else {
            zip.start_file("level.dat", options).expect("zip start_file");
            zip.write_all(b"level data").expect("zip write");
        }
        zip.finish().expect("zip finish");
    }

    fn output_paths(root: &Path) -> OutputPaths {
        let paths = OutputPaths::new(root);
        paths.ensure_created().expect("output dirs");
        paths
    }

    #[test]
    fn extracts_and_flattens_the_top_level_directory() -> AppResult<()> {
        let root = temp_root("world_extract");
        let paths = output_paths(&root);
        let zip_path = paths.saves.join("mypack.zip");
        write_world_zip(&zip_path, Some("mypack_world"));

        let info = process_world_file(
            zip_path.clone(),
            "mypack",
            &paths,
            Some(LevelFrom::WorldFile),
        )?;

        assert_eq!(info.path, zip_path);
        assert_eq!(info.level_name.as_deref(), Some("saves/mypack"));
        assert_eq!(
            std::fs::read_to_string(paths.saves.join("mypack/level.dat"))?,
            "level data"
        );
        assert!(paths.saves.join("mypack/region/r.0.0.mca").exists());
        assert!(
            !paths.saves.join("mypack/mypack_world").exists(),
            "the archive's top directory should be flattened away"
        );

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn existing_world_directory_is_not_touched() -> AppResult<()> {
        let root = temp_root("world_exists");
        let paths = output_paths(&root);
        std::fs::create_dir_all(paths.saves.join("mypack"))?;
        std::fs::write(paths.saves.join("mypack/level.dat"), b"operator data")?;

        let zip_path = paths.saves.join("mypack.zip");
        write_world_zip(&zip_path, Some("mypack_world"));

        let info = process_world_file(
            zip_path.clone(),
            "mypack",
            &paths,
            Some(LevelFrom::WorldFile),
        )?;

        assert_eq!(info.level_name.as_deref(), Some("saves/mypack"));
        assert_eq!(
            std::fs::read_to_string(paths.saves.join("mypack/level.dat"))?,
            "operator data"
        );

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn non_world_file_policy_skips_extraction() -> AppResult<()> {
        let root = temp_root("world_policy");
        let paths = output_paths(&root);
        let zip_path = paths.saves.join("mypack.zip");
        write_world_zip(&zip_path, Some("mypack_world"));

        let info = process_world_file(zip_path.clone(), "mypack", &paths, None)?;
        assert_eq!(info.path, zip_path);
        assert!(info.level_name.is_none());
        assert!(!paths.saves.join("mypack").exists());

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn archive_without_a_leading_directory_is_rejected() -> AppResult<()> {
        let root = temp_root("world_bad");
        let paths = output_paths(&root);
        let zip_path = paths.saves.join("mypack.zip");
        write_world_zip(&zip_path, None);

        let result = process_world_file(zip_path, "mypack", &paths, Some(LevelFrom::WorldFile));
        assert!(matches!(result, Err(AppError::InvalidPack(_))));

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }
}
