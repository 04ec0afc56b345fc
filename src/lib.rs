//! Installs CurseForge modpacks into Minecraft server directories.
//!
//! Given a pack slug, a downloaded pack archive or a standalone pack
//! manifest, the installer resolves the pack's referenced project files,
//! downloads them into the right subtree (`mods/`, `plugins/`, `saves/`),
//! applies the pack's overrides, installs the declared mod loader and records
//! a manifest of everything written so later runs can reconcile or skip work.

pub mod errors;
pub mod models;
pub mod services;

pub use errors::{AppError, AppResult};
pub use models::config::{
    ExcludeIncludes, ExcludeIncludesContent, HttpOptions, InstallerConfig, LevelFrom,
};
pub use models::install::InstallOutcome;
pub use models::manifest::InstallManifest;
pub use models::pack::CfManifest;
pub use services::installer::CurseForgeInstaller;
