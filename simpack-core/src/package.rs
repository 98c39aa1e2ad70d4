//! High-level pipeline: orchestrates layout → copy → resolve → install → archive.
//!
//! This module provides the top-level orchestration for one packaging run as
//! described by a [`PackageConfig`]. It:
//!   - Checks that every source tree exists and that the build directory,
//!     trees and archive do not overlap (before anything is deleted)
//!   - Recreates the build directory and copies each tree into its own subdirectory
//!   - Resolves the pinned dependency set via a [`DependencyResolver`] and
//!     writes it as the manifest at the build root
//!   - Installs the manifest into the build root via a [`PackageInstaller`]
//!     and optionally verifies the result
//!   - Replaces the output archive with a fresh zip of the build directory
//!
//! # Error Handling
//! Fail-fast: the first failing step returns its [`PackageError`] and nothing
//! after it runs. Because the build directory is always recreated from
//! scratch, simply re-running recovers from a partial failure. The archive at
//! the output path is only touched once the build directory is complete.
//!
//! # Navigation
//! - Main entrypoint: [`package`]
//! - Supporting: [`preflight`], [`clean`], [`PackageReport`]

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::archive::write_archive;
use crate::config::PackageConfig;
use crate::contract::{DependencyResolver, PackageInstaller};
use crate::error::PackageError;
use crate::install::missing_installs;
use crate::layout::{copy_tree, prepare_build_dir, remove_path, resolve_path};
use crate::manifest::Requirement;

/// Files copied for one tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeReport {
    pub name: String,
    pub target: PathBuf,
    pub files: usize,
}

/// Outcome of a successful packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub build_dir: PathBuf,
    pub archive_path: PathBuf,
    pub archive_bytes: u64,
    pub archive_sha256: String,
    pub archive_entries: usize,
    pub trees: Vec<TreeReport>,
    pub requirements: Vec<Requirement>,
}

fn overlap(message: String) -> PackageError {
    error!(reason = %message, "[PACKAGE][ERROR] Rejected overlapping paths");
    PackageError::Overlap(message)
}

fn resolved(path: &Path) -> Result<PathBuf, PackageError> {
    resolve_path(path).map_err(|e| PackageError::io(format!("failed to resolve {}", path.display()), e))
}

/// A target must name a subdirectory strictly below the build directory.
fn is_plain_relative(target: &Path) -> bool {
    let mut named = false;
    for component in target.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

/// Validate the inputs of a run without modifying the filesystem.
///
/// Paths are compared after resolving symlinks and `..`, so aliases of the
/// project root or of a tree are caught.
pub fn preflight(config: &PackageConfig) -> Result<(), PackageError> {
    for tree in &config.trees {
        if !tree.source.is_dir() {
            error!(tree = %tree.name, path = %tree.source.display(), "[PACKAGE][ERROR] Source tree missing");
            return Err(PackageError::MissingTree {
                name: tree.name.clone(),
                path: tree.source.clone(),
            });
        }
        if !is_plain_relative(&tree.target) {
            return Err(overlap(format!(
                "target {} of tree `{}` must be a relative subdirectory of the build directory",
                tree.target.display(),
                tree.name
            )));
        }
    }

    let build_dir = resolved(&config.build_dir)?;
    let archive = resolved(&config.archive_path)?;
    let project_root = resolved(&config.project_root)?;

    if project_root.starts_with(&build_dir) {
        return Err(overlap(format!(
            "build directory {} contains the project root {}",
            config.build_dir.display(),
            config.project_root.display()
        )));
    }
    if archive.starts_with(&build_dir) {
        return Err(overlap(format!(
            "archive {} is inside build directory {}",
            config.archive_path.display(),
            config.build_dir.display()
        )));
    }

    for tree in &config.trees {
        let source = resolved(&tree.source)?;
        if build_dir.starts_with(&source) {
            return Err(overlap(format!(
                "build directory {} is inside source tree `{}`",
                config.build_dir.display(),
                tree.name
            )));
        }
        if source.starts_with(&build_dir) {
            return Err(overlap(format!(
                "source tree `{}` is inside build directory {}",
                tree.name,
                config.build_dir.display()
            )));
        }
        if archive.starts_with(&source) {
            return Err(overlap(format!(
                "archive {} is inside source tree `{}`",
                config.archive_path.display(),
                tree.name
            )));
        }
    }
    Ok(())
}

/// Run the full packaging pipeline.
pub async fn package<R, I>(
    config: &PackageConfig,
    resolver: &R,
    installer: &I,
) -> Result<PackageReport, PackageError>
where
    R: DependencyResolver + ?Sized,
    I: PackageInstaller + ?Sized,
{
    info!(build_dir = %config.build_dir.display(), "[PACKAGE] Starting packaging pipeline");
    preflight(config)?;

    // --- Steps a+b: fresh build directory with one subdirectory per tree ---
    prepare_build_dir(&config.build_dir, &config.trees)?;

    // --- Step c: copy each tree into its own subdirectory ---
    let mut trees = Vec::with_capacity(config.trees.len());
    for tree in &config.trees {
        let dest = config.build_dir.join(&tree.target);
        let files = copy_tree(&tree.source, &dest, &config.exclude)?;
        info!(tree = %tree.name, files, "[PACKAGE] Copied tree");
        trees.push(TreeReport {
            name: tree.name.clone(),
            target: tree.target.clone(),
            files,
        });
    }

    // --- Step d: resolve and write the pinned manifest ---
    let manifest = resolver.resolve().await.map_err(|e| {
        error!(error = %e, "[PACKAGE][ERROR] Dependency resolution failed");
        PackageError::Resolve(e)
    })?;
    let manifest_path = config.manifest_path();
    manifest
        .write_to(&manifest_path)
        .map_err(|e| PackageError::io(format!("failed to write {}", manifest_path.display()), e))?;
    info!(entries = manifest.len(), path = %manifest_path.display(), "[PACKAGE] Wrote manifest");

    // --- Step e: install without transitive resolution ---
    if manifest.is_empty() {
        warn!("[PACKAGE] Manifest is empty, skipping installation");
    } else {
        installer
            .install(&manifest_path, &config.build_dir)
            .await
            .map_err(|e| {
                error!(error = %e, "[PACKAGE][ERROR] Dependency installation failed");
                PackageError::Install(e)
            })?;
        info!("[PACKAGE] Installed dependencies");

        if config.verify_install {
            let missing = missing_installs(&manifest, &config.build_dir).map_err(|e| {
                PackageError::io(format!("failed to scan {}", config.build_dir.display()), e)
            })?;
            if !missing.is_empty() {
                error!(?missing, "[PACKAGE][ERROR] Installed packages do not match manifest");
                return Err(PackageError::Verify { missing });
            }
            info!("[PACKAGE] Verified installed packages against manifest");
        }
    }

    // --- Steps f+g: replace the archive ---
    let summary = write_archive(&config.build_dir, &config.archive_path).map_err(|e| {
        error!(error = %e, "[PACKAGE][ERROR] Archive creation failed");
        PackageError::Archive(e)
    })?;
    info!(archive = %summary.path.display(), sha256 = %summary.sha256, "[PACKAGE] Packaging complete");

    Ok(PackageReport {
        build_dir: config.build_dir.clone(),
        archive_path: summary.path,
        archive_bytes: summary.bytes,
        archive_sha256: summary.sha256,
        archive_entries: summary.entries,
        trees,
        requirements: manifest.requirements,
    })
}

/// Remove the build directory and the archive. Returns what was removed.
///
/// Refuses to run when the build directory contains the project root.
pub fn clean(config: &PackageConfig) -> Result<Vec<PathBuf>, PackageError> {
    if resolved(&config.project_root)?.starts_with(resolved(&config.build_dir)?) {
        return Err(overlap(format!(
            "build directory {} contains the project root {}",
            config.build_dir.display(),
            config.project_root.display()
        )));
    }
    let mut removed = Vec::new();
    for path in [&config.build_dir, &config.archive_path] {
        if remove_path(path)? {
            info!(path = %path.display(), "[PACKAGE] Removed");
            removed.push(path.clone());
        }
    }
    Ok(removed)
}
