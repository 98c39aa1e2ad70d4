//! Build-directory layout: idempotent reset and tree copying.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::TreeSpec;
use crate::error::PackageError;

/// Real path of `path`, which need not exist yet.
///
/// The longest existing prefix is canonicalised (symlinks and `..` resolved
/// by the filesystem) and the remaining components are applied lexically.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let components: Vec<Component<'_>> = path.components().collect();
    for split in (0..=components.len()).rev() {
        let existing: PathBuf = components[..split].iter().collect();
        let base = if existing.as_os_str().is_empty() {
            fs::canonicalize(".")
        } else {
            fs::canonicalize(&existing)
        };
        let Ok(mut resolved) = base else {
            continue;
        };
        for component in &components[split..] {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::CurDir => {}
                other => resolved.push(other.as_os_str()),
            }
        }
        return Ok(resolved);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor of {}", path.display()),
    ))
}

/// Remove a file or directory if present. Returns whether anything was removed.
pub fn remove_path(path: &Path) -> Result<bool, PackageError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(PackageError::io(
                format!("failed to inspect {}", path.display()),
                e,
            ))
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to remove existing path");
        PackageError::io(format!("failed to remove {}", path.display()), e)
    })?;
    debug!(path = %path.display(), "Removed existing path");
    Ok(true)
}

/// Delete `path` recursively (no error if absent) and create it again, empty.
pub fn reset_dir(path: &Path) -> Result<(), PackageError> {
    remove_path(path)?;
    fs::create_dir_all(path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to create directory");
        PackageError::io(format!("failed to create {}", path.display()), e)
    })?;
    debug!(path = %path.display(), "Created fresh directory");
    Ok(())
}

/// Reset the build directory and create one empty subdirectory per tree.
pub fn prepare_build_dir(build_dir: &Path, trees: &[TreeSpec]) -> Result<(), PackageError> {
    reset_dir(build_dir)?;
    for tree in trees {
        let target = build_dir.join(&tree.target);
        fs::create_dir_all(&target).map_err(|e| {
            PackageError::io(format!("failed to create {}", target.display()), e)
        })?;
    }
    info!(build_dir = %build_dir.display(), subdirs = trees.len(), "Prepared build directory");
    Ok(())
}

/// Recursively copy the contents of `source` into `dest`, preserving structure.
///
/// Entries whose file name is in `exclude` are skipped along with everything
/// beneath them. Symlinks are followed and copied as regular files/dirs.
/// Returns the number of files copied.
pub fn copy_tree(source: &Path, dest: &Path, exclude: &[String]) -> Result<usize, PackageError> {
    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || e.file_name()
                    .to_str()
                    .map(|name| !exclude.iter().any(|x| x == name))
                    .unwrap_or(true)
        });

    let mut files = 0;
    for entry in walker {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk {}", source.display());
            PackageError::io(context, io::Error::from(e))
        })?;
        let rel_path = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(rel_path);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                PackageError::io(format!("failed to create {}", target.display()), e)
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                error!(error = ?e, from = %entry.path().display(), to = %target.display(), "Failed to copy file");
                PackageError::io(format!("failed to copy {}", entry.path().display()), e)
            })?;
            files += 1;
        }
    }

    debug!(source = %source.display(), dest = %dest.display(), files, "Copied tree");
    Ok(files)
}
