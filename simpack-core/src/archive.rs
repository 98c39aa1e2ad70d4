//! Deterministic zip archives of a build directory.
//!
//! Entries are written in sorted path order with a fixed modification time, so
//! archiving the same tree twice yields byte-identical files. The archive is
//! staged in a temporary file next to its destination and only moved into
//! place once complete.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::ArchiveError;

/// What ended up at the output path.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Directory and file entries written.
    pub entries: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Zip entry name for a path relative to the archive root, always `/`-separated.
fn entry_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Zip everything under `root` (not `root` itself) into `archive_path`,
/// replacing any previous archive there.
pub fn write_archive(root: &Path, archive_path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staged = NamedTempFile::new_in(&parent)?;
    let mut writer = ZipWriter::new(staged.as_file());
    let mut entries = 0;

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name().min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = entry_name(rel_path);
        let metadata = entry.metadata().map_err(io::Error::from)?;
        let options = entry_options().unix_permissions(file_mode(&metadata));

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), options.unix_permissions(0o755))?;
        } else {
            writer.start_file(name.clone(), options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
        }
        debug!(entry = %name, "Added archive entry");
        entries += 1;
    }
    writer.finish()?;

    if archive_path.exists() {
        fs::remove_file(archive_path)?;
        debug!(path = %archive_path.display(), "Removed previous archive");
    }
    let persisted = staged.persist(archive_path)?;
    // temp files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        persisted.set_permissions(fs::Permissions::from_mode(0o644))?;
    }
    drop(persisted);

    let bytes = fs::metadata(archive_path)?.len();
    let sha256 = sha256_file(archive_path)?;
    info!(
        path = %archive_path.display(),
        entries,
        bytes,
        sha256 = %sha256,
        "Wrote archive"
    );

    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        entries,
        bytes,
        sha256,
    })
}
