//! Error types shared across the packaging pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of an external command (resolver or installer).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` produced non UTF-8 output")]
    InvalidOutput { program: String },
}

/// A manifest line that is not a pinned requirement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("line {line}: `{text}` is not pinned as name==version")]
    Unpinned { line: usize, text: String },

    #[error("line {line}: `{name}` is listed more than once")]
    Duplicate { line: usize, name: String },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("failed to read lock file {}: {source}", path.display())]
    ReadLockfile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("zip writer failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to move finished archive into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Top-level error for a packaging run. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("source tree `{name}` not found at {}", path.display())]
    MissingTree { name: String, path: PathBuf },

    #[error("{0}")]
    Overlap(String),

    #[error("dependency resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("dependency installation failed: {0}")]
    Install(#[source] ToolError),

    #[error("installed packages do not match the manifest, missing: {}", missing.join(", "))]
    Verify { missing: Vec<String> },

    #[error("archive creation failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PackageError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        PackageError::Io {
            context: context.into(),
            source,
        }
    }
}
