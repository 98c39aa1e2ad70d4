//! # contract: interfaces to the external dependency tools
//!
//! The packager never talks to a package manager directly. It goes through two
//! traits so the pipeline can run against real subprocesses in production and
//! against deterministic mocks in tests.
//!
//! ## Interface & Extensibility
//! - Implement [`DependencyResolver`] to produce a pinned [`Manifest`] (from a
//!   freeze command, a lock file, or anything else).
//! - Implement [`PackageInstaller`] to install a written manifest into a target
//!   directory without re-resolving transitive dependencies.
//! - Both are async and `Send + Sync`.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; `MockDependencyResolver` and
//!   `MockPackageInstaller` are exported under the default
//!   `test-export-mocks` feature so downstream crates can use them too.
//!
//! ## Default implementations
//! - [`crate::resolve::CommandResolver`], [`crate::resolve::LockfileResolver`]
//! - [`crate::install::PipInstaller`]

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{ResolveError, ToolError};
use crate::manifest::Manifest;

/// Produces the flat, pinned dependency set for the project.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Resolve the current dependency set into a manifest.
    async fn resolve(&self) -> Result<Manifest, ResolveError>;
}

/// Installs every entry of a manifest file into a target directory.
///
/// Implementors must not re-resolve transitive dependencies: the manifest is
/// assumed to be complete already.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, manifest_path: &Path, target_dir: &Path) -> Result<(), ToolError>;
}
