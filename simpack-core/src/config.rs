use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Names of the project trees copied into every build, in copy order.
pub const DEFAULT_TREES: [&str; 3] = ["src", "inputs", "sim_test"];

pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEFAULT_ARCHIVE: &str = "build.zip";
pub const DEFAULT_MANIFEST: &str = "requirements.txt";

/// One project tree to copy into the build directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSpec {
    /// Label used in logs and reports.
    pub name: String,
    /// Directory the files are copied from.
    pub source: PathBuf,
    /// Destination, relative to the build directory.
    pub target: PathBuf,
}

impl TreeSpec {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Everything the packager needs to know about where things live.
///
/// Paths are used as given; callers resolve relative paths against the
/// project root before building this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Directory the trees live in. The build directory may never contain it.
    pub project_root: PathBuf,
    pub build_dir: PathBuf,
    pub archive_path: PathBuf,
    /// File name of the pinned manifest written at the build directory root.
    pub manifest_name: String,
    pub trees: Vec<TreeSpec>,
    /// File or directory names skipped while copying trees.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Check that every manifest entry was actually installed.
    pub verify_install: bool,
}

impl PackageConfig {
    /// The standard layout for a project rooted at `root`: `src`, `inputs`
    /// and `sim_test` copied into `build/`, archived to `build.zip`.
    pub fn for_project(root: &Path) -> Self {
        Self {
            project_root: root.to_path_buf(),
            build_dir: root.join(DEFAULT_BUILD_DIR),
            archive_path: root.join(DEFAULT_ARCHIVE),
            manifest_name: DEFAULT_MANIFEST.to_string(),
            trees: default_trees(root),
            exclude: Vec::new(),
            verify_install: true,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.build_dir.join(&self.manifest_name)
    }

    pub fn trace_loaded(&self) {
        info!(
            build_dir = %self.build_dir.display(),
            archive = %self.archive_path.display(),
            trees_count = self.trees.len(),
            "Loaded PackageConfig"
        );
        debug!(?self, "PackageConfig loaded (full debug)");
    }
}

/// Each default tree copied into a build subdirectory of the same name.
pub fn default_trees(root: &Path) -> Vec<TreeSpec> {
    DEFAULT_TREES
        .iter()
        .map(|name| TreeSpec::new(*name, root.join(name), *name))
        .collect()
}
