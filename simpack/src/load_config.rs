/// `load_config` module: Loads a static YAML config, applies environment overrides, and maps it to
/// the core `PackageConfig` plus the resolver and installer to use.
///
/// This module is the only place where user YAML is parsed and mapped to strongly-typed core structs.
///
/// # Responsibilities
/// - Locate the config file (`--config`, else `simpack.yaml` in the project root, else defaults)
/// - Parse the YAML into the loosely-typed file schema below
/// - Apply `SIMPACK_BUILD_DIR`, `SIMPACK_ARCHIVE` and `SIMPACK_PYTHON` overrides
/// - Resolve every relative path against the project root
///
/// # Errors
/// All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use simpack_core::config::{
    default_trees, PackageConfig, TreeSpec, DEFAULT_ARCHIVE, DEFAULT_BUILD_DIR, DEFAULT_MANIFEST,
};
use simpack_core::contract::DependencyResolver;
use simpack_core::error::ResolveError;
use simpack_core::install::PipInstaller;
use simpack_core::manifest::Manifest;
use simpack_core::resolve::{CommandResolver, LockfileResolver};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Config file looked up in the project root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "simpack.yaml";
pub const DEFAULT_PYTHON: &str = "python3";

pub const ENV_BUILD_DIR: &str = "SIMPACK_BUILD_DIR";
pub const ENV_ARCHIVE: &str = "SIMPACK_ARCHIVE";
pub const ENV_PYTHON: &str = "SIMPACK_PYTHON";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    #[serde(default)]
    pub archive: Option<PathBuf>,
    #[serde(default)]
    pub manifest: Option<String>,
    #[serde(default)]
    pub python: Option<String>,
    #[serde(default)]
    pub trees: Option<Vec<TreeSection>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub installer: Option<InstallerSection>,
    #[serde(default)]
    pub verify_install: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TreeSection {
    pub name: String,
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub target: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolverSection {
    /// `<python> -m pip freeze --exclude-editable`
    Freeze {
        #[serde(default)]
        python: Option<String>,
    },
    /// An already pinned requirements file.
    Lockfile { path: PathBuf },
    /// Any command printing a pinned manifest on stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for ResolverSection {
    fn default() -> Self {
        ResolverSection::Freeze { python: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallerSection {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

/// The resolver selected by configuration.
#[derive(Debug, Clone)]
pub enum ResolverChoice {
    Command(CommandResolver),
    Lockfile(LockfileResolver),
}

#[async_trait]
impl DependencyResolver for ResolverChoice {
    async fn resolve(&self) -> Result<Manifest, ResolveError> {
        match self {
            ResolverChoice::Command(r) => r.resolve().await,
            ResolverChoice::Lockfile(r) => r.resolve().await,
        }
    }
}

/// Fully merged configuration, ready to hand to the core pipeline.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub project_root: PathBuf,
    /// Config file that was read, if any.
    pub source: Option<PathBuf>,
    pub package: PackageConfig,
    pub resolver: ResolverChoice,
    pub installer: PipInstaller,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(cwd.join(path))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    // An empty file means "all defaults".
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Locate, parse and merge the configuration.
///
/// `project_root` from the command line wins over the file's `project_root`,
/// which is itself relative to the config file's directory.
pub fn load_config(config: Option<&Path>, project_root: Option<&Path>) -> Result<LoadedConfig> {
    let cli_root = project_root.map(absolute).transpose()?;

    let config_path = match config {
        Some(path) => Some(absolute(path)?),
        None => {
            let root = match &cli_root {
                Some(root) => root.clone(),
                None => absolute(Path::new("."))?,
            };
            Some(root.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file())
        }
    };

    let file = match &config_path {
        Some(path) => {
            info!(config_path = ?path, "Loading configuration from file");
            read_file_config(path)?
        }
        None => {
            info!("No config file found, using defaults");
            FileConfig::default()
        }
    };

    let project_root = match (cli_root, &file.project_root, &config_path) {
        (Some(root), _, _) => root,
        (None, Some(root), Some(cfg)) => {
            let base = cfg.parent().unwrap_or_else(|| Path::new("."));
            base.join(root)
        }
        (None, None, Some(cfg)) => cfg.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
        (None, root, None) => absolute(root.as_deref().unwrap_or_else(|| Path::new(".")))?,
    };
    let resolve = |p: &Path| project_root.join(p);

    let build_dir = env_override(ENV_BUILD_DIR)
        .map(PathBuf::from)
        .or(file.build_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR));
    let archive = env_override(ENV_ARCHIVE)
        .map(PathBuf::from)
        .or(file.archive)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE));
    let python = env_override(ENV_PYTHON)
        .or(file.python)
        .unwrap_or_else(|| DEFAULT_PYTHON.to_string());

    let trees = match file.trees {
        Some(sections) => sections
            .into_iter()
            .map(|t| {
                let source = t.source.unwrap_or_else(|| PathBuf::from(&t.name));
                let target = t.target.unwrap_or_else(|| PathBuf::from(&t.name));
                TreeSpec::new(t.name, resolve(&source), target)
            })
            .collect(),
        None => default_trees(&project_root),
    };

    let resolver = match file.resolver {
        ResolverSection::Freeze { python: freeze_python } => {
            let program = freeze_python.unwrap_or_else(|| python.clone());
            ResolverChoice::Command(CommandResolver::pip_freeze(program).working_dir(&project_root))
        }
        ResolverSection::Lockfile { path } => ResolverChoice::Lockfile(LockfileResolver::new(resolve(&path))),
        ResolverSection::Command { program, args } => {
            ResolverChoice::Command(CommandResolver::new(program, args).working_dir(&project_root))
        }
    };

    let installer = match file.installer {
        Some(InstallerSection { program, args }) => {
            let default = PipInstaller::for_python(program.unwrap_or_else(|| python.clone()));
            match args {
                Some(args) => PipInstaller::new(default.program(), args),
                None => default,
            }
        }
        None => PipInstaller::for_python(python.clone()),
    };

    let package = PackageConfig {
        project_root: project_root.clone(),
        build_dir: resolve(&build_dir),
        archive_path: resolve(&archive),
        manifest_name: file.manifest.unwrap_or_else(|| DEFAULT_MANIFEST.to_string()),
        trees,
        exclude: file.exclude,
        verify_install: file.verify_install.unwrap_or(true),
    };
    package.trace_loaded();

    info!(
        project_root = %project_root.display(),
        python = %python,
        "Config loaded and merged successfully"
    );

    Ok(LoadedConfig {
        project_root,
        source: config_path,
        package,
        resolver,
        installer,
    })
}
