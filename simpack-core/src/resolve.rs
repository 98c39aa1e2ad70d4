use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{error, info};

use crate::contract::DependencyResolver;
use crate::error::ResolveError;
use crate::manifest::Manifest;
use crate::tool::run_tool;

/// Resolves dependencies by running a command and parsing its stdout as a manifest.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandResolver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// `<python> -m pip freeze --exclude-editable`: the installed environment, pinned.
    pub fn pip_freeze(python: impl Into<String>) -> Self {
        Self::new(
            python,
            ["-m", "pip", "freeze", "--exclude-editable"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl DependencyResolver for CommandResolver {
    async fn resolve(&self) -> Result<Manifest, ResolveError> {
        let args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        let output = run_tool(&self.program, &args, self.working_dir.as_deref()).await?;
        let manifest: Manifest = output.stdout.parse().map_err(|e| {
            error!(program = %self.program, error = %e, "Resolver output is not a pinned manifest");
            ResolveError::Manifest(e)
        })?;
        info!(program = %self.program, entries = manifest.len(), "Resolved dependencies");
        Ok(manifest)
    }
}

/// Reads an already pinned requirements/lock file.
#[derive(Debug, Clone)]
pub struct LockfileResolver {
    path: PathBuf,
}

impl LockfileResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl DependencyResolver for LockfileResolver {
    async fn resolve(&self) -> Result<Manifest, ResolveError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            error!(path = %self.path.display(), error = ?e, "Failed to read lock file");
            ResolveError::ReadLockfile {
                path: self.path.clone(),
                source: e,
            }
        })?;
        let manifest: Manifest = text.parse()?;
        info!(path = %self.path.display(), entries = manifest.len(), "Loaded dependencies from lock file");
        Ok(manifest)
    }
}
