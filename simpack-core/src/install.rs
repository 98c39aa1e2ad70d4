use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::contract::PackageInstaller;
use crate::error::ToolError;
use crate::manifest::{normalize_name, Manifest};
use crate::tool::run_tool;

/// Installs a manifest with pip into a target directory, never touching
/// transitive dependencies.
///
/// Runs `<program> <args...> --no-deps --target <dir> -r <manifest>`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    program: String,
    args: Vec<String>,
}

impl PipInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<python> -m pip install ...`
    pub fn for_python(python: impl Into<String>) -> Self {
        Self::new(
            python,
            vec!["-m".to_string(), "pip".to_string(), "install".to_string()],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command_args(&self, manifest_path: &Path, target_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push("--no-deps".into());
        args.push("--target".into());
        args.push(target_dir.into());
        args.push("-r".into());
        args.push(manifest_path.into());
        args
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    async fn install(&self, manifest_path: &Path, target_dir: &Path) -> Result<(), ToolError> {
        let args = self.command_args(manifest_path, target_dir);
        run_tool(&self.program, &args, None).await?;
        info!(target = %target_dir.display(), "Installed dependencies");
        Ok(())
    }
}

/// (normalised name, version) for every `*.dist-info` / `*.egg-info` directory in `dir`.
fn installed_distributions(dir: &Path) -> io::Result<HashSet<(String, String)>> {
    let mut found = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = file_name
            .strip_suffix(".dist-info")
            .or_else(|| file_name.strip_suffix(".egg-info"))
        else {
            continue;
        };
        // egg-info may carry a trailing -pyX.Y segment
        let mut parts = stem.splitn(3, '-');
        match (parts.next(), parts.next()) {
            (Some(name), Some(version)) => {
                debug!(name, version, "Found installed distribution");
                found.insert((normalize_name(name), version.to_string()));
            }
            _ => warn!(dir = file_name, "Unrecognised distribution metadata directory"),
        }
    }
    Ok(found)
}

/// Entries of `manifest` with no matching installed distribution in `target_dir`,
/// rendered as `name==version`.
///
/// Entries guarded by an environment marker may legitimately be skipped by
/// pip, and direct references carry no version to compare, so neither is
/// checked.
pub fn missing_installs(manifest: &Manifest, target_dir: &Path) -> io::Result<Vec<String>> {
    let installed = installed_distributions(target_dir)?;
    let mut missing = Vec::new();
    for requirement in manifest.iter() {
        let Some(version) = &requirement.version else {
            debug!(name = %requirement.name, "Not verifying direct reference");
            continue;
        };
        if let Some(marker) = &requirement.marker {
            debug!(name = %requirement.name, marker = %marker, "Not verifying marker-guarded entry");
            continue;
        }
        if !installed.contains(&(requirement.normalized_name(), version.clone())) {
            missing.push(format!("{}=={}", requirement.name, version));
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pip_arguments_disable_dependency_resolution() {
        let installer = PipInstaller::for_python("python3");
        let args = installer.command_args(Path::new("/b/requirements.txt"), Path::new("/b"));
        let rendered: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            rendered,
            vec!["-m", "pip", "install", "--no-deps", "--target", "/b", "-r", "/b/requirements.txt"]
        );
    }

    #[test]
    fn missing_installs_matches_dist_info_and_egg_info() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("numpy-1.26.4.dist-info")).unwrap();
        fs::create_dir(tmp.path().join("ruamel_yaml-0.18.6.dist-info")).unwrap();
        fs::create_dir(tmp.path().join("legacy-0.1-py3.11.egg-info")).unwrap();
        fs::write(tmp.path().join("stray-9.9.dist-info"), b"not a dir").unwrap();

        let manifest: Manifest =
            "numpy==1.26.4\nruamel.yaml==0.18.6\nlegacy==0.1\nstray==9.9\nscipy==1.12.0\n"
                .parse()
                .unwrap();
        let missing = missing_installs(&manifest, tmp.path()).unwrap();
        assert_eq!(missing, vec!["stray==9.9", "scipy==1.12.0"]);
    }

    #[test]
    fn marker_guarded_and_direct_entries_are_not_verified() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("numpy-1.26.4.dist-info")).unwrap();
        let manifest: Manifest = "numpy==1.26.4\n\
pywin32==306 ; sys_platform == \"win32\"\n\
mypkg @ file:///tmp/mypkg\n"
            .parse()
            .unwrap();
        assert!(missing_installs(&manifest, tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn version_mismatch_counts_as_missing() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("numpy-1.26.3.dist-info")).unwrap();
        let manifest: Manifest = "numpy==1.26.4\n".parse().unwrap();
        assert_eq!(missing_installs(&manifest, tmp.path()).unwrap(), vec!["numpy==1.26.4"]);
    }
}
