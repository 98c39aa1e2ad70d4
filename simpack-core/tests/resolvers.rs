use simpack_core::contract::{DependencyResolver, PackageInstaller};
use simpack_core::error::{ResolveError, ToolError};
use simpack_core::install::PipInstaller;
use simpack_core::resolve::{CommandResolver, LockfileResolver};
use std::fs;
use tempfile::tempdir;

#[tokio::test]
async fn test_lockfile_resolver_reads_pinned_entries() {
    let tmp = tempdir().unwrap();
    let lock = tmp.path().join("requirements.lock");
    fs::write(&lock, "# locked\nnumpy==1.26.4\npandas==2.2.1\n").unwrap();

    let manifest = LockfileResolver::new(&lock).resolve().await.unwrap();

    assert_eq!(manifest.render(), "numpy==1.26.4\npandas==2.2.1\n");
}

#[tokio::test]
async fn test_lockfile_resolver_reports_missing_file() {
    let tmp = tempdir().unwrap();
    let err = LockfileResolver::new(tmp.path().join("absent.txt"))
        .resolve()
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ReadLockfile { .. }));
}

#[tokio::test]
async fn test_lockfile_resolver_rejects_unpinned_entries() {
    let tmp = tempdir().unwrap();
    let lock = tmp.path().join("requirements.in");
    fs::write(&lock, "numpy\n").unwrap();

    let err = LockfileResolver::new(&lock).resolve().await.unwrap_err();
    assert!(matches!(err, ResolveError::Manifest(_)));
}

#[tokio::test]
async fn test_command_resolver_spawn_failure_names_program() {
    let resolver = CommandResolver::new("simpack-definitely-not-a-real-tool", vec![]);
    let err = resolver.resolve().await.unwrap_err();
    match err {
        ResolveError::Tool(ToolError::Spawn { program, .. }) => {
            assert_eq!(program, "simpack-definitely-not-a-real-tool")
        }
        other => panic!("Expected spawn failure, got {other:?}"),
    }
}

#[test]
fn test_pip_freeze_resolver_excludes_editable_installs() {
    let resolver = CommandResolver::pip_freeze("python3");
    assert_eq!(resolver.program(), "python3");
    assert_eq!(resolver.args(), ["-m", "pip", "freeze", "--exclude-editable"]);
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn test_command_resolver_parses_stdout_in_working_dir() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("pins.txt"), "numpy==1.26.4\n").unwrap();

        let resolver =
            CommandResolver::new("sh", vec!["-c".into(), "cat pins.txt".into()]).working_dir(tmp.path());
        let manifest = resolver.resolve().await.unwrap();

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.requirements[0].version.as_deref(), Some("1.26.4"));
    }

    #[tokio::test]
    async fn test_command_resolver_failure_carries_stderr() {
        let resolver = CommandResolver::new(
            "sh",
            vec!["-c".into(), "echo 'lock is stale' >&2; exit 3".into()],
        );
        let err = resolver.resolve().await.unwrap_err();
        match err {
            ResolveError::Tool(ToolError::Failed { stderr, .. }) => assert_eq!(stderr, "lock is stale"),
            other => panic!("Expected tool failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pip_installer_passes_no_deps_target_and_manifest() {
        let tmp = tempdir().unwrap();
        let manifest = tmp.path().join("requirements.txt");
        fs::write(&manifest, "numpy==1.26.4\n").unwrap();
        let log = tmp.path().join("args.log");

        // Stand-in for pip: record the arguments it was given.
        let script = format!("printf '%s\\n' \"$@\" > '{}'", log.display());
        let installer = PipInstaller::new("sh", vec!["-c".into(), script, "fake-pip".into()]);
        installer.install(&manifest, tmp.path()).await.unwrap();

        let recorded = fs::read_to_string(&log).unwrap();
        let args: Vec<_> = recorded.lines().collect();
        assert_eq!(
            args,
            vec![
                "--no-deps",
                "--target",
                tmp.path().to_str().unwrap(),
                "-r",
                manifest.to_str().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_pip_installer_failure_is_reported() {
        let tmp = tempdir().unwrap();
        let manifest = tmp.path().join("requirements.txt");
        fs::write(&manifest, "numpy==1.26.4\n").unwrap();

        let installer = PipInstaller::new("false", vec![]);
        let err = installer.install(&manifest, tmp.path()).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
