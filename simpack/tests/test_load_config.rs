use serial_test::serial;
use simpack::load_config::{load_config, ResolverChoice, ENV_ARCHIVE, ENV_BUILD_DIR, ENV_PYTHON};
use std::env;
use std::fs::{create_dir_all, write};
use std::path::PathBuf;
use tempfile::tempdir;

fn clear_overrides() {
    env::remove_var(ENV_BUILD_DIR);
    env::remove_var(ENV_ARCHIVE);
    env::remove_var(ENV_PYTHON);
}

/// Without any config file the standard layout under the project root applies.
#[test]
#[serial]
fn test_defaults_without_config_file() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let root = tmp.path();

    let config = load_config(None, Some(root)).expect("Config should load");

    assert_eq!(config.source, None);
    assert_eq!(config.project_root, root);
    assert_eq!(config.package.build_dir, root.join("build"));
    assert_eq!(config.package.archive_path, root.join("build.zip"));
    assert_eq!(config.package.manifest_name, "requirements.txt");
    assert!(config.package.verify_install);

    let trees: Vec<_> = config
        .package
        .trees
        .iter()
        .map(|t| (t.name.as_str(), t.source.clone(), t.target.clone()))
        .collect();
    assert_eq!(
        trees,
        vec![
            ("src", root.join("src"), PathBuf::from("src")),
            ("inputs", root.join("inputs"), PathBuf::from("inputs")),
            ("sim_test", root.join("sim_test"), PathBuf::from("sim_test")),
        ]
    );

    match &config.resolver {
        ResolverChoice::Command(r) => {
            assert_eq!(r.program(), "python3");
            assert_eq!(r.args(), ["-m", "pip", "freeze", "--exclude-editable"]);
        }
        other => panic!("Expected pip freeze resolver, got {other:?}"),
    }
    assert_eq!(config.installer.program(), "python3");
    assert_eq!(config.installer.args(), ["-m", "pip", "install"]);
}

/// simpack.yaml in the project root is picked up and its relative paths resolve against the root.
#[test]
#[serial]
fn test_discovers_simpack_yaml_and_resolves_relative_paths() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(
        root.join("simpack.yaml"),
        r#"
build_dir: out/build
archive: dist/sim.zip
manifest: pins.txt
python: python3.11
exclude: [__pycache__]
verify_install: false
trees:
  - name: src
  - name: data
    source: inputs
    target: inputs
resolver:
  type: lockfile
  path: requirements.lock
installer:
  args: [-m, pip, install, --only-binary=:all:]
"#,
    )
    .unwrap();

    let config = load_config(None, Some(root)).expect("Config should load");

    assert_eq!(config.source, Some(root.join("simpack.yaml")));
    assert_eq!(config.package.build_dir, root.join("out/build"));
    assert_eq!(config.package.archive_path, root.join("dist/sim.zip"));
    assert_eq!(config.package.manifest_path(), root.join("out/build/pins.txt"));
    assert_eq!(config.package.exclude, vec!["__pycache__".to_string()]);
    assert!(!config.package.verify_install);

    assert_eq!(config.package.trees.len(), 2);
    assert_eq!(config.package.trees[1].name, "data");
    assert_eq!(config.package.trees[1].source, root.join("inputs"));
    assert_eq!(config.package.trees[1].target, PathBuf::from("inputs"));

    match &config.resolver {
        ResolverChoice::Lockfile(r) => assert_eq!(r.path(), root.join("requirements.lock")),
        other => panic!("Expected lockfile resolver, got {other:?}"),
    }
    assert_eq!(config.installer.program(), "python3.11");
    assert_eq!(
        config.installer.args(),
        ["-m", "pip", "install", "--only-binary=:all:"]
    );
}

/// A config passed with --config resolves project_root against its own directory.
#[test]
#[serial]
fn test_project_root_is_relative_to_config_file() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let conf_dir = tmp.path().join("ci");
    create_dir_all(&conf_dir).unwrap();
    let conf = conf_dir.join("package.yaml");
    write(&conf, "project_root: ..\nresolver:\n  type: command\n  program: pipenv\n  args: [requirements]\n").unwrap();

    let config = load_config(Some(&conf), None).expect("Config should load");

    assert_eq!(config.project_root, conf_dir.join(".."));
    assert_eq!(config.package.build_dir, conf_dir.join("..").join("build"));
    match &config.resolver {
        ResolverChoice::Command(r) => {
            assert_eq!(r.program(), "pipenv");
            assert_eq!(r.args(), ["requirements"]);
        }
        other => panic!("Expected command resolver, got {other:?}"),
    }
}

/// Environment overrides win over file values.
#[test]
#[serial]
fn test_environment_overrides_file_values() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(root.join("simpack.yaml"), "build_dir: from-file\npython: python3.9\n").unwrap();

    env::set_var(ENV_BUILD_DIR, "from-env");
    env::set_var(ENV_ARCHIVE, "/tmp/simpack-env.zip");
    env::set_var(ENV_PYTHON, "/opt/py/bin/python");
    let config = load_config(None, Some(root));
    clear_overrides();
    let config = config.expect("Config should load");

    assert_eq!(config.package.build_dir, root.join("from-env"));
    assert_eq!(config.package.archive_path, PathBuf::from("/tmp/simpack-env.zip"));
    assert_eq!(config.installer.program(), "/opt/py/bin/python");
}

#[test]
#[serial]
fn test_errors_for_invalid_yaml() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let conf = tmp.path().join("simpack.yaml");
    write(&conf, b"build_dir: [:::").unwrap();

    let err = load_config(Some(&conf), None).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_errors_for_unknown_keys() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let conf = tmp.path().join("simpack.yaml");
    write(&conf, "biuld_dir: build\n").unwrap();

    let err = load_config(Some(&conf), None).unwrap_err();
    assert!(err.to_string().contains("YAML"), "got: {err}");
}

#[test]
#[serial]
fn test_errors_for_missing_explicit_config() {
    clear_overrides();
    let tmp = tempdir().unwrap();
    let err = load_config(Some(&tmp.path().join("absent.yaml")), None).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "got: {err}");
}
