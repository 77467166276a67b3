use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PACKAGES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<packages>
  <package>
    <id>p</id>
    <name>Sample plugin</name>
    <type>filter</type>
    <latestVersion>1.0</latestVersion>
    <files>
      <file>plugins/p.auf</file>
      <file optional="true">plugins/p.ini</file>
    </files>
  </package>
</packages>"#;

fn apm(root: &Path, catalog: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("apm"));
    cmd.env_remove("APM_ROOT")
        .env_remove("APM_CATALOGS")
        .env_remove("APM_CONFIG")
        .env("XDG_CONFIG_HOME", root.join("no-config"))
        .arg("--root")
        .arg(root)
        .arg("--catalog")
        .arg(catalog);
    cmd
}

#[test]
fn test_end_to_end_status_transitions() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("host");
    fs::create_dir_all(&root).unwrap();
    let catalog = dir.path().join("packages.xml");
    fs::write(&catalog, PACKAGES).unwrap();
    let staged = dir.path().join("staged");
    fs::create_dir_all(&staged).unwrap();
    fs::write(staged.join("p.auf"), "plugin").unwrap();

    apm(&root, &catalog)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("p (Sample plugin): not installed"));

    apm(&root, &catalog)
        .args(["install", "p", "--from"])
        .arg(&staged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed Sample plugin 1.0"));

    assert!(root.join("plugins/p.auf").exists());
    let records = fs::read_to_string(root.join("apm.json")).unwrap();
    assert!(records.contains("\"version\": \"1.0\""));

    apm(&root, &catalog)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("p (Sample plugin): 1.0"));

    fs::remove_file(root.join("plugins/p.auf")).unwrap();

    apm(&root, &catalog)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "p (Sample plugin): not installed (installed files could not be found)",
        ));
}

#[test]
fn test_manual_files_and_manual_status() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("host");
    fs::create_dir_all(root.join("plugins")).unwrap();
    fs::write(root.join("plugins/p.auf"), "").unwrap();
    fs::write(root.join("exedit.auf"), "").unwrap();
    let catalog = dir.path().join("packages.xml");
    fs::write(&catalog, PACKAGES).unwrap();

    apm(&root, &catalog)
        .arg("manual")
        .assert()
        .success()
        .stdout(predicate::str::contains("plugins/p.auf"))
        .stdout(predicate::str::contains("exedit").not());

    apm(&root, &catalog)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("p (Sample plugin): manually installed"));
}

#[test]
fn test_uninstall_removes_files_and_record() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("host");
    fs::create_dir_all(&root).unwrap();
    let catalog = dir.path().join("packages.xml");
    fs::write(&catalog, PACKAGES).unwrap();
    let staged = dir.path().join("staged");
    fs::create_dir_all(&staged).unwrap();
    fs::write(staged.join("p.auf"), "plugin").unwrap();

    apm(&root, &catalog)
        .args(["install", "p", "--from"])
        .arg(&staged)
        .assert()
        .success();

    apm(&root, &catalog)
        .args(["uninstall", "p", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed Sample plugin"));

    assert!(!root.join("plugins/p.auf").exists());
    let records = fs::read_to_string(root.join("apm.json")).unwrap();
    assert!(!records.contains("\"p\""));
}

#[test]
fn test_failed_install_reports_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("host");
    let catalog = dir.path().join("packages.xml");
    fs::write(&catalog, PACKAGES).unwrap();
    let staged = dir.path().join("empty");
    fs::create_dir_all(&staged).unwrap();

    apm(&root, &catalog)
        .args(["install", "p", "--from"])
        .arg(&staged)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to install p"));

    assert!(!root.join("apm.json").exists());
}

#[test]
fn test_unknown_package_fails() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("packages.xml");
    fs::write(&catalog, PACKAGES).unwrap();

    apm(dir.path(), &catalog)
        .args(["show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Package missing not found."));
}
