use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Nothing listens on the discard port, so connections fail immediately
const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

fn cmsync() -> Command {
    let mut cmd = Command::cargo_bin("cmsync").unwrap();
    cmd.env_remove("CMSYNC_URL")
        .env_remove("CMSYNC_USER")
        .env_remove("CMSYNC_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn workspace_with_category() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("categories")).unwrap();
    fs::write(
        dir.path().join("categories").join("news.json"),
        r#"{"id": "c1", "name": "News", "rev": "3-abc"}"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_help_output() {
    cmsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_output() {
    cmsync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_push_help_lists_type_values() {
    cmsync()
        .args(["push", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--create-only"))
        .stdout(predicate::str::contains("layout-mappings"));
}

#[test]
fn test_dry_run_push_stays_offline() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config", "--dry-run"])
        .args(["push", "-t", "categories", "-I"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 artifact would be pushed"));

    assert!(dir.path().join(".cmsync").join("cmsync.log").exists());
}

#[test]
fn test_push_without_artifact_folders_fails() {
    let dir = TempDir::new().unwrap();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config", "push"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No artifact directories exist"));
}

#[test]
fn test_pull_from_unreachable_server_fails() {
    let dir = TempDir::new().unwrap();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config"])
        .args(["pull", "-t", "categories", "-I"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to pull categories"));
}

#[test]
fn test_missing_url_is_reported() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "push"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No content hub URL configured"));
}

#[test]
fn test_invalid_url_is_rejected() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", "ftp://hub.example.com", "--no-config", "push"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http://"));
}

#[test]
fn test_named_requires_one_type() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config"])
        .args(["push", "--named", "News"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--named requires exactly one --type"));
}

#[test]
fn test_named_conflicts_with_ignore_timestamps() {
    cmsync()
        .args(["pull", "-t", "content", "--named", "Home", "-I"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_status_lists_modified_artifacts() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "status", "-t", "categories"])
        .assert()
        .success()
        .stdout(predicate::str::contains("categories: 1 modified"))
        .stdout(predicate::str::contains("News"));
}

#[test]
fn test_status_in_empty_directory() {
    let dir = TempDir::new().unwrap();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No artifact directories exist"));
}

#[test]
fn test_config_command_without_files() {
    let dir = TempDir::new().unwrap();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored (--no-config)"))
        .stdout(predicate::str::contains("Concurrency: 10"));
}

#[test]
fn test_config_command_reads_project_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".cmsync.toml"),
        "api_url = \"https://hub.example.com/api\"\nconcurrency = 4\n",
    )
    .unwrap();

    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains(".cmsync.toml"))
        .stdout(predicate::str::contains("Concurrency: 4"))
        .stdout(predicate::str::contains("https://hub.example.com/api"));
}

fn workspace_with_layout_and_category() -> TempDir {
    let dir = workspace_with_category();
    fs::create_dir_all(dir.path().join("layouts").join("site")).unwrap();
    fs::write(
        dir.path().join("layouts").join("site").join("header.json"),
        r#"{"name": "Header"}"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_path_push_skips_types_without_paths() {
    let dir = workspace_with_layout_and_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config", "--dry-run"])
        .args(["push", "--path", "/site", "-I"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 artifact would be pushed"));
}

#[test]
fn test_path_status_lists_only_path_based_types() {
    let dir = workspace_with_layout_and_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "status", "--path", "/site"])
        .assert()
        .success()
        .stdout(predicate::str::contains("layouts: 1 modified"))
        .stdout(predicate::str::contains("categories").not());
}

#[test]
fn test_path_with_only_flat_types_is_rejected() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--no-config", "status", "-t", "categories", "--path", "/site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--path only applies to"));
}

#[test]
fn test_named_dry_run_push() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config", "--dry-run"])
        .args(["push", "-t", "categories", "--named", "News"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 artifact would be pushed"));
}

#[test]
fn test_named_push_of_unknown_artifact_fails() {
    let dir = workspace_with_category();
    cmsync()
        .arg("--dir")
        .arg(dir.path())
        .args(["--url", UNREACHABLE_URL, "--no-config", "--dry-run"])
        .args(["push", "-t", "categories", "--named", "Sports"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to push categories"));
}
