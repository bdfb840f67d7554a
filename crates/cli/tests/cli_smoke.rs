//! CLI smoke tests for stagefile.
//!
//! These tests verify that the commands run without panicking and return
//! appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn stagefile_cmd() -> Command {
  cargo_bin_cmd!("stagefile")
}

fn temp_recipe(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("recipe.lua"), content).unwrap();
  temp
}

const MINIMAL_RECIPE: &str = r#"recipe.stage{ image = "ubuntu:22.04" }"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  stagefile_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  stagefile_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("stagefile"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["render", "info"] {
    stagefile_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// render
// =============================================================================

#[test]
fn render_minimal_recipe() {
  let temp = temp_recipe(MINIMAL_RECIPE);
  stagefile_cmd()
    .arg("render")
    .arg(temp.path().join("recipe.lua"))
    .assert()
    .success()
    .stdout("FROM ubuntu:22.04\n");
}

#[test]
fn render_missing_recipe_fails() {
  stagefile_cmd()
    .args(["render", "/nonexistent/recipe.lua"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("recipe not found"));
}

#[test]
fn render_rejects_unknown_format() {
  let temp = temp_recipe(MINIMAL_RECIPE);
  stagefile_cmd()
    .arg("render")
    .arg(temp.path().join("recipe.lua"))
    .args(["--format", "podman"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("podman"));
}

#[test]
fn render_rejects_malformed_userarg() {
  let temp = temp_recipe(MINIMAL_RECIPE);
  stagefile_cmd()
    .arg("render")
    .arg(temp.path().join("recipe.lua"))
    .args(["--userarg", "novalue"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn render_reports_lua_errors() {
  let temp = temp_recipe("recipe.stage{ image = 'ubuntu:22.04' }:shell(nil)");
  stagefile_cmd()
    .arg("render")
    .arg(temp.path().join("recipe.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to evaluate recipe"));
}

// =============================================================================
// info
// =============================================================================

#[test]
fn info_lists_formats() {
  stagefile_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("docker, singularity, bash"))
    .stdout(predicate::str::contains("rockylinux"));
}

#[test]
fn info_json_is_valid() {
  let output = stagefile_cmd().args(["info", "--json"]).output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["formats"][1], "singularity");
  assert_eq!(json["distros"][0]["default_version"], "22.04");
}
