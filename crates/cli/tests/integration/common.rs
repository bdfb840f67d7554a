//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// A scratch directory for output files.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn output_path(&self, name: &str) -> PathBuf {
    self.temp.path().join(name)
  }

  /// `stagefile render <fixture>` with logging silenced unless asked for.
  pub fn render_cmd(&self, fixture: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("stagefile");
    cmd.arg("render").arg(fixture_path(fixture)).current_dir(self.temp.path());
    cmd
  }
}
