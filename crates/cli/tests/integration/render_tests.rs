//! `stagefile render` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn basic_recipe_renders_a_dockerfile() {
  TestEnv::new()
    .render_cmd("basic.lua")
    .assert()
    .success()
    .stdout(predicate::str::starts_with("FROM ubuntu:18.04\nRUN apt-get update -y && \\\n"))
    .stdout(predicate::str::ends_with("RUN echo hi\nENV X=1\n"));
}

#[test]
fn basic_recipe_renders_a_singularity_definition() {
  TestEnv::new()
    .render_cmd("basic.lua")
    .args(["--format", "singularity"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("BootStrap: docker\nFrom: ubuntu:18.04\n"))
    .stdout(predicate::str::contains("%environment\n    export X=1"));
}

#[test]
fn apptainer_is_an_alias_for_singularity() {
  TestEnv::new()
    .render_cmd("basic.lua")
    .args(["--format", "apptainer"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("BootStrap: docker"));
}

#[test]
fn output_goes_to_a_file() {
  let env = TestEnv::new();
  let out = env.output_path("Dockerfile");
  env
    .render_cmd("basic.lua")
    .arg("--out")
    .arg(&out)
    .assert()
    .success()
    .stdout("");
  let written = std::fs::read_to_string(&out).unwrap();
  assert!(written.starts_with("FROM ubuntu:18.04"));
}

#[test]
fn multistage_recipe_copies_the_runtime() {
  TestEnv::new()
    .render_cmd("multistage.lua")
    .assert()
    .success()
    .stdout(predicate::str::contains("FROM ubuntu:22.04 AS devel"))
    .stdout(predicate::str::contains("COPY --from=devel /usr/local/zlib /usr/local/zlib"))
    .stdout(predicate::str::contains("ENTRYPOINT [\"/usr/local/bin/app\"]"));
}

#[test]
fn old_singularity_rejects_multistage() {
  TestEnv::new()
    .render_cmd("multistage.lua")
    .args(["--format", "singularity", "--singularity-version", "3.0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Singularity 3.2 or later"));
}

#[test]
fn merge_flag_folds_instructions() {
  let env = TestEnv::new();
  let plain = env.render_cmd("multistage.lua").output().unwrap();
  let merged = env.render_cmd("multistage.lua").arg("--merge").output().unwrap();
  assert!(plain.status.success() && merged.status.success());
  assert!(merged.stdout.len() <= plain.stdout.len());
}

#[test]
fn license_is_enforced_by_default() {
  TestEnv::new()
    .render_cmd("nvhpc.lua")
    .assert()
    .failure()
    .stderr(predicate::str::contains("license agreement was not accepted"));
}

#[test]
fn license_policy_warn_renders_with_a_warning() {
  TestEnv::new()
    .render_cmd("nvhpc.lua")
    .args(["--license-policy", "warn"])
    .assert()
    .success()
    .stdout(predicate::str::contains("nvhpc_2024_241_Linux_x86_64_cuda_12.3.tar.gz"))
    .stderr(predicate::str::contains("license agreement not accepted"));
}

#[test]
fn userargs_are_passed_through() {
  TestEnv::new()
    .render_cmd("userarg.lua")
    .args(["--userarg", "image=rockylinux:9", "--userarg", "message=hello"])
    .assert()
    .success()
    .stdout("FROM rockylinux:9\nRUN echo hello\n");
}

#[test]
fn emit_json_dumps_the_ir() {
  let output = TestEnv::new()
    .render_cmd("basic.lua")
    .args(["--emit", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json[0]["platform"], "x86_64-ubuntu18.04");
  assert_eq!(json[0]["primitives"][1]["kind"], "shell");
}

#[test]
fn bash_output_skips_container_instructions() {
  TestEnv::new()
    .render_cmd("multistage.lua")
    .args(["--format", "bash"])
    .assert()
    .success()
    .stdout(predicate::str::contains("#!/bin/bash -ex"))
    .stderr(predicate::str::contains("no bash equivalent"));
}
