//! End-to-end CLI tests driving the built `bscope` binary against small
//! synthetic bundles.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

const BUNDLE_V1: &str = r#"function zO6(A,q){var x="queued_command_marker";return A+q}function yK2(e){try{e()}catch(t){console.log(t)}}"#;
const BUNDLE_V2: &str = r#"function zO6(A,q,z){var x="queued_command_marker";console.log("extra_one");return A+q+z}function brandNew(){return 1}"#;

fn write_bundle(dir: &assert_fs::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let file = dir.child(name);
    file.write_str(content).expect("write fixture bundle");
    file.path().to_path_buf()
}

#[test]
fn beautify_writes_both_output_files() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bundle = write_bundle(&tmp, "bundle.js", BUNDLE_V1);

    Command::cargo_bin("bscope").expect("bin").arg("beautify").arg(&bundle).assert().success();

    tmp.child("bundle.beautified.js").assert(predicate::path::exists());
    tmp.child("bundle.offsetmap.json").assert(predicate::path::exists());

    let map_contents = fs::read_to_string(tmp.child("bundle.offsetmap.json").path()).unwrap();
    let offsets: Value = serde_json::from_str(&map_contents).unwrap();
    assert!(offsets.as_array().unwrap().len() > 1);
}

#[test]
fn find_reports_a_unique_literal_match() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bundle = write_bundle(&tmp, "bundle.js", BUNDLE_V1);

    Command::cargo_bin("bscope")
        .expect("bin")
        .args(["find", bundle.to_str().unwrap(), "queued_command_marker", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));
}

#[test]
fn match_exits_zero_on_unique_pattern() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bundle = write_bundle(&tmp, "bundle.js", BUNDLE_V1);

    Command::cargo_bin("bscope")
        .expect("bin")
        .args(["match", bundle.to_str().unwrap(), "queued_command_marker"])
        .assert()
        .success();
}

#[test]
fn match_exits_two_on_ambiguous_pattern() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let src = r#"var a="dup";var b="dup";"#;
    let bundle = write_bundle(&tmp, "bundle.js", src);

    Command::cargo_bin("bscope").expect("bin").args(["match", bundle.to_str().unwrap(), "dup"]).assert().code(2);
}

#[test]
fn match_exits_one_on_missing_pattern() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bundle = write_bundle(&tmp, "bundle.js", BUNDLE_V1);

    Command::cargo_bin("bscope")
        .expect("bin")
        .args(["match", bundle.to_str().unwrap(), "does_not_exist_anywhere"])
        .assert()
        .code(1);
}

#[test]
fn patch_check_exits_one_on_ambiguous_pattern() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let src = r#"var a="dup";var b="dup";"#;
    let bundle = write_bundle(&tmp, "bundle.js", src);

    Command::cargo_bin("bscope")
        .expect("bin")
        .args(["patch-check", bundle.to_str().unwrap(), "dup"])
        .assert()
        .code(1);
}

#[test]
fn map_json_is_valid_and_lists_both_functions() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bundle = write_bundle(&tmp, "bundle.js", BUNDLE_V1);

    let output = Command::cargo_bin("bscope")
        .expect("bin")
        .args(["map", bundle.to_str().unwrap(), "--json"])
        .output()
        .expect("run map");
    assert!(output.status.success());

    let entries: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let names: Vec<&str> = entries.as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"zO6"));
    assert!(names.contains(&"yK2"));
}

#[test]
fn diff_fns_reports_modified_and_added_functions() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let v1 = write_bundle(&tmp, "v1.js", BUNDLE_V1);
    let v2 = write_bundle(&tmp, "v2.js", BUNDLE_V2);

    Command::cargo_bin("bscope")
        .expect("bin")
        .args(["diff-fns", v1.to_str().unwrap(), v2.to_str().unwrap(), "--summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("modified: 1"))
        .stdout(predicate::str::contains("added: 1"));
}
