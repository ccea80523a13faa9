//! Exit-code and filesystem behavior of the build tool

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TEMPLATE: &str = "<html><head><script>\n\
var featureFlags = /** REPLACED_WITH_FEATURE_FLAGS_START **/ {} /** REPLACED_WITH_FEATURE_FLAGS_END **/;\n\
var errorReportingEnabled = /** REPLACED_WITH_ERROR_REPORTING_ENABLE_START **/ false /** REPLACED_WITH_ERROR_REPORTING_ENABLE_END **/;\n\
var errorReportingEnvironment = /** REPLACED_WITH_ERROR_REPORTING_ENVIRONMENT_START **/ null /** REPLACED_WITH_ERROR_REPORTING_ENVIRONMENT_END **/;\n\
</script></head><body></body></html>\n";

fn scaffold(flags_json: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    let public = dir.path().join("public");
    fs::create_dir_all(public.join("assets")).unwrap();
    fs::write(public.join("index.template.html"), TEMPLATE).unwrap();
    fs::write(public.join("assets/app.css"), "body {}\n").unwrap();
    if let Some(flags) = flags_json {
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("config/feature-flags.json"), flags).unwrap();
    }
    dir
}

fn build_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cubedrill-build").unwrap();
    cmd.current_dir(dir);
    cmd
}

const VALID_FLAGS: &str =
    r#"{"staging": {"newStatistics": true}, "production": {"newStatistics": false}}"#;

#[test]
fn zero_arguments_exits_one_with_usage() {
    let dir = scaffold(Some(VALID_FLAGS));
    build_cmd(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--target=development"));
}

#[test]
fn bogus_target_exits_one_with_usage() {
    let dir = scaffold(Some(VALID_FLAGS));
    build_cmd(dir.path())
        .arg("--target=bogus")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--target=staging"));
}

#[test]
fn extra_arguments_exit_one() {
    let dir = scaffold(Some(VALID_FLAGS));
    build_cmd(dir.path())
        .args(["--target=staging", "--surprise"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_feature_flags_file_exits_one() {
    let dir = scaffold(None);
    build_cmd(dir.path())
        .arg("--target=staging")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("config/feature-flags.json"));
}

#[test]
fn missing_public_directory_exits_one() {
    let dir = TempDir::new().unwrap();
    build_cmd(dir.path())
        .arg("--target=staging")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("public"));
}

#[test]
fn mismatched_flag_keys_fail_before_any_writes() {
    let dir = scaffold(Some(
        r#"{"staging": {"newStatistics": true}, "production": {"renamed": false}}"#,
    ));
    build_cmd(dir.path())
        .arg("--target=staging")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("don't have the same keys"));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn mismatched_override_keys_fail() {
    let dir = scaffold(Some(VALID_FLAGS));
    fs::write(
        dir.path().join("config/local-feature-flags.json"),
        r#"{"somethingElse": true}"#,
    )
    .unwrap();
    build_cmd(dir.path())
        .arg("--target=development")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("overrides"));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn staging_build_substitutes_and_removes_the_template() {
    let dir = scaffold(Some(VALID_FLAGS));
    build_cmd(dir.path())
        .arg("--target=staging")
        .assert()
        .success();

    let built = dir.path().join("build/public");
    let index = fs::read_to_string(built.join("index.html")).unwrap();
    assert!(index.contains(r#""newStatistics":true"#));
    assert!(index.contains(r#""placeholder":false"#));
    assert!(index.contains(r#"var errorReportingEnabled = true;"#));
    assert!(index.contains(r#"var errorReportingEnvironment = "staging";"#));
    assert!(!index.contains("REPLACED_WITH"));

    // the template is gone, the other assets came along
    assert!(!built.join("index.template.html").exists());
    assert!(built.join("assets/app.css").exists());
}

#[test]
fn development_build_uses_local_overrides() {
    let dir = scaffold(Some(VALID_FLAGS));
    fs::write(
        dir.path().join("config/local-feature-flags.json"),
        r#"{"newStatistics": false}"#,
    )
    .unwrap();
    build_cmd(dir.path())
        .arg("--target=development")
        .assert()
        .success();

    let index = fs::read_to_string(dir.path().join("build/public/index.html")).unwrap();
    assert!(index.contains(r#""newStatistics":false"#));
    assert!(index.contains("var errorReportingEnvironment = null;"));
}
