// assert_cmd spawns the compiled binary; assert_fs builds hermetic fixtures.
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

mod util;

fn rlens() -> Command
{
    let mut cmd = Command::cargo_bin("rlens").expect("bin");
    cmd.env("NO_COLOR", "1")
        .env_remove("REPOLENS_SCAN__MAX_FILE_SIZE")
        .env_remove("REPOLENS_SELECTION__MAX_ANALYSIS_FILES");
    cmd
}

#[test]
fn scan_json_reports_categories_and_selection()
{
    let tmp = util::make_repo_fixture();

    let assert = rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "scan", ".", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let v: Value = serde_json::from_str(&stdout).expect("json");

    // node_modules and the png are not counted
    assert_eq!(v["stats"]["total_files"], 5);
    assert_eq!(v["stats"]["by_category"]["source_code"], 2);
    assert_eq!(v["stats"]["by_category"]["test"], 1);
    assert_eq!(v["stats"]["by_language"]["python"], 3);

    let selection = v["selection"].as_array().expect("selection array");
    assert_eq!(selection.len(), 5);
    // entry point ranks first
    assert_eq!(selection[0]["path"], "src/main.py");
    assert_eq!(selection[0]["score"], 140);
    assert!(
        selection
            .iter()
            .all(|f| !f["path"].as_str().unwrap_or_default().contains("node_modules"))
    );
}

#[test]
fn scan_respects_max_files()
{
    let tmp = util::make_repo_fixture();

    let assert = rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "scan", "--max-files", "2", "--json"])
        .assert()
        .success();

    let v: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(v["selection"].as_array().map(Vec::len), Some(2));
}

#[test]
fn scan_text_output_has_tables()
{
    let tmp = util::make_repo_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "--no-color", "scan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected for analysis"))
        .stdout(predicate::str::contains("src/main.py"))
        .stdout(predicate::str::contains("source_code"));
}

#[test]
fn scan_of_empty_tree_succeeds()
{
    let tmp = util::make_empty_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "scan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No analyzable files found."));
}

#[test]
fn unknown_source_is_an_error()
{
    let tmp = util::make_empty_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "scan", "no such thing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
