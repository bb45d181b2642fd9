// Drives `rlens analyze` against local fixtures. Nothing here reaches the
// network: dry runs never build a provider, and the failing case stops at
// provider construction.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod util;

fn rlens() -> Command
{
    let mut cmd = Command::cargo_bin("rlens").expect("bin");
    cmd.env("NO_COLOR", "1")
        .env_remove("OPENAI_API_KEY")
        .env_remove("LLM_PROVIDER")
        .env_remove("REPOLENS_LLM__PROVIDER")
        .env_remove("REPOLENS_OPENAI__API_KEY");
    cmd
}

#[test]
fn dry_run_prints_prompts_and_selection()
{
    let tmp = util::make_repo_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--dry-run", "analyze", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN: no requests will be sent to openai"))
        .stdout(predicate::str::contains(" 140  src/main.py"))
        .stdout(predicate::str::contains("Overview prompt (~"))
        .stdout(predicate::str::contains("\"primary_tech\""))
        .stdout(predicate::str::contains("Detail prompt (~"))
        // imports and comments are reduced away
        .stdout(predicate::str::contains("def main():\n    return run(sys.argv)"))
        .stdout(predicate::str::contains("import sys").not())
        .stdout(predicate::str::contains("node_modules").not());
}

#[test]
fn dry_run_honors_max_files()
{
    let tmp = util::make_repo_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--dry-run", "analyze", ".", "--max-files", "1", "--provider", "ollama"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sent to ollama"))
        .stdout(predicate::str::contains("src/main.py"))
        .stdout(predicate::str::contains("\nsrc/runner.py:\n").not());
}

#[test]
fn missing_api_key_fails_cleanly()
{
    let tmp = util::make_repo_fixture();

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "analyze", ".", "--provider", "openai"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn config_file_selects_provider()
{
    let tmp = util::make_repo_fixture();
    tmp.child("repolens.toml")
        .write_str("[llm]\nprovider = \"ollama\"\n\n[ollama]\nmodel = \"codellama:7b\"\n")
        .expect("write config");

    rlens()
        .current_dir(tmp.path())
        .args(["--dry-run", "analyze", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("sent to ollama"));
}

#[test]
fn init_writes_config_once()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "init"])
        .assert()
        .success();
    tmp.child("repolens.toml")
        .assert(predicate::str::contains("[llm]"))
        .assert(predicate::str::contains("overview_model = \"gpt-4.1-mini\""));

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    rlens()
        .current_dir(tmp.path())
        .args(["--quiet", "init", "--force"])
        .assert()
        .success();
}
