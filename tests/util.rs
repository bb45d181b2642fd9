//! Shared test utilities for integration tests
//!
//! Builds small on-disk repositories so the binary can be driven
//! without network access.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// A small mixed-language project: source, docs, config, tests, and
/// a vendored directory that the scanner must skip.
pub fn make_repo_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/main.py")
        .write_str(
            "#!/usr/bin/env python\n\
             import sys\n\
             from runner import run\n\
             \n\
             def main():\n    \
                 return run(sys.argv)\n",
        )
        .expect("write main.py");

    tmp.child("src/runner.py")
        .write_str("def run(args):\n    return len(args)\n")
        .expect("write runner.py");

    tmp.child("README.md")
        .write_str("# Fixture\n\nA tiny demo project.\n")
        .expect("write README.md");

    tmp.child("pyproject.toml")
        .write_str("[project]\nname = \"fixture\"\n")
        .expect("write pyproject.toml");

    tmp.child("tests/test_app.py")
        .write_str("def test_run():\n    assert True\n")
        .expect("write test_app.py");

    tmp.child("node_modules/left-pad/index.js")
        .write_str("module.exports = () => {};\n")
        .expect("write vendored js");

    tmp.child("assets/logo.png")
        .write_binary(&[0x89, 0x50, 0x4e, 0x47])
        .expect("write png");

    tmp
}

/// A tree with nothing the scanner understands
pub fn make_empty_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("Makefile")
        .write_str("all:\n\techo hi\n")
        .expect("write Makefile");
    tmp
}
