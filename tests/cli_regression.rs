// CLI regression tests: rewritten output on stdout, miette diagnostics on stderr.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("namespacer-cli-{}-{}", std::process::id(), name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn namespacer() -> Command {
    Command::cargo_bin("namespacer").unwrap()
}

#[test]
fn expand_prints_rewritten_forms() {
    let dir = scratch_dir("expand");
    let file = dir.join("lib.el");
    fs::write(&file, "(define-namespace foo- (defvar bar 1) (defun baz () bar))\n(message \"done\")").unwrap();

    namespacer()
        .arg("expand")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("(progn (defvar foo-bar 1) (defun foo-baz () foo-bar))"))
        .stdout(contains("(message \"done\")"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn expand_trace_shows_a_diff() {
    let dir = scratch_dir("trace");
    let file = dir.join("lib.el");
    fs::write(&file, "(define-namespace foo- (defvar bar 1))").unwrap();

    namespacer()
        .args(["expand", "--trace"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("--- Form 0 ---"))
        .stdout(contains("-(define-namespace foo- (defvar bar 1))"))
        .stdout(contains("+(progn (defvar foo-bar 1))"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn rewrite_treats_the_file_as_one_namespace() {
    let dir = scratch_dir("rewrite");
    let file = dir.join("body.el");
    fs::write(&file, "(let ((x 1)) x)").unwrap();

    namespacer()
        .args(["rewrite", "--prefix", "foo-", "--let-vars"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("(progn (let ((foo-x 1)) foo-x))"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn env_and_prelude_seed_the_host() {
    let dir = scratch_dir("env");
    let env = dir.join("env.yaml");
    let prelude = dir.join("prelude.el");
    let file = dir.join("body.el");
    fs::write(&env, "variables:\n  - foo-count\n").unwrap();
    fs::write(&prelude, "(defun foo-helper () nil)").unwrap();
    fs::write(&file, "(helper count)").unwrap();

    namespacer()
        .args(["rewrite", "--prefix", "foo-", "--env"])
        .arg(&env)
        .arg("--prelude")
        .arg(&prelude)
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("(progn (foo-helper foo-count))"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parse_errors_are_rendered_with_miette() {
    let dir = scratch_dir("parse");
    let file = dir.join("bad.el");
    fs::write(&file, "(define-namespace foo- (defvar x 42)").unwrap();

    namespacer()
        .arg("expand")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("namespacer::parse").or(contains("Parse error")));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_namespace_option_fails() {
    let dir = scratch_dir("option");
    let file = dir.join("lib.el");
    fs::write(&file, "(define-namespace foo- :global (defvar x 1))").unwrap();

    namespacer()
        .arg("expand")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains(":global"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_reports_failing_files() {
    let dir = scratch_dir("check");
    fs::write(dir.join("good.el"), "(define-namespace a- (defvar x 1) x)").unwrap();
    fs::write(dir.join("bad.el"), "(define-namespace b- (let x))").unwrap();
    fs::write(dir.join("notes.txt"), "(not lisp").unwrap();

    namespacer()
        .arg("check")
        .arg(&dir)
        .assert()
        .failure()
        .stdout(contains("checked 2 file(s), 1 failed"))
        .stderr(contains("namespacer::malformedform").or(contains("Malformed form")));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_passes_on_clean_sources() {
    let dir = scratch_dir("clean");
    fs::write(dir.join("good.el"), "(define-namespace a- (defvar x 1) x)").unwrap();

    namespacer()
        .arg("check")
        .arg(&dir)
        .assert()
        .success()
        .stdout(contains("checked 1 file(s), 0 failed"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_is_an_io_error() {
    namespacer()
        .args(["expand", "/nonexistent/namespacer/input.el"])
        .assert()
        .failure()
        .stderr(contains("Failed to read"));
}
