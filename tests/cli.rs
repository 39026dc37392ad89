use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn evoscript_run_script() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("hello.evo");
    fs::write(
        &script,
        "function greet(name) { return \"Hello, \" + name; }\nsys.writeln(greet(\"evoscript\"));\n",
    )
    .expect("write script");

    let mut cmd = Command::cargo_bin("evoscript").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello, evoscript"));
}

#[test]
fn evoscript_eval_prints_value() {
    let mut cmd = Command::cargo_bin("evoscript").expect("binary exists");
    cmd.arg("eval").arg("1 + 2;");
    cmd.assert().success().stdout(predicate::eq("3\n"));
}

#[test]
fn uncaught_exception_fails() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("throw.evo");
    fs::write(&script, "function fail() { throw new Exception(\"boom\"); }\nfail();\n")
        .expect("write script");

    let mut cmd = Command::cargo_bin("evoscript").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Uncaught Exception: boom"))
        .stderr(predicate::str::contains("    at Global::fail()"));
}

#[test]
fn syntax_error_fails() {
    let mut cmd = Command::cargo_bin("evoscript").expect("binary exists");
    cmd.arg("eval").arg("let x = (1;");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Syntax Errors detected"))
        .stderr(predicate::str::contains("Unmatched '('"));
}

#[test]
fn missing_script_reports_io_error() {
    let dir = tempdir().expect("create temp dir");
    let mut cmd = Command::cargo_bin("evoscript").expect("binary exists");
    cmd.arg("run").arg(dir.path().join("absent.evo"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::starts_with("error: "));
}
