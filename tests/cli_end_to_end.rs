use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::NamedTempFile;

fn message_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write message");
    file
}

fn chatmark() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatmark"));
    cmd.env_remove("CHATMARK_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn render_reads_file_and_typesets_math() {
    let message = message_file("**hi** $x^2$ [out](https://example.org/)");

    let assert = chatmark()
        .arg("render")
        .arg("--document-url")
        .arg("https://chat.example.com/")
        .arg(message.path())
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("<strong>hi</strong>"));
    assert!(output.contains(r#"data-math-rendered="inline""#));
    assert!(output.contains(r#"rel="noopener noreferrer""#));
}

#[test]
fn render_reads_standard_input_by_default() {
    chatmark()
        .write_stdin("<script>alert(1)</script>plain")
        .assert()
        .success()
        .stdout(contains("plain"))
        .stdout(predicate::str::contains("<script").not());
}

#[test]
fn literal_mode_flag_disables_markdown() {
    chatmark()
        .args(["render", "--markdown", "false"])
        .write_stdin("**x**")
        .assert()
        .success()
        .stdout(contains("**x**"));
}

#[test]
fn theme_css_prints_stylesheet() {
    chatmark()
        .args(["theme-css", "InspiredGitHub"])
        .assert()
        .success()
        .stdout(contains(".syntax-"));
}

#[test]
fn unknown_theme_fails() {
    chatmark()
        .args(["theme-css", "no-such-theme"])
        .assert()
        .failure()
        .stderr(contains("no-such-theme"));
}

#[test]
fn invalid_document_url_fails_fast() {
    chatmark()
        .args(["render", "--document-url", "not a url"])
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(contains("render.document_url"));
}
