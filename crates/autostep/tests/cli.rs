use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const RECORDING: &str = r#"{
  "screen_width": 1000,
  "screen_height": 1000,
  "events": [
    { "type": "mouse_move", "time": 0.0, "nx": 0.5, "ny": 0.5 },
    { "type": "mouse_click", "time": 0.01, "nx": 0.5, "ny": 0.5, "button": "left", "pressed": true },
    { "type": "mouse_click", "time": 0.02, "nx": 0.5, "ny": 0.5, "button": "left", "pressed": false },
    { "type": "key_press", "time": 0.03, "key": "a" },
    { "type": "key_release", "time": 0.04, "key": "a" }
  ]
}"#;

fn autostep(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autostep"))
        .arg("--dir")
        .arg(dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .output()
        .expect("run autostep")
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

fn with_recording() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("demo.json"), RECORDING).unwrap();
    dir
}

#[test]
fn list_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = autostep(dir.path(), &["list"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("No recordings saved."));
}

#[test]
fn list_and_show() {
    let dir = with_recording();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let out = autostep(dir.path(), &["list"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "demo.json");

    let out = autostep(dir.path(), &["show", "demo.json", "--all"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Screen: 1000x1000"));
    assert!(text.contains("Events: 5"));
    assert!(text.contains("Clicks: 2"));
    assert!(text.contains(r#""type":"key_press""#));
}

#[test]
fn dry_run_scales_and_finishes() {
    let dir = with_recording();
    let out = autostep(
        dir.path(),
        &[
            "play", "demo.json", "--dry-run", "--yes", "--countdown", "0", "--repeat", "2",
            "--delay", "0", "--screen", "2000x1000",
        ],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Cycle 2/2"));
    assert!(text.contains("Done!"));
    assert!(text.contains("2 moves, 4 clicks, 4 keys, 0 failed, 2/2 cycles"));
}

#[test]
fn declined_mismatch_cancels() {
    let dir = with_recording();
    let out = autostep(
        dir.path(),
        &["play", "demo.json", "--dry-run", "--countdown", "0", "--screen", "800x600"],
    );
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Recorded at 1000x1000 but this screen is 800x600"));
    assert!(text.contains("Playback cancelled."));
    assert!(!text.contains("Done!"));
}

#[test]
fn bad_options_rejected() {
    let dir = with_recording();
    let out = autostep(dir.path(), &["play", "demo.json", "--dry-run", "--repeat", "0"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("InvalidParameter"));
}

#[test]
fn malformed_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), r#"{"screen_width": 10, "screen_height": 10}"#).unwrap();
    let out = autostep(dir.path(), &["show", "broken.json"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("MalformedRecording"));
}

#[test]
fn delete_removes_file() {
    let dir = with_recording();
    let out = autostep(dir.path(), &["delete", "demo.json"]);
    assert!(out.status.success());
    assert!(!dir.path().join("demo.json").exists());

    let out = autostep(dir.path(), &["delete", "demo.json"]);
    assert!(!out.status.success());
}

#[cfg(not(feature = "native"))]
#[test]
fn real_backends_need_native_feature() {
    let dir = with_recording();
    for args in [&["record", "--countdown", "0"][..], &["play", "demo.json", "--countdown", "0"][..]] {
        let out = autostep(dir.path(), args);
        assert!(!out.status.success());
        let err = stderr(&out);
        assert!(err.contains("Unsupported"), "{}", err);
        assert!(err.contains("native"));
    }
}

#[test]
fn playback_outcome_is_logged() {
    let dir = with_recording();
    let out = Command::new(env!("CARGO_BIN_EXE_autostep"))
        .arg("--dir")
        .arg(dir.path())
        .args(["play", "demo.json", "--dry-run", "--countdown", "0"])
        .env("RUST_LOG", "autostep=info")
        .stdin(Stdio::null())
        .output()
        .expect("run autostep");
    assert!(out.status.success());
    assert!(stderr(&out).contains("playback ended"));
}
