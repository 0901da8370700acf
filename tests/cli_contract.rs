use std::fs;
use std::path::Path;
use std::process::Command;

use image::{Rgba, RgbaImage};
use serde_json::Value;
use tempfile::tempdir;

fn write_tape(path: &Path, yaml: &str) {
    fs::write(path, yaml).expect("tape should write");
}

fn write_banner(path: &Path) {
    let mut banner = RgbaImage::from_pixel(12, 3, Rgba([255, 255, 255, 255]));
    for x in (0..12).step_by(3) {
        banner.put_pixel(x, 1, Rgba([0, 0, 0, 255]));
    }
    banner.save(path).expect("banner should write");
}

fn run_ledgif(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ledgif"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("ledgif command should run")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

#[test]
fn render_then_list_frames() {
    let dir = tempdir().expect("tempdir should create");
    write_banner(&dir.path().join("banner.png"));
    write_tape(
        &dir.path().join("tape.yaml"),
        r#"
columns: 4
rows: 3
fragments:
  - image: banner.png
    duration: 40
"#,
    );

    let render = run_ledgif(dir.path(), &["render", "tape.yaml", "-o", "out.gif", "--quiet"]);
    assert!(
        render.status.success(),
        "render should succeed: {}",
        String::from_utf8_lossy(&render.stderr)
    );
    assert!(dir.path().join("out.gif").is_file());

    let frames = run_ledgif(dir.path(), &["frames", "out.gif", "--json"]);
    assert!(frames.status.success(), "frames should succeed");
    let listing = stdout_json(&frames);
    assert_eq!(listing["width"], 25);
    assert_eq!(listing["height"], 22);
    let delays = listing["delays_ms"].as_array().expect("delays array");
    assert_eq!(delays.len(), 8);
    assert!(delays.iter().all(|delay| delay == 40));

    write_tape(
        &dir.path().join("reuse.yaml"),
        "columns: 4\nrows: 3\nloop: 1\nfragments:\n  - gif: out.gif\n    speed: 2\n",
    );
    let check = run_ledgif(dir.path(), &["check", "reuse.yaml", "--json"]);
    assert!(check.status.success(), "check should succeed");
    let summary = stdout_json(&check);
    assert_eq!(summary["fragments"], 1);
    assert_eq!(summary["frames"], 4);
    assert_eq!(summary["loop"], 1);
}

#[test]
fn progress_bar_is_drawn_on_stderr() {
    let dir = tempdir().expect("tempdir should create");
    write_banner(&dir.path().join("banner.png"));
    write_tape(
        &dir.path().join("tape.yaml"),
        "columns: 4\nrows: 3\nfragments:\n  - image: banner.png\n    direction: none\n",
    );

    let render = run_ledgif(dir.path(), &["render", "tape.yaml", "-o", "one.gif"]);
    assert!(render.status.success(), "render should succeed");
    let stderr = String::from_utf8_lossy(&render.stderr);
    assert!(stderr.contains("[1/1 frames][100%]"), "{stderr}");
    assert!(stderr.contains("[one.gif]"), "{stderr}");
    assert!(String::from_utf8_lossy(&render.stdout).contains("Wrote one.gif"));
}

#[test]
fn json_failures_carry_stable_codes() {
    let dir = tempdir().expect("tempdir should create");
    write_banner(&dir.path().join("banner.png"));
    write_tape(
        &dir.path().join("big.yaml"),
        "columns: 20\nrows: 3\nfragments:\n  - image: banner.png\n",
    );

    let render = run_ledgif(dir.path(), &["render", "big.yaml", "-o", "out.gif", "--json"]);
    assert_eq!(render.status.code(), Some(1));
    let envelope = stdout_json(&render);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"]["code"], "SIZE_MISMATCH");
    assert!(!dir.path().join("out.gif").exists());

    let frames = run_ledgif(dir.path(), &["frames", "banner.png", "--json"]);
    assert_eq!(frames.status.code(), Some(1));
    assert_eq!(stdout_json(&frames)["error"]["code"], "TYPE_MISMATCH");

    write_tape(&dir.path().join("empty.yaml"), "fragments: []\n");
    let check = run_ledgif(dir.path(), &["check", "empty.yaml", "--json"]);
    assert_eq!(check.status.code(), Some(1));
    assert_eq!(stdout_json(&check)["error"]["code"], "EMPTY_DOCUMENT");
}

#[test]
fn text_command_requires_a_readable_font() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_ledgif(
        dir.path(),
        &["text", "HI", "-o", "hi.gif", "--font", "missing.ttf", "--json"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["error"]["code"], "IO");
}
