use std::path::Path;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::tempdir;

fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(path)
        .expect("fixture png should save");
}

fn run_tiv(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tiv"))
        .args(args)
        .env_remove("TIV_COLORS")
        .env_remove("TIV_USE_UPPER_BLOCK")
        .output()
        .expect("tiv should run")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn renders_a_png_to_stdout() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("red.png");
    write_png(&path, 4, 4, [255, 0, 0, 255]);

    let output = run_tiv(&["-g", "80x48", "-E", path.to_str().unwrap()]);
    assert!(output.status.success(), "exit code should be zero");
    assert!(contains(&output.stdout, b"\x1b[38;2;"), "true color SGR expected");
    assert!(
        contains(&output.stdout, "\u{2584}".as_bytes()),
        "half-block glyphs expected"
    );
}

#[test]
fn unloadable_file_fails_but_later_files_still_show() {
    let dir = tempdir().expect("tempdir should create");
    let good = dir.path().join("good.png");
    write_png(&good, 4, 4, [0, 255, 0, 255]);
    let missing = dir.path().join("missing.png");

    let output = run_tiv(&[
        "-g",
        "80x48",
        "-E",
        missing.to_str().unwrap(),
        good.to_str().unwrap(),
    ]);
    assert!(!output.status.success(), "a failed load must set the exit code");
    assert!(
        contains(&output.stderr, b"missing.png"),
        "the failing file should be reported"
    );
    assert!(
        contains(&output.stdout, b"\x1b[38;2;"),
        "the good file should still render"
    );
}

#[test]
fn filename_echo_precedes_the_image() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("named.png");
    write_png(&path, 2, 2, [1, 2, 3, 255]);

    let output = run_tiv(&["-g", "80x48", "-E", "-F", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(contains(&output.stdout, b"named.png"));
}

#[test]
fn malformed_geometry_is_rejected() {
    let output = run_tiv(&["-g", "banana", "whatever.png"]);
    assert!(!output.status.success());
}

#[test]
fn cursor_is_hidden_and_restored_by_default() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("tiny.png");
    write_png(&path, 2, 2, [9, 9, 9, 255]);

    let output = run_tiv(&["-g", "80x48", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(contains(&output.stdout, b"\x1b[?25l"));
    assert!(contains(&output.stdout, b"\x1b[?25h"));
}

#[test]
fn quantized_palette_env_toggle() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("blue.png");
    write_png(&path, 4, 4, [0, 0, 255, 255]);

    let output = Command::new(env!("CARGO_BIN_EXE_tiv"))
        .args(["-g", "80x48", "-E", path.to_str().unwrap()])
        .env("TIV_COLORS", "256")
        .output()
        .expect("tiv should run");
    assert!(output.status.success());
    assert!(contains(&output.stdout, b"\x1b[38;5;"));
    assert!(!contains(&output.stdout, b"38;2;"));
}
