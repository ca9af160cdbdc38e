use std::{fs, path::Path, process::Command};

fn precache(cwd: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_precache"))
        .current_dir(cwd)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let dist = dir.path().join("dist");
    fs::create_dir_all(dist.join("assets")).unwrap();
    fs::write(dist.join("index.html"), "<html></html>").unwrap();
    fs::write(dist.join("assets/index.js"), "let a = 1;").unwrap();
    fs::write(dist.join("assets/index.css"), "p{}").unwrap();
    fs::write(dist.join("favicon.ico"), [1u8; 4]).unwrap();
    dir
}

#[test]
fn generates_worker_in_dist() {
    let dir = site();
    let output = precache(dir.path());
    assert!(output.status.success());
    let sw = dir.path().join("dist/sw.js");
    assert!(sw.is_file());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Generated "));
    assert!(stdout.contains("dist/sw.js, which will precache 3 files, totaling 26 bytes."));

    let contents = fs::read_to_string(sw).unwrap();
    assert!(contents.contains("keck-mb-parts-exchange-manager-precache-v2"));
    assert!(contents.contains("\"url\": \"assets/index.js\""));
    assert!(!contents.contains("favicon.ico"));
}

#[test]
fn second_run_is_identical() {
    let dir = site();
    assert!(precache(dir.path()).status.success());
    let first = fs::read(dir.path().join("dist/sw.js")).unwrap();
    let output = precache(dir.path());
    assert!(output.status.success());
    let second = fs::read(dir.path().join("dist/sw.js")).unwrap();
    assert_eq!(first, second);
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("precache 3 files"));
}

#[test]
fn missing_dist_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = precache(dir.path());
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!dir.path().join("dist/sw.js").exists());
}

#[test]
fn dist_without_matches_warns_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let dist = dir.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    fs::write(dist.join("banner.png"), [7u8; 32]).unwrap();

    let output = precache(dir.path());
    assert!(output.status.success());
    assert!(dist.join("sw.js").is_file());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let warnings: Vec<_> = stderr
        .lines()
        .filter(|line| line.starts_with("One of the glob patterns doesn't match any files"))
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("**/*.{html,js,css}"));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("which will precache 0 files, totaling 0 bytes."));
}
