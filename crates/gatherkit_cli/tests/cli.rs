use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_text(path: &Path, txt: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, txt).expect("write text");
}

fn gatherkit() -> Command {
    let mut cmd = Command::cargo_bin("gatherkit").expect("binary");
    cmd.env_remove("GATHERKIT_SOURCE")
        .env_remove("GATHERKIT_DESTINATION")
        .env_remove("GATHERKIT_SUFFIX")
        .env_remove("GATHERKIT_LOG");
    cmd
}

#[test]
fn gathers_opf_files_and_prints_one_line_per_match() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write_text(&src.join("a/1.opf"), "first");
    write_text(&src.join("a/b/1.opf"), "second");
    write_text(&src.join("c/2.txt"), "text");

    gatherkit()
        .arg("--source")
        .arg(&src)
        .arg("--destination")
        .arg(&dst)
        .arg("--no-prompt")
        .assert()
        .success()
        .stdout(predicate::str::contains("copied: a/1.opf"))
        .stdout(predicate::str::contains("renamed: a/b/1.opf -> 1 (1).opf"))
        .stdout(predicate::str::contains(
            "[GATHER] matched=2 copied=2 renamed=1 skipped=0 failed=0",
        ))
        .stdout(predicate::str::ends_with("Done\n"));

    assert_eq!(std::fs::read_to_string(dst.join("1.opf")).expect("read"), "first");
    assert_eq!(
        std::fs::read_to_string(dst.join("1 (1).opf")).expect("read"),
        "second"
    );
    assert!(!dst.join("2.txt").exists());
}

#[test]
fn rerun_reports_duplicates_as_skipped() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write_text(&src.join("a/1.opf"), "same");
    write_text(&dst.join("1.opf"), "same");

    gatherkit()
        .args(["--no-prompt", "-s"])
        .arg(&src)
        .arg("-d")
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped (identical to 1.opf): a/1.opf"))
        .stdout(predicate::str::contains("matched=1 copied=0 renamed=0 skipped=1 failed=0"));
}

#[test]
fn missing_source_fails_without_touching_destination() {
    let tmp = TempDir::new().expect("tempdir");
    let dst = tmp.path().join("dst");

    gatherkit()
        .arg("--source")
        .arg(tmp.path().join("missing"))
        .arg("--destination")
        .arg(&dst)
        .arg("--no-prompt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source does not exist"));

    assert!(!dst.exists());
}

#[test]
fn no_prompt_requires_both_folders() {
    gatherkit()
        .arg("--no-prompt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing --source"));
}

#[test]
fn prompts_for_missing_destination() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write_text(&src.join("x.csv"), "x");

    gatherkit()
        .arg("--source")
        .arg(&src)
        .args(["--suffix", ".csv"])
        .write_stdin(format!("{}\n", dst.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Choose folder to copy found .csv files into"))
        .stdout(predicate::str::contains("copied: x.csv"));

    assert!(dst.join("x.csv").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write_text(&src.join("1.opf"), "x");

    gatherkit()
        .arg("--source")
        .arg(&src)
        .arg("--destination")
        .arg(&dst)
        .args(["--no-prompt", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would copy: 1.opf -> 1.opf"));

    assert!(!dst.exists());
}
