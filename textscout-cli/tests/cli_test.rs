use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn create_test_files(dir: &TempDir, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file_path, content)?;
    }
    Ok(())
}

/// The binary, isolated from any user or working-directory configuration
fn textscout(dir: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("textscout")?;
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_search_lists_matching_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("a.log", "first\nerror: disk full\n"),
            ("b.log", "all good\n"),
            ("c.txt", "error in a text file\n"),
            ("nested/d.log", "another error\n"),
        ],
    )?;

    textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "error"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.log"))
        .stdout(predicate::str::contains("d.log"))
        .stdout(predicate::str::contains("b.log").not())
        .stdout(predicate::str::contains("c.txt").not());
    Ok(())
}

#[test]
fn test_search_prints_tree() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("x/b.log", "needle\n"),
            ("x/y/a.log", "needle\n"),
            ("z/c.log", "nothing\n"),
        ],
    )?;

    textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "needle", "--tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  x/\n    b.log\n    y/\n      a.log\n"))
        .stdout(predicate::str::contains("z/").not());
    Ok(())
}

#[test]
fn test_search_json_output() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", "needle\n"), ("b.log", "hay\n")])?;

    let output = textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "needle", "--json", "--tree"])
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let matches = value["matches"].as_array().expect("matches array");
    assert_eq!(matches.len(), 1);
    assert!(matches[0]["path"]
        .as_str()
        .expect("path string")
        .ends_with("a.log"));
    assert_eq!(value["stats"]["files_submitted"], 2);
    assert_eq!(value["tree"]["children"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn test_search_stats() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", "needle\n"), ("b.log", "hay\n")])?;

    textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "needle", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Found 1 matching files out of 2 candidates",
        ));
    Ok(())
}

#[test]
fn test_search_rejects_invalid_requests() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", "needle\n")])?;

    textscout(dir.path())?
        .args(["search", ".", "-e", ".log", "-q", "needle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Extension is incorrect"));

    textscout(dir.path())?
        .args(["search", "missing", "-e", "log", "-q", "needle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Root folder"));

    textscout(dir.path())?
        .args(["search", ".", "-e", "log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Search text must not be empty"));
    Ok(())
}

#[test]
fn test_search_reads_config_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("logs/a.log", "needle\n"),
            ("logs/archive/b.log", "needle\n"),
        ],
    )?;
    let config_path = dir.path().join("custom.yaml");
    fs::write(
        &config_path,
        "extension: \"log\"\nquery: \"needle\"\nignore_patterns:\n  - \"archive/**\"\n",
    )?;

    textscout(dir.path())?
        .args(["search", "logs", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.log"))
        .stdout(predicate::str::contains("b.log").not());
    Ok(())
}

#[test]
fn test_show_renders_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", "one error\r\ntwo\rthree")])?;

    textscout(dir.path())?
        .args(["show", "a.log", "-q", "error"])
        .assert()
        .success()
        .stdout("one error\ntwo\nthree\n");
    Ok(())
}

#[test]
fn test_show_absent_query() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", "nothing to see\n")])?;

    textscout(dir.path())?
        .args(["show", "a.log", "-q", "error"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("No occurrences of 'error'"));
    Ok(())
}

#[test]
fn test_show_rejects_directory() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("sub/a.log", "error\n")])?;

    textscout(dir.path())?
        .args(["show", "sub", "-q", "error"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a readable regular file"));
    Ok(())
}

#[test]
fn test_show_undecodable_file() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bad.log"), b"error \xff\xfe here\n")?;

    textscout(dir.path())?
        .args(["show", "bad.log", "-q", "error"])
        .assert()
        .failure();

    textscout(dir.path())?
        .args(["show", "bad.log", "-q", "error", "--encoding", "lossy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("error \u{FFFD}\u{FFFD} here"));
    Ok(())
}

#[test]
fn test_search_flag_overrides_config_file() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.log"), b"hit \xff\n")?;
    fs::write(dir.path().join("b.log"), "hit\n")?;
    let config_path = dir.path().join("custom.yaml");
    fs::write(&config_path, "encoding_mode: \"lossy\"\nthread_count: 1\n")?;

    // The file value applies while the flag is absent
    textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "hit", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.log"))
        .stdout(predicate::str::contains("b.log"));

    // An explicit flag wins even when it names the default
    textscout(dir.path())?
        .args(["search", ".", "-e", "log", "-q", "hit", "--encoding", "skip", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.log").not())
        .stdout(predicate::str::contains("b.log"));
    Ok(())
}
