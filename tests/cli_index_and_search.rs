use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::tempdir;

fn write_workspace(root: &std::path::Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("src").join("getUserName.rs"),
        "pub fn getUserName() -> String { String::new() }",
    )
    .unwrap();
    fs::write(root.join("src").join("config.rs"), "pub struct Config;").unwrap();
}

#[test]
fn index_then_search_finds_exact_match() {
    let dir = tempdir().expect("tempdir");
    write_workspace(dir.path());

    let mut index_cmd = cargo_bin_cmd!("codesearch");
    index_cmd
        .arg("-C")
        .arg(dir.path())
        .arg("--index-path")
        .arg(dir.path().join("index.sqlite"))
        .arg("index");
    index_cmd.assert().success();

    let mut search_cmd = cargo_bin_cmd!("codesearch");
    search_cmd
        .arg("-C")
        .arg(dir.path())
        .arg("--index-path")
        .arg(dir.path().join("index.sqlite"))
        .args(["search", "config.rs"]);
    search_cmd.assert().success().stdout(contains("config.rs"));
}

#[test]
fn search_without_prior_index_triggers_implicit_build() {
    let dir = tempdir().expect("tempdir");
    write_workspace(dir.path());

    let mut cmd = cargo_bin_cmd!("codesearch");
    cmd.arg("-C")
        .arg(dir.path())
        .arg("--index-path")
        .arg(dir.path().join("index.sqlite"))
        .args(["search", "getUserName", "--json"]);

    cmd.assert().success().stdout(contains("getUserName.rs"));
}

#[test]
fn stats_reports_nonzero_after_index() {
    let dir = tempdir().expect("tempdir");
    write_workspace(dir.path());

    let mut index_cmd = cargo_bin_cmd!("codesearch");
    index_cmd
        .arg("-C")
        .arg(dir.path())
        .arg("--index-path")
        .arg(dir.path().join("index.sqlite"))
        .arg("index");
    index_cmd.assert().success();

    let mut stats_cmd = cargo_bin_cmd!("codesearch");
    stats_cmd
        .arg("-C")
        .arg(dir.path())
        .arg("--index-path")
        .arg(dir.path().join("index.sqlite"))
        .arg("stats");
    stats_cmd.assert().success().stdout(contains("items"));
}

#[test]
fn memory_storage_flag_works_end_to_end() {
    let dir = tempdir().expect("tempdir");
    write_workspace(dir.path());

    let mut cmd = cargo_bin_cmd!("codesearch");
    cmd.arg("-C")
        .arg(dir.path())
        .args(["--storage", "memory"])
        .args(["search", "config"]);

    cmd.assert().success().stdout(contains("config.rs"));
}
