mod common;

use common::{HELLO_MD5, preserve_cmd, write_tree};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const WORLD_MD5: &str = "7d793037a0760186574b0282f2f435e7";

fn inventoried_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("one.txt", "hello"), ("sub/two.txt", "world")]);
    temp
}

#[test]
fn complete_bag_directory_checks_clean() {
    let files = inventoried_tree();
    let bag = TempDir::new().unwrap();
    fs::write(
        bag.path().join("manifest-md5.txt"),
        format!("{HELLO_MD5}  data/one.txt\n{WORLD_MD5}  data/sub/two.txt\n"),
    )
    .unwrap();

    preserve_cmd(files.path())
        .args(["bagcheck", "-i", "."])
        .arg("-b")
        .arg(bag.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Aligned by stripping 1 leading segment(s) from bag paths (2 matched, md5)",
        ))
        .stdout(predicate::str::contains("Success"));
}

#[test]
fn incomplete_bag_lists_missing_and_extra() {
    let files = inventoried_tree();
    let bag = TempDir::new().unwrap();
    fs::write(
        bag.path().join("manifest-md5.txt"),
        format!("{HELLO_MD5}  data/one.txt\n{WORLD_MD5}  data/sub/other.txt\n"),
    )
    .unwrap();

    preserve_cmd(files.path())
        .args(["bagcheck", "-i", "."])
        .arg("-b")
        .arg(bag.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing from bag: 1"))
        .stdout(predicate::str::contains(format!("  {WORLD_MD5}  sub/two.txt")))
        .stdout(predicate::str::contains("Extra in bag: 1"))
        .stdout(predicate::str::contains(format!("  {WORLD_MD5}  sub/other.txt")))
        .stdout(predicate::str::contains("Possible problems found"));
}

#[test]
fn bag_without_manifest_is_an_error() {
    let files = inventoried_tree();
    let bag = TempDir::new().unwrap();

    preserve_cmd(files.path())
        .args(["bagcheck", "-i", "."])
        .arg("-b")
        .arg(bag.path())
        .assert()
        .code(255)
        .stderr(predicate::str::contains("No manifest-sha256.txt or manifest-md5.txt"));
}

#[test]
fn plain_file_is_not_a_bag() {
    let files = inventoried_tree();
    let out = TempDir::new().unwrap();
    let bogus = out.path().join("bag.zip");
    fs::write(&bogus, "PK not a tar archive at all").unwrap();

    preserve_cmd(files.path())
        .args(["bagcheck", "-i", "."])
        .arg("-b")
        .arg(&bogus)
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Not a bag directory or tar archive"));
}

#[test]
fn md5_inventory_checks_against_md5_manifest_of_dual_manifest_bag() {
    let files = inventoried_tree();
    let out = TempDir::new().unwrap();
    let inventory = out.path().join("inv.csv");

    preserve_cmd(files.path())
        .args(["inventory", ".", "-b", "b1", "-a", "md5", "-o"])
        .arg(&inventory)
        .assert()
        .success();

    let bag = TempDir::new().unwrap();
    fs::write(
        bag.path().join("manifest-sha256.txt"),
        format!(
            "{}  data/one.txt\n{}  data/sub/two.txt\n",
            "a".repeat(64),
            "b".repeat(64)
        ),
    )
    .unwrap();
    fs::write(
        bag.path().join("manifest-md5.txt"),
        format!("{HELLO_MD5}  data/one.txt\n{WORLD_MD5}  data/sub/two.txt\n"),
    )
    .unwrap();

    preserve_cmd(files.path())
        .args(["bagcheck", "-i"])
        .arg(&inventory)
        .arg("-b")
        .arg(bag.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(2 matched, md5)"))
        .stdout(predicate::str::contains("Missing from bag: 0"))
        .stdout(predicate::str::contains("Extra in bag: 0"))
        .stdout(predicate::str::contains("Success"));
}
