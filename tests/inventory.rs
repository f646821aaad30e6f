mod common;

use common::{HELLO_MD5, data_lines, preserve_cmd, write_tree};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn inventory_to_stdout_lists_every_visible_file() {
    let source = TempDir::new().unwrap();
    write_tree(
        source.path(),
        &[("a.txt", "hello"), ("sub/b.txt", "world"), (".hidden", "x")],
    );

    let output = preserve_cmd(source.path())
        .args(["inventory", ".", "--batch", "b1"])
        .assert()
        .success()
        .get_output()
        .clone();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines[0],
        "BATCH,PATH,DIRECTORY,RELPATH,FILENAME,EXTENSION,BYTES,MTIME,MODDATE,MD5,ETAG,SHA1,SHA256,STORAGEPROVIDER,STORAGELOCATION"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("b1,"));
    assert!(lines[1].contains(",a.txt,a.txt,TXT,5,"));
    assert!(lines[1].contains(HELLO_MD5));
    assert!(lines[2].contains(",sub/b.txt,b.txt,TXT,5,"));
    assert!(!stdout.contains(".hidden"));
}

#[test]
fn inventory_honors_algorithm_selection_and_label() {
    let source = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-a", "md5", "-l", "DRIVE3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{HELLO_MD5},{HELLO_MD5},,,"
        )))
        .stdout(predicate::str::contains("DRIVE3"));
}

#[test]
fn inventory_rejects_unknown_algorithm() {
    let source = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-a", "md4"])
        .assert()
        .code(255)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("md4"));
}

#[test]
fn new_inventory_refuses_to_overwrite() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    let inventory = out.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert_eq!(data_lines(&inventory).len(), 1);

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .code(255)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn resume_only_adds_new_files() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    let inventory = out.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .success();
    let first_row = data_lines(&inventory)[0].clone();

    write_tree(source.path(), &[("b.txt", "world")]);

    preserve_cmd(source.path())
        .args(["-v", "inventory", ".", "-b", "b2", "-e"])
        .arg(&inventory)
        .assert()
        .success()
        .stderr(predicate::str::contains("1 files already recorded"))
        .stderr(predicate::str::contains("1 files added, 1 already recorded"));

    let rows = data_lines(&inventory);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], first_row);
    assert!(rows[1].starts_with("b2,"));
    assert!(rows[1].contains(",b.txt,b.txt,"));
}

#[test]
fn resume_of_complete_inventory_changes_nothing() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    let inventory = out.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .success();
    let before = fs::read_to_string(&inventory).unwrap();

    preserve_cmd(source.path())
        .args(["-v", "inventory", ".", "-b", "b1", "-e"])
        .arg(&inventory)
        .assert()
        .success()
        .stderr(predicate::str::contains("Inventory already complete"));

    assert_eq!(fs::read_to_string(&inventory).unwrap(), before);
}

#[test]
fn resume_recovers_from_truncated_last_row() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello"), ("b.txt", "world")]);
    let inventory = out.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .success();
    let complete = data_lines(&inventory);

    let content = fs::read_to_string(&inventory).unwrap();
    let cut = content.trim_end().len() - 20;
    fs::write(&inventory, &content[..cut]).unwrap();

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-e"])
        .arg(&inventory)
        .assert()
        .success();

    let rows = data_lines(&inventory);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], complete[0]);
    assert!(rows[1].contains(",b.txt,b.txt,"));
}

#[test]
fn resume_fails_when_recorded_file_is_gone() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello"), ("b.txt", "world")]);
    let inventory = out.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o"])
        .arg(&inventory)
        .assert()
        .success();
    let before = fs::read_to_string(&inventory).unwrap();

    fs::remove_file(source.path().join("b.txt")).unwrap();

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-e"])
        .arg(&inventory)
        .assert()
        .code(255)
        .stderr(predicate::str::contains("no longer present"));

    assert_eq!(fs::read_to_string(&inventory).unwrap(), before);
}

#[test]
fn resume_requires_existing_inventory() {
    let source = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-e", "missing.csv"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn resume_rejects_foreign_csv() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    let foreign = out.path().join("export.csv");
    fs::write(&foreign, "Filename,Bytes\na.txt,5\n").unwrap();

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-e"])
        .arg(&foreign)
        .assert()
        .code(255)
        .stderr(predicate::str::contains("not usable for resuming"));
}

#[test]
fn output_inside_inventoried_directory_is_not_listed() {
    let source = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    let inventory = source.path().join("inv.csv");

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-o", "inv.csv"])
        .assert()
        .success();

    let rows = data_lines(&inventory);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains(",a.txt,a.txt,"));
}

#[test]
fn mtime_column_records_seconds_since_epoch() {
    use filetime::{FileTime, set_file_mtime};

    let source = TempDir::new().unwrap();
    write_tree(source.path(), &[("a.txt", "hello")]);
    set_file_mtime(
        source.path().join("a.txt"),
        FileTime::from_unix_time(1_700_000_000, 0),
    )
    .unwrap();

    preserve_cmd(source.path())
        .args(["inventory", ".", "-b", "b1", "-a", "md5"])
        .assert()
        .success()
        .stdout(predicate::str::contains(",a.txt,TXT,5,1700000000,2023-11-"));
}
