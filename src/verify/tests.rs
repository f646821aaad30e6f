use super::*;
use crate::manifest::ManifestSource;
use std::path::PathBuf;

const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

fn asset(relpath: &str, md5: &str, bytes: u64) -> Asset {
    let mut a = Asset::new(&format!("/root/{relpath}"), relpath, bytes);
    a.digests.md5 = Some(md5.to_string());
    a
}

fn manifest(assets: Vec<Asset>) -> Manifest {
    Manifest::new(
        "/root".to_string(),
        ManifestSource::Directory,
        PathBuf::from("/root"),
        assets,
    )
    .unwrap()
}

fn sig(md5: &str, bytes: u64) -> Signature {
    Signature {
        checksum: Some(md5.to_string()),
        bytes,
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn clean_match() {
    let a = manifest(vec![asset("a/b.txt", EMPTY_MD5, 0)]);
    let b = manifest(vec![asset("a/b.txt", EMPTY_MD5, 0)]);

    let report = reconcile(&a, &b);

    assert_eq!(report.unchanged, set(&["a/b.txt"]));
    assert!(report.modified.is_empty());
    assert!(report.added.is_empty());
    assert!(report.deleted.is_empty());
    assert!(report.moved.is_empty());
    assert!(report.is_clean());
}

#[test]
fn rename_is_detected_as_move() {
    let a = manifest(vec![asset("old/name.txt", "aaa", 10)]);
    let b = manifest(vec![asset("new/name.txt", "aaa", 10)]);

    let report = reconcile(&a, &b);

    assert_eq!(
        report.moved,
        BTreeMap::from([(
            sig("aaa", 10),
            vec!["new/name.txt".to_string(), "old/name.txt".to_string()]
        )])
    );
    assert!(report.added.is_empty());
    assert!(report.deleted.is_empty());
    assert!(report.modified.is_empty());
    assert!(!report.is_clean());
}

#[test]
fn content_change_in_place_is_modified() {
    let a = manifest(vec![asset("doc.pdf", "aaa", 10)]);
    let b = manifest(vec![asset("doc.pdf", "bbb", 12)]);

    let report = reconcile(&a, &b);

    assert_eq!(
        report.modified["doc.pdf"],
        (sig("aaa", 10), sig("bbb", 12))
    );
    assert!(report.unchanged.is_empty());
}

#[test]
fn same_checksum_different_size_is_modified() {
    let a = manifest(vec![asset("x", "aaa", 1)]);
    let b = manifest(vec![asset("x", "aaa", 2)]);

    assert_eq!(reconcile(&a, &b).outcome_of("x"), Some(Outcome::Modified));
}

#[test]
fn unmatched_paths_are_added_or_deleted() {
    let a = manifest(vec![asset("gone.txt", "aaa", 1), asset("kept.txt", "kkk", 1)]);
    let b = manifest(vec![asset("kept.txt", "kkk", 1), asset("new.txt", "bbb", 1)]);

    let report = reconcile(&a, &b);

    assert_eq!(report.deleted, set(&["gone.txt"]));
    assert_eq!(report.added, set(&["new.txt"]));
    assert_eq!(report.unchanged, set(&["kept.txt"]));
}

#[test]
fn copy_of_unchanged_file_counts_as_moved() {
    // The content of `a.txt` still exists at its old path, and also at a new one.
    let a = manifest(vec![asset("a.txt", "aaa", 1)]);
    let b = manifest(vec![asset("a.txt", "aaa", 1), asset("copy/a.txt", "aaa", 1)]);

    let report = reconcile(&a, &b);

    assert_eq!(report.unchanged, set(&["a.txt"]));
    assert_eq!(report.moved[&sig("aaa", 1)], vec!["copy/a.txt".to_string()]);
}

#[test]
fn duplicate_content_within_one_side_is_allowed() {
    let a = manifest(vec![asset("one.txt", "aaa", 1), asset("two.txt", "aaa", 1)]);
    let b = manifest(vec![asset("three.txt", "aaa", 1)]);

    let report = reconcile(&a, &b);

    assert_eq!(
        report.moved[&sig("aaa", 1)],
        vec!["one.txt", "three.txt", "two.txt"]
    );
    assert_eq!(duplicate_signatures(&a), BTreeMap::from([(sig("aaa", 1), 2)]));
    assert!(duplicate_signatures(&b).is_empty());
}

#[test]
fn assets_without_checksums_are_not_moved() {
    let a = manifest(vec![Asset::new("/root/x.tif", "x.tif", 5)]);
    let b = manifest(vec![Asset::new("/root/y.tif", "y.tif", 5)]);

    let report = reconcile(&a, &b);

    assert_eq!(report.deleted, set(&["x.tif"]));
    assert_eq!(report.added, set(&["y.tif"]));
    assert!(report.moved.is_empty());
}

#[test]
fn every_path_lands_in_exactly_one_category() {
    let a = manifest(vec![
        asset("same.txt", "s", 1),
        asset("changed.txt", "c1", 1),
        asset("gone.txt", "g", 1),
        asset("before/moved.txt", "m", 1),
        asset("dup1.txt", "d", 2),
    ]);
    let b = manifest(vec![
        asset("same.txt", "s", 1),
        asset("changed.txt", "c2", 1),
        asset("new.txt", "n", 1),
        asset("after/moved.txt", "m", 1),
        asset("dup2.txt", "d", 2),
        asset("dup3.txt", "d", 2),
    ]);

    let report = reconcile(&a, &b);

    let all: BTreeSet<&str> = a
        .iter()
        .chain(b.iter())
        .map(|asset| asset.relpath.as_str())
        .collect();
    for path in &all {
        let memberships = [
            report.unchanged.contains(*path),
            report.modified.contains_key(*path),
            report.added.contains(*path),
            report.deleted.contains(*path),
            report.moved.values().flatten().any(|p| p == *path),
        ];
        assert_eq!(
            memberships.iter().filter(|m| **m).count(),
            1,
            "{path} is in {memberships:?}"
        );
    }
    assert_eq!(report.total(), all.len());
}

#[test]
fn reconciliation_is_deterministic() {
    let assets = |prefix: &str| {
        (0..50)
            .map(|i| asset(&format!("{prefix}/{i:02}.txt"), &format!("{:03}", i % 7), 1))
            .collect::<Vec<_>>()
    };
    let a = manifest(assets("a"));
    let b = manifest(assets("b"));

    assert_eq!(reconcile(&a, &b), reconcile(&a, &b));
    let first = reconcile(&a, &b);
    for paths in first.moved.values() {
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(*paths, sorted);
    }
}

#[test]
fn modes_report_independent_differences() {
    let a = manifest(vec![asset("x/a.txt", "aaa", 1), asset("x/b.txt", "bbb", 1)]);
    let b = manifest(vec![asset("y/a.txt", "aaa", 1), asset("x/b.txt", "ccc", 1)]);

    let by_checksum = compare_by_mode(&a, &b, VerifyMode::Checksums);
    let by_relpath = compare_by_mode(&a, &b, VerifyMode::Relpaths);
    let by_filename = compare_by_mode(&a, &b, VerifyMode::Filenames);

    assert_eq!(by_checksum.only_in_first, set(&["x/b.txt"]));
    assert_eq!(by_checksum.only_in_second, set(&["x/b.txt"]));
    assert_eq!(by_relpath.only_in_first, set(&["x/a.txt"]));
    assert_eq!(by_relpath.only_in_second, set(&["y/a.txt"]));
    assert!(by_filename.is_clean());
}

#[test]
fn checksum_mode_never_matches_files_without_checksums() {
    let a = manifest(vec![
        Asset::new("/root/x/a.txt", "x/a.txt", 7),
        asset("x/b.txt", "bbb", 1),
    ]);
    let b = manifest(vec![
        Asset::new("/root/y/a.txt", "y/a.txt", 7),
        asset("y/b.txt", "bbb", 1),
    ]);

    let report = compare_by_mode(&a, &b, VerifyMode::Checksums);

    assert_eq!(report.only_in_first, set(&["x/a.txt"]));
    assert_eq!(report.only_in_second, set(&["y/a.txt"]));
}

#[test]
fn verify_mode_names_round_trip() {
    for mode in [VerifyMode::Checksums, VerifyMode::Relpaths, VerifyMode::Filenames] {
        assert_eq!(mode.name().parse::<VerifyMode>().unwrap(), mode);
    }
    assert!("sizes".parse::<VerifyMode>().is_err());
}
