//! Recursive file listing for inventories.
//!
//! Walks a directory tree and collects filesystem metadata (size, mtime) for
//! every regular file below it. Hidden entries, meaning any file or directory
//! whose name begins with `.`, are pruned together with everything beneath
//! them. Symlinks are not followed and are not listed. No file content is read
//! here; hashing happens later and only for files that need it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Path relative to the listing root.
    pub relative_path: PathBuf,
    pub size: u64,
    pub mtime: SystemTime,
}

pub fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}

/// Lists every non-hidden regular file below `root`, sorted by relative path.
pub fn list_files(root: &Path) -> Result<Vec<FileEntry>, DirListError> {
    let root = std::path::absolute(root).map_err(DirListError::Io)?;

    let root_metadata = std::fs::metadata(&root).map_err(|e| io_error(&root, e))?;
    if !root_metadata.is_dir() {
        return Err(DirListError::NotADirectory(root));
    }

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    let mut entries = Vec::new();

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata().map_err(walk_error)?;
        let path = entry.into_path();
        let relative_path = path
            .strip_prefix(&root)
            .map_err(|_| DirListError::Io(std::io::Error::other("entry escaped listing root")))?
            .to_path_buf();

        entries.push(FileEntry {
            relative_path,
            size: metadata.len(),
            mtime: metadata.modified().map_err(DirListError::Io)?,
            path,
        });
    }

    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(entries)
}

fn io_error(path: &Path, e: std::io::Error) -> DirListError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(path.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}

fn walk_error(e: walkdir::Error) -> DirListError {
    let path = e.path().map(Path::to_path_buf);
    match (e.io_error().map(std::io::Error::kind), path) {
        (Some(std::io::ErrorKind::PermissionDenied), Some(path)) => {
            DirListError::PermissionDenied(path)
        }
        _ => DirListError::Io(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative_paths(entries: &[FileEntry]) -> Vec<PathBuf> {
        entries.iter().map(|e| e.relative_path.clone()).collect()
    }

    #[test]
    fn test_lists_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("file1.txt"), "content1").unwrap();
        fs::write(root.join("file2.txt"), "content2").unwrap();
        fs::create_dir(root.join("dir1")).unwrap();
        fs::write(root.join("dir1/file3.txt"), "content3").unwrap();

        let entries = list_files(root).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![
                PathBuf::from("dir1/file3.txt"),
                PathBuf::from("file1.txt"),
                PathBuf::from("file2.txt"),
            ]
        );
        assert!(entries.iter().all(|e| e.path.is_absolute()));
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let entries = list_files(temp_dir.path()).unwrap();

        assert!(entries.is_empty());
    }

    #[test]
    fn test_hidden_files_and_directories_are_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("visible.txt"), "v").unwrap();
        fs::write(root.join(".DS_Store"), "junk").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/.hidden"), "h").unwrap();
        fs::write(root.join("sub/shown.txt"), "s").unwrap();

        let entries = list_files(root).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![PathBuf::from("sub/shown.txt"), PathBuf::from("visible.txt")]
        );
    }

    #[test]
    fn test_hidden_root_is_still_listed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join(".staging");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();

        let entries = list_files(&root).unwrap();

        assert_eq!(relative_paths(&entries), vec![PathBuf::from("a.txt")]);
    }

    #[test]
    fn test_metadata_collection() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.txt"), "content").unwrap();

        let entries = list_files(temp_dir.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 7);
    }

    #[test]
    fn test_listing_a_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        match list_files(&file) {
            Err(DirListError::NotADirectory(_)) => {}
            other => panic!("Expected NotADirectory, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_not_listed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("target.txt"), "content").unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();

        let entries = list_files(root).unwrap();

        assert_eq!(relative_paths(&entries), vec![PathBuf::from("target.txt")]);
    }

    #[test]
    fn test_deterministic_ordering() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("zebra.txt"), "z").unwrap();
        fs::write(root.join("apple.txt"), "a").unwrap();
        fs::write(root.join("banana.txt"), "b").unwrap();

        let entries1 = list_files(root).unwrap();
        let entries2 = list_files(root).unwrap();

        assert_eq!(
            relative_paths(&entries1),
            vec![
                PathBuf::from("apple.txt"),
                PathBuf::from("banana.txt"),
                PathBuf::from("zebra.txt"),
            ]
        );
        assert_eq!(entries1, entries2);
    }

    #[test]
    fn test_missing_root() {
        match list_files(Path::new("/nonexistent/preserve/root")) {
            Err(DirListError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected NotFound IO error, got {other:?}"),
        }
    }
}
