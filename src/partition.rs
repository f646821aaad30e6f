//! Splits a flat directory of files into subdirectories by filename pattern.
//!
//! The whole mapping from source to destination is planned and validated
//! before anything is copied or moved: colliding destinations and existing
//! files abort the run with nothing touched.

use crate::dir_list::{DirListError, list_files};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// `<collection>-<number>` followed by `-` or `_`, any stem, and an extension.
pub const PARTITION_PATTERN: &str = r"^([a-z]+?)-(\d+?)[-_][^.]+?\.\S+?$";

/// Directory for files the pattern does not match.
pub const EXTRA_DIR: &str = "extra";

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("{0}")]
    Config(String),
    #[error("Duplicate filenames detected: {}", format_groups(.0))]
    Duplicates(Vec<Vec<PathBuf>>),
    #[error("Destination files already exist: {}", format_paths(.0))]
    Clobbering(Vec<PathBuf>),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Failed to {action} {source_path} to {destination}: {error}")]
    Transfer {
        action: &'static str,
        source_path: PathBuf,
        destination: PathBuf,
        error: std::io::Error,
    },
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_groups(groups: &[Vec<PathBuf>]) -> String {
    groups
        .iter()
        .map(|g| format!("[{}]", format_paths(g)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionMode {
    /// Print the mapping only.
    #[default]
    DryRun,
    Copy,
    Move,
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PartitionMode::DryRun => "dryrun",
            PartitionMode::Copy => "copy",
            PartitionMode::Move => "move",
        })
    }
}

impl FromStr for PartitionMode {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dryrun" => Ok(PartitionMode::DryRun),
            "copy" => Ok(PartitionMode::Copy),
            "move" => Ok(PartitionMode::Move),
            other => Err(PartitionError::Config(format!("Unknown mode: {other}"))),
        }
    }
}

pub struct PartitionOptions {
    pub mode: PartitionMode,
    pub pattern: Regex,
}

impl PartitionOptions {
    pub fn new(mode: PartitionMode) -> Result<Self, PartitionError> {
        Ok(PartitionOptions {
            mode,
            pattern: Regex::new(PARTITION_PATTERN)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub filename: String,
    pub bytes: u64,
}

/// Files to partition, keyed by source path.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: BTreeMap<PathBuf, PartitionFile>,
}

impl FromIterator<(PathBuf, PartitionFile)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (PathBuf, PartitionFile)>>(iter: I) -> Self {
        FileSet {
            files: iter.into_iter().collect(),
        }
    }
}

impl FileSet {
    /// Every non-hidden file below `root`.
    pub fn from_filesystem(root: &Path) -> Result<Self, PartitionError> {
        let set: FileSet = list_files(root)?
            .into_iter()
            .map(|entry| {
                let filename = entry
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (
                    entry.path,
                    PartitionFile {
                        filename,
                        bytes: entry.size,
                    },
                )
            })
            .collect();
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.files.values().map(|f| f.bytes).sum()
    }

    /// Maps each source path to `destination/<group>/<filename>`.
    ///
    /// The group is `<first capture>-<second capture>` of `pattern`, or
    /// [`EXTRA_DIR`] when the filename does not match.
    pub fn partition_by(&self, pattern: &Regex, destination: &Path) -> BTreeMap<PathBuf, PathBuf> {
        self.files
            .iter()
            .map(|(path, file)| {
                let group = match pattern.captures(&file.filename) {
                    Some(c) => format!(
                        "{}-{}",
                        c.get(1).map_or("", |m| m.as_str()),
                        c.get(2).map_or("", |m| m.as_str())
                    ),
                    None => EXTRA_DIR.to_string(),
                };
                (path.clone(), destination.join(group).join(&file.filename))
            })
            .collect()
    }
}

/// Source must be a directory; destination must be absent or empty.
pub fn check_args(source: &Path, destination: &Path) -> Result<(), PartitionError> {
    if !source.is_dir() {
        return Err(PartitionError::Config(format!(
            "Source directory not found: {}",
            source.display()
        )));
    }

    if destination.is_dir() {
        let mut entries = std::fs::read_dir(destination).map_err(|e| {
            PartitionError::Config(format!("Cannot read {}: {e}", destination.display()))
        })?;
        if entries.next().is_some() {
            return Err(PartitionError::Config(format!(
                "Destination directory is not empty: {}",
                destination.display()
            )));
        }
    } else if destination.exists() {
        return Err(PartitionError::Config(format!(
            "Destination is not a directory: {}",
            destination.display()
        )));
    }

    Ok(())
}

/// Groups of source paths that map to the same destination. Empty when all
/// destinations are unique.
pub fn has_duplicates(mapping: &BTreeMap<PathBuf, PathBuf>) -> Vec<Vec<PathBuf>> {
    let mut by_destination: BTreeMap<&Path, Vec<PathBuf>> = BTreeMap::new();
    for (source, destination) in mapping {
        by_destination
            .entry(destination.as_path())
            .or_default()
            .push(source.clone());
    }
    by_destination
        .into_values()
        .filter(|sources| sources.len() > 1)
        .collect()
}

/// Destinations that already exist on disk.
pub fn clobbered(mapping: &BTreeMap<PathBuf, PathBuf>) -> Vec<PathBuf> {
    mapping
        .values()
        .filter(|d| d.exists())
        .cloned()
        .collect()
}

#[derive(Debug)]
pub struct PartitionPlan {
    pub mode: PartitionMode,
    pub files: usize,
    pub bytes: u64,
    pub mapping: BTreeMap<PathBuf, PathBuf>,
}

/// Plans the partition of `source` into `destination` and, unless dry running,
/// carries it out.
pub fn partition(
    source: &Path,
    destination: &Path,
    options: &PartitionOptions,
) -> Result<PartitionPlan, PartitionError> {
    check_args(source, destination)?;

    let fileset = FileSet::from_filesystem(source)?;
    info!(
        "Analyzing files: {} files, {} bytes",
        fileset.len(),
        fileset.bytes()
    );
    if fileset.is_empty() {
        warn!("Nothing to partition in {}", source.display());
    }

    let mapping = fileset.partition_by(&options.pattern, destination);

    let duplicates = has_duplicates(&mapping);
    if !duplicates.is_empty() {
        return Err(PartitionError::Duplicates(duplicates));
    }
    let existing = clobbered(&mapping);
    if !existing.is_empty() {
        return Err(PartitionError::Clobbering(existing));
    }
    info!("Destination paths are all unique");

    if options.mode != PartitionMode::DryRun {
        let total = mapping.len();
        for (n, (from, to)) in mapping.iter().enumerate() {
            transfer(from, to, options.mode)?;
            info!("Partitioned {}/{} files", n + 1, total);
        }
    }

    Ok(PartitionPlan {
        mode: options.mode,
        files: fileset.len(),
        bytes: fileset.bytes(),
        mapping,
    })
}

fn transfer(from: &Path, to: &Path, mode: PartitionMode) -> Result<(), PartitionError> {
    let fail = |action: &'static str, error: std::io::Error| PartitionError::Transfer {
        action,
        source_path: from.to_path_buf(),
        destination: to.to_path_buf(),
        error,
    };

    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail("create directory for", e))?;
    }

    match mode {
        PartitionMode::DryRun => {}
        PartitionMode::Copy => {
            std::fs::copy(from, to).map_err(|e| fail("copy", e))?;
            debug!("Copied {} -> {}", from.display(), to.display());
        }
        PartitionMode::Move => {
            if let Err(e) = std::fs::rename(from, to) {
                debug!("Rename failed ({e}), copying instead");
                std::fs::copy(from, to).map_err(|e| fail("move", e))?;
                std::fs::remove_file(from).map_err(|e| fail("move", e))?;
            }
            debug!("Moved {} -> {}", from.display(), to.display());
        }
    }
    Ok(())
}
