use crate::asset::Asset;
use crate::checksum::{Algorithm, ChecksumError, DEFAULT_ETAG_CHUNK_SIZE};
use crate::dir_list::{DirListError, FileEntry, list_files};
use crate::inventory_file::{self, InventoryFileError, InventoryRow, InventoryWriter, TrailingLine};
use crate::manifest::{self, ManifestError, ManifestFormat};
use crate::util::paths;
use std::collections::{BTreeMap, HashSet};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory file error: {0}")]
    InventoryFile(#[from] InventoryFileError),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Output file already exists (use --existing to resume it): {0}")]
    OutputExists(PathBuf),
    #[error("Existing inventory is not usable for resuming ({reason}): {path}")]
    MalformedManifest { path: PathBuf, reason: String },
    #[error("Existing inventory {path} lists {} file(s) no longer present", .missing.len())]
    InconsistentManifest { path: PathBuf, missing: Vec<String> },
}

pub struct InventoryOptions {
    /// Value written to the BATCH column of every new row.
    pub batch: String,
    pub algorithms: Vec<Algorithm>,
    /// Drive label for the storage columns.
    pub label: Option<String>,
    pub etag_chunk_size: u64,
}

impl InventoryOptions {
    pub fn new(batch: impl Into<String>) -> Self {
        InventoryOptions {
            batch: batch.into(),
            algorithms: Algorithm::ALL.to_vec(),
            label: None,
            etag_chunk_size: DEFAULT_ETAG_CHUNK_SIZE,
        }
    }
}

/// Where the inventory goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryTarget {
    Stdout,
    /// A file that must not exist yet.
    New(PathBuf),
    /// A partially (or fully) written inventory from an earlier run.
    Existing(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryOutcome {
    Complete { recorded: usize, added: usize },
    /// The existing inventory already covers every file. Nothing was written.
    AlreadyComplete { recorded: usize },
}

/// Resume state of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// On disk, not yet in the inventory.
    Pending,
    /// On disk and in the inventory. The row is trusted as written.
    Recorded,
    /// In the inventory but gone from disk.
    Inconsistent,
}

/// Classifies every path from the listing and the recorded rows.
pub fn plan<'r, I>(current: &[FileEntry], recorded: I) -> BTreeMap<String, FileState>
where
    I: IntoIterator<Item = &'r str>,
{
    let mut states: BTreeMap<String, FileState> = current
        .iter()
        .map(|e| (paths::to_slash(&e.path), FileState::Pending))
        .collect();

    for path in recorded {
        states
            .entry(path.to_string())
            .and_modify(|s| *s = FileState::Recorded)
            .or_insert(FileState::Inconsistent);
    }

    states
}

/// Inventories every non-hidden file under `root`.
///
/// With [`InventoryTarget::Existing`], rows already in the file are kept as
/// they are and only files missing from it are hashed. Rows are written one
/// at a time and flushed, so an interrupted run can be resumed from whatever
/// reached the disk.
///
/// # Errors
///
/// - `OutputExists` if a new output file is already present
/// - `MalformedManifest` if the existing file is not an inventory CSV, has
///   rows without a PATH or records the same PATH twice
/// - `InconsistentManifest` if the existing file lists paths that are no
///   longer under `root`
pub fn build_inventory(
    root: &Path,
    target: &InventoryTarget,
    options: &InventoryOptions,
) -> Result<InventoryOutcome, InventoryError> {
    let root = std::path::absolute(root).map_err(InventoryError::Io)?;

    info!("Listing files under {}", root.display());
    let mut entries = list_files(&root)?;
    if let InventoryTarget::New(output) | InventoryTarget::Existing(output) = target {
        let output = std::path::absolute(output).map_err(InventoryError::Io)?;
        entries.retain(|e| e.path != output);
    }
    info!("Found {} files", entries.len());

    match target {
        InventoryTarget::Stdout => {
            let stdout = std::io::stdout();
            let mut writer = InventoryWriter::new(stdout.lock());
            writer.write_header()?;
            let added = write_pending(&mut writer, &entries, &root, options)?;
            Ok(InventoryOutcome::Complete { recorded: 0, added })
        }
        InventoryTarget::New(path) => {
            let file = std::fs::File::create_new(path).map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => InventoryError::OutputExists(path.clone()),
                _ => InventoryError::Io(e),
            })?;
            let mut writer = InventoryWriter::new(file);
            writer.write_header()?;
            let added = write_pending(&mut writer, &entries, &root, options)?;
            Ok(InventoryOutcome::Complete { recorded: 0, added })
        }
        InventoryTarget::Existing(path) => resume(path, &entries, &root, options),
    }
}

fn resume(
    path: &Path,
    entries: &[FileEntry],
    root: &Path,
    options: &InventoryOptions,
) -> Result<InventoryOutcome, InventoryError> {
    match manifest::detect_file_format(path)? {
        Some(ManifestFormat::Inventory) => {}
        other => {
            return Err(InventoryError::MalformedManifest {
                path: path.to_path_buf(),
                reason: match other {
                    Some(format) => format!("found {}", format.describe()),
                    None => "unrecognized header".to_string(),
                },
            });
        }
    }

    let rows = inventory_file::read_rows(path, TrailingLine::DropIncomplete).map_err(|e| match e {
        InventoryFileError::Malformed { path, reason } => {
            InventoryError::MalformedManifest { path, reason }
        }
        other => other.into(),
    })?;
    if rows.iter().any(|r| r.path.is_empty()) {
        return Err(InventoryError::MalformedManifest {
            path: path.to_path_buf(),
            reason: "rows without PATH".to_string(),
        });
    }
    let mut seen = HashSet::with_capacity(rows.len());
    if let Some(row) = rows.iter().find(|r| !seen.insert(r.path.as_str())) {
        return Err(InventoryError::MalformedManifest {
            path: path.to_path_buf(),
            reason: format!("duplicate PATH {}", row.path),
        });
    }
    info!("{} files already recorded in {}", rows.len(), path.display());

    let states = plan(entries, rows.iter().map(|r| r.path.as_str()));

    let missing: Vec<String> = states
        .iter()
        .filter(|(_, s)| **s == FileState::Inconsistent)
        .map(|(p, _)| p.clone())
        .collect();
    if !missing.is_empty() {
        return Err(InventoryError::InconsistentManifest {
            path: path.to_path_buf(),
            missing,
        });
    }

    let pending: HashSet<&str> = states
        .iter()
        .filter(|(_, s)| **s == FileState::Pending)
        .map(|(p, _)| p.as_str())
        .collect();
    if pending.is_empty() {
        info!("Inventory {} is already complete", path.display());
        return Ok(InventoryOutcome::AlreadyComplete {
            recorded: rows.len(),
        });
    }

    // Rewriting drops any partial trailing line left by an interrupted run.
    inventory_file::save(path, &rows)?;

    let remaining: Vec<FileEntry> = entries
        .iter()
        .filter(|e| pending.contains(paths::to_slash(&e.path).as_str()))
        .cloned()
        .collect();
    info!("Resuming with {} files remaining", remaining.len());

    let mut writer = inventory_file::open_append(path)?;
    let added = write_pending(&mut writer, &remaining, root, options)?;

    Ok(InventoryOutcome::Complete {
        recorded: rows.len(),
        added,
    })
}

fn write_pending<W: Write>(
    writer: &mut InventoryWriter<W>,
    entries: &[FileEntry],
    root: &Path,
    options: &InventoryOptions,
) -> Result<usize, InventoryError> {
    let total = entries.len();

    for (n, entry) in entries.iter().enumerate() {
        let asset = Asset::from_filesystem(
            &entry.path,
            root,
            &options.algorithms,
            options.etag_chunk_size,
        )?;
        if asset.bytes != entry.size {
            warn!(
                "{} changed size since listing ({} -> {} bytes)",
                entry.path.display(),
                entry.size,
                asset.bytes
            );
        }
        let row: InventoryRow = asset.to_record(&options.batch, options.label.as_deref());
        writer.write_row(&row)?;
        debug!("Recorded {}", asset.relpath);
        info!("Checked {}/{} files", n + 1, total);
    }

    Ok(total)
}
