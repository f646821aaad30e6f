//! Fills in local paths and missing checksums of an inventory.
//!
//! Rows that do not yet know where their file lives are matched by filename
//! against a directory tree. A candidate is accepted when every checksum the
//! row already records agrees with the file on disk.

use crate::checksum::{Algorithm, ChecksumError, DEFAULT_ETAG_CHUNK_SIZE, Digests, checksum_file};
use crate::dir_list::{DirListError, list_files};
use crate::inventory_file::{self, InventoryFileError, InventoryRow, InventoryWriter, TrailingLine};
use crate::util::paths;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("Inventory file error: {0}")]
    InventoryFile(#[from] InventoryFileError),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateSummary {
    pub rows: usize,
    /// Rows that already had a location and were left out of the output.
    pub skipped: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Maps each filename under `root` to its paths, in sorted walk order.
pub fn index_by_filename(root: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>, DirListError> {
    let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in list_files(root)? {
        if let Some(name) = entry.path.file_name() {
            index
                .entry(name.to_string_lossy().into_owned())
                .or_default()
                .push(entry.path);
        }
    }
    Ok(index)
}

fn stored(row: &InventoryRow, algorithm: Algorithm) -> &str {
    match algorithm {
        Algorithm::Md5 => &row.md5,
        Algorithm::Sha1 => &row.sha1,
        Algorithm::Sha256 => &row.sha256,
    }
}

/// True when every non-blank stored digest equals the computed one.
fn agrees(row: &InventoryRow, digests: &Digests) -> bool {
    Algorithm::ALL.iter().all(|&algorithm| {
        let stored = stored(row, algorithm).trim();
        stored.is_empty()
            || digests
                .get(algorithm)
                .is_some_and(|d| d.eq_ignore_ascii_case(stored))
    })
}

fn fill(slot: &mut String, value: Option<&String>) {
    if slot.trim().is_empty()
        && let Some(value) = value
    {
        *slot = value.clone();
    }
}

/// Finds the first candidate that agrees with the row and backfills from it.
///
/// Returns `None` when no candidate agrees.
pub fn annotate_row(
    row: &InventoryRow,
    candidates: &[PathBuf],
) -> Result<Option<InventoryRow>, ChecksumError> {
    for candidate in candidates {
        let checksum = checksum_file(candidate, &Algorithm::ALL, DEFAULT_ETAG_CHUNK_SIZE)?;
        if !agrees(row, &checksum.digests) {
            debug!("{} does not match", candidate.display());
            continue;
        }

        let mut updated = row.clone();
        updated.path = paths::to_slash(candidate);
        fill(&mut updated.md5, checksum.digests.md5.as_ref());
        fill(&mut updated.etag, checksum.digests.etag.as_ref());
        fill(&mut updated.sha1, checksum.digests.sha1.as_ref());
        fill(&mut updated.sha256, checksum.digests.sha256.as_ref());
        return Ok(Some(updated));
    }
    Ok(None)
}

/// Annotates `inventory` against files under `root` and writes the result to `output`.
///
/// Only rows without a PATH or STORAGELOCATION are written out. Unmatched
/// rows are written unchanged.
pub fn annotate(
    inventory: &Path,
    root: &Path,
    output: &Path,
) -> Result<AnnotateSummary, AnnotateError> {
    let rows = inventory_file::read_rows(inventory, TrailingLine::Keep)?;
    info!("Read {} rows from {}", rows.len(), inventory.display());

    let index = index_by_filename(root)?;
    info!("Indexed {} filenames under {}", index.len(), root.display());

    let file = std::fs::File::create_new(output).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => AnnotateError::OutputExists(output.to_path_buf()),
        _ => AnnotateError::Io(e),
    })?;
    let mut writer = InventoryWriter::new(file);
    writer.write_header()?;

    let mut summary = AnnotateSummary {
        rows: rows.len(),
        ..Default::default()
    };

    for (n, row) in rows.iter().enumerate() {
        if !row.path.is_empty() || !row.storagelocation.is_empty() {
            debug!("{}. Skipping completed row for {}", n + 1, row.filename);
            summary.skipped += 1;
            continue;
        }

        let candidates = index.get(&row.filename).map(Vec::as_slice).unwrap_or_default();
        match annotate_row(row, candidates)? {
            Some(updated) => {
                info!("{}. {} found at {}", n + 1, row.filename, updated.path);
                writer.write_row(&updated)?;
                summary.matched += 1;
            }
            None => {
                warn!("{}. No match for {}", n + 1, row.filename);
                writer.write_row(row)?;
                summary.unmatched += 1;
            }
        }
    }

    Ok(summary)
}
