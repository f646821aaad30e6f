//! The inventory CSV: this tool's own persisted manifest format.
//!
//! One row per file with a fixed column order. Rows are kept as strings so
//! that rows read back from an existing inventory are written out again
//! byte for byte when a job is resumed.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const FIELDNAMES: [&str; 15] = [
    "BATCH",
    "PATH",
    "DIRECTORY",
    "RELPATH",
    "FILENAME",
    "EXTENSION",
    "BYTES",
    "MTIME",
    "MODDATE",
    "MD5",
    "ETAG",
    "SHA1",
    "SHA256",
    "STORAGEPROVIDER",
    "STORAGELOCATION",
];

#[derive(Debug, thiserror::Error)]
pub enum InventoryFileError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Not an inventory CSV ({reason}): {path}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct InventoryRow {
    pub batch: String,
    pub path: String,
    pub directory: String,
    pub relpath: String,
    pub filename: String,
    pub extension: String,
    pub bytes: String,
    pub mtime: String,
    pub moddate: String,
    pub md5: String,
    pub etag: String,
    pub sha1: String,
    pub sha256: String,
    pub storageprovider: String,
    pub storagelocation: String,
}

/// How to treat a final line that has no line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingLine {
    Keep,
    /// Drop it: the writer was interrupted mid-row.
    DropIncomplete,
}

/// Checks that a header only uses known inventory columns.
///
/// Column names are compared case-insensitively. A usable header names the
/// file either through `PATH` or through `DIRECTORY` plus `FILENAME`.
pub fn header_is_inventory(header: &[&str]) -> Result<(), String> {
    let upper: Vec<String> = header.iter().map(|h| h.trim().to_ascii_uppercase()).collect();

    if let Some(unknown) = upper.iter().find(|h| !FIELDNAMES.contains(&h.as_str())) {
        return Err(format!("unknown column {unknown}"));
    }

    let has = |name: &str| upper.iter().any(|h| h == name);
    if !has("PATH") && !(has("DIRECTORY") && has("FILENAME")) {
        return Err("no PATH or DIRECTORY/FILENAME columns".to_string());
    }

    Ok(())
}

/// Parses inventory CSV content.
pub fn parse_rows(
    content: &str,
    source: &Path,
    trailing: TrailingLine,
) -> Result<Vec<InventoryRow>, InventoryFileError> {
    let content = match trailing {
        TrailingLine::DropIncomplete if !content.is_empty() && !content.ends_with('\n') => {
            let end = content.rfind('\n').map(|i| i + 1).unwrap_or(0);
            warn!(
                "Ignoring incomplete last line of {} ({} bytes)",
                source.display(),
                content.len() - end
            );
            &content[..end]
        }
        _ => content,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(InventoryFileError::Malformed {
            path: source.to_path_buf(),
            reason: "missing header".to_string(),
        });
    }

    let fields: Vec<&str> = header.iter().collect();
    header_is_inventory(&fields).map_err(|reason| InventoryFileError::Malformed {
        path: source.to_path_buf(),
        reason,
    })?;

    let normalized: csv::StringRecord =
        header.iter().map(|h| h.trim().to_ascii_uppercase()).collect();
    reader.set_headers(normalized);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: InventoryRow = result.map_err(|e| InventoryFileError::Malformed {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn read_rows(path: &Path, trailing: TrailingLine) -> Result<Vec<InventoryRow>, InventoryFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    parse_rows(&content, path, trailing)
}

/// Streams inventory rows to a writer, flushing after every row so that an
/// interrupted job leaves only whole rows behind (plus at most one partial line).
pub struct InventoryWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> InventoryWriter<W> {
    pub fn new(sink: W) -> Self {
        InventoryWriter {
            inner: csv::WriterBuilder::new().has_headers(false).from_writer(sink),
        }
    }

    pub fn write_header(&mut self) -> Result<(), InventoryFileError> {
        self.inner.write_record(FIELDNAMES)?;
        self.inner.flush().map_err(InventoryFileError::Io)
    }

    pub fn write_row(&mut self, row: &InventoryRow) -> Result<(), InventoryFileError> {
        self.inner.serialize(row)?;
        self.inner.flush().map_err(InventoryFileError::Io)
    }
}

/// Writes a complete inventory atomically.
///
/// Writes to a temporary file, fsyncs it, then atomically renames it into place.
pub fn save(path: &Path, rows: &[InventoryRow]) -> Result<(), InventoryFileError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;

    {
        let mut writer = InventoryWriter::new(temp_file.as_file_mut());
        writer.write_header()?;
        for row in rows {
            writer.write_row(row)?;
        }
    }

    temp_file.as_file().sync_all().map_err(InventoryFileError::Io)?;

    temp_file.persist(path).map_err(|e| io_error(path, e.error))?;

    Ok(())
}

/// Opens an existing inventory for appending further rows.
pub fn open_append(path: &Path) -> Result<InventoryWriter<File>, InventoryFileError> {
    let file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    Ok(InventoryWriter::new(file))
}

fn io_error(path: &Path, e: std::io::Error) -> InventoryFileError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        InventoryFileError::PermissionDenied(path.to_path_buf())
    } else {
        InventoryFileError::Io(e)
    }
}
