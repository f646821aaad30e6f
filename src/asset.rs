use crate::checksum::{Algorithm, ChecksumError, Digests, checksum_file};
use crate::inventory_file::InventoryRow;
use crate::util::paths;
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Invalid {column} value {value:?} for {path}")]
    InvalidNumber {
        column: &'static str,
        value: String,
        path: String,
    },
    #[error("Row has neither PATH nor DIRECTORY/FILENAME")]
    MissingPath,
}

/// Content signature used to recognise the same file under a different path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub checksum: Option<String>,
    pub bytes: u64,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes)",
            self.checksum.as_deref().unwrap_or("no checksum"),
            self.bytes
        )
    }
}

/// One file's preservation-relevant identity.
///
/// Equality covers md5, size, filename and relpath only; two records of the
/// same file taken at different times compare equal.
#[derive(Debug, Clone)]
pub struct Asset {
    pub path: String,
    pub relpath: String,
    pub directory: String,
    pub filename: String,
    /// Uppercased, without the leading dot.
    pub extension: String,
    pub bytes: u64,
    /// Seconds since the Unix epoch. Some legacy formats don't record it.
    pub mtime: Option<i64>,
    pub digests: Digests,
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.digests.md5 == other.digests.md5
            && self.bytes == other.bytes
            && self.filename == other.filename
            && self.relpath == other.relpath
    }
}

impl Eq for Asset {}

impl Asset {
    /// Builds an asset from a path and the parts that every source knows.
    pub fn new(path: &str, relpath: &str, bytes: u64) -> Self {
        let (directory, filename) = paths::split_dir_file(path);
        Asset {
            path: path.to_string(),
            relpath: relpath.to_string(),
            directory: directory.to_string(),
            filename: filename.to_string(),
            extension: paths::extension(filename),
            bytes,
            mtime: None,
            digests: Digests::default(),
        }
    }

    /// Stats and hashes a file on disk. `root` anchors the relpath.
    pub fn from_filesystem(
        path: &Path,
        root: &Path,
        algorithms: &[Algorithm],
        etag_chunk_size: u64,
    ) -> Result<Self, ChecksumError> {
        let checksum = checksum_file(path, algorithms, etag_chunk_size)?;

        let relpath = path
            .strip_prefix(root)
            .map(paths::to_slash)
            .unwrap_or_else(|_| paths::to_slash(path));
        let mtime = checksum
            .mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_else(|e| -(e.duration().as_secs() as i64));

        let mut asset = Asset::new(&paths::to_slash(path), &relpath, checksum.size);
        asset.mtime = Some(mtime);
        asset.digests = checksum.digests;
        Ok(asset)
    }

    /// Parses a persisted inventory row.
    ///
    /// `root` is used only when the row carries no RELPATH of its own.
    pub fn from_record(row: &InventoryRow, root: &str) -> Result<Self, AssetError> {
        let path = if !row.path.is_empty() {
            row.path.clone()
        } else if !row.filename.is_empty() {
            paths::join(&row.directory, &row.filename)
        } else {
            return Err(AssetError::MissingPath);
        };

        let relpath = if row.relpath.is_empty() {
            paths::relative_to(&path, root).to_string()
        } else {
            row.relpath.clone()
        };

        let bytes = parse_number(&row.bytes, "BYTES", &path)?.unwrap_or(0);
        let mtime = parse_number(&row.mtime, "MTIME", &path)?;

        let mut asset = Asset::new(&path, &relpath, bytes);
        if !row.directory.is_empty() {
            asset.directory = row.directory.clone();
        }
        if !row.filename.is_empty() {
            asset.filename = row.filename.clone();
        }
        if !row.extension.is_empty() {
            asset.extension = row.extension.clone();
        }
        asset.mtime = mtime;
        asset.digests = Digests {
            md5: non_empty(&row.md5),
            etag: non_empty(&row.etag),
            sha1: non_empty(&row.sha1),
            sha256: non_empty(&row.sha256),
        };
        Ok(asset)
    }

    /// Serializes into an inventory row.
    ///
    /// With a drive `label` the storage columns record `HDD` and `label:relpath`.
    pub fn to_record(&self, batch: &str, label: Option<&str>) -> InventoryRow {
        let (storageprovider, storagelocation) = match label {
            Some(label) => ("HDD".to_string(), format!("{}:{}", label, self.relpath)),
            None => (String::new(), String::new()),
        };

        InventoryRow {
            batch: batch.to_string(),
            path: self.path.clone(),
            directory: self.directory.clone(),
            relpath: self.relpath.clone(),
            filename: self.filename.clone(),
            extension: self.extension.clone(),
            bytes: self.bytes.to_string(),
            mtime: self.mtime.map(|m| m.to_string()).unwrap_or_default(),
            moddate: self.moddate().unwrap_or_default(),
            md5: self.digests.md5.clone().unwrap_or_default(),
            etag: self.digests.etag.clone().unwrap_or_default(),
            sha1: self.digests.sha1.clone().unwrap_or_default(),
            sha256: self.digests.sha256.clone().unwrap_or_default(),
            storageprovider,
            storagelocation,
        }
    }

    pub fn signature(&self) -> Signature {
        Signature {
            checksum: self.digests.md5.clone(),
            bytes: self.bytes,
        }
    }

    /// Local time ISO-8601 rendering of `mtime`.
    pub fn moddate(&self) -> Option<String> {
        self.mtime.and_then(format_moddate)
    }
}

pub fn format_moddate(mtime: i64) -> Option<String> {
    let utc = chrono::DateTime::from_timestamp(mtime, 0)?;
    Some(
        utc.with_timezone(&chrono::Local)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    )
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number<T: std::str::FromStr>(
    value: &str,
    column: &'static str,
    path: &str,
) -> Result<Option<T>, AssetError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| AssetError::InvalidNumber {
            column,
            value: value.to_string(),
            path: path.to_string(),
        })
}
