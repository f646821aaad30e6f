//! Loading asset collections from disk.
//!
//! A manifest is either a directory, scanned and hashed on the spot, or a
//! file in one of the tabular formats this tool understands. File formats are
//! recognised from their first line by a fixed list of detectors tried in
//! order; the first detector that claims the line decides the parser.

use crate::asset::{Asset, AssetError};
use crate::checksum::{Algorithm, ChecksumError, DEFAULT_ETAG_CHUNK_SIZE};
use crate::dir_list::{DirListError, list_files};
use crate::inventory_file::{self, InventoryFileError, TrailingLine};
use crate::util::paths;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// First line of a vendor backup-tool report.
pub const TSM_SENTINEL: &str = "IBM Tivoli Storage Manager";

const FILENAME_MARKERS: [&str; 4] = ["Filename", "FILENAME", "Key", "KEY"];

static TSM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Normal File-->\s*([\d,]+)\s+(.+?)\s+\[Sent\]").expect("valid TSM line pattern")
});

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not found: {0}")]
    NotFound(PathBuf),
    #[error("Unrecognized manifest format: {0}")]
    UnrecognizedFormat(PathBuf),
    #[error("Malformed manifest {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("Duplicate relative path {relpath} in {path}")]
    DuplicateRelpath { relpath: String, path: PathBuf },
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Inventory file error: {0}")]
    InventoryFile(#[from] InventoryFileError),
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// Plain-text report from the backup tool.
    TsmReport,
    /// This tool's own inventory CSV.
    Inventory,
    /// File analyzer style export with a filename column.
    DelimitedExport { delimiter: u8 },
}

impl ManifestFormat {
    pub fn describe(self) -> &'static str {
        match self {
            ManifestFormat::TsmReport => "backup tool report",
            ManifestFormat::Inventory => "inventory CSV",
            ManifestFormat::DelimitedExport { delimiter: b'\t' } => "tab delimited export",
            ManifestFormat::DelimitedExport { .. } => "comma delimited export",
        }
    }
}

type Detector = fn(&str) -> Option<ManifestFormat>;

/// Tried in order. The inventory header also contains a filename column, so
/// it has to be claimed before the generic export detector sees it.
const DETECTORS: [Detector; 3] = [detect_tsm, detect_inventory, detect_delimited];

fn detect_tsm(first_line: &str) -> Option<ManifestFormat> {
    (first_line.trim_end() == TSM_SENTINEL).then_some(ManifestFormat::TsmReport)
}

fn detect_inventory(first_line: &str) -> Option<ManifestFormat> {
    if first_line.contains('\t') {
        return None;
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(first_line.as_bytes());
    let record = reader.records().next()?.ok()?;
    let fields: Vec<&str> = record.iter().collect();
    inventory_file::header_is_inventory(&fields)
        .ok()
        .map(|()| ManifestFormat::Inventory)
}

fn detect_delimited(first_line: &str) -> Option<ManifestFormat> {
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };
    let has_marker = first_line
        .split(delimiter as char)
        .map(|c| c.trim().trim_matches('"'))
        .any(|c| FILENAME_MARKERS.contains(&c));
    has_marker.then_some(ManifestFormat::DelimitedExport { delimiter })
}

pub fn detect_format(first_line: &str) -> Option<ManifestFormat> {
    let first_line = first_line.trim_start_matches('\u{feff}');
    DETECTORS.iter().find_map(|detect| detect(first_line))
}

/// Reads the first line of a file and detects its format.
pub fn detect_file_format(path: &Path) -> Result<Option<ManifestFormat>, ManifestError> {
    let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(ManifestError::Io)?;
    Ok(detect_format(&first_line))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Directory,
    File(ManifestFormat),
}

impl ManifestSource {
    pub fn describe(&self) -> &'static str {
        match self {
            ManifestSource::Directory => "directory scan",
            ManifestSource::File(format) => format.describe(),
        }
    }
}

/// An ordered set of assets sharing a common root.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Prefix every member's relpath is relative to.
    pub root: String,
    pub source: ManifestSource,
    /// Where the manifest was loaded from.
    pub origin: PathBuf,
    assets: Vec<Asset>,
}

impl Manifest {
    /// Builds a manifest from assets, rejecting relpath collisions.
    pub fn new(
        root: String,
        source: ManifestSource,
        origin: PathBuf,
        assets: Vec<Asset>,
    ) -> Result<Self, ManifestError> {
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if !seen.insert(asset.relpath.as_str()) {
                return Err(ManifestError::DuplicateRelpath {
                    relpath: asset.relpath.clone(),
                    path: origin,
                });
            }
        }

        Ok(Manifest {
            root,
            source,
            origin,
            assets,
        })
    }

    /// Loads a manifest from a directory (hashing with MD5) or a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        Self::load_with(path, &[Algorithm::Md5])
    }

    /// Like [`Manifest::load`], choosing the digests computed for directories.
    pub fn load_with(path: &Path, algorithms: &[Algorithm]) -> Result<Self, ManifestError> {
        let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;

        if metadata.is_dir() {
            info!("{} is a directory, scanning files", path.display());
            Self::scan_directory(path, algorithms)
        } else {
            info!("{} is a file, reading manifest", path.display());
            Self::read_file(path)
        }
    }

    fn scan_directory(path: &Path, algorithms: &[Algorithm]) -> Result<Self, ManifestError> {
        let root = std::path::absolute(path).map_err(ManifestError::Io)?;
        let entries = list_files(&root)?;
        let total = entries.len();

        let mut assets = Vec::with_capacity(total);
        for (n, entry) in entries.iter().enumerate() {
            assets.push(Asset::from_filesystem(
                &entry.path,
                &root,
                algorithms,
                DEFAULT_ETAG_CHUNK_SIZE,
            )?);
            debug!("Scanned {}/{} files", n + 1, total);
        }
        info!("Found {} files under {}", total, root.display());

        Self::new(
            paths::to_slash(&root),
            ManifestSource::Directory,
            path.to_path_buf(),
            assets,
        )
    }

    fn read_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let first_line = content.lines().next().unwrap_or_default();

        let format =
            detect_format(first_line).ok_or_else(|| ManifestError::UnrecognizedFormat(path.into()))?;
        info!("Parsing {} as {}", path.display(), format.describe());

        let body = content.trim_start_matches('\u{feff}');
        let manifest = match format {
            ManifestFormat::TsmReport => parse_tsm(body, path)?,
            ManifestFormat::Inventory => parse_inventory(body, path)?,
            ManifestFormat::DelimitedExport { delimiter } => parse_delimited(body, path, delimiter)?,
        };
        info!("Read {} assets from {}", manifest.len(), path.display());
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asset> {
        self.assets.iter()
    }

    pub fn by_relpath(&self) -> HashMap<&str, &Asset> {
        self.assets.iter().map(|a| (a.relpath.as_str(), a)).collect()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Asset;
    type IntoIter = std::slice::Iter<'a, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}

/// Re-roots assets whose relpath was not recorded at the common prefix of their paths.
fn rooted(path: &Path, source: ManifestSource, mut assets: Vec<Asset>) -> Result<Manifest, ManifestError> {
    let root = paths::common_root(assets.iter().map(|a| a.path.as_str()));
    for asset in &mut assets {
        if asset.relpath.is_empty() {
            asset.relpath = paths::relative_to(&asset.path, &root).to_string();
        }
    }
    Manifest::new(root, source, path.to_path_buf(), assets)
}

fn parse_tsm(content: &str, path: &Path) -> Result<Manifest, ManifestError> {
    let mut assets = Vec::new();

    for line in content.lines().filter(|l| l.contains("Normal File-->")) {
        let Some(captures) = TSM_LINE.captures(line) else {
            debug!("Skipping unparseable report line: {line}");
            continue;
        };
        let bytes: u64 = captures[1]
            .replace(',', "")
            .parse()
            .map_err(|_| ManifestError::Malformed {
                path: path.to_path_buf(),
                reason: format!("bad byte count in line {line:?}"),
            })?;
        let file_path = captures[2].replace('\\', "/");
        assets.push(Asset::new(&file_path, "", bytes));
    }

    rooted(path, ManifestSource::File(ManifestFormat::TsmReport), assets)
}

fn parse_inventory(content: &str, path: &Path) -> Result<Manifest, ManifestError> {
    let rows = inventory_file::parse_rows(content, path, TrailingLine::Keep)?;

    let row_paths: Vec<String> = rows
        .iter()
        .map(|r| {
            if r.path.is_empty() {
                paths::join(&r.directory, &r.filename)
            } else {
                r.path.clone()
            }
        })
        .collect();
    let root = paths::common_root(row_paths.iter().map(String::as_str));

    let assets = rows
        .iter()
        .map(|row| Asset::from_record(row, &root))
        .collect::<Result<Vec<_>, _>>()?;

    Manifest::new(
        root,
        ManifestSource::File(ManifestFormat::Inventory),
        path.to_path_buf(),
        assets,
    )
}

fn parse_delimited(content: &str, path: &Path, delimiter: u8) -> Result<Manifest, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let header = reader.headers()?.clone();
    let column = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };

    let filename_col = FILENAME_MARKERS
        .iter()
        .find_map(|m| header.iter().position(|h| h.trim() == *m))
        .ok_or_else(|| ManifestError::Malformed {
            path: path.to_path_buf(),
            reason: "no filename column".to_string(),
        })?;
    let directory_col = column(&["Directory"]);
    let bytes_col = column(&["Bytes", "Size"]);
    let md5_col = column(&["MD5", "Other"]);
    let mtime_col = column(&["MTime"]);

    let mut assets = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("").trim();

        let filename = field(Some(filename_col)).replace('\\', "/");
        if filename.is_empty() {
            continue;
        }
        let directory = field(directory_col).replace('\\', "/");
        let file_path = paths::join(&directory, &filename);

        let bytes = match field(bytes_col).replace(',', "") {
            b if b.is_empty() => 0,
            b => b.parse().map_err(|_| ManifestError::Malformed {
                path: path.to_path_buf(),
                reason: format!("bad size {b:?} for {file_path}"),
            })?,
        };

        let mut asset = Asset::new(&file_path, "", bytes);
        asset.mtime = field(mtime_col).parse().ok();
        let md5 = field(md5_col);
        if !md5.is_empty() {
            asset.digests.md5 = Some(md5.to_ascii_lowercase());
        }
        assets.push(asset);
    }

    rooted(
        path,
        ManifestSource::File(ManifestFormat::DelimitedExport { delimiter }),
        assets,
    )
}

fn io_error(path: &Path, e: std::io::Error) -> ManifestError {
    match e.kind() {
        ErrorKind::PermissionDenied => ManifestError::PermissionDenied(path.to_path_buf()),
        ErrorKind::NotFound => ManifestError::NotFound(path.to_path_buf()),
        _ => ManifestError::Io(e),
    }
}
