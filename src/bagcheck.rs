//! Checks an inventory against the payload manifest of a bag.
//!
//! The bag may be a directory or a tar archive, optionally gzip compressed.
//! Only the manifest file is read; nothing is extracted.

use crate::checksum::Algorithm;
use crate::manifest::{Manifest, ManifestError};
use crate::util::paths;
use flate2::read::GzDecoder;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest names in order of preference.
const MANIFEST_NAMES: [(&str, Algorithm); 2] = [
    ("manifest-sha256.txt", Algorithm::Sha256),
    ("manifest-md5.txt", Algorithm::Md5),
];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_OFFSET: u64 = 257;

#[derive(Debug, thiserror::Error)]
pub enum BagCheckError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not a bag directory or tar archive: {0}")]
    UnrecognizedArchive(PathBuf),
    #[error("No manifest-sha256.txt or manifest-md5.txt found in {0}")]
    MissingManifest(PathBuf),
    #[error("Malformed line {line} in bag manifest of {path}")]
    MalformedLine { path: PathBuf, line: usize },
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

/// Parsed payload manifest of a bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagManifest {
    pub algorithm: Algorithm,
    /// `(checksum, path inside the bag)`.
    pub entries: BTreeSet<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagReport {
    pub algorithm: Algorithm,
    /// Leading segments stripped from bag paths to line them up with the inventory.
    pub trim: usize,
    /// Bag paths that matched an inventory relpath at the chosen trim.
    pub matched: usize,
    /// In the inventory but not in the bag.
    pub missing: BTreeSet<(String, String)>,
    /// In the bag but not in the inventory.
    pub extra: BTreeSet<(String, String)>,
}

impl BagReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Splits `<checksum><whitespace><path>` lines. Paths may contain spaces.
pub fn parse_manifest_lines(
    content: &str,
    source: &Path,
) -> Result<BTreeSet<(String, String)>, BagCheckError> {
    let mut entries = BTreeSet::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (checksum, path) = line
            .trim_start()
            .split_once(char::is_whitespace)
            .ok_or_else(|| BagCheckError::MalformedLine {
                path: source.to_path_buf(),
                line: n + 1,
            })?;
        let path = path.trim_start().trim_end_matches('\r');
        entries.insert((checksum.to_ascii_lowercase(), path.to_string()));
    }
    Ok(entries)
}

/// Reads every payload manifest of a bag directory or tar archive, in order
/// of preference.
pub fn read_bag_manifests(bag: &Path) -> Result<Vec<BagManifest>, BagCheckError> {
    let metadata = std::fs::metadata(bag).map_err(|e| io_error(bag, e))?;

    let found = if metadata.is_dir() {
        read_from_directory(bag)?
    } else {
        read_from_archive(bag)?
    };
    if found.is_empty() {
        return Err(BagCheckError::MissingManifest(bag.to_path_buf()));
    }

    let mut manifests = Vec::with_capacity(found.len());
    for (algorithm, content) in found {
        let entries = parse_manifest_lines(&content, bag)?;
        info!(
            "Read {} {} entries from bag {}",
            entries.len(),
            algorithm.name(),
            bag.display()
        );
        manifests.push(BagManifest { algorithm, entries });
    }
    Ok(manifests)
}

fn read_from_directory(bag: &Path) -> Result<Vec<(Algorithm, String)>, BagCheckError> {
    let mut found = Vec::new();
    for (name, algorithm) in MANIFEST_NAMES {
        let path = bag.join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Found {}", path.display());
                found.push((algorithm, content));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(io_error(&path, e)),
        }
    }
    Ok(found)
}

fn read_from_archive(bag: &Path) -> Result<Vec<(Algorithm, String)>, BagCheckError> {
    let mut file = File::open(bag).map_err(|e| io_error(bag, e))?;

    let mut magic = [0u8; 2];
    let is_gzip = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0)).map_err(BagCheckError::Io)?;

    if is_gzip {
        debug!("{} is gzip compressed", bag.display());
        return find_in_tar(GzDecoder::new(BufReader::new(file)), bag);
    }

    let mut ustar = [0u8; 5];
    file.seek(SeekFrom::Start(USTAR_OFFSET))
        .map_err(BagCheckError::Io)?;
    if file.read_exact(&mut ustar).is_err() || &ustar != b"ustar" {
        return Err(BagCheckError::UnrecognizedArchive(bag.to_path_buf()));
    }
    file.seek(SeekFrom::Start(0)).map_err(BagCheckError::Io)?;

    find_in_tar(BufReader::new(file), bag)
}

/// Streams through a tar archive and keeps the shallowest manifest of each kind.
fn find_in_tar<R: Read>(
    reader: R,
    bag: &Path,
) -> Result<Vec<(Algorithm, String)>, BagCheckError> {
    let mut archive = tar::Archive::new(reader);
    let mut found: [Option<(usize, String)>; MANIFEST_NAMES.len()] = Default::default();

    let entries = archive.entries().map_err(|e| archive_error(bag, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(bag, e))?;
        let path = entry.path().map_err(BagCheckError::Io)?.into_owned();

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(slot) = MANIFEST_NAMES.iter().position(|(m, _)| *m == name) else {
            continue;
        };

        let depth = path.components().count();
        if found[slot].as_ref().is_some_and(|(d, _)| *d <= depth) {
            continue;
        }
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(BagCheckError::Io)?;
        debug!("Found {} in archive", path.display());
        found[slot] = Some((depth, content));
    }

    Ok(MANIFEST_NAMES
        .iter()
        .zip(found)
        .filter_map(|((_, algorithm), hit)| hit.map(|(_, content)| (*algorithm, content)))
        .collect())
}

/// Picks the bag manifest to check against.
///
/// With a loaded inventory, the first manifest whose algorithm every asset
/// has a digest for wins. A directory inventory is hashed on demand, so it
/// takes the most preferred manifest.
fn choose_manifest(
    manifests: Vec<BagManifest>,
    inventory: Option<&Manifest>,
    bag: &Path,
) -> Result<BagManifest, BagCheckError> {
    let index = match inventory {
        None => 0,
        Some(inventory) => manifests
            .iter()
            .position(|m| inventory.iter().all(|a| a.digests.get(m.algorithm).is_some()))
            .unwrap_or_else(|| {
                warn!("No bag manifest uses an algorithm recorded for every inventoried file");
                0
            }),
    };
    manifests
        .into_iter()
        .nth(index)
        .ok_or_else(|| BagCheckError::MissingManifest(bag.to_path_buf()))
}

/// Finds how many leading segments to strip from bag paths so they line up
/// with inventory relpaths.
///
/// Tries every trim from zero up to one less than the shortest bag path's
/// segment count and keeps the one with the most matches; the smallest trim
/// wins a tie. Returns `(trim, matches)`.
pub fn align<'a>(
    inventory_paths: &HashSet<&str>,
    bag_paths: impl Iterator<Item = &'a str> + Clone,
) -> (usize, usize) {
    let max_trim = bag_paths
        .clone()
        .map(paths::segment_count)
        .min()
        .map_or(0, |n| n.saturating_sub(1));

    let mut best = (0, 0);
    for trim in 0..=max_trim {
        let matches = bag_paths
            .clone()
            .filter_map(|p| paths::strip_leading_segments(p, trim))
            .filter(|p| inventory_paths.contains(p))
            .count();
        debug!("Trim {trim} matches {matches} paths");
        if matches > best.1 {
            best = (trim, matches);
        }
    }
    best
}

/// Compares an inventory (any loadable manifest) with a bag's payload manifest.
pub fn check_bag(inventory: &Path, bag: &Path) -> Result<BagReport, BagCheckError> {
    let manifests = read_bag_manifests(bag)?;
    let (inventory, bag_manifest) = if inventory.is_dir() {
        let bag_manifest = choose_manifest(manifests, None, bag)?;
        let scanned = Manifest::load_with(inventory, &[bag_manifest.algorithm])?;
        (scanned, bag_manifest)
    } else {
        let loaded = Manifest::load(inventory)?;
        let bag_manifest = choose_manifest(manifests, Some(&loaded), bag)?;
        (loaded, bag_manifest)
    };
    let algorithm = bag_manifest.algorithm;
    debug!("Checking with {} digests", algorithm.name());

    let expected: BTreeSet<(String, String)> = inventory
        .iter()
        .map(|asset| {
            let checksum = asset.digests.get(algorithm).unwrap_or_default();
            if checksum.is_empty() {
                warn!("{} has no {} checksum", asset.relpath, algorithm.name());
            }
            (checksum.to_ascii_lowercase(), asset.relpath.clone())
        })
        .collect();

    let inventory_paths: HashSet<&str> = expected.iter().map(|(_, p)| p.as_str()).collect();
    let (trim, matched) = align(
        &inventory_paths,
        bag_manifest.entries.iter().map(|(_, p)| p.as_str()),
    );
    info!("Aligned bag paths by stripping {trim} leading segment(s), {matched} matched");

    let actual: BTreeSet<(String, String)> = bag_manifest
        .entries
        .iter()
        .map(|(checksum, path)| {
            let trimmed = paths::strip_leading_segments(path, trim).unwrap_or(path);
            (checksum.clone(), trimmed.to_string())
        })
        .collect();

    Ok(BagReport {
        algorithm,
        trim,
        matched,
        missing: expected.difference(&actual).cloned().collect(),
        extra: actual.difference(&expected).cloned().collect(),
    })
}

fn io_error(path: &Path, e: std::io::Error) -> BagCheckError {
    if e.kind() == ErrorKind::PermissionDenied {
        BagCheckError::PermissionDenied(path.to_path_buf())
    } else {
        BagCheckError::Io(e)
    }
}

fn archive_error(bag: &Path, e: std::io::Error) -> BagCheckError {
    if e.kind() == ErrorKind::PermissionDenied {
        BagCheckError::PermissionDenied(bag.to_path_buf())
    } else {
        debug!("Reading {} as tar failed: {e}", bag.display());
        BagCheckError::UnrecognizedArchive(bag.to_path_buf())
    }
}
