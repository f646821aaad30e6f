use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Chunk size used for multipart ETags when none is configured (8 MiB).
pub const DEFAULT_ETAG_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
    #[error("Unknown hash algorithm: {0} (expected md5, sha1 or sha256)")]
    UnknownAlgorithm(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Md5, Algorithm::Sha1, Algorithm::Sha256];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            _ => Err(ChecksumError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Parses a comma separated algorithm list such as `md5,sha256`.
///
/// Duplicates are collapsed and the result is in canonical order.
pub fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ChecksumError> {
    let mut algorithms = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Algorithm::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    algorithms.sort();
    algorithms.dedup();
    Ok(algorithms)
}

/// Hex encoded digests of one file. Absent when not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digests {
    pub md5: Option<String>,
    pub etag: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl Digests {
    pub fn get(&self, algorithm: Algorithm) -> Option<&str> {
        match algorithm {
            Algorithm::Md5 => self.md5.as_deref(),
            Algorithm::Sha1 => self.sha1.as_deref(),
            Algorithm::Sha256 => self.sha256.as_deref(),
        }
    }
}

pub struct FileChecksum {
    pub digests: Digests,
    /// Modification time captured after checksumming.
    pub mtime: std::time::SystemTime,
    /// File size in bytes.
    pub size: u64,
}

/// Incremental multipart ETag, compatible with S3-style object stores.
///
/// Objects no larger than one chunk get the plain MD5. Larger objects get
/// `md5(md5(chunk_1) || ... || md5(chunk_n))-n`, using the raw 16 byte chunk
/// digests.
pub(crate) struct EtagHasher {
    chunk_size: u64,
    whole: Md5,
    current: Md5,
    current_len: u64,
    part_digests: Vec<u8>,
    parts: u64,
    total: u64,
}

impl EtagHasher {
    pub(crate) fn new(chunk_size: u64) -> Self {
        EtagHasher {
            chunk_size: chunk_size.max(1),
            whole: Md5::new(),
            current: Md5::new(),
            current_len: 0,
            part_digests: Vec::new(),
            parts: 0,
            total: 0,
        }
    }

    pub(crate) fn update(&mut self, mut data: &[u8]) {
        self.whole.update(data);
        self.total += data.len() as u64;

        while !data.is_empty() {
            let room = self.chunk_size - self.current_len;
            let take = usize::try_from(room).unwrap_or(usize::MAX).min(data.len());
            self.current.update(&data[..take]);
            self.current_len += take as u64;
            data = &data[take..];

            if self.current_len == self.chunk_size {
                self.close_part();
            }
        }
    }

    fn close_part(&mut self) {
        let digest = std::mem::replace(&mut self.current, Md5::new()).finalize();
        self.part_digests.extend_from_slice(&digest);
        self.parts += 1;
        self.current_len = 0;
    }

    /// Returns `(md5, etag)`, both hex encoded.
    pub(crate) fn finish(mut self) -> (String, String) {
        let md5 = format!("{:x}", self.whole.clone().finalize());

        if self.total <= self.chunk_size {
            return (md5.clone(), md5);
        }

        if self.current_len > 0 {
            self.close_part();
        }

        let combined = Md5::digest(&self.part_digests);
        (md5, format!("{:x}-{}", combined, self.parts))
    }
}

/// Computes the requested digests of a file in a single read pass.
///
/// # Behavior
/// - Records the file's modification time before reading
/// - Reads the file in chunks, feeding every requested hasher from the same buffer
/// - Computes the multipart ETag alongside MD5 whenever MD5 is requested
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors (may be changed in the future)
/// - `ChecksumError::Io`: File doesn't exist or other I/O errors
/// - `ChecksumError::NotAFile`: Path is a directory or other non-regular file
/// - `ChecksumError::PermissionDenied`: Insufficient permissions to read the file
/// - `ChecksumError::ConcurrentModification`: File was detected as being modified while
///   checksumming. Note that the absence of this error is *not* a guarantee that the
///   file was *not* modified.
pub fn checksum_file(
    path: &Path,
    algorithms: &[Algorithm],
    etag_chunk_size: u64,
) -> Result<FileChecksum, ChecksumError> {
    info!("Checksumming {}", path.display());

    let metadata_before = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
    if !metadata_before.is_file() {
        return Err(ChecksumError::NotAFile(path.to_path_buf()));
    }
    let mtime_before = metadata_before.modified().map_err(ChecksumError::Io)?;

    let mut file = File::open(path).map_err(|e| io_error(path, e))?;

    let mut etag = algorithms
        .contains(&Algorithm::Md5)
        .then(|| EtagHasher::new(etag_chunk_size));
    let mut sha1 = algorithms.contains(&Algorithm::Sha1).then(Sha1::new);
    let mut sha256 = algorithms.contains(&Algorithm::Sha256).then(Sha256::new);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ChecksumError::Io)?;
        if bytes_read == 0 {
            break;
        }
        let chunk = &buffer[..bytes_read];
        if let Some(h) = etag.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha1.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha256.as_mut() {
            h.update(chunk);
        }
    }

    let metadata_after = std::fs::metadata(path).map_err(ChecksumError::Io)?;
    let mtime_after = metadata_after.modified().map_err(ChecksumError::Io)?;

    if mtime_before != mtime_after {
        return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
    }

    let mut digests = Digests::default();
    if let Some(h) = etag {
        let (md5, etag) = h.finish();
        digests.md5 = Some(md5);
        digests.etag = Some(etag);
    }
    digests.sha1 = sha1.map(|h| format!("{:x}", h.finalize()));
    digests.sha256 = sha256.map(|h| format!("{:x}", h.finalize()));

    debug!("Checksums of {} are {:?}", path.display(), digests);

    Ok(FileChecksum {
        digests,
        mtime: mtime_after,
        size: metadata_after.len(),
    })
}

fn io_error(path: &Path, e: std::io::Error) -> ChecksumError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ChecksumError::PermissionDenied(path.to_path_buf())
    } else {
        ChecksumError::Io(e)
    }
}
