//! Inventories every subdirectory of a batch root, one inventory file each.
//!
//! Progress is kept in a status CSV so that an interrupted batch picks up
//! where it stopped: completed directories are skipped and a directory that
//! was in progress resumes from its partial inventory.

use crate::checksum::{self, Algorithm, ChecksumError};
use crate::dir_list::{DirListError, is_hidden, list_files};
use crate::inventory::{
    InventoryError, InventoryOptions, InventoryOutcome, InventoryTarget, build_inventory,
};
use crate::util::units::human_readable;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("{0}")]
    Config(String),
    #[error("Invalid batch config {path}: {error}")]
    Toml {
        path: PathBuf,
        error: toml::de::Error,
    },
    #[error("Status file error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Inventory of {dirname} failed: {error}")]
    Inventory {
        dirname: String,
        error: InventoryError,
    },
}

fn default_algorithms() -> String {
    "md5".to_string()
}

/// Batch configuration, read from a TOML file.
///
/// ```toml
/// input_root = "/mnt/drive"
/// output_root = "/home/me/inventories"
/// manifest = "/home/me/inventories/status.csv"
/// excludes = ["$RECYCLE.BIN"]
/// batch = "drive-42"
/// algorithms = "md5,sha256"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Status CSV tracking every directory of the batch.
    pub manifest: PathBuf,
    #[serde(default)]
    pub excludes: Vec<String>,
    /// BATCH column value. Defaults to the name of the input root.
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default = "default_algorithms")]
    pub algorithms: String,
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let config: BatchConfig = toml::from_str(&content).map_err(|error| BatchError::Toml {
            path: path.to_path_buf(),
            error,
        })?;
        debug!("Loaded batch config {:?}", config);
        Ok(config)
    }

    fn batch_label(&self) -> String {
        self.batch.clone().unwrap_or_else(|| {
            self.input_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    fn algorithms(&self) -> Result<Vec<Algorithm>, BatchError> {
        let algorithms = checksum::parse_algorithms(&self.algorithms)?;
        if algorithms.is_empty() {
            return Err(BatchError::Config("No checksum algorithms configured".to_string()));
        }
        Ok(algorithms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    ToDo,
    Exclude,
    Complete,
}

/// One row of the status CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStatus {
    pub path: String,
    pub dirname: String,
    pub filecount: u64,
    pub bytecount: u64,
    pub humanread: String,
    pub status: Status,
}

impl DirectoryStatus {
    /// Counts the non-hidden files below `path`.
    pub fn survey(path: &Path, excluded: bool) -> Result<Self, BatchError> {
        let entries = list_files(path)?;
        let bytecount = entries.iter().map(|e| e.size).sum();
        Ok(DirectoryStatus {
            path: path.to_string_lossy().into_owned(),
            dirname: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            filecount: entries.len() as u64,
            bytecount,
            humanread: human_readable(bytecount),
            status: if excluded { Status::Exclude } else { Status::ToDo },
        })
    }
}

pub fn read_statuses(path: &Path) -> Result<Vec<DirectoryStatus>, BatchError> {
    let mut reader = csv::Reader::from_path(path)?;
    let statuses = reader.deserialize().collect::<Result<Vec<_>, _>>()?;
    Ok(statuses)
}

/// Writes the status CSV atomically.
pub fn save_statuses(path: &Path, statuses: &[DirectoryStatus]) -> Result<(), BatchError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    {
        let mut writer = csv::Writer::from_writer(temp_file.as_file_mut());
        for status in statuses {
            writer.serialize(status)?;
        }
        writer.flush().map_err(BatchError::Io)?;
    }
    temp_file.as_file().sync_all().map_err(BatchError::Io)?;
    temp_file.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

/// Loads the status CSV, or surveys the input root and creates it.
pub fn load_or_survey(config: &BatchConfig) -> Result<Vec<DirectoryStatus>, BatchError> {
    if !config.input_root.is_dir() {
        return Err(BatchError::Config(format!(
            "Input root is not a directory: {}",
            config.input_root.display()
        )));
    }

    if config.manifest.is_file() {
        info!("Resuming batch from {}", config.manifest.display());
        return read_statuses(&config.manifest);
    }

    info!("Surveying {}", config.input_root.display());
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(&config.input_root).map_err(|e| io_error(&config.input_root, e))? {
        let entry = entry.map_err(BatchError::Io)?;
        if entry.file_type().map_err(BatchError::Io)?.is_dir() && !is_hidden(&entry.file_name()) {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();

    let statuses = subdirs
        .iter()
        .map(|dir| {
            let excluded = dir
                .file_name()
                .is_some_and(|n| config.excludes.iter().any(|x| n == x.as_str()));
            DirectoryStatus::survey(dir, excluded)
        })
        .collect::<Result<Vec<_>, _>>()?;

    save_statuses(&config.manifest, &statuses)?;
    Ok(statuses)
}

/// Inventories every directory still marked `ToDo`, updating the status CSV
/// after each one.
pub fn run_batch(config: &BatchConfig, statuses: &mut [DirectoryStatus]) -> Result<usize, BatchError> {
    let mut options = InventoryOptions::new(config.batch_label());
    options.algorithms = config.algorithms()?;

    std::fs::create_dir_all(&config.output_root).map_err(|e| io_error(&config.output_root, e))?;

    let mut completed = 0;
    for n in 0..statuses.len() {
        if statuses[n].status != Status::ToDo {
            debug!("Skipping {} ({:?})", statuses[n].dirname, statuses[n].status);
            continue;
        }

        let dirname = statuses[n].dirname.clone();
        let output = config.output_root.join(format!("{dirname}.csv"));
        let target = if output.is_file() {
            InventoryTarget::Existing(output)
        } else {
            InventoryTarget::New(output)
        };
        info!("Inventorying {} ({} files)", dirname, statuses[n].filecount);

        let outcome = build_inventory(Path::new(&statuses[n].path), &target, &options)
            .map_err(|error| BatchError::Inventory {
                dirname: dirname.clone(),
                error,
            })?;
        match outcome {
            InventoryOutcome::AlreadyComplete { recorded } => {
                info!("{dirname}: already complete ({recorded} files)")
            }
            InventoryOutcome::Complete { recorded, added } => {
                info!("{dirname}: {added} files added to {recorded} already recorded")
            }
        }

        statuses[n].status = Status::Complete;
        save_statuses(&config.manifest, statuses)?;
        completed += 1;
    }

    Ok(completed)
}

fn io_error(path: &Path, e: std::io::Error) -> BatchError {
    if e.kind() == ErrorKind::PermissionDenied {
        BatchError::PermissionDenied(path.to_path_buf())
    } else {
        BatchError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BatchConfig) {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("drive");
        for (dir, files) in [("alpha", 2), ("beta", 1), ("$RECYCLE.BIN", 1)] {
            fs::create_dir_all(input.join(dir)).unwrap();
            for i in 0..files {
                fs::write(input.join(dir).join(format!("{i}.txt")), "12345").unwrap();
            }
        }
        fs::create_dir_all(input.join(".Trashes")).unwrap();
        fs::write(input.join("loose.txt"), "not a directory").unwrap();

        let config = BatchConfig {
            input_root: input,
            output_root: temp.path().join("out"),
            manifest: temp.path().join("status.csv"),
            excludes: vec!["$RECYCLE.BIN".to_string()],
            batch: None,
            algorithms: default_algorithms(),
        };
        (temp, config)
    }

    #[test]
    fn config_from_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batch.toml");
        fs::write(
            &path,
            "input_root = \"/in\"\noutput_root = \"/out\"\nmanifest = \"/out/status.csv\"\n",
        )
        .unwrap();

        let config = BatchConfig::load(&path).unwrap();

        assert_eq!(config.input_root, PathBuf::from("/in"));
        assert!(config.excludes.is_empty());
        assert_eq!(config.algorithms, "md5");
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batch.toml");
        fs::write(
            &path,
            "input_root = \"/in\"\noutput_root = \"/out\"\nmanifest = \"/m.csv\"\nexclude = []\n",
        )
        .unwrap();

        assert!(matches!(
            BatchConfig::load(&path),
            Err(BatchError::Toml { .. })
        ));
    }

    #[test]
    fn survey_lists_subdirectories_with_exclusions() {
        let (_temp, config) = setup();

        let statuses = load_or_survey(&config).unwrap();

        let summary: Vec<(&str, u64, u64, Status)> = statuses
            .iter()
            .map(|s| (s.dirname.as_str(), s.filecount, s.bytecount, s.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("$RECYCLE.BIN", 1, 5, Status::Exclude),
                ("alpha", 2, 10, Status::ToDo),
                ("beta", 1, 5, Status::ToDo),
            ]
        );
        assert_eq!(read_statuses(&config.manifest).unwrap(), statuses);
    }

    #[test]
    fn run_inventories_each_directory_and_marks_it_complete() {
        let (_temp, config) = setup();
        let mut statuses = load_or_survey(&config).unwrap();

        let completed = run_batch(&config, &mut statuses).unwrap();

        assert_eq!(completed, 2);
        assert!(config.output_root.join("alpha.csv").is_file());
        assert!(config.output_root.join("beta.csv").is_file());
        assert!(!config.output_root.join("$RECYCLE.BIN.csv").exists());

        let saved = read_statuses(&config.manifest).unwrap();
        assert_eq!(saved[1].status, Status::Complete);
        assert_eq!(saved[2].status, Status::Complete);
        assert_eq!(saved[0].status, Status::Exclude);
    }

    #[test]
    fn rerun_resumes_from_status_file() {
        let (_temp, config) = setup();
        let mut statuses = load_or_survey(&config).unwrap();
        run_batch(&config, &mut statuses).unwrap();

        let mut again = load_or_survey(&config).unwrap();
        let completed = run_batch(&config, &mut again).unwrap();

        assert_eq!(completed, 0);
    }

    #[test]
    fn missing_input_root_is_a_config_error() {
        let (_temp, mut config) = setup();
        config.input_root = config.input_root.join("nope");

        assert!(matches!(
            load_or_survey(&config),
            Err(BatchError::Config(_))
        ));
    }
}
