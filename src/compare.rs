use crate::manifest::{Manifest, ManifestError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What identifies a file when comparing listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareKey {
    #[default]
    Filename,
    Relpath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareReport {
    /// Values present in every listing.
    pub common: BTreeSet<String>,
    /// Per listing, in argument order, the values not common to all.
    pub unique: Vec<(PathBuf, BTreeSet<String>)>,
}

pub fn compare_values(lists: Vec<(PathBuf, BTreeSet<String>)>) -> CompareReport {
    let mut sets = lists.iter().map(|(_, values)| values);
    let common = match sets.next() {
        Some(first) => sets.fold(first.clone(), |acc, values| {
            acc.intersection(values).cloned().collect()
        }),
        None => BTreeSet::new(),
    };

    let unique = lists
        .into_iter()
        .map(|(path, values)| {
            let only: BTreeSet<String> = values.difference(&common).cloned().collect();
            (path, only)
        })
        .collect();

    CompareReport { common, unique }
}

/// Loads every listing and compares them by `key`.
///
/// Listings that yield no files are left out of the comparison.
pub fn compare_manifests(paths: &[&Path], key: CompareKey) -> Result<CompareReport, ManifestError> {
    let mut lists = Vec::with_capacity(paths.len());

    for path in paths {
        let manifest = Manifest::load(path)?;
        if manifest.is_empty() {
            warn!("{} has no files, leaving it out", path.display());
            continue;
        }
        let values: BTreeSet<String> = manifest
            .iter()
            .map(|asset| match key {
                CompareKey::Filename => asset.filename.clone(),
                CompareKey::Relpath => asset.relpath.clone(),
            })
            .collect();
        info!("{}: {} files", path.display(), values.len());
        lists.push((path.to_path_buf(), values));
    }

    Ok(compare_values(lists))
}
