use crate::asset::{Asset, Signature};
use crate::manifest::Manifest;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Modified,
    Added,
    Deleted,
    Moved,
}

impl Outcome {
    /// Single letter status code used in reports.
    pub fn code(self) -> &'static str {
        match self {
            Outcome::Unchanged => "U",
            Outcome::Modified => "M",
            Outcome::Added => "A",
            Outcome::Deleted => "D",
            Outcome::Moved => "R",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Modified => "modified",
            Outcome::Added => "added",
            Outcome::Deleted => "deleted",
            Outcome::Moved => "moved",
        }
    }
}

/// Result of reconciling collection A (before) against collection B (after).
///
/// Every relpath of either collection lands in exactly one category. All
/// containers are ordered, so iterating a report is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// In both collections with the same content.
    pub unchanged: BTreeSet<String>,
    /// In both collections, content differs: `(signature in A, signature in B)`.
    pub modified: BTreeMap<String, (Signature, Signature)>,
    /// Only in B, content not found in A.
    pub added: BTreeSet<String>,
    /// Only in A, content not found in B.
    pub deleted: BTreeSet<String>,
    /// Paths present in only one collection whose content exists in the
    /// other, grouped by signature. Paths from both sides share a group.
    pub moved: BTreeMap<Signature, Vec<String>>,
}

impl ReconciliationReport {
    /// True when both collections hold the same paths with the same content.
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.added.is_empty()
            && self.deleted.is_empty()
            && self.moved.is_empty()
    }

    #[cfg(test)]
    pub fn outcome_of(&self, relpath: &str) -> Option<Outcome> {
        if self.unchanged.contains(relpath) {
            Some(Outcome::Unchanged)
        } else if self.modified.contains_key(relpath) {
            Some(Outcome::Modified)
        } else if self.added.contains(relpath) {
            Some(Outcome::Added)
        } else if self.deleted.contains(relpath) {
            Some(Outcome::Deleted)
        } else if self.moved.values().any(|paths| paths.iter().any(|p| p == relpath)) {
            Some(Outcome::Moved)
        } else {
            None
        }
    }

    pub fn total(&self) -> usize {
        self.unchanged.len()
            + self.modified.len()
            + self.added.len()
            + self.deleted.len()
            + self.moved.values().map(Vec::len).sum::<usize>()
    }
}

/// Content signatures usable for move detection.
///
/// Assets without a checksum are left out: a bare byte count is not enough
/// evidence that two files hold the same content.
fn signatures<'a>(assets: impl Iterator<Item = &'a Asset>) -> HashSet<Signature> {
    assets
        .map(Asset::signature)
        .filter(|s| s.checksum.is_some())
        .collect()
}

pub fn reconcile(a: &Manifest, b: &Manifest) -> ReconciliationReport {
    let a_by_path = a.by_relpath();
    let b_by_path = b.by_relpath();
    let a_sigs = signatures(a.iter());
    let b_sigs = signatures(b.iter());

    let mut report = ReconciliationReport::default();

    for (path, asset_a) in &a_by_path {
        match b_by_path.get(path) {
            Some(asset_b) if asset_a == asset_b => {
                report.unchanged.insert(path.to_string());
            }
            Some(asset_b) => {
                debug!("{} modified", path);
                report
                    .modified
                    .insert(path.to_string(), (asset_a.signature(), asset_b.signature()));
            }
            None => {
                let signature = asset_a.signature();
                if b_sigs.contains(&signature) {
                    report.moved.entry(signature).or_default().push(path.to_string());
                } else {
                    report.deleted.insert(path.to_string());
                }
            }
        }
    }

    for (path, asset_b) in &b_by_path {
        if a_by_path.contains_key(path) {
            continue;
        }
        let signature = asset_b.signature();
        if a_sigs.contains(&signature) {
            report.moved.entry(signature).or_default().push(path.to_string());
        } else {
            report.added.insert(path.to_string());
        }
    }

    for paths in report.moved.values_mut() {
        paths.sort();
    }

    info!(
        "Reconciled {} and {} assets: {} unchanged, {} modified, {} added, {} deleted, {} moved",
        a.len(),
        b.len(),
        report.unchanged.len(),
        report.modified.len(),
        report.added.len(),
        report.deleted.len(),
        report.moved.values().map(Vec::len).sum::<usize>()
    );

    report
}

/// A single criterion for the narrower verification modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerifyMode {
    /// Checksum and size.
    Checksums,
    Relpaths,
    Filenames,
}

impl VerifyMode {
    pub fn name(self) -> &'static str {
        match self {
            VerifyMode::Checksums => "checksums",
            VerifyMode::Relpaths => "relpaths",
            VerifyMode::Filenames => "filenames",
        }
    }

    /// Matching key of an asset. An asset without a checksum has no key under
    /// [`VerifyMode::Checksums`] and never matches anything.
    fn key(self, asset: &Asset) -> Option<String> {
        match self {
            VerifyMode::Checksums => {
                let signature = asset.signature();
                signature.checksum.is_some().then(|| signature.to_string())
            }
            VerifyMode::Relpaths => Some(asset.relpath.clone()),
            VerifyMode::Filenames => Some(asset.filename.clone()),
        }
    }
}

impl FromStr for VerifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checksums" => Ok(VerifyMode::Checksums),
            "relpaths" => Ok(VerifyMode::Relpaths),
            "filenames" => Ok(VerifyMode::Filenames),
            _ => Err(format!("unknown verify mode: {s}")),
        }
    }
}

/// Relpaths of each side whose key under one mode has no match on the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeReport {
    pub mode: VerifyMode,
    pub only_in_first: BTreeSet<String>,
    pub only_in_second: BTreeSet<String>,
}

impl ModeReport {
    pub fn is_clean(&self) -> bool {
        self.only_in_first.is_empty() && self.only_in_second.is_empty()
    }
}

pub fn compare_by_mode(a: &Manifest, b: &Manifest, mode: VerifyMode) -> ModeReport {
    let not_in_other = |this: &Manifest, other: &Manifest| -> BTreeSet<String> {
        let other_keys: HashSet<String> =
            other.iter().filter_map(|asset| mode.key(asset)).collect();
        this.iter()
            .filter(|asset| mode.key(asset).is_none_or(|key| !other_keys.contains(&key)))
            .map(|asset| asset.relpath.clone())
            .collect()
    };

    let report = ModeReport {
        mode,
        only_in_first: not_in_other(a, b),
        only_in_second: not_in_other(b, a),
    };
    info!(
        "By {}: {} only in first, {} only in second",
        mode.name(),
        report.only_in_first.len(),
        report.only_in_second.len()
    );
    report
}

/// Counts how many assets share each signature within one collection.
///
/// Duplicated content within a collection is allowed; this only feeds the
/// summary line of the report.
pub fn duplicate_signatures(manifest: &Manifest) -> BTreeMap<Signature, usize> {
    let mut counts: HashMap<Signature, usize> = HashMap::new();
    for asset in manifest.iter().filter(|a| a.digests.md5.is_some()) {
        *counts.entry(asset.signature()).or_default() += 1;
    }
    counts.into_iter().filter(|(_, n)| *n > 1).collect()
}

#[cfg(test)]
mod tests;
