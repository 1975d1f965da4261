//! Line ownership: which method version of a commit owns (file, line)?
//!
//! File paths are matched by substring containment because the coverage
//! tool reports paths relative to a different root than the method
//! extractor. Two files sharing a path suffix can therefore mis-bind; the
//! first candidate in insertion order wins.

use std::collections::HashMap;

use crate::core::{MethodVersion, Result};
use crate::storage::StorageAdapter;

/// Method versions of one commit, in insertion order.
#[derive(Debug, Clone)]
pub struct MethodVersionIndex {
    commit_id: i64,
    versions: Vec<MethodVersion>,
}

impl MethodVersionIndex {
    /// Build from versions that all belong to `commit_id`; others are ignored.
    pub fn new(commit_id: i64, versions: Vec<MethodVersion>) -> Self {
        let versions = versions
            .into_iter()
            .filter(|v| v.commit_id == commit_id)
            .collect();
        Self {
            commit_id,
            versions,
        }
    }

    /// Load every version bound to `commit_id`.
    pub fn load<S: StorageAdapter + ?Sized>(storage: &S, commit_id: i64) -> Result<Self> {
        Ok(Self::new(
            commit_id,
            storage.method_versions_for_commit(commit_id)?,
        ))
    }

    pub fn commit_id(&self) -> i64 {
        self.commit_id
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The first version whose path contains `full_name` and whose range
    /// contains `line`. An empty `full_name` never matches.
    pub fn lookup(&self, full_name: &str, line: u32) -> Option<&MethodVersion> {
        if full_name.is_empty() {
            return None;
        }
        self.versions
            .iter()
            .find(|v| v.file_path.contains(full_name) && v.contains_line(line))
    }

    /// Memoized [`lookup`](Self::lookup). Returns the owning version id.
    ///
    /// A cache built for another commit is cleared before use.
    pub fn resolve(&self, cache: &mut LineOwnerCache, full_name: &str, line: u32) -> Option<i64> {
        cache.reset_for(self.commit_id);

        if let Some(owner) = cache.lines.get(&(full_name.to_string(), line)) {
            cache.hits += 1;
            return *owner;
        }
        cache.misses += 1;

        let candidates = cache
            .files
            .entry(full_name.to_string())
            .or_insert_with(|| {
                if full_name.is_empty() {
                    return Vec::new();
                }
                self.versions
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.file_path.contains(full_name))
                    .map(|(i, _)| i)
                    .collect()
            });

        let owner = candidates
            .iter()
            .map(|&i| &self.versions[i])
            .find(|v| v.contains_line(line))
            .map(|v| v.id);

        cache.lines.insert((full_name.to_string(), line), owner);
        owner
    }
}

/// Per-ingestion memo of line ownership answers.
///
/// Keyed by (file, line) and scoped to one commit; answers never leak
/// across commits.
#[derive(Debug, Default)]
pub struct LineOwnerCache {
    commit_id: Option<i64>,
    /// Candidate version positions per coverage file name.
    files: HashMap<String, Vec<usize>>,
    lines: HashMap<(String, u32), Option<i64>>,
    hits: usize,
    misses: usize,
}

impl LineOwnerCache {
    pub fn new(commit_id: i64) -> Self {
        Self {
            commit_id: Some(commit_id),
            ..Self::default()
        }
    }

    fn reset_for(&mut self, commit_id: i64) {
        if self.commit_id != Some(commit_id) {
            if self.commit_id.is_some() {
                tracing::debug!(
                    "Line cache moved from commit {:?} to {}; clearing",
                    self.commit_id,
                    commit_id
                );
            }
            *self = Self::new(commit_id);
        }
    }

    pub fn commit_id(&self) -> Option<i64> {
        self.commit_id
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
