//! JSON inputs produced by the external analysis tools.
//!
//! - `methods.json`: declared production methods with line-range snapshots
//!   (method-extraction tool).
//! - `coverage.json`: per-test line-activation matrix (coverage tool).
//! - `commit.json` / `project.json`: metadata written by the repository driver.

use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::core::{Error, MethodKey, Result};

// ============================================================================
// methods.json
// ============================================================================

/// One declared method as reported by the method-extraction tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDeclaration {
    pub method_name: String,
    pub method_decl: String,
    pub class_name: String,
    pub package_name: String,
    pub file_path: String,
    #[serde(default)]
    pub versions: Vec<VersionDescriptor>,
}

impl MethodDeclaration {
    /// Identity tuple of the declared method.
    pub fn key(&self) -> MethodKey {
        MethodKey {
            method_name: self.method_name.clone(),
            method_decl: self.method_decl.clone(),
            class_name: self.class_name.clone(),
            package_name: self.package_name.clone(),
        }
    }

    /// The most recent line-range snapshot; the only one ingestion uses.
    pub fn current_version(&self) -> Option<&VersionDescriptor> {
        self.versions.last()
    }
}

/// A line-range snapshot of a declared method.
///
/// Extractor versions disagree on whether line numbers are numbers or
/// strings, so both are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    #[serde(deserialize_with = "line_number")]
    pub line_start: u32,
    #[serde(deserialize_with = "line_number")]
    pub line_end: u32,
}

fn line_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Line {
        Number(u32),
        Text(String),
    }

    match Line::deserialize(deserializer)? {
        Line::Number(n) => Ok(n),
        Line::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid line number: {s:?}"))),
    }
}

/// Parse `methods.json` from a file.
pub fn load_methods(path: &Path) -> Result<Vec<MethodDeclaration>> {
    let content = read(path)?;
    parse_methods_str(&content)
}

/// Parse `methods.json` content.
pub fn parse_methods_str(content: &str) -> Result<Vec<MethodDeclaration>> {
    Ok(serde_json::from_str(content)?)
}

// ============================================================================
// coverage.json
// ============================================================================

/// Raw per-test coverage matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveragePayload {
    pub test_count: i64,
    /// Raw test identifiers; the position is the test id used by `sources`.
    #[serde(default)]
    pub tests_index: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceCoverage>,
}

/// Coverage of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCoverage {
    pub source: SourceInfo,
    /// Test ids (indices into `testsIndex`) that activated this source.
    #[serde(default)]
    pub activating_tests: Vec<usize>,
    /// One activation row per entry of `activating_tests`; column `i` is
    /// line `first_line + i`.
    #[serde(default)]
    pub test_stmt_matrix: Vec<Vec<bool>>,
}

/// Identity and line span of a covered source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub full_name: String,
    pub first_line: u32,
    #[serde(default)]
    pub last_line: u32,
}

impl CoveragePayload {
    /// Total number of set activation bits across all sources.
    pub fn activation_count(&self) -> usize {
        self.sources
            .iter()
            .flat_map(|s| s.test_stmt_matrix.iter())
            .map(|row| row.iter().filter(|covered| **covered).count())
            .sum()
    }
}

/// Parse `coverage.json` from a file.
pub fn load_coverage(path: &Path) -> Result<CoveragePayload> {
    let content = read(path)?;
    parse_coverage_str(&content)
}

/// Parse `coverage.json` content.
pub fn parse_coverage_str(content: &str) -> Result<CoveragePayload> {
    Ok(serde_json::from_str(content)?)
}

// ============================================================================
// commit.json / project.json
// ============================================================================

/// Commit metadata written next to the tool outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub datetime: String,
}

/// Project metadata written at the root of a project's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(alias = "project_name")]
    pub name: String,
}

/// Parse `commit.json` from a file.
pub fn load_commit(path: &Path) -> Result<CommitInfo> {
    Ok(serde_json::from_str(&read(path)?)?)
}

/// Parse `project.json` from a file.
pub fn load_project(path: &Path) -> Result<ProjectInfo> {
    Ok(serde_json::from_str(&read(path)?)?)
}

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}
