//! Stored rows and their identity keys.
//!
//! Every row carries a surrogate `id` assigned by the store; identity is the
//! tuple named by the matching `*Key` type and is enforced with a unique
//! constraint, never derived by hashing.

use serde::{Deserialize, Serialize};

/// An analyzed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// One analyzed commit of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: i64,
    pub project_id: i64,
    pub sha: String,
    pub author: String,
    /// Commit timestamp as reported by the repository driver.
    pub datetime: String,
}

/// Identity of a production method inside a project.
///
/// The file path is deliberately absent so a method keeps its identity when
/// its file moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    pub method_name: String,
    pub method_decl: String,
    pub class_name: String,
    pub package_name: String,
}

/// A production method as first seen in some commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub id: i64,
    pub project_id: i64,
    pub method_name: String,
    pub method_decl: String,
    pub class_name: String,
    pub package_name: String,
}

impl Method {
    /// The identity tuple of this method.
    pub fn key(&self) -> MethodKey {
        MethodKey {
            method_name: self.method_name.clone(),
            method_decl: self.method_decl.clone(),
            class_name: self.class_name.clone(),
            package_name: self.package_name.clone(),
        }
    }
}

/// A method's line-range footprint as of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodVersion {
    pub id: i64,
    pub method_id: i64,
    pub commit_id: i64,
    pub line_start: u32,
    pub line_end: u32,
    pub file_path: String,
}

impl MethodVersion {
    /// Whether `line` falls inside `[line_start, line_end]`.
    pub fn contains_line(&self, line: u32) -> bool {
        self.line_start <= line && line <= self.line_end
    }
}

/// A method version that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMethodVersion {
    pub method_id: i64,
    pub commit_id: i64,
    pub line_start: u32,
    pub line_end: u32,
    pub file_path: String,
}

/// Identity of a test case inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestKey {
    pub package_name: String,
    pub class_name: String,
    pub method_name: String,
}

/// A test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethod {
    pub id: i64,
    pub project_id: i64,
    pub package_name: String,
    pub class_name: String,
    pub method_name: String,
}

/// One covered line bound to a method version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCoverage {
    pub id: i64,
    pub commit_id: i64,
    pub test_id: i64,
    pub method_version_id: i64,
    pub test_result: bool,
    /// Source file identity as reported by the coverage tool.
    pub full_name: String,
    pub line_number: u32,
}

/// A covered line that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineCoverage<'a> {
    pub commit_id: i64,
    pub test_id: i64,
    pub method_version_id: i64,
    pub test_result: bool,
    pub full_name: &'a str,
    pub line_number: u32,
}

/// Outcome of inserting a single coverage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted(i64),
    /// The identity tuple was already stored; nothing was written.
    Duplicate,
}

/// Test-to-method edge of one commit, grouped by (test, method version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub test_id: i64,
    pub method_id: i64,
    pub test_result: bool,
}

/// Edge of a method's history: which test covered it in which commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodHistoryEdge {
    pub test_id: i64,
    pub commit_id: i64,
    pub test_result: bool,
}

/// Edge of a test's history: which method version it covered in which commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestHistoryEdge {
    pub commit_id: i64,
    pub method_version_id: i64,
    pub test_result: bool,
}

/// Row counts of every stored table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub projects: usize,
    pub commits: usize,
    pub methods: usize,
    pub method_versions: usize,
    pub tests: usize,
    pub line_coverage: usize,
}
