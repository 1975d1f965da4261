//! Persistence boundary.
//!
//! [`StorageAdapter`] is everything the ingestion core and the queries need
//! from a store. It is implemented for [`rusqlite::Connection`], so the same
//! code runs against a plain connection or inside a transaction (which
//! dereferences to one). [`SqliteStore`] owns the connection and the schema.

mod schema;
mod sqlite;

use crate::core::{
    Commit, Edge, EdgeInsert, Method, MethodHistoryEdge, MethodKey, MethodVersion,
    NewLineCoverage, NewMethodVersion, Project, Result, StoreStats, TestHistoryEdge, TestKey,
    TestMethod,
};

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

/// Reads and writes of projects, commits, methods, versions, tests and edges.
///
/// Inserts never deduplicate on their own: callers look rows up by identity
/// first. The one exception is [`insert_line_coverage`](Self::insert_line_coverage),
/// which reports an already-stored edge as [`EdgeInsert::Duplicate`].
pub trait StorageAdapter {
    // ------------------------------------------------------------------
    // projects and commits
    // ------------------------------------------------------------------

    /// Get the project named `name`, creating it if needed.
    fn upsert_project(&self, name: &str) -> Result<Project>;

    fn project(&self, id: i64) -> Result<Option<Project>>;

    fn project_by_name(&self, name: &str) -> Result<Option<Project>>;

    /// All projects ordered by name.
    fn projects(&self) -> Result<Vec<Project>>;

    /// Get the commit `(project_id, sha)`, creating it if needed. An existing
    /// commit keeps its original metadata.
    fn upsert_commit(
        &self,
        project_id: i64,
        sha: &str,
        author: &str,
        datetime: &str,
    ) -> Result<Commit>;

    fn commit(&self, id: i64) -> Result<Option<Commit>>;

    fn commit_by_sha(&self, project_id: i64, sha: &str) -> Result<Option<Commit>>;

    /// Commits of a project, most recently stored first.
    fn commits(&self, project_id: i64) -> Result<Vec<Commit>>;

    /// Remove a commit with its method versions and coverage rows.
    fn delete_commit(&self, commit_id: i64) -> Result<()>;

    // ------------------------------------------------------------------
    // production methods
    // ------------------------------------------------------------------

    fn find_method(&self, project_id: i64, key: &MethodKey) -> Result<Option<Method>>;

    fn insert_method(&self, project_id: i64, key: &MethodKey) -> Result<Method>;

    fn method(&self, id: i64) -> Result<Option<Method>>;

    /// Methods of a project ordered by package, class and declaration;
    /// restricted to methods with a version in `commit_id` when given.
    fn methods(&self, project_id: i64, commit_id: Option<i64>) -> Result<Vec<Method>>;

    fn find_method_version(
        &self,
        method_id: i64,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Option<MethodVersion>>;

    fn insert_method_version(&self, version: &NewMethodVersion) -> Result<MethodVersion>;

    fn method_version(&self, id: i64) -> Result<Option<MethodVersion>>;

    /// Versions bound to one commit, in insertion order.
    fn method_versions_for_commit(&self, commit_id: i64) -> Result<Vec<MethodVersion>>;

    /// Versions of one method, in insertion order.
    fn method_versions(&self, method_id: i64) -> Result<Vec<MethodVersion>>;

    // ------------------------------------------------------------------
    // tests and coverage
    // ------------------------------------------------------------------

    fn find_test(&self, project_id: i64, key: &TestKey) -> Result<Option<TestMethod>>;

    fn insert_test(&self, project_id: i64, key: &TestKey) -> Result<TestMethod>;

    fn test(&self, id: i64) -> Result<Option<TestMethod>>;

    /// Tests with at least one coverage row in the commit.
    fn tests_for_commit(&self, project_id: i64, commit_id: i64) -> Result<Vec<TestMethod>>;

    /// Tests with a coverage row on any version of the method.
    fn tests_for_method(&self, method_id: i64) -> Result<Vec<TestMethod>>;

    fn insert_line_coverage(&self, row: &NewLineCoverage<'_>) -> Result<EdgeInsert>;

    /// Edges of one commit grouped by (test, method version).
    fn commit_edges(&self, commit_id: i64) -> Result<Vec<Edge>>;

    /// Edges of every version of one method grouped by (test, method version).
    fn method_edges(&self, method_id: i64) -> Result<Vec<MethodHistoryEdge>>;

    /// Edges of one test grouped by (method version, commit).
    fn test_edges(&self, test_id: i64) -> Result<Vec<TestHistoryEdge>>;

    /// Row counts of every table.
    fn stats(&self) -> Result<StoreStats>;
}
