//! Read-side views over stored coverage history.
//!
//! Each view bundles the rows a consumer needs to draw a test-to-method
//! graph: the nodes and the edge list grouped by (test, method version).

use serde::Serialize;

use crate::core::{
    Commit, Edge, Error, Method, MethodHistoryEdge, MethodVersion, Project, Result,
    TestHistoryEdge, TestMethod,
};
use crate::storage::StorageAdapter;

/// Coverage graph of one commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitCoverage {
    pub project: Project,
    pub commit: Commit,
    /// Methods with a version in this commit.
    pub methods: Vec<Method>,
    /// Tests with at least one coverage row in this commit.
    pub tests: Vec<TestMethod>,
    pub edges: Vec<Edge>,
}

/// Coverage of one method across every commit that declared it.
#[derive(Debug, Clone, Serialize)]
pub struct MethodHistory {
    pub method: Method,
    pub versions: Vec<MethodVersion>,
    pub commits: Vec<Commit>,
    pub tests: Vec<TestMethod>,
    pub edges: Vec<MethodHistoryEdge>,
}

/// A method version together with its method.
#[derive(Debug, Clone, Serialize)]
pub struct CoveredVersion {
    pub version: MethodVersion,
    pub method: Method,
}

/// Everything one test covered, per commit.
#[derive(Debug, Clone, Serialize)]
pub struct TestHistory {
    pub test: TestMethod,
    pub versions: Vec<CoveredVersion>,
    pub commits: Vec<Commit>,
    pub edges: Vec<TestHistoryEdge>,
}

/// Coverage graph of `commit_id`, which must belong to `project_id`.
pub fn commit_coverage<S: StorageAdapter + ?Sized>(
    storage: &S,
    project_id: i64,
    commit_id: i64,
) -> Result<CommitCoverage> {
    let project = storage
        .project(project_id)?
        .ok_or_else(|| Error::not_found("Project", project_id))?;
    let commit = storage
        .commit(commit_id)?
        .filter(|c| c.project_id == project_id)
        .ok_or_else(|| Error::not_found("Commit", commit_id))?;

    Ok(CommitCoverage {
        methods: storage.methods(project_id, Some(commit_id))?,
        tests: storage.tests_for_commit(project_id, commit_id)?,
        edges: storage.commit_edges(commit_id)?,
        project,
        commit,
    })
}

/// History of one production method.
pub fn method_history<S: StorageAdapter + ?Sized>(
    storage: &S,
    method_id: i64,
) -> Result<MethodHistory> {
    let method = storage
        .method(method_id)?
        .ok_or_else(|| Error::not_found("Method", method_id))?;
    let versions = storage.method_versions(method_id)?;
    let commits = load_commits(storage, versions.iter().map(|v| v.commit_id))?;

    Ok(MethodHistory {
        tests: storage.tests_for_method(method_id)?,
        edges: storage.method_edges(method_id)?,
        method,
        versions,
        commits,
    })
}

/// History of one test.
pub fn test_history<S: StorageAdapter + ?Sized>(storage: &S, test_id: i64) -> Result<TestHistory> {
    let test = storage
        .test(test_id)?
        .ok_or_else(|| Error::not_found("Test", test_id))?;
    let edges = storage.test_edges(test_id)?;

    let mut version_ids: Vec<i64> = edges.iter().map(|e| e.method_version_id).collect();
    version_ids.sort_unstable();
    version_ids.dedup();

    let mut versions = Vec::with_capacity(version_ids.len());
    for id in version_ids {
        let Some(version) = storage.method_version(id)? else {
            continue;
        };
        let Some(method) = storage.method(version.method_id)? else {
            continue;
        };
        versions.push(CoveredVersion { version, method });
    }

    Ok(TestHistory {
        commits: load_commits(storage, edges.iter().map(|e| e.commit_id))?,
        test,
        versions,
        edges,
    })
}

/// Commits for `ids`, deduplicated, oldest first.
fn load_commits<S: StorageAdapter + ?Sized>(
    storage: &S,
    ids: impl Iterator<Item = i64>,
) -> Result<Vec<Commit>> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();

    let mut commits = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(commit) = storage.commit(id)? {
            commits.push(commit);
        }
    }
    Ok(commits)
}

/// All projects.
pub fn list_projects<S: StorageAdapter + ?Sized>(storage: &S) -> Result<Vec<Project>> {
    storage.projects()
}

/// Commits of a project, newest first.
pub fn list_commits<S: StorageAdapter + ?Sized>(storage: &S, project_id: i64) -> Result<Vec<Commit>> {
    require_project(storage, project_id)?;
    storage.commits(project_id)
}

/// Methods of a project, optionally only those declared in `commit_id`.
pub fn list_methods<S: StorageAdapter + ?Sized>(
    storage: &S,
    project_id: i64,
    commit_id: Option<i64>,
) -> Result<Vec<Method>> {
    require_project(storage, project_id)?;
    storage.methods(project_id, commit_id)
}

/// Versions of a method, oldest first.
pub fn list_versions<S: StorageAdapter + ?Sized>(
    storage: &S,
    method_id: i64,
) -> Result<Vec<MethodVersion>> {
    if storage.method(method_id)?.is_none() {
        return Err(Error::not_found("Method", method_id));
    }
    storage.method_versions(method_id)
}

fn require_project<S: StorageAdapter + ?Sized>(storage: &S, project_id: i64) -> Result<Project> {
    storage
        .project(project_id)?
        .ok_or_else(|| Error::not_found("Project", project_id))
}
