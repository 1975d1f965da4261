//! SQLite schema.
//!
//! Surrogate integer keys plus a UNIQUE constraint on each identity tuple.

/// Value stored in `PRAGMA user_version` once the schema is created.
pub const SCHEMA_VERSION: i64 = 1;

pub(super) const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    project_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    sha TEXT NOT NULL,
    author TEXT NOT NULL,
    datetime TEXT NOT NULL,
    UNIQUE (project_id, sha)
);

CREATE TABLE IF NOT EXISTS prod_methods (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    method_name TEXT NOT NULL,
    method_decl TEXT NOT NULL,
    class_name TEXT NOT NULL,
    package_name TEXT NOT NULL,
    UNIQUE (project_id, method_name, method_decl, class_name, package_name)
);

CREATE TABLE IF NOT EXISTS method_versions (
    id INTEGER PRIMARY KEY,
    method_id INTEGER NOT NULL REFERENCES prod_methods(id),
    commit_id INTEGER NOT NULL REFERENCES commits(id),
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    UNIQUE (method_id, commit_id, file_path)
);
CREATE INDEX IF NOT EXISTS idx_method_versions_commit ON method_versions(commit_id);

CREATE TABLE IF NOT EXISTS test_methods (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    package_name TEXT NOT NULL,
    class_name TEXT NOT NULL,
    method_name TEXT NOT NULL,
    UNIQUE (project_id, package_name, class_name, method_name)
);

CREATE TABLE IF NOT EXISTS line_coverage (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL REFERENCES commits(id),
    test_id INTEGER NOT NULL REFERENCES test_methods(id),
    method_version_id INTEGER NOT NULL REFERENCES method_versions(id),
    test_result INTEGER NOT NULL,
    full_name TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    UNIQUE (commit_id, test_id, method_version_id, line_number)
);
CREATE INDEX IF NOT EXISTS idx_line_coverage_edge
    ON line_coverage(commit_id, method_version_id, test_result);
CREATE INDEX IF NOT EXISTS idx_line_coverage_version_commit
    ON line_coverage(method_version_id, commit_id);
CREATE INDEX IF NOT EXISTS idx_line_coverage_version_test
    ON line_coverage(method_version_id, test_id);
CREATE INDEX IF NOT EXISTS idx_line_coverage_test
    ON line_coverage(test_id);
";
