//! SQLite implementation of [`StorageAdapter`].

use std::path::Path;

use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::schema::{CREATE_SCHEMA, SCHEMA_VERSION};
use super::StorageAdapter;
use crate::core::{
    Commit, Edge, EdgeInsert, Method, MethodHistoryEdge, MethodKey, MethodVersion,
    NewLineCoverage, NewMethodVersion, Project, Result, StoreStats, TestHistoryEdge, TestKey,
    TestMethod,
};

/// Owns one SQLite connection with the coverage schema applied.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` is accepted.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened coverage database");
        Self::with_connection(conn)
    }

    /// Open a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        self.conn.execute_batch(CREATE_SCHEMA)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!(from = version, to = SCHEMA_VERSION, "Applied schema");
        Ok(())
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// The underlying connection, usable as a [`StorageAdapter`].
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one transaction. Writes are committed only when `f`
    /// returns `Ok`; any error rolls everything back.
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

const PROJECT_COLUMNS: &str = "id, project_name";
const COMMIT_COLUMNS: &str = "id, project_id, sha, author, datetime";
const METHOD_COLUMNS: &str =
    "id, project_id, method_name, method_decl, class_name, package_name";
const VERSION_COLUMNS: &str = "id, method_id, commit_id, line_start, line_end, file_path";
const TEST_COLUMNS: &str = "id, project_id, package_name, class_name, method_name";

fn project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn commit_row(row: &Row<'_>) -> rusqlite::Result<Commit> {
    Ok(Commit {
        id: row.get(0)?,
        project_id: row.get(1)?,
        sha: row.get(2)?,
        author: row.get(3)?,
        datetime: row.get(4)?,
    })
}

fn method_row(row: &Row<'_>) -> rusqlite::Result<Method> {
    Ok(Method {
        id: row.get(0)?,
        project_id: row.get(1)?,
        method_name: row.get(2)?,
        method_decl: row.get(3)?,
        class_name: row.get(4)?,
        package_name: row.get(5)?,
    })
}

fn version_row(row: &Row<'_>) -> rusqlite::Result<MethodVersion> {
    Ok(MethodVersion {
        id: row.get(0)?,
        method_id: row.get(1)?,
        commit_id: row.get(2)?,
        line_start: row.get(3)?,
        line_end: row.get(4)?,
        file_path: row.get(5)?,
    })
}

fn test_row(row: &Row<'_>) -> rusqlite::Result<TestMethod> {
    Ok(TestMethod {
        id: row.get(0)?,
        project_id: row.get(1)?,
        package_name: row.get(2)?,
        class_name: row.get(3)?,
        method_name: row.get(4)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// ============================================================================
// StorageAdapter
// ============================================================================

impl StorageAdapter for Connection {
    fn upsert_project(&self, name: &str) -> Result<Project> {
        self.execute(
            "INSERT INTO projects (project_name) VALUES (?1)
             ON CONFLICT (project_name) DO NOTHING",
            params![name],
        )?;
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_name = ?1");
        Ok(self.query_row(&sql, params![name], project_row)?)
    }

    fn project(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        Ok(self.query_row(&sql, params![id], project_row).optional()?)
    }

    fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_name = ?1");
        Ok(self.query_row(&sql, params![name], project_row).optional()?)
    }

    fn projects(&self) -> Result<Vec<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY project_name");
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map([], project_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn upsert_commit(
        &self,
        project_id: i64,
        sha: &str,
        author: &str,
        datetime: &str,
    ) -> Result<Commit> {
        self.execute(
            "INSERT INTO commits (project_id, sha, author, datetime) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (project_id, sha) DO NOTHING",
            params![project_id, sha, author, datetime],
        )?;
        let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE project_id = ?1 AND sha = ?2");
        Ok(self.query_row(&sql, params![project_id, sha], commit_row)?)
    }

    fn commit(&self, id: i64) -> Result<Option<Commit>> {
        let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE id = ?1");
        Ok(self.query_row(&sql, params![id], commit_row).optional()?)
    }

    fn commit_by_sha(&self, project_id: i64, sha: &str) -> Result<Option<Commit>> {
        let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE project_id = ?1 AND sha = ?2");
        Ok(self
            .query_row(&sql, params![project_id, sha], commit_row)
            .optional()?)
    }

    fn commits(&self, project_id: i64) -> Result<Vec<Commit>> {
        let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE project_id = ?1 ORDER BY id DESC");
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], commit_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn delete_commit(&self, commit_id: i64) -> Result<()> {
        let edges = self.execute(
            "DELETE FROM line_coverage WHERE commit_id = ?1",
            params![commit_id],
        )?;
        let versions = self.execute(
            "DELETE FROM method_versions WHERE commit_id = ?1",
            params![commit_id],
        )?;
        self.execute("DELETE FROM commits WHERE id = ?1", params![commit_id])?;
        debug!(commit_id, edges, versions, "Deleted commit");
        Ok(())
    }

    fn find_method(&self, project_id: i64, key: &MethodKey) -> Result<Option<Method>> {
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM prod_methods
             WHERE project_id = ?1 AND method_name = ?2 AND method_decl = ?3
               AND class_name = ?4 AND package_name = ?5"
        );
        let mut stmt = self.prepare_cached(&sql)?;
        Ok(stmt
            .query_row(
                params![
                    project_id,
                    key.method_name,
                    key.method_decl,
                    key.class_name,
                    key.package_name
                ],
                method_row,
            )
            .optional()?)
    }

    fn insert_method(&self, project_id: i64, key: &MethodKey) -> Result<Method> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO prod_methods (project_id, method_name, method_decl, class_name, package_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            project_id,
            key.method_name,
            key.method_decl,
            key.class_name,
            key.package_name
        ])?;
        Ok(Method {
            id: self.last_insert_rowid(),
            project_id,
            method_name: key.method_name.clone(),
            method_decl: key.method_decl.clone(),
            class_name: key.class_name.clone(),
            package_name: key.package_name.clone(),
        })
    }

    fn method(&self, id: i64) -> Result<Option<Method>> {
        let sql = format!("SELECT {METHOD_COLUMNS} FROM prod_methods WHERE id = ?1");
        Ok(self.query_row(&sql, params![id], method_row).optional()?)
    }

    fn methods(&self, project_id: i64, commit_id: Option<i64>) -> Result<Vec<Method>> {
        let order = "ORDER BY package_name, class_name, method_decl";
        match commit_id {
            Some(commit_id) => {
                let sql = format!(
                    "SELECT {METHOD_COLUMNS} FROM prod_methods
                     WHERE project_id = ?1
                       AND id IN (SELECT method_id FROM method_versions WHERE commit_id = ?2)
                     {order}"
                );
                let mut stmt = self.prepare(&sql)?;
                let rows = stmt.query_map(params![project_id, commit_id], method_row)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
            None => {
                let sql =
                    format!("SELECT {METHOD_COLUMNS} FROM prod_methods WHERE project_id = ?1 {order}");
                let mut stmt = self.prepare(&sql)?;
                let rows = stmt.query_map(params![project_id], method_row)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
        }
    }

    fn find_method_version(
        &self,
        method_id: i64,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Option<MethodVersion>> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM method_versions
             WHERE method_id = ?1 AND commit_id = ?2 AND file_path = ?3"
        );
        let mut stmt = self.prepare_cached(&sql)?;
        Ok(stmt
            .query_row(params![method_id, commit_id, file_path], version_row)
            .optional()?)
    }

    fn insert_method_version(&self, version: &NewMethodVersion) -> Result<MethodVersion> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO method_versions (method_id, commit_id, line_start, line_end, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            version.method_id,
            version.commit_id,
            version.line_start,
            version.line_end,
            version.file_path
        ])?;
        Ok(MethodVersion {
            id: self.last_insert_rowid(),
            method_id: version.method_id,
            commit_id: version.commit_id,
            line_start: version.line_start,
            line_end: version.line_end,
            file_path: version.file_path.clone(),
        })
    }

    fn method_version(&self, id: i64) -> Result<Option<MethodVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM method_versions WHERE id = ?1");
        Ok(self.query_row(&sql, params![id], version_row).optional()?)
    }

    fn method_versions_for_commit(&self, commit_id: i64) -> Result<Vec<MethodVersion>> {
        let sql =
            format!("SELECT {VERSION_COLUMNS} FROM method_versions WHERE commit_id = ?1 ORDER BY id");
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![commit_id], version_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn method_versions(&self, method_id: i64) -> Result<Vec<MethodVersion>> {
        let sql =
            format!("SELECT {VERSION_COLUMNS} FROM method_versions WHERE method_id = ?1 ORDER BY id");
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![method_id], version_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn find_test(&self, project_id: i64, key: &TestKey) -> Result<Option<TestMethod>> {
        let sql = format!(
            "SELECT {TEST_COLUMNS} FROM test_methods
             WHERE project_id = ?1 AND package_name = ?2 AND class_name = ?3 AND method_name = ?4"
        );
        let mut stmt = self.prepare_cached(&sql)?;
        Ok(stmt
            .query_row(
                params![project_id, key.package_name, key.class_name, key.method_name],
                test_row,
            )
            .optional()?)
    }

    fn insert_test(&self, project_id: i64, key: &TestKey) -> Result<TestMethod> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO test_methods (project_id, package_name, class_name, method_name)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            project_id,
            key.package_name,
            key.class_name,
            key.method_name
        ])?;
        Ok(TestMethod {
            id: self.last_insert_rowid(),
            project_id,
            package_name: key.package_name.clone(),
            class_name: key.class_name.clone(),
            method_name: key.method_name.clone(),
        })
    }

    fn test(&self, id: i64) -> Result<Option<TestMethod>> {
        let sql = format!("SELECT {TEST_COLUMNS} FROM test_methods WHERE id = ?1");
        Ok(self.query_row(&sql, params![id], test_row).optional()?)
    }

    fn tests_for_commit(&self, project_id: i64, commit_id: i64) -> Result<Vec<TestMethod>> {
        let sql = format!(
            "SELECT {TEST_COLUMNS} FROM test_methods
             WHERE project_id = ?1
               AND id IN (SELECT test_id FROM line_coverage WHERE commit_id = ?2)
             ORDER BY package_name, class_name, method_name"
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id, commit_id], test_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn tests_for_method(&self, method_id: i64) -> Result<Vec<TestMethod>> {
        let sql = format!(
            "SELECT {TEST_COLUMNS} FROM test_methods
             WHERE id IN (
                 SELECT lc.test_id FROM line_coverage lc
                 JOIN method_versions mv ON mv.id = lc.method_version_id
                 WHERE mv.method_id = ?1
             )
             ORDER BY package_name, class_name, method_name"
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![method_id], test_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn insert_line_coverage(&self, row: &NewLineCoverage<'_>) -> Result<EdgeInsert> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO line_coverage
                 (commit_id, test_id, method_version_id, test_result, full_name, line_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let inserted = stmt.execute(params![
            row.commit_id,
            row.test_id,
            row.method_version_id,
            row.test_result,
            row.full_name,
            row.line_number
        ]);
        match inserted {
            Ok(_) => Ok(EdgeInsert::Inserted(self.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Ok(EdgeInsert::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    fn commit_edges(&self, commit_id: i64) -> Result<Vec<Edge>> {
        let mut stmt = self.prepare(
            "SELECT lc.test_id, mv.method_id, MIN(lc.test_result)
             FROM line_coverage lc
             JOIN method_versions mv ON mv.id = lc.method_version_id
             WHERE lc.commit_id = ?1
             GROUP BY lc.test_id, lc.method_version_id
             ORDER BY lc.test_id, mv.method_id",
        )?;
        let rows = stmt.query_map(params![commit_id], |row| {
            Ok(Edge {
                test_id: row.get(0)?,
                method_id: row.get(1)?,
                test_result: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn method_edges(&self, method_id: i64) -> Result<Vec<MethodHistoryEdge>> {
        let mut stmt = self.prepare(
            "SELECT lc.test_id, lc.commit_id, MIN(lc.test_result)
             FROM line_coverage lc
             JOIN method_versions mv ON mv.id = lc.method_version_id
             WHERE mv.method_id = ?1
             GROUP BY lc.test_id, lc.method_version_id, lc.commit_id
             ORDER BY lc.commit_id, lc.test_id",
        )?;
        let rows = stmt.query_map(params![method_id], |row| {
            Ok(MethodHistoryEdge {
                test_id: row.get(0)?,
                commit_id: row.get(1)?,
                test_result: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn test_edges(&self, test_id: i64) -> Result<Vec<TestHistoryEdge>> {
        let mut stmt = self.prepare(
            "SELECT commit_id, method_version_id, MIN(test_result)
             FROM line_coverage
             WHERE test_id = ?1
             GROUP BY method_version_id, commit_id
             ORDER BY commit_id, method_version_id",
        )?;
        let rows = stmt.query_map(params![test_id], |row| {
            Ok(TestHistoryEdge {
                commit_id: row.get(0)?,
                method_version_id: row.get(1)?,
                test_result: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<usize> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let n: i64 = self.query_row(&sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            projects: count("projects")?,
            commits: count("commits")?,
            methods: count("prod_methods")?,
            method_versions: count("method_versions")?,
            tests: count("test_methods")?,
            line_coverage: count("line_coverage")?,
        })
    }
}
