//! Per-commit orchestration and batch import of analysis output trees.
//!
//! One commit is ingested inside one transaction: the project and commit
//! rows, the method catalog, tests and coverage either all land or none do.
//! A failing commit never stops a batch import.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{Config, LayoutConfig};
use crate::core::{Error, ProgressTracker, Result};
use crate::ingest::{CoverageIngestor, IngestReport};
use crate::payload::{
    load_commit, load_coverage, load_methods, load_project, CommitInfo, CoveragePayload,
    MethodDeclaration,
};
use crate::registry::{MethodRegistry, RegistryReport};
use crate::storage::{SqliteStore, StorageAdapter};

/// Everything needed to ingest one commit.
#[derive(Debug, Clone)]
pub struct CommitInput {
    pub project: String,
    pub commit: CommitInfo,
    pub methods: Vec<MethodDeclaration>,
    pub coverage: CoveragePayload,
}

impl CommitInput {
    /// Read the two tool outputs for `commit`.
    pub fn load(
        project: impl Into<String>,
        commit: CommitInfo,
        methods_path: &Path,
        coverage_path: &Path,
    ) -> Result<Self> {
        Ok(Self {
            project: project.into(),
            commit,
            methods: load_methods(methods_path)?,
            coverage: load_coverage(coverage_path)?,
        })
    }
}

/// Outcome of one successfully ingested commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub project: String,
    pub sha: String,
    pub project_id: i64,
    pub commit_id: i64,
    pub methods: RegistryReport,
    pub coverage: IngestReport,
}

/// Drives one commit through the registry and the coverage ingestor.
#[derive(Debug, Clone)]
pub struct CommitPipeline {
    registry_marker: String,
    ingestor: CoverageIngestor,
}

impl Default for CommitPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitPipeline {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            registry_marker: config.ingest.test_path_marker.clone(),
            ingestor: CoverageIngestor::new().with_min_test_count(config.ingest.min_test_count),
        }
    }

    fn registry(&self) -> MethodRegistry {
        MethodRegistry::new().with_test_path_marker(self.registry_marker.clone())
    }

    /// Ingest one commit atomically.
    ///
    /// On any fatal error nothing from this call is kept, including a commit
    /// row created for it.
    pub fn run(&self, store: &mut SqliteStore, input: &CommitInput) -> Result<CommitReport> {
        let sha = input.commit.sha.as_str();
        let result = store.with_transaction(|conn| {
            let project = conn.upsert_project(&input.project)?;
            let commit = conn.upsert_commit(
                project.id,
                sha,
                &input.commit.author,
                &input.commit.datetime,
            )?;
            let registered = self
                .registry()
                .ingest_methods(conn, &project, &commit, &input.methods)?;
            let coverage = self.ingestor.ingest(conn, &project, &commit, &input.coverage)?;

            Ok(CommitReport {
                project: project.name,
                sha: commit.sha,
                project_id: project.id,
                commit_id: commit.id,
                methods: registered.report,
                coverage,
            })
        });

        match &result {
            Ok(report) => tracing::info!(
                "{}@{}: ok, {} methods ({} new), {} versions, {} tests ({} new), {} edges, {} duplicate, {} unparseable, {} unresolved lines",
                report.project,
                sha,
                report.methods.methods_created + report.methods.methods_reused,
                report.methods.methods_created,
                report.methods.versions_created,
                report.coverage.tests_created + report.coverage.tests_reused,
                report.coverage.tests_created,
                report.coverage.edges_inserted,
                report.coverage.duplicate_edges,
                report.coverage.unparseable,
                report.coverage.unresolved_lines
            ),
            Err(e) => tracing::error!("{}@{}: failed, rolled back: {}", input.project, sha, e),
        }
        result
    }
}

// ============================================================================
// Directory import
// ============================================================================

/// Options for [`import_directory`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub layout: LayoutConfig,
    /// Skip commits already stored for their project.
    pub skip_existing: bool,
    /// Show a progress bar.
    pub progress: bool,
}

/// A commit that could not be ingested.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCommit {
    pub project: String,
    pub sha: String,
    pub error: String,
}

/// A commit left alone because it was already stored.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedCommit {
    pub project: String,
    pub sha: String,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub succeeded: Vec<CommitReport>,
    pub failed: Vec<FailedCommit>,
    pub skipped: Vec<SkippedCommit>,
}

impl ImportSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

/// One `<root>/<project>/<sha>` directory.
#[derive(Debug, Clone)]
struct CommitJob {
    project: String,
    dir: PathBuf,
}

impl CommitJob {
    fn commit_info(&self, layout: &LayoutConfig) -> Result<CommitInfo> {
        let path = self.dir.join(&layout.commit_file);
        if path.exists() {
            return load_commit(&path);
        }
        // Without metadata the directory name is the sha.
        Ok(CommitInfo {
            sha: dir_name(&self.dir),
            author: String::new(),
            datetime: String::new(),
        })
    }

    fn load(&self, layout: &LayoutConfig, commit: CommitInfo) -> Result<CommitInput> {
        CommitInput::load(
            self.project.clone(),
            commit,
            &self.dir.join(&layout.methods_file),
            &self.dir.join(&layout.coverage_file),
        )
    }
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn project_name(dir: &Path, layout: &LayoutConfig) -> Result<String> {
    let path = dir.join(&layout.project_file);
    if path.exists() {
        return Ok(load_project(&path)?.name);
    }
    Ok(dir_name(dir))
}

/// Commit directories to import, plus those of projects whose metadata
/// could not be read.
#[derive(Debug, Default)]
struct Discovery {
    jobs: Vec<CommitJob>,
    failed: Vec<FailedCommit>,
}

fn discover(root: &Path, layout: &LayoutConfig) -> Result<Discovery> {
    if !root.is_dir() {
        return Err(Error::FileNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut discovery = Discovery::default();
    for project_dir in subdirectories(root) {
        let commits = subdirectories(&project_dir);
        let project = match project_name(&project_dir, layout) {
            Ok(project) => project,
            Err(e) => {
                tracing::error!(
                    "{}: unreadable project metadata, {} commit(s) not imported: {}",
                    project_dir.display(),
                    commits.len(),
                    e
                );
                let project = dir_name(&project_dir);
                discovery
                    .failed
                    .extend(commits.iter().map(|dir| FailedCommit {
                        project: project.clone(),
                        sha: dir_name(dir),
                        error: e.to_string(),
                    }));
                continue;
            }
        };
        for dir in commits {
            discovery.jobs.push(CommitJob {
                project: project.clone(),
                dir,
            });
        }
    }
    Ok(discovery)
}

/// Import every `<root>/<project>/<sha>` directory.
///
/// Payloads are read and deserialized in parallel; commits are stored one
/// at a time in discovery order. A project with unreadable metadata fails
/// its own commits only. An unreadable root or a storage failure outside a
/// commit aborts the import.
pub fn import_directory(
    store: &mut SqliteStore,
    pipeline: &CommitPipeline,
    root: &Path,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let Discovery { jobs, failed } = discover(root, &options.layout)?;
    tracing::info!("Found {} commit directories under {}", jobs.len(), root.display());

    let progress = ProgressTracker::maybe(options.progress, jobs.len(), "import");
    let mut summary = ImportSummary {
        failed,
        ..ImportSummary::default()
    };

    let chunk_size = rayon::current_num_threads().max(1) * 2;
    for chunk in jobs.chunks(chunk_size) {
        let mut pending = Vec::with_capacity(chunk.len());
        for job in chunk {
            let commit = match job.commit_info(&options.layout) {
                Ok(commit) => commit,
                Err(e) => {
                    tracing::error!("{}: unreadable commit metadata: {}", job.dir.display(), e);
                    summary.failed.push(FailedCommit {
                        project: job.project.clone(),
                        sha: job.dir.display().to_string(),
                        error: e.to_string(),
                    });
                    progress.advance("");
                    continue;
                }
            };
            if options.skip_existing && is_stored(store, &job.project, &commit.sha)? {
                tracing::debug!("{}@{}: already stored, skipping", job.project, commit.sha);
                progress.advance(&commit.sha);
                summary.skipped.push(SkippedCommit {
                    project: job.project.clone(),
                    sha: commit.sha,
                });
                continue;
            }
            pending.push((job, commit));
        }

        let loaded: Vec<(String, String, Result<CommitInput>)> = pending
            .into_par_iter()
            .map(|(job, commit)| {
                let sha = commit.sha.clone();
                (job.project.clone(), sha, job.load(&options.layout, commit))
            })
            .collect();

        for (project, sha, input) in loaded {
            progress.advance(&sha);
            let outcome = match input {
                Ok(input) => pipeline.run(store, &input),
                Err(e) => {
                    tracing::error!("{project}@{sha}: unreadable input: {e}");
                    Err(e)
                }
            };
            match outcome {
                Ok(report) => summary.succeeded.push(report),
                Err(e) => summary.failed.push(FailedCommit {
                    project,
                    sha,
                    error: e.to_string(),
                }),
            }
        }
    }
    progress.finish();

    tracing::info!(
        "Import finished: {} succeeded, {} failed, {} skipped",
        summary.succeeded.len(),
        summary.failed.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

fn is_stored(store: &SqliteStore, project: &str, sha: &str) -> Result<bool> {
    let conn = store.conn();
    match conn.project_by_name(project)? {
        Some(project) => Ok(conn.commit_by_sha(project.id, sha)?.is_some()),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const METHODS: &str = r#"[
        {"methodName": "run", "methodDecl": "void run()", "className": "Foo",
         "packageName": "org.pkg", "filePath": "src/main/java/org/pkg/Foo.java",
         "versions": [{"lineStart": 10, "lineEnd": 14}]},
        {"methodName": "check", "methodDecl": "void check()", "className": "FooTest",
         "packageName": "org.pkg", "filePath": "src/test/java/org/pkg/FooTest.java",
         "versions": [{"lineStart": 5, "lineEnd": 9}]}
    ]"#;

    const COVERAGE: &str = r#"{
        "testCount": 2,
        "testsIndex": [
            "testRun().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testRun()]",
            "testFail().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testFail()]_F"
        ],
        "sources": [{
            "source": {"fullName": "org/pkg/Foo.java", "firstLine": 10, "lastLine": 13},
            "activatingTests": [0, 1],
            "testStmtMatrix": [[true, true, false, true], [false, true, false, false]]
        }]
    }"#;

    fn input(sha: &str, coverage: &str) -> CommitInput {
        CommitInput {
            project: "demo".to_string(),
            commit: CommitInfo {
                sha: sha.to_string(),
                author: "dev".to_string(),
                datetime: "2024-01-01T00:00:00Z".to_string(),
            },
            methods: crate::payload::parse_methods_str(METHODS).unwrap(),
            coverage: crate::payload::parse_coverage_str(coverage).unwrap(),
        }
    }

    fn write_commit(root: &Path, project: &str, sha: &str, coverage: &str) {
        let dir = root.join(project).join(sha);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("commit.json"),
            format!(r#"{{"sha": "{sha}", "author": "dev", "datetime": "2024-01-01"}}"#),
        )
        .unwrap();
        fs::write(dir.join("methods.json"), METHODS).unwrap();
        fs::write(dir.join("coverage.json"), coverage).unwrap();
    }

    // ========================================================================
    // CommitPipeline
    // ========================================================================

    #[test]
    fn test_run_stores_commit() {
        let mut store = SqliteStore::in_memory().unwrap();
        let report = CommitPipeline::new().run(&mut store, &input("abc", COVERAGE)).unwrap();

        assert_eq!(report.methods.methods_created, 1);
        assert_eq!(report.methods.filtered_tests, 1);
        assert_eq!(report.coverage.tests_created, 2);
        assert_eq!(report.coverage.edges_inserted, 4);

        let stats = store.conn().stats().unwrap();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.line_coverage, 4);
    }

    #[test]
    fn test_fatal_error_rolls_back_commit() {
        let mut store = SqliteStore::in_memory().unwrap();
        let bad = COVERAGE.replace(r#""testCount": 2"#, r#""testCount": 1"#);

        let result = CommitPipeline::new().run(&mut store, &input("abc", &bad));

        assert!(matches!(
            result,
            Err(Error::InsufficientCoverageData { test_count: 1 })
        ));
        let stats = store.conn().stats().unwrap();
        assert_eq!(stats.projects, 0);
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.methods, 0);
        assert_eq!(stats.method_versions, 0);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut store = SqliteStore::in_memory().unwrap();
        let pipeline = CommitPipeline::new();
        pipeline.run(&mut store, &input("abc", COVERAGE)).unwrap();
        let before = store.conn().stats().unwrap();

        let report = pipeline.run(&mut store, &input("abc", COVERAGE)).unwrap();

        assert_eq!(store.conn().stats().unwrap(), before);
        assert_eq!(report.coverage.duplicate_edges, 4);
    }

    #[test]
    fn test_pipeline_from_config() {
        let mut config = Config::default();
        config.ingest.min_test_count = 3;
        let mut store = SqliteStore::in_memory().unwrap();

        let result = CommitPipeline::from_config(&config).run(&mut store, &input("abc", COVERAGE));

        assert!(matches!(result, Err(Error::InsufficientCoverageData { .. })));
    }

    // ========================================================================
    // import_directory
    // ========================================================================

    #[test]
    fn test_import_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), "demo", "aaa", COVERAGE);
        write_commit(dir.path(), "demo", "bbb", r#"{"testCount": 0}"#);
        write_commit(dir.path(), "demo", "ccc", COVERAGE);

        let mut store = SqliteStore::in_memory().unwrap();
        let summary = import_directory(
            &mut store,
            &CommitPipeline::new(),
            dir.path(),
            &ImportOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].sha, "bbb");
        assert!(summary.has_failures());
        assert_eq!(store.conn().stats().unwrap().commits, 2);
    }

    #[test]
    fn test_import_broken_project_file_fails_only_that_project() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), "good", "aaa", COVERAGE);
        write_commit(dir.path(), "zbad", "bbb", COVERAGE);
        write_commit(dir.path(), "zbad", "ccc", COVERAGE);
        fs::write(dir.path().join("zbad").join("project.json"), "{not json").unwrap();

        let mut store = SqliteStore::in_memory().unwrap();
        let summary = import_directory(
            &mut store,
            &CommitPipeline::new(),
            dir.path(),
            &ImportOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.succeeded[0].project, "good");
        let failed: Vec<_> = summary
            .failed
            .iter()
            .map(|f| (f.project.as_str(), f.sha.as_str()))
            .collect();
        assert_eq!(failed, vec![("zbad", "bbb"), ("zbad", "ccc")]);
        assert_eq!(summary.total(), 3);
        assert_eq!(store.conn().stats().unwrap().commits, 1);
    }

    #[test]
    fn test_import_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), "demo", "aaa", COVERAGE);
        let mut store = SqliteStore::in_memory().unwrap();
        let pipeline = CommitPipeline::new();
        let options = ImportOptions {
            skip_existing: true,
            ..ImportOptions::default()
        };

        import_directory(&mut store, &pipeline, dir.path(), &options).unwrap();
        let second = import_directory(&mut store, &pipeline, dir.path(), &options).unwrap();

        assert!(second.succeeded.is_empty());
        assert_eq!(second.skipped.len(), 1);
        assert_eq!(second.total(), 1);
    }

    #[test]
    fn test_import_uses_project_file() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), "out-1", "aaa", COVERAGE);
        fs::write(
            dir.path().join("out-1").join("project.json"),
            r#"{"name": "commons-io"}"#,
        )
        .unwrap();

        let mut store = SqliteStore::in_memory().unwrap();
        import_directory(
            &mut store,
            &CommitPipeline::new(),
            dir.path(),
            &ImportOptions::default(),
        )
        .unwrap();

        assert!(store.conn().project_by_name("commons-io").unwrap().is_some());
    }

    #[test]
    fn test_import_missing_root() {
        let mut store = SqliteStore::in_memory().unwrap();
        let result = import_directory(
            &mut store,
            &CommitPipeline::new(),
            Path::new("/nonexistent/morpheus-out"),
            &ImportOptions::default(),
        );
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }
}
