//! Coverage ingestion.
//!
//! Turns one raw coverage matrix into TestMethod and LineCoverage rows for a
//! commit. The work runs through fixed stages:
//!
//! ```text
//! Start -> TestsParsed -> LinesCollected -> Merged -> Bound -> Stored
//! ```
//!
//! The first three transitions are pure ([`CoverageIngestor::prepare`]); the
//! last two need the commit's method versions and a store
//! ([`CoverageIngestor::ingest`]). A malformed test identifier only drops that
//! test. An undersized payload or an empty merge fails the whole commit.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::core::{Commit, EdgeInsert, Error, NewLineCoverage, Project, Result};
use crate::identifier::{self, TestIdentifier};
use crate::index::{LineOwnerCache, MethodVersionIndex};
use crate::payload::CoveragePayload;
use crate::storage::StorageAdapter;

/// Default lower bound on `testCount`; payloads below it are rejected.
pub const DEFAULT_MIN_TEST_COUNT: i64 = 2;

/// Ingestion stage reached by one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    TestsParsed,
    LinesCollected,
    Merged,
    Bound,
    Stored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::TestsParsed => "tests_parsed",
            Stage::LinesCollected => "lines_collected",
            Stage::Merged => "merged",
            Stage::Bound => "bound",
            Stage::Stored => "stored",
        };
        f.write_str(name)
    }
}

/// A covered (file, line) candidate before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoveragePoint<'p> {
    pub full_name: &'p str,
    pub line_number: u32,
}

/// A parsed test with every line it activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTest<'p> {
    /// Position in `testsIndex`.
    pub index: usize,
    pub test: TestIdentifier,
    pub points: Vec<CoveragePoint<'p>>,
}

/// Output of the pure stages.
#[derive(Debug, Clone, Default)]
pub struct PreparedCoverage<'p> {
    pub tests: Vec<MergedTest<'p>>,
    pub identifiers: usize,
    pub unparseable: usize,
    /// Parsed tests that activated no line.
    pub without_lines: usize,
}

impl PreparedCoverage<'_> {
    pub fn point_count(&self) -> usize {
        self.tests.iter().map(|t| t.points.len()).sum()
    }
}

/// Counters from one ingestion, logged as the per-commit summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub identifiers: usize,
    pub unparseable: usize,
    pub tests_merged: usize,
    pub tests_created: usize,
    pub tests_reused: usize,
    pub points: usize,
    pub unresolved_lines: usize,
    pub edges_inserted: usize,
    pub duplicate_edges: usize,
}

/// Ingests coverage payloads for one commit at a time.
#[derive(Debug, Clone)]
pub struct CoverageIngestor {
    min_test_count: i64,
}

impl Default for CoverageIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageIngestor {
    pub fn new() -> Self {
        Self {
            min_test_count: DEFAULT_MIN_TEST_COUNT,
        }
    }

    /// Set the smallest accepted `testCount`.
    pub fn with_min_test_count(mut self, min_test_count: i64) -> Self {
        self.min_test_count = min_test_count;
        self
    }

    /// Parse test identifiers, collect activated lines and merge the two.
    ///
    /// `commit` only labels errors and logs.
    pub fn prepare<'p>(
        &self,
        payload: &'p CoveragePayload,
        commit: &str,
    ) -> Result<PreparedCoverage<'p>> {
        if payload.test_count < self.min_test_count {
            return Err(Error::InsufficientCoverageData {
                test_count: payload.test_count,
            });
        }

        // Start -> TestsParsed
        let mut unparseable = 0;
        let mut tests = BTreeMap::new();
        for (index, raw) in payload.tests_index.iter().enumerate() {
            match identifier::parse(raw) {
                Ok(test) => {
                    tests.insert(index, test);
                }
                Err(e) if !e.is_fatal() => {
                    unparseable += 1;
                    tracing::warn!("{commit}: skipping test #{index}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!("{commit}: {}, {} tests", Stage::TestsParsed, tests.len());

        // TestsParsed -> LinesCollected
        let mut lines: BTreeMap<usize, Vec<CoveragePoint<'p>>> = BTreeMap::new();
        for source in &payload.sources {
            if source.activating_tests.len() != source.test_stmt_matrix.len() {
                tracing::debug!(
                    "{commit}: {} lists {} activating tests but {} matrix rows",
                    source.source.full_name,
                    source.activating_tests.len(),
                    source.test_stmt_matrix.len()
                );
            }
            for (test_index, row) in source.activating_tests.iter().zip(&source.test_stmt_matrix) {
                if !tests.contains_key(test_index) {
                    continue;
                }
                let points = lines.entry(*test_index).or_default();
                points.extend(row.iter().enumerate().filter(|(_, hit)| **hit).map(
                    |(offset, _)| CoveragePoint {
                        full_name: &source.source.full_name,
                        line_number: source.source.first_line + offset as u32,
                    },
                ));
            }
        }
        tracing::debug!(
            "{commit}: {}, {} tests with lines",
            Stage::LinesCollected,
            lines.len()
        );

        // LinesCollected -> Merged
        let identifiers = payload.tests_index.len();
        let parsed = tests.len();
        let merged: Vec<MergedTest<'p>> = tests
            .into_iter()
            .filter_map(|(index, test)| {
                let points = lines.remove(&index)?;
                Some(MergedTest {
                    index,
                    test,
                    points,
                })
            })
            .collect();

        if merged.is_empty() {
            return Err(Error::NoCoverageProduced {
                commit: commit.to_string(),
            });
        }
        tracing::debug!("{commit}: {}, {} tests", Stage::Merged, merged.len());

        Ok(PreparedCoverage {
            without_lines: parsed - merged.len(),
            tests: merged,
            identifiers,
            unparseable,
        })
    }

    /// Run every stage for `commit` and persist the result.
    ///
    /// The commit's method versions must already be stored. Lines that no
    /// version owns are dropped; duplicate edges are counted and skipped.
    pub fn ingest<S: StorageAdapter + ?Sized>(
        &self,
        storage: &S,
        project: &Project,
        commit: &Commit,
        payload: &CoveragePayload,
    ) -> Result<IngestReport> {
        let prepared = self.prepare(payload, &commit.sha)?;

        // Merged -> Bound
        let index = MethodVersionIndex::load(storage, commit.id)?;
        let mut cache = LineOwnerCache::new(commit.id);
        let mut report = IngestReport {
            identifiers: prepared.identifiers,
            unparseable: prepared.unparseable,
            tests_merged: prepared.tests.len(),
            points: prepared.point_count(),
            ..IngestReport::default()
        };

        let mut bound = Vec::with_capacity(prepared.tests.len());
        for merged in &prepared.tests {
            let mut owned = Vec::with_capacity(merged.points.len());
            for point in &merged.points {
                match index.resolve(&mut cache, point.full_name, point.line_number) {
                    Some(version_id) => owned.push((version_id, point)),
                    None => report.unresolved_lines += 1,
                }
            }
            bound.push((merged, owned));
        }
        tracing::debug!(
            "{}: {}, {} lines unresolved, cache {} hits / {} misses",
            commit.sha,
            Stage::Bound,
            report.unresolved_lines,
            cache.hits(),
            cache.misses()
        );

        // Bound -> Stored
        for (merged, owned) in bound {
            let key = merged.test.key();
            let test = match storage.find_test(project.id, &key)? {
                Some(test) => {
                    report.tests_reused += 1;
                    test
                }
                None => {
                    report.tests_created += 1;
                    storage.insert_test(project.id, &key)?
                }
            };

            for (method_version_id, point) in owned {
                let row = NewLineCoverage {
                    commit_id: commit.id,
                    test_id: test.id,
                    method_version_id,
                    test_result: merged.test.passed,
                    full_name: point.full_name,
                    line_number: point.line_number,
                };
                match storage.insert_line_coverage(&row)? {
                    EdgeInsert::Inserted(_) => report.edges_inserted += 1,
                    EdgeInsert::Duplicate => report.duplicate_edges += 1,
                }
            }
        }
        if report.duplicate_edges > 0 {
            tracing::info!(
                "{}: skipped {} already stored coverage rows",
                commit.sha,
                report.duplicate_edges
            );
        }
        tracing::debug!("{}: {}", commit.sha, Stage::Stored);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NewMethodVersion, MethodKey};
    use crate::payload::{parse_coverage_str, SourceCoverage, SourceInfo};
    use crate::storage::SqliteStore;

    const FOO_TEST: &str =
        "testFoo().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testFoo()]";
    const BAR_TEST_FAILED: &str =
        "testBar().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testBar()]_F";

    fn payload(tests: &[&str], sources: Vec<SourceCoverage>) -> CoveragePayload {
        CoveragePayload {
            test_count: tests.len() as i64,
            tests_index: tests.iter().map(|t| t.to_string()).collect(),
            sources,
        }
    }

    fn source(full_name: &str, first_line: u32, rows: Vec<(usize, Vec<bool>)>) -> SourceCoverage {
        let (activating_tests, test_stmt_matrix) = rows.into_iter().unzip();
        SourceCoverage {
            source: SourceInfo {
                full_name: full_name.to_string(),
                first_line,
                last_line: 0,
            },
            activating_tests,
            test_stmt_matrix,
        }
    }

    /// Store with one commit and `run` at Foo.java:10-14.
    fn seeded() -> (SqliteStore, Project, Commit) {
        let store = SqliteStore::in_memory().unwrap();
        let conn = store.conn();
        let project = conn.upsert_project("demo").unwrap();
        let commit = conn.upsert_commit(project.id, "abc", "dev", "now").unwrap();
        let method = conn
            .insert_method(
                project.id,
                &MethodKey {
                    method_name: "run".to_string(),
                    method_decl: "void run()".to_string(),
                    class_name: "Foo".to_string(),
                    package_name: "org.pkg".to_string(),
                },
            )
            .unwrap();
        conn.insert_method_version(&NewMethodVersion {
            method_id: method.id,
            commit_id: commit.id,
            line_start: 10,
            line_end: 14,
            file_path: "src/main/java/org/pkg/Foo.java".to_string(),
        })
        .unwrap();
        (store, project, commit)
    }

    // ========================================================================
    // Pure stages
    // ========================================================================

    #[test]
    fn test_insufficient_test_count() {
        let payload = payload(&[FOO_TEST], vec![]);
        let result = CoverageIngestor::new().prepare(&payload, "abc");
        assert!(matches!(
            result,
            Err(Error::InsufficientCoverageData { test_count: 1 })
        ));
    }

    #[test]
    fn test_lines_use_first_line_offset() {
        let payload = payload(
            &[FOO_TEST, BAR_TEST_FAILED],
            vec![source(
                "org/pkg/Foo.java",
                10,
                vec![(0, vec![true, false, true]), (1, vec![false, true, false])],
            )],
        );

        let prepared = CoverageIngestor::new().prepare(&payload, "abc").unwrap();

        assert_eq!(prepared.tests.len(), 2);
        let lines: Vec<u32> = prepared.tests[0].points.iter().map(|p| p.line_number).collect();
        assert_eq!(lines, vec![10, 12]);
        assert_eq!(prepared.tests[1].points[0].line_number, 11);
        assert!(!prepared.tests[1].test.passed);
    }

    #[test]
    fn test_unparseable_identifier_is_skipped() {
        let payload = payload(
            &["garbage", FOO_TEST],
            vec![source(
                "org/pkg/Foo.java",
                10,
                vec![(0, vec![true]), (1, vec![true])],
            )],
        );

        let prepared = CoverageIngestor::new().prepare(&payload, "abc").unwrap();

        assert_eq!(prepared.unparseable, 1);
        assert_eq!(prepared.tests.len(), 1);
        assert_eq!(prepared.tests[0].index, 1);
    }

    #[test]
    fn test_tests_without_lines_are_dropped() {
        let payload = payload(
            &[FOO_TEST, BAR_TEST_FAILED],
            vec![source("org/pkg/Foo.java", 10, vec![(0, vec![true])])],
        );

        let prepared = CoverageIngestor::new().prepare(&payload, "abc").unwrap();

        assert_eq!(prepared.tests.len(), 1);
        assert_eq!(prepared.without_lines, 1);
    }

    #[test]
    fn test_empty_merge_is_fatal() {
        let payload = payload(
            &["garbage", "more garbage"],
            vec![source("org/pkg/Foo.java", 10, vec![(0, vec![true])])],
        );

        let result = CoverageIngestor::new().prepare(&payload, "abc");

        assert!(matches!(result, Err(Error::NoCoverageProduced { commit }) if commit == "abc"));
    }

    #[test]
    fn test_custom_min_test_count() {
        let payload = payload(
            &[FOO_TEST],
            vec![source("org/pkg/Foo.java", 10, vec![(0, vec![true])])],
        );
        let prepared = CoverageIngestor::new()
            .with_min_test_count(1)
            .prepare(&payload, "abc")
            .unwrap();
        assert_eq!(prepared.tests.len(), 1);
    }

    // ========================================================================
    // Binding and storing
    // ========================================================================

    #[test]
    fn test_ingest_binds_and_stores() {
        let (store, project, commit) = seeded();
        let payload = payload(
            &[FOO_TEST, BAR_TEST_FAILED],
            vec![source(
                "org/pkg/Foo.java",
                8,
                // Lines 8..=15; only 10..=14 belong to `run`.
                vec![(0, vec![true; 8]), (1, vec![false, false, true])],
            )],
        );

        let report = CoverageIngestor::new()
            .ingest(store.conn(), &project, &commit, &payload)
            .unwrap();

        assert_eq!(report.tests_created, 2);
        assert_eq!(report.points, 9);
        assert_eq!(report.edges_inserted, 6);
        assert_eq!(report.unresolved_lines, 3);

        let edges = store.conn().commit_edges(commit.id).unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| !e.test_result));
    }

    #[test]
    fn test_reingest_creates_no_rows() {
        let (store, project, commit) = seeded();
        let payload = parse_coverage_str(&format!(
            r#"{{
                "testCount": 2,
                "testsIndex": [{FOO_TEST:?}, {BAR_TEST_FAILED:?}],
                "sources": [{{
                    "source": {{"fullName": "org/pkg/Foo.java", "firstLine": 10, "lastLine": 12}},
                    "activatingTests": [0, 1],
                    "testStmtMatrix": [[true, true, true], [true, false, false]]
                }}]
            }}"#
        ))
        .unwrap();
        let ingestor = CoverageIngestor::new();

        ingestor
            .ingest(store.conn(), &project, &commit, &payload)
            .unwrap();
        let before = store.conn().stats().unwrap();
        let second = ingestor
            .ingest(store.conn(), &project, &commit, &payload)
            .unwrap();

        assert_eq!(store.conn().stats().unwrap(), before);
        assert_eq!(second.tests_reused, 2);
        assert_eq!(second.edges_inserted, 0);
        assert_eq!(second.duplicate_edges, 4);
    }

    #[test]
    fn test_insufficient_payload_stores_nothing() {
        let (store, project, commit) = seeded();
        let payload = payload(&[FOO_TEST], vec![]);

        let result = CoverageIngestor::new().ingest(store.conn(), &project, &commit, &payload);

        assert!(result.is_err());
        let stats = store.conn().stats().unwrap();
        assert_eq!(stats.tests, 0);
        assert_eq!(stats.line_coverage, 0);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Start < Stage::TestsParsed);
        assert!(Stage::Bound < Stage::Stored);
        assert_eq!(Stage::LinesCollected.to_string(), "lines_collected");
    }
}
