//! Production-method catalog.
//!
//! Deduplicates methods by their identity tuple and binds one
//! [`MethodVersion`] per (method, commit, file) to the latest line range the
//! extractor reported.

use serde::Serialize;

use crate::core::{Commit, Error, Method, MethodVersion, NewMethodVersion, Project, Result};
use crate::payload::MethodDeclaration;
use crate::storage::StorageAdapter;

/// Default substring marking a test-source file path.
pub const DEFAULT_TEST_PATH_MARKER: &str = "test";

/// Counters from one `ingest_methods` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryReport {
    /// Declarations received.
    pub declared: usize,
    /// Declarations dropped because their path looks like test code.
    pub filtered_tests: usize,
    /// Declarations dropped because they carried no version descriptor.
    pub without_versions: usize,
    pub methods_created: usize,
    pub methods_reused: usize,
    pub versions_created: usize,
    pub versions_reused: usize,
    /// Methods that could not be re-read after the upsert phase.
    pub unresolved: usize,
}

/// Result of binding a commit's method declarations.
#[derive(Debug, Clone, Default)]
pub struct RegisteredMethods {
    pub bindings: Vec<(Method, MethodVersion)>,
    pub report: RegistryReport,
}

/// Maintains the Method/MethodVersion catalog.
pub struct MethodRegistry {
    test_path_marker: String,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            test_path_marker: DEFAULT_TEST_PATH_MARKER.to_string(),
        }
    }

    /// Set the substring that marks a declaration's file as test code.
    pub fn with_test_path_marker(mut self, marker: impl Into<String>) -> Self {
        self.test_path_marker = marker.into();
        self
    }

    fn is_test_source(&self, declaration: &MethodDeclaration) -> bool {
        !self.test_path_marker.is_empty() && declaration.file_path.contains(&self.test_path_marker)
    }

    /// Upsert every production declaration and bind its latest line range to
    /// `commit`.
    ///
    /// Fails with [`Error::EmptyMethodSet`] when nothing survives filtering.
    /// Calling it again with the same input creates no rows.
    pub fn ingest_methods<S: StorageAdapter + ?Sized>(
        &self,
        storage: &S,
        project: &Project,
        commit: &Commit,
        declarations: &[MethodDeclaration],
    ) -> Result<RegisteredMethods> {
        let mut report = RegistryReport {
            declared: declarations.len(),
            ..RegistryReport::default()
        };

        let mut production = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            if self.is_test_source(declaration) {
                report.filtered_tests += 1;
                continue;
            }
            match declaration.current_version() {
                Some(version) => production.push((declaration, *version)),
                None => {
                    report.without_versions += 1;
                    tracing::warn!(
                        "Skipping {}.{}::{} in {}: no line range reported",
                        declaration.package_name,
                        declaration.class_name,
                        declaration.method_decl,
                        declaration.file_path
                    );
                }
            }
        }

        if production.is_empty() {
            return Err(Error::EmptyMethodSet {
                commit: commit.sha.clone(),
            });
        }

        // Upsert the catalog first, then bind versions against what the store
        // actually holds.
        for (declaration, _) in &production {
            let key = declaration.key();
            if storage.find_method(project.id, &key)?.is_some() {
                report.methods_reused += 1;
            } else {
                storage.insert_method(project.id, &key)?;
                report.methods_created += 1;
            }
        }

        let mut bindings = Vec::with_capacity(production.len());
        for (declaration, range) in production {
            let Some(method) = storage.find_method(project.id, &declaration.key())? else {
                report.unresolved += 1;
                tracing::warn!(
                    "Method {}.{}::{} was not stored; skipping its version",
                    declaration.package_name,
                    declaration.class_name,
                    declaration.method_decl
                );
                continue;
            };

            let existing =
                storage.find_method_version(method.id, commit.id, &declaration.file_path)?;
            let version = match existing {
                Some(version) => {
                    report.versions_reused += 1;
                    version
                }
                None => {
                    report.versions_created += 1;
                    storage.insert_method_version(&NewMethodVersion {
                        method_id: method.id,
                        commit_id: commit.id,
                        line_start: range.line_start,
                        line_end: range.line_end,
                        file_path: declaration.file_path.clone(),
                    })?
                }
            };
            bindings.push((method, version));
        }

        tracing::debug!(
            "Registered {} methods for {}: {} new, {} new versions",
            bindings.len(),
            commit.sha,
            report.methods_created,
            report.versions_created
        );

        Ok(RegisteredMethods { bindings, report })
    }
}
