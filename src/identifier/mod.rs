//! Parsing of raw test identifiers emitted by the coverage tool.
//!
//! Different JVM test engines serialize test identities differently:
//!
//! - `junit-jupiter`: `name().[engine:junit-jupiter]/[class:pkg.Cls]/[method:name()]`,
//!   with `test-template`/`test-factory` variants for parameterized and
//!   dynamic tests and `nested-class` segments for `@Nested` classes.
//! - `junit-vintage`: `name.[engine:junit-vintage]/[runner:pkg.Cls]/[test:name(pkg.Cls)]`,
//!   with a second `test:` segment for parameterized runners.
//! - anything else falls back to the display name `name[index](pkg.Cls)`.
//!
//! A trailing `_F` marks a failed test regardless of engine.

mod dialects;
mod segments;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result, TestKey};

pub use segments::{RawIdentifier, Segment, FAILURE_MARKER};

/// Test-execution engine that produced an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    Jupiter,
    Vintage,
    /// Unknown or absent engine; only the display name is parsed.
    NoEngine,
}

impl Engine {
    /// Detect the engine from the first `engine:` segment.
    pub fn detect(raw: &RawIdentifier<'_>) -> Self {
        match raw.first("engine") {
            Some(name) => Self::from_name(name).unwrap_or_else(|| {
                tracing::debug!("Engine '{}' is not supported, using display name", name);
                Self::NoEngine
            }),
            None => Self::NoEngine,
        }
    }

    /// Map an engine name to a supported engine.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "junit-jupiter" => Some(Self::Jupiter),
            "junit-vintage" => Some(Self::Vintage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jupiter => "junit-jupiter",
            Self::Vintage => "junit-vintage",
            Self::NoEngine => "none",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decomposed test identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestIdentifier {
    pub engine: Engine,
    pub package_name: String,
    pub class_name: String,
    /// Method name; parameterized invocations carry an `[invocation]` suffix.
    pub method_name: String,
    pub passed: bool,
}

impl TestIdentifier {
    /// Identity tuple used to store this test.
    pub fn key(&self) -> TestKey {
        TestKey {
            package_name: self.package_name.clone(),
            class_name: self.class_name.clone(),
            method_name: self.method_name.clone(),
        }
    }

    /// `package.Class.method`, or `Class.method` without a package.
    pub fn qualified_name(&self) -> String {
        if self.package_name.is_empty() {
            format!("{}.{}", self.class_name, self.method_name)
        } else {
            format!(
                "{}.{}.{}",
                self.package_name, self.class_name, self.method_name
            )
        }
    }
}

/// Parse one raw test identifier.
///
/// Pure and deterministic. Fails with [`Error::UnparseableIdentifier`] when
/// the detected dialect cannot find a class or a method name.
pub fn parse(identifier: &str) -> Result<TestIdentifier> {
    let raw = RawIdentifier::tokenize(identifier);
    let engine = Engine::detect(&raw);
    let dialect = dialects::dialect(engine);

    let (package_name, class_name) =
        (dialect.class)(&raw).ok_or_else(|| Error::unparseable(identifier))?;
    let method_name = (dialect.method)(&raw).ok_or_else(|| Error::unparseable(identifier))?;

    Ok(TestIdentifier {
        engine,
        package_name,
        class_name,
        method_name,
        passed: !raw.failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(identifier: &str) -> (String, String, String, bool) {
        let test = parse(identifier).expect("identifier should parse");
        (
            test.package_name,
            test.class_name,
            test.method_name,
            test.passed,
        )
    }

    fn tuple(package: &str, class: &str, method: &str, passed: bool) -> (String, String, String, bool) {
        (
            package.to_string(),
            class.to_string(),
            method.to_string(),
            passed,
        )
    }

    // ========================================================================
    // engine detection
    // ========================================================================

    #[test]
    fn test_detect_engines() {
        let jupiter = RawIdentifier::tokenize("a.[engine:junit-jupiter]/[class:a.B]");
        let vintage = RawIdentifier::tokenize("a.[engine:junit-vintage]/[runner:a.B]");
        let testng = RawIdentifier::tokenize("a.[engine:testng]/[class:a.B]");
        let bare = RawIdentifier::tokenize("a(b.C)");

        assert_eq!(Engine::detect(&jupiter), Engine::Jupiter);
        assert_eq!(Engine::detect(&vintage), Engine::Vintage);
        assert_eq!(Engine::detect(&testng), Engine::NoEngine);
        assert_eq!(Engine::detect(&bare), Engine::NoEngine);
    }

    // ========================================================================
    // junit-jupiter
    // ========================================================================

    #[test]
    fn test_jupiter_regular_method() {
        assert_eq!(
            parsed("testFoo().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testFoo()]"),
            tuple("org.pkg", "FooTest", "testFoo", true)
        );
    }

    #[test]
    fn test_jupiter_commons_io_method() {
        assert_eq!(
            parsed(
                "testMagicNumberFileFilterStringOffset().[engine:junit-jupiter]/[class:org.apache.commons.io.filefilter.FileFilterTestCase]/[method:testMagicNumberFileFilterStringOffset()]"
            ),
            tuple(
                "org.apache.commons.io.filefilter",
                "FileFilterTestCase",
                "testMagicNumberFileFilterStringOffset",
                true
            )
        );
    }

    #[test]
    fn test_jupiter_test_template() {
        assert_eq!(
            parsed(
                "[1] 0 files, 0 directories, 0 bytes.[engine:junit-jupiter]/[class:org.apache.commons.io.file.DeletingPathVisitorTest]/[test-template:testDeleteEmptyDirectory(org.apache.commons.io.file.DeletingPathVisitor)]/[test-template-invocation:#1]"
            ),
            tuple(
                "org.apache.commons.io.file",
                "DeletingPathVisitorTest",
                "testDeleteEmptyDirectory[1]",
                true
            )
        );
    }

    #[test]
    fn test_jupiter_test_template_with_many_arguments() {
        let test = parse(
            "test-file-utf8-win-linebr.bin, encoding=UTF-8, blockSize=null.[engine:junit-jupiter]/[class:org.apache.commons.io.input.ReversedLinesFileReaderTestParamFile]/[test-template:testDataIntegrityWithBufferedReader(java.lang.String, java.lang.String, java.lang.Integer, boolean, boolean)]/[test-template-invocation:#9]",
        )
        .unwrap();
        assert_eq!(test.method_name, "testDataIntegrityWithBufferedReader[9]");
        assert_eq!(test.class_name, "ReversedLinesFileReaderTestParamFile");
    }

    #[test]
    fn test_jupiter_test_bar_template() {
        let test = parse(
            "[1] x.[engine:junit-jupiter]/[class:org.pkg.BarTest]/[test-template:testBar(int)]/[test-template-invocation:#1]",
        )
        .unwrap();
        assert_eq!(test.method_name, "testBar[1]");
    }

    #[test]
    fn test_jupiter_test_factory() {
        assert_eq!(
            parsed(
                "IllegalArgumentException.[engine:junit-jupiter]/[class:org.apache.commons.lang3.StreamsTest]/[test-factory:simpleStreamFilterFailing()]/[dynamic-test:#1]"
            ),
            tuple(
                "org.apache.commons.lang3",
                "StreamsTest",
                "simpleStreamFilterFailing[1]",
                true
            )
        );
    }

    #[test]
    fn test_jupiter_nested_class() {
        let test = parse(
            "shouldWork().[engine:junit-jupiter]/[class:org.pkg.Outer]/[nested-class:Inner]/[method:shouldWork()]",
        )
        .unwrap();
        assert_eq!(test.package_name, "org.pkg");
        assert_eq!(test.class_name, "Outer[Inner]");
        assert_eq!(test.method_name, "shouldWork");
    }

    #[test]
    fn test_jupiter_deeply_nested_class() {
        assert_eq!(
            parsed(
                "shouldNotThrowExceptionWhenValueIsInstanceOfClass().[engine:junit-jupiter]/[class:org.apache.commons.lang3.ValidateTest]/[nested-class:IsInstanceOf]/[nested-class:WithMessageTemplate]/[method:shouldNotThrowExceptionWhenValueIsInstanceOfClass()]"
            ),
            tuple(
                "org.apache.commons.lang3",
                "ValidateTest[IsInstanceOf[WithMessageTemplate]]",
                "shouldNotThrowExceptionWhenValueIsInstanceOfClass",
                true
            )
        );
    }

    #[test]
    fn test_jupiter_failed() {
        let test =
            parse("testFoo().[engine:junit-jupiter]/[class:org.pkg.FooTest]/[method:testFoo()]_F")
                .unwrap();
        assert!(!test.passed);
        assert_eq!(test.method_name, "testFoo");
    }

    // ========================================================================
    // junit-vintage
    // ========================================================================

    #[test]
    fn test_vintage_regular() {
        assert_eq!(
            parsed(
                "testHandleStartDirectoryFalse.[engine:junit-vintage]/[runner:org.apache.commons.io.DirectoryWalkerTestCaseJava4]/[test:testHandleStartDirectoryFalse(org.apache.commons.io.DirectoryWalkerTestCaseJava4)]"
            ),
            tuple(
                "org.apache.commons.io",
                "DirectoryWalkerTestCaseJava4",
                "testHandleStartDirectoryFalse",
                true
            )
        );
    }

    #[test]
    fn test_vintage_parameterized() {
        let test = parse(
            "testUTF16LEFile[BlockSize=4,096].[engine:junit-vintage]/[runner:org.apache.commons.io.input.ReversedLinesFileReaderTestParamBlockSize]/[test:%5BBlockSize=4,096%5D]/[test:testUTF16LEFile%5BBlockSize=4,096%5D(org.apache.commons.io.input.ReversedLinesFileReaderTestParamBlockSize)]",
        )
        .unwrap();
        assert_eq!(test.engine, Engine::Vintage);
        assert_eq!(test.package_name, "org.apache.commons.io.input");
        assert_eq!(test.class_name, "ReversedLinesFileReaderTestParamBlockSize");
        assert_eq!(
            test.method_name,
            "testUTF16LEFile%5BBlockSize=4,096%5D[%5BBlockSize=4,096%5D]"
        );
    }

    #[test]
    fn test_vintage_serialized_step_uses_display_name() {
        let test = parse(
            "When the user presses the \"Start\" button.[engine:junit-vintage]/[runner:nl.tudelft.jpacman.e2e.framework.startup.StartupTest]/[test:rO0ABXNyAB9naGVya2lu]/[test:rO0ABXNyACBnaGVya2lu]/[test:rO0ABXNyABxnaGVya2lu]",
        )
        .unwrap();
        assert_eq!(test.package_name, "nl.tudelft.jpacman.e2e.framework.startup");
        assert_eq!(test.class_name, "StartupTest");
        assert_eq!(test.method_name, "When the user presses the \"Start\" button");
    }

    #[test]
    fn test_vintage_counts_test_segments_not_display_text() {
        let test =
            parse("Scenario test: login.[engine:junit-vintage]/[runner:a.B]/[test:foo(a.B)]")
                .unwrap();
        assert_eq!(test.class_name, "B");
        assert_eq!(test.method_name, "foo");
    }

    #[test]
    fn test_vintage_without_runner_fails() {
        let err = parse("x.[engine:junit-vintage]/[test:x(a.B)]").unwrap_err();
        assert!(matches!(err, Error::UnparseableIdentifier { .. }));
    }

    // ========================================================================
    // no engine
    // ========================================================================

    #[test]
    fn test_no_engine_regular() {
        assert_eq!(
            parsed(
                "testGetFreeSpaceWindows_String_EmptyMultiLineResponse(org.apache.commons.io.FileSystemUtilsTestCase)"
            ),
            tuple(
                "org.apache.commons.io",
                "FileSystemUtilsTestCase",
                "testGetFreeSpaceWindows_String_EmptyMultiLineResponse",
                true
            )
        );
    }

    #[test]
    fn test_no_engine_indexed() {
        assert_eq!(
            parsed(
                "testDataIntegrityWithBufferedReader[8](org.apache.commons.io.input.ReversedLinesFileReaderTestParamFile)"
            ),
            tuple(
                "org.apache.commons.io.input",
                "ReversedLinesFileReaderTestParamFile",
                "testDataIntegrityWithBufferedReader[8]",
                true
            )
        );
    }

    #[test]
    fn test_no_engine_failed() {
        let test = parse("testFoo(org.pkg.FooTest)_F").unwrap();
        assert!(!test.passed);
        assert_eq!(test.method_name, "testFoo");
    }

    #[test]
    fn test_unsupported_engine_uses_display_name() {
        let test = parse("testFoo(org.pkg.FooTest).[engine:testng]/[class:org.pkg.FooTest]").unwrap();
        assert_eq!(test.engine, Engine::NoEngine);
        assert_eq!(test.class_name, "FooTest");
        assert_eq!(test.method_name, "testFoo");
    }

    #[test]
    fn test_unparseable_carries_identifier() {
        match parse("not a test at all") {
            Err(Error::UnparseableIdentifier { identifier }) => {
                assert_eq!(identifier, "not a test at all");
            }
            other => panic!("Expected UnparseableIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn test_qualified_name() {
        let test = parse("testFoo(org.pkg.FooTest)").unwrap();
        assert_eq!(test.qualified_name(), "org.pkg.FooTest.testFoo");
        let test = parse("testFoo(FooTest)").unwrap();
        assert_eq!(test.qualified_name(), "FooTest.testFoo");
    }
}
