//! Tokenizer for raw test identifiers.
//!
//! A raw identifier looks like
//! `<display name>.[engine:junit-jupiter]/[class:pkg.Cls]/[method:name()]`,
//! optionally followed by the failure marker `_F`. Segment values may
//! themselves contain brackets (array parameter types, `[1]` display
//! prefixes), so segments are split on the `]/[` separator rather than on
//! single brackets.

/// Suffix appended by the coverage tool to identifiers of failed tests.
pub const FAILURE_MARKER: &str = "_F";

const SEGMENTS_START: &str = "[engine:";
const SEGMENT_SEPARATOR: &str = "]/[";

/// One `[key:value]` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// A raw identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIdentifier<'a> {
    /// The whole identifier without the failure marker.
    pub body: &'a str,
    /// Human-readable name preceding the segments (the whole body when the
    /// identifier carries no segments).
    pub display_name: &'a str,
    pub segments: Vec<Segment<'a>>,
    pub failed: bool,
}

impl<'a> RawIdentifier<'a> {
    /// Split a raw identifier. Never fails; missing parts are simply absent.
    pub fn tokenize(raw: &'a str) -> Self {
        let (body, failed) = match raw.strip_suffix(FAILURE_MARKER) {
            Some(body) => (body, true),
            None => (raw, false),
        };

        let Some(start) = body.find(SEGMENTS_START) else {
            return Self {
                body,
                display_name: body,
                segments: Vec::new(),
                failed,
            };
        };

        let display_name = body[..start].strip_suffix('.').unwrap_or(&body[..start]);
        let inner = &body[start + 1..];
        let inner = inner.strip_suffix(']').unwrap_or(inner);
        let segments = inner.split(SEGMENT_SEPARATOR).map(split_segment).collect();

        Self {
            body,
            display_name,
            segments,
            failed,
        }
    }

    /// Value of the first segment with the given key.
    pub fn first(&self, key: &str) -> Option<&'a str> {
        self.segments
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value)
    }

    /// Value of the last segment with the given key.
    pub fn last(&self, key: &str) -> Option<&'a str> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.key == key)
            .map(|s| s.value)
    }

    /// Values of every segment with the given key, in order.
    pub fn all(&self, key: &str) -> Vec<&'a str> {
        self.segments
            .iter()
            .filter(|s| s.key == key)
            .map(|s| s.value)
            .collect()
    }
}

fn split_segment(segment: &str) -> Segment<'_> {
    match segment.split_once(':') {
        Some((key, value)) => Segment { key, value },
        None => Segment {
            key: segment,
            value: "",
        },
    }
}

/// Strip a trailing parenthesized argument list: `name(args)` -> `name`.
pub fn strip_arguments(value: &str) -> &str {
    match value.find('(') {
        Some(idx) => &value[..idx],
        None => value,
    }
}

/// Split `org.pkg.Cls` into (`org.pkg`, `Cls`). A path without dots has an
/// empty package.
pub fn split_qualified(path: &str) -> Option<(String, String)> {
    let (package, class) = match path.rsplit_once('.') {
        Some((package, class)) => (package, class),
        None => ("", path),
    };
    if class.is_empty() {
        return None;
    }
    Some((package.to_string(), class.to_string()))
}
