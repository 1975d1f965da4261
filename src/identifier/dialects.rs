//! Per-engine extraction rules.
//!
//! Each engine maps to a [`Dialect`]: a pair of pure functions extracting the
//! (package, class) pair and the method name from a tokenized identifier.
//! A `None` from either function means a required part was missing.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::segments::{split_qualified, strip_arguments, RawIdentifier};
use super::Engine;

/// Extraction rules for one engine.
#[derive(Clone, Copy)]
pub struct Dialect {
    pub class: fn(&RawIdentifier<'_>) -> Option<(String, String)>,
    pub method: fn(&RawIdentifier<'_>) -> Option<String>,
}

const JUPITER: Dialect = Dialect {
    class: jupiter_class,
    method: jupiter_method,
};

const VINTAGE: Dialect = Dialect {
    class: vintage_class,
    method: vintage_method,
};

const NO_ENGINE: Dialect = Dialect {
    class: display_class,
    method: display_method,
};

/// Extraction rules for `engine`.
pub fn dialect(engine: Engine) -> Dialect {
    match engine {
        Engine::Jupiter => JUPITER,
        Engine::Vintage => VINTAGE,
        Engine::NoEngine => NO_ENGINE,
    }
}

// ============================================================================
// junit-jupiter
// ============================================================================

fn jupiter_class(raw: &RawIdentifier<'_>) -> Option<(String, String)> {
    let path = raw.first("class").or_else(|| raw.first("runner"))?;
    let (package, class) = split_qualified(path)?;

    let nested = raw.all("nested-class");
    if nested.is_empty() {
        return Some((package, class));
    }
    Some((package, format!("{class}[{}]", nest(&nested))))
}

/// `[A, B, C]` -> `A[B[C]]`.
fn nest(names: &[&str]) -> String {
    names.iter().rev().fold(String::new(), |inner, name| {
        if inner.is_empty() {
            (*name).to_string()
        } else {
            format!("{name}[{inner}]")
        }
    })
}

fn jupiter_method(raw: &RawIdentifier<'_>) -> Option<String> {
    if let Some(method) = raw.first("method") {
        return non_empty(strip_arguments(method)).map(str::to_string);
    }

    if let Some(template) = raw.first("test-template") {
        let invocation = invocation_number(raw.last("test-template-invocation")?)?;
        let name = non_empty(strip_arguments(template))?;
        return Some(format!("{name}[{invocation}]"));
    }

    if let Some(factory) = raw.first("test-factory") {
        let invocation = invocation_number(raw.last("dynamic-test")?)?;
        let name = non_empty(strip_arguments(factory))?;
        return Some(format!("{name}[{invocation}]"));
    }

    None
}

/// `#12` -> `12`.
fn invocation_number(value: &str) -> Option<&str> {
    let digits = value.strip_prefix('#')?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

// ============================================================================
// junit-vintage
// ============================================================================

fn vintage_class(raw: &RawIdentifier<'_>) -> Option<(String, String)> {
    split_qualified(raw.first("runner")?)
}

fn vintage_method(raw: &RawIdentifier<'_>) -> Option<String> {
    // Counted by segment key, so `test:` inside the display name is ignored.
    let tests = raw.all("test");
    match tests.as_slice() {
        [single] => {
            let name = single.find('(').map(|idx| &single[..idx])?;
            non_empty(name).map(str::to_string)
        }
        [first, second] => {
            // The method is the segment carrying an argument list; the other
            // one is the parameter-set label.
            let (method, label) = if first.contains('(') || !second.contains('(') {
                (*first, *second)
            } else {
                (*second, *first)
            };
            if !method.contains('(') {
                return None;
            }
            let name = non_empty(strip_arguments(method))?;
            Some(format!("{name}[{label}]"))
        }
        _ => {
            // Serialized identifiers (e.g. Cucumber steps) only carry a
            // readable label in the display name.
            let label = raw.display_name.split('.').next().unwrap_or_default();
            non_empty(label.trim()).map(str::to_string)
        }
    }
}

// ============================================================================
// display-name fallback: `method[index](qualified.Class)`
// ============================================================================

fn display_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?P<method>[\w$]+)(?:\[(?P<index>[^\]\[()]*)\])?\((?P<class>[\w.$]+)\)")
            .expect("valid regex")
    })
}

fn display_captures<'a>(raw: &RawIdentifier<'a>) -> Option<Captures<'a>> {
    display_pattern().captures(raw.display_name)
}

fn display_class(raw: &RawIdentifier<'_>) -> Option<(String, String)> {
    let captures = display_captures(raw)?;
    split_qualified(captures.name("class")?.as_str())
}

fn display_method(raw: &RawIdentifier<'_>) -> Option<String> {
    let captures = display_captures(raw)?;
    let method = captures.name("method")?.as_str();
    match captures.name("index") {
        Some(index) => Some(format!("{method}[{}]", index.as_str())),
        None => Some(method.to_string()),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
