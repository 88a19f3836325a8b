//! Test definition parser.
//!
//! A definition file is a frontmatter block delimited by `---` lines,
//! followed by a SQL body. Bodies containing `--- step: <name>` marker lines
//! split into named step bodies; anything else is a single statement.
//!
//! Duplicate step names are last-wins: the later body replaces the earlier
//! one while keeping its first-occurrence position. This mirrors how the
//! frontmatter's own mapping semantics treat repeated keys and is defined
//! behavior, not an accident.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{EngineError, Result};
use crate::model::{SqlBody, TestDefinition, TestMetadata};
use crate::vars::{self, ProcessEnv, VarSource};

lazy_static! {
    static ref FRONTMATTER_RE: Regex =
        Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(\r?\n|\z)").expect("valid regex");
    static ref STEP_MARKER_RE: Regex =
        Regex::new(r"(?mi)^---[ \t]*step[ \t]*:[ \t]*(.+)$").expect("valid regex");
}

/// Parse a definition file from disk, resolving `${VAR}` placeholders
/// against the process environment.
pub fn parse_test_file(path: &Path) -> Result<TestDefinition> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Message(format!("Failed to read {}: {e}", path.display())))?;
    parse_test_source(&text, path)
}

/// Parse definition text. `path` is carried onto the definition for error
/// messages and the test-name fallback.
pub fn parse_test_source(text: &str, path: &Path) -> Result<TestDefinition> {
    parse_test_source_with(text, path, &ProcessEnv)
}

/// Like [`parse_test_source`], with an explicit variable source.
pub fn parse_test_source_with<S: VarSource>(
    text: &str,
    path: &Path,
    source: &S,
) -> Result<TestDefinition> {
    // A UTF-8 byte-order mark would keep the frontmatter anchor from
    // matching at the start of the file.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let captures = FRONTMATTER_RE
        .captures(text)
        .ok_or_else(|| EngineError::MissingFrontmatter {
            path: path.to_path_buf(),
        })?;

    let block = captures.get(1).expect("frontmatter group").as_str();
    let raw: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|e| EngineError::MalformedMetadata {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    if !raw.is_mapping() {
        return Err(EngineError::MalformedMetadata {
            path: path.to_path_buf(),
            detail: "frontmatter is not a mapping".to_string(),
        });
    }

    let resolved = vars::resolve_with(&raw, source)?;
    let meta: TestMetadata =
        serde_yaml::from_value(resolved).map_err(|e| EngineError::MalformedMetadata {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let body = split_body(&text[captures.get(0).expect("match").end()..]);

    Ok(TestDefinition {
        path: path.to_path_buf(),
        meta,
        body,
    })
}

fn split_body(body: &str) -> SqlBody {
    let markers: Vec<(String, usize, usize)> = STEP_MARKER_RE
        .captures_iter(body)
        .map(|caps| {
            let whole = caps.get(0).expect("match");
            (
                caps[1].trim().to_string(),
                whole.start(),
                whole.end(),
            )
        })
        .collect();

    if markers.is_empty() {
        return SqlBody::Single(body.trim().to_string());
    }

    // Text before the first marker is preamble and is dropped.
    let mut steps: Vec<(String, String)> = Vec::with_capacity(markers.len());
    for (index, (name, _, end)) in markers.iter().enumerate() {
        let sql_end = markers
            .get(index + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(body.len());
        let sql = body[*end..sql_end].trim().to_string();

        match steps.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = sql,
            None => steps.push((name.clone(), sql)),
        }
    }
    SqlBody::Steps(steps)
}
