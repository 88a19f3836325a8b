//! Result structures: the terminal artifacts of a run, consumed verbatim by
//! reporting. Reporting never re-derives pass/fail from these.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::value::Row;

/// Outcome of one executed step. Created once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step_name: String,
    pub server: String,
    pub database: String,
    /// SQL after template rendering, as sent to the database.
    pub sql: String,
    pub rows: Vec<Row>,
    pub columns: Vec<String>,
    pub duration_ms: f64,
    pub error: Option<String>,
}

/// Outcome of one test definition. Exactly one per file per run, whether the
/// test passed, failed, or blew up.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test_name: String,
    pub file_path: PathBuf,
    pub passed: bool,
    pub message: String,
    pub tags: Vec<String>,
    pub steps: Vec<StepResult>,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    /// A failing result carrying only a message, for faults that occur
    /// before any step could run (e.g. parse errors).
    pub fn failure(
        test_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        TestResult {
            test_name: test_name.into(),
            file_path: file_path.into(),
            passed: false,
            message: message.into(),
            tags: Vec::new(),
            steps: Vec::new(),
            duration_ms: 0.0,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_results_are_failed_and_empty() {
        let result = TestResult::failure("bad", "/tests/bad.sql", "Parse error: no frontmatter");
        assert!(!result.passed);
        assert!(result.steps.is_empty());
        assert!(result.message.contains("Parse error"));
    }

    #[test]
    fn results_serialize_with_named_fields() {
        let result = TestResult::failure("t", "/tests/t.sql", "m");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["test_name"], "t");
        assert_eq!(json["passed"], false);
        assert!(json["timestamp"].is_string());
    }
}
