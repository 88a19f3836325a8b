//! Report rendering: JSON and a self-contained HTML page.
//!
//! Both consume the engine's result structures verbatim; verdicts are never
//! re-derived here.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlprobe_core::TestResult;
use uuid::Uuid;

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    run_timestamp: DateTime<Utc>,
    summary: Summary,
    tests: Vec<JsonTest<'a>>,
}

#[derive(Serialize)]
struct Summary {
    total: usize,
    passed: usize,
    failed: usize,
}

#[derive(Serialize)]
struct JsonTest<'a> {
    test_name: &'a str,
    file: String,
    passed: bool,
    message: &'a str,
    duration_ms: f64,
    tags: &'a [String],
    steps: Vec<JsonStep<'a>>,
}

#[derive(Serialize)]
struct JsonStep<'a> {
    step: &'a str,
    server: &'a str,
    database: &'a str,
    rows_returned: usize,
    duration_ms: f64,
    error: Option<&'a str>,
}

fn summarize(results: &[TestResult]) -> Summary {
    let passed = results.iter().filter(|r| r.passed).count();
    Summary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Write results as JSON.
pub fn write_json_report(results: &[TestResult], path: &Path) -> Result<()> {
    let report = JsonReport {
        run_id: Uuid::now_v7(),
        run_timestamp: Utc::now(),
        summary: summarize(results),
        tests: results
            .iter()
            .map(|result| JsonTest {
                test_name: &result.test_name,
                file: result.file_path.display().to_string(),
                passed: result.passed,
                message: &result.message,
                duration_ms: round2(result.duration_ms),
                tags: &result.tags,
                steps: result
                    .steps
                    .iter()
                    .map(|step| JsonStep {
                        step: &step.step_name,
                        server: &step.server,
                        database: &step.database,
                        rows_returned: step.rows.len(),
                        duration_ms: round2(step.duration_ms),
                        error: step.error.as_deref(),
                    })
                    .collect(),
            })
            .collect(),
    };

    let body = serde_json::to_string_pretty(&report).context("Failed to serialize JSON report")?;
    std::fs::write(path, body)
        .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
    Ok(())
}

/// Write a self-contained HTML report.
pub fn write_html_report(results: &[TestResult], path: &Path) -> Result<()> {
    let summary = summarize(results);

    let mut rows_html = String::new();
    for result in results {
        let status = if result.passed {
            "&#9989; PASS"
        } else {
            "&#10060; FAIL"
        };
        let color = if result.passed { "#e6ffe6" } else { "#ffe6e6" };

        let steps_detail: Vec<String> = result
            .steps
            .iter()
            .map(|step| {
                let error_note = match &step.error {
                    Some(error) => format!(" &#9888; {}", escape(error)),
                    None => String::new(),
                };
                format!(
                    "<small>{}: {}/{} ({} rows, {:.0}ms){}</small>",
                    escape(&step.step_name),
                    escape(&step.server),
                    escape(&step.database),
                    step.rows.len(),
                    step.duration_ms,
                    error_note,
                )
            })
            .collect();

        rows_html.push_str(&format!(
            "<tr style=\"background:{color}\">\
             <td>{status}</td>\
             <td><strong>{}</strong><br><small>{}</small></td>\
             <td>{}</td>\
             <td>{}</td>\
             <td>{:.0}ms</td>\
             </tr>\n",
            escape(&result.test_name),
            escape(&result.file_path.display().to_string()),
            escape(&result.message),
            steps_detail.join("<br>"),
            result.duration_ms,
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>sqlprobe Test Report</title>
<style>
  body {{ font-family: system-ui, sans-serif; margin: 2rem; background: #fafafa; }}
  h1 {{ color: #333; }}
  .summary {{ font-size: 1.2rem; margin: 1rem 0; }}
  .pass {{ color: #2d7a2d; }} .fail {{ color: #c0392b; }}
  table {{ border-collapse: collapse; width: 100%; margin-top: 1rem; }}
  th, td {{ border: 1px solid #ccc; padding: 8px 12px; text-align: left; vertical-align: top; }}
  th {{ background: #333; color: white; }}
  small {{ color: #666; }}
</style></head><body>
<h1>sqlprobe Test Report</h1>
<p class="summary">
  Run: {} &mdash;
  <span class="pass">{} passed</span> /
  <span class="fail">{} failed</span> /
  {} total
</p>
<table>
<tr><th>Status</th><th>Test</th><th>Message</th><th>Steps</th><th>Duration</th></tr>
{}</table></body></html>"#,
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        summary.passed,
        summary.failed,
        summary.total,
        rows_html,
    );

    std::fs::write(path, html)
        .with_context(|| format!("Failed to write HTML report: {}", path.display()))?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlprobe_core::StepResult;
    use tempfile::TempDir;

    fn sample_results() -> Vec<TestResult> {
        let mut passing = TestResult::failure("counts_match", "/tests/counts.sql", "");
        passing.passed = true;
        passing.message = "All 2 row(s) passed".to_string();
        passing.duration_ms = 12.345;
        passing.tags = vec!["smoke".to_string()];
        passing.steps.push(StepResult {
            step_name: "query".to_string(),
            server: "localhost".to_string(),
            database: ":memory:".to_string(),
            sql: "SELECT 0 AS success".to_string(),
            rows: vec![],
            columns: vec!["success".to_string()],
            duration_ms: 3.21,
            error: None,
        });

        let failing = TestResult::failure(
            "orders_exist",
            "/tests/orders.sql",
            "Query returned no rows",
        );
        vec![passing, failing]
    }

    #[test]
    fn json_report_carries_summary_and_step_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&sample_results(), &path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed["summary"]["total"], 2);
        assert_eq!(parsed["summary"]["passed"], 1);
        assert_eq!(parsed["summary"]["failed"], 1);
        assert!(parsed["run_id"].is_string());
        assert_eq!(parsed["tests"][0]["test_name"], "counts_match");
        assert_eq!(parsed["tests"][0]["duration_ms"], 12.35);
        assert_eq!(parsed["tests"][0]["steps"][0]["step"], "query");
        assert_eq!(parsed["tests"][0]["steps"][0]["rows_returned"], 0);
        assert_eq!(parsed["tests"][1]["passed"], false);
    }

    #[test]
    fn html_report_lists_every_test_with_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.html");
        write_html_report(&sample_results(), &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("1 passed"));
        assert!(html.contains("1 failed"));
        assert!(html.contains("counts_match"));
        assert!(html.contains("orders_exist"));
        assert!(html.contains("PASS"));
        assert!(html.contains("FAIL"));
    }

    #[test]
    fn html_report_escapes_markup_in_messages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.html");
        let results = vec![TestResult::failure(
            "xss",
            "/tests/xss.sql",
            "<script>alert(1)</script>",
        )];
        write_html_report(&results, &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
