//! Test orchestration.
//!
//! Drives one parsed definition end to end: resolve connections, execute the
//! single query or the ordered step pipeline, and decide the verdict with
//! the success expression or the column comparison rule. Multi-step
//! execution is fail-fast: the first step error stops the test and the
//! remaining steps never run.
//!
//! [`run_test`] is infallible by design. Whatever goes wrong is recorded on
//! the returned [`TestResult`], so a malformed test can never abort a batch.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionDescriptor, ConnectionRegistry, DEFAULT_DATABASE, DEFAULT_DRIVER};
use crate::error::{EngineError, Result};
use crate::expr;
use crate::model::{Row, SqlBody, StepResult, StepSpec, TestDefinition, TestMetadata, TestResult, Value};
use crate::render::render_sql;

const DEFAULT_SUCCESS_COLUMN: &str = "success";

/// Execute a single test definition and return its result.
pub fn run_test(definition: &TestDefinition, registry: &ConnectionRegistry) -> TestResult {
    let started = Instant::now();
    let mut result = TestResult {
        test_name: definition.test_name(),
        file_path: definition.path.clone(),
        passed: false,
        message: String::new(),
        tags: definition.meta.tags.clone(),
        steps: Vec::new(),
        duration_ms: 0.0,
        timestamp: Utc::now(),
    };

    let outcome = match &definition.body {
        SqlBody::Single(sql) => run_simple(definition, sql, registry, &mut result),
        SqlBody::Steps(_) => run_pipeline(definition, registry, &mut result),
    };

    if let Err(error) = outcome {
        result.passed = false;
        result.message = error.to_string();
    }

    result.duration_ms = elapsed_ms(started);

    if result.passed {
        info!("[PASS] {}: {}", result.test_name, result.message);
    } else {
        warn!("[FAIL] {}: {}", result.test_name, result.message);
    }
    result
}

fn run_simple(
    definition: &TestDefinition,
    sql: &str,
    registry: &ConnectionRegistry,
    result: &mut TestResult,
) -> Result<()> {
    let descriptor = default_connection(definition, registry)?;
    let connection = registry.connection(&descriptor)?;

    let started = Instant::now();
    let query = connection.query(sql);
    let duration_ms = elapsed_ms(started);

    let (rows, columns, error) = match query {
        Ok(output) => (output.rows, output.columns, None),
        Err(e) => (Vec::new(), Vec::new(), Some(e.to_string())),
    };

    result.steps.push(StepResult {
        step_name: "query".to_string(),
        server: descriptor.server.clone(),
        database: descriptor.database.clone(),
        sql: sql.to_string(),
        rows: rows.clone(),
        columns,
        duration_ms,
        error: error.clone(),
    });

    if let Some(error) = error {
        result.passed = false;
        result.message = error;
        return Ok(());
    }

    let (passed, message) = match &definition.meta.success_expression {
        Some(expression) => {
            // The single query is in scope as a pseudo-step named "query".
            let steps = BTreeMap::from([("query".to_string(), rows)]);
            expr::check(expression, &steps)
        }
        None => evaluate_success_column(&definition.meta, &rows),
    };
    result.passed = passed;
    result.message = message;
    Ok(())
}

fn run_pipeline(
    definition: &TestDefinition,
    registry: &ConnectionRegistry,
    result: &mut TestResult,
) -> Result<()> {
    let meta = &definition.meta;
    if meta.steps.is_empty() {
        return Err(EngineError::message(format!(
            "{} declares step bodies but no 'steps' list in its metadata",
            definition.path.display()
        )));
    }

    let mut collected: BTreeMap<String, Vec<Row>> = BTreeMap::new();

    for step in &meta.steps {
        let descriptor = step_connection(definition, step, registry)?;
        let connection = registry.connection(&descriptor)?;

        let template = definition.sql_for_step(&step.name).ok_or_else(|| {
            EngineError::message(format!("No SQL body found for step '{}'", step.name))
        })?;
        let sql = render_sql(template, &collected)?;

        let started = Instant::now();
        let query = connection.query(&sql);
        let duration_ms = elapsed_ms(started);

        let (rows, columns, error) = match query {
            Ok(output) => (output.rows, output.columns, None),
            Err(e) => (Vec::new(), Vec::new(), Some(e.to_string())),
        };

        debug!(
            step = %step.name,
            rows = rows.len(),
            duration_ms,
            "step executed"
        );

        result.steps.push(StepResult {
            step_name: step.name.clone(),
            server: descriptor.server.clone(),
            database: descriptor.database.clone(),
            sql,
            rows: rows.clone(),
            columns,
            duration_ms,
            error: error.clone(),
        });
        collected.insert(step.name.clone(), rows);

        if let Some(error) = error {
            result.passed = false;
            result.message = format!("Step '{}' failed: {error}", step.name);
            return Ok(());
        }
    }

    let (passed, message) = match &meta.success_expression {
        Some(expression) => expr::check(expression, &collected),
        None => {
            let last = meta.steps.last().expect("steps checked non-empty");
            let rows = collected.remove(&last.name).unwrap_or_default();
            evaluate_success_column(meta, &rows)
        }
    };
    result.passed = passed;
    result.message = message;
    Ok(())
}

/// Column comparison rule: every row's success column must equal the
/// expected value. Detail is capped at the first five failing rows.
fn evaluate_success_column(meta: &TestMetadata, rows: &[Row]) -> (bool, String) {
    let column = meta
        .success_column
        .as_deref()
        .unwrap_or(DEFAULT_SUCCESS_COLUMN);
    let expected = meta.success_value.clone().unwrap_or(Value::Integer(0));

    if rows.is_empty() {
        return if meta.allow_empty {
            (true, "Query returned no rows (allowed)".to_string())
        } else {
            (false, "Query returned no rows".to_string())
        };
    }

    let mut failures = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match row.get(column) {
            None => {
                let columns: Vec<&str> = row.keys().map(String::as_str).collect();
                return (
                    false,
                    format!("Column '{column}' not found in results. Columns: {columns:?}"),
                );
            }
            Some(value) if *value != expected => {
                failures.push(format!("Row {index}: {column}={value}"));
            }
            Some(_) => {}
        }
    }

    if failures.is_empty() {
        (true, format!("All {} row(s) passed", rows.len()))
    } else {
        let detail = failures
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        (false, format!("{} row(s) failed: {detail}", failures.len()))
    }
}

/// Connection for one step: the step's own reference first (test-local
/// `connections` map, then the shared registry), else the definition's
/// default connection.
fn step_connection(
    definition: &TestDefinition,
    step: &StepSpec,
    registry: &ConnectionRegistry,
) -> Result<ConnectionDescriptor> {
    match &step.connection {
        Some(name) => match definition.meta.connections.get(name) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => registry.resolve_name(name),
        },
        None => default_connection(definition, registry),
    }
}

/// The definition's default connection: a named/inline reference, or the
/// inline single-connection fields.
fn default_connection(
    definition: &TestDefinition,
    registry: &ConnectionRegistry,
) -> Result<ConnectionDescriptor> {
    let meta = &definition.meta;
    if let Some(reference) = &meta.connection {
        return registry.resolve(reference);
    }

    let Some(server) = &meta.server else {
        return Err(EngineError::Connection {
            message: format!("no connection configured in {}", definition.path.display()),
        });
    };

    Ok(ConnectionDescriptor {
        driver: meta.driver.clone().unwrap_or_else(|| DEFAULT_DRIVER.to_string()),
        server: server.clone(),
        database: meta
            .database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        trusted: meta.trusted_connection.unwrap_or(false),
        username: meta.username.clone(),
        password: meta.password.clone(),
        trust_server_certificate: meta.trust_server_certificate.unwrap_or(true),
        options: meta.options.clone(),
    })
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
