//! Built-in SQLite driver.
//!
//! The descriptor's `database` field is the database file path, or
//! `:memory:` for a private in-memory database. The `server` field only
//! participates in the connection-string cache key.

use std::rc::Rc;

use crate::connection::ConnectionDescriptor;
use crate::driver::{Connection, Driver, QueryOutput};
use crate::error::{EngineError, Result};
use crate::model::{Row, Value};

pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Rc<dyn Connection>> {
        if !descriptor.driver.eq_ignore_ascii_case("sqlite") {
            return Err(EngineError::Connection {
                message: format!(
                    "unsupported driver '{}' (built-in driver: sqlite)",
                    descriptor.driver
                ),
            });
        }

        let inner = if descriptor.database == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&descriptor.database)
        }
        .map_err(|e| EngineError::Connection {
            message: format!("failed to open '{}': {e}", descriptor.database),
        })?;

        Ok(Rc::new(SqliteConnection { inner }))
    }
}

#[derive(Debug)]
struct SqliteConnection {
    inner: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str) -> Result<QueryOutput> {
        let mut statement = self.inner.prepare(sql).map_err(step_error)?;

        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        let mut cursor = statement.query([]).map_err(step_error)?;
        while let Some(raw) = cursor.next().map_err(step_error)? {
            let mut row = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let value: rusqlite::types::Value = raw.get(index).map_err(step_error)?;
                row.insert(column.clone(), Value::from(value));
            }
            rows.push(row);
        }

        Ok(QueryOutput { columns, rows })
    }
}

fn step_error(source: rusqlite::Error) -> EngineError {
    EngineError::StepExecution {
        message: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            driver: "sqlite".to_string(),
            server: "localhost".to_string(),
            database: ":memory:".to_string(),
            trusted: true,
            username: None,
            password: None,
            trust_server_certificate: true,
            options: Default::default(),
        }
    }

    #[test]
    fn select_maps_driver_types_to_tagged_values() {
        let conn = SqliteDriver.open(&memory_descriptor()).unwrap();
        let output = conn
            .query("SELECT 1 AS n, 2.5 AS f, 'x' AS t, NULL AS missing")
            .unwrap();

        assert_eq!(output.columns, vec!["n", "f", "t", "missing"]);
        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row["n"], Value::Integer(1));
        assert_eq!(row["f"], Value::Float(2.5));
        assert_eq!(row["t"], Value::Text("x".to_string()));
        assert_eq!(row["missing"], Value::Null);
    }

    #[test]
    fn statements_without_result_sets_yield_empty_output() {
        let conn = SqliteDriver.open(&memory_descriptor()).unwrap();
        let output = conn.query("CREATE TABLE t (id INTEGER)").unwrap();
        assert!(output.rows.is_empty());
        assert!(output.columns.is_empty());
    }

    #[test]
    fn invalid_sql_surfaces_as_step_execution_error() {
        let conn = SqliteDriver.open(&memory_descriptor()).unwrap();
        let err = conn.query("SELECT * FROM missing_table").unwrap_err();
        assert!(matches!(err, EngineError::StepExecution { .. }));
        assert!(err.to_string().contains("missing_table"));
    }

    #[test]
    fn unknown_driver_is_a_connection_error() {
        let mut descriptor = memory_descriptor();
        descriptor.driver = "oracle".to_string();
        let err = SqliteDriver.open(&descriptor).unwrap_err();
        assert!(matches!(err, EngineError::Connection { .. }));
        assert!(err.to_string().contains("oracle"));
    }
}
