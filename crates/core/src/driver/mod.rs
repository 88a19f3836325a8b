//! Database driver seam.
//!
//! The engine talks to databases through these traits so the execution
//! pipeline is independent of any one driver. The built-in implementation is
//! SQLite; descriptors naming any other driver fail at open time.

pub mod sqlite;

use std::rc::Rc;

use crate::connection::ConnectionDescriptor;
use crate::error::Result;
use crate::model::Row;

/// Rows and column order returned by one query execution.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Opens live connections from descriptors.
pub trait Driver {
    fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Rc<dyn Connection>>;
}

/// One live database connection.
pub trait Connection: std::fmt::Debug {
    /// Execute a statement and collect its result set. Statements that
    /// return no rows (DDL, DML) yield an empty output.
    fn query(&self, sql: &str) -> Result<QueryOutput>;

    /// Best-effort close. Errors are swallowed; the default relies on drop.
    fn close(&self) {}
}
