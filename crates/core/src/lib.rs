//! File-driven test engine for validating relational-database state.
//!
//! A test definition is a text file: a YAML frontmatter block describing the
//! test (connections, steps, success criteria) followed by one or more SQL
//! bodies. The engine parses definitions, resolves connections through a
//! run-scoped registry, executes the SQL (single query or an ordered
//! multi-step pipeline with cross-step templating), and produces a
//! [`TestResult`] that encodes the verdict. [`run_test`] never fails: every
//! fault is folded into the returned result so one broken test cannot take
//! down a batch run.

pub mod connection;
pub mod driver;
pub mod error;
pub mod expr;
pub mod model;
pub mod parse;
pub mod render;
pub mod runner;
pub mod vars;

pub use connection::{ConnectionDescriptor, ConnectionRef, ConnectionRegistry};
pub use driver::{Connection, Driver, QueryOutput};
pub use error::{EngineError, Result};
pub use model::{Row, SqlBody, StepResult, TestDefinition, TestMetadata, TestResult, Value};
pub use parse::{parse_test_file, parse_test_source};
pub use runner::run_test;
