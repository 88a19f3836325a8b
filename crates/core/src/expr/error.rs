//! Errors produced while parsing or evaluating success expressions. All of
//! them fail closed: the orchestrator converts them into a failing verdict.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unknown name '{name}': only 'steps' is in scope")]
    UnknownName { name: String },

    #[error("Unknown function '{name}': allowed functions are len, abs, min, max, sum")]
    UnknownFunction { name: String },

    #[error("Wrong number of arguments for {function}(): expected {expected}, got {actual}")]
    WrongArgumentCount {
        function: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("No step named '{name}' in results")]
    UnknownStep { name: String },

    #[error("Row index {index} out of range ({len} row(s))")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Column '{column}' not present in row")]
    MissingColumn { column: String },

    #[error("Type error: {message}")]
    Type { message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid number '{value}'")]
    InvalidNumber { value: String },

    #[error("Parser internal error: {message}")]
    Internal { message: String },
}
