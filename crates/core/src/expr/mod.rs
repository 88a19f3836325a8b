//! Sandboxed success-expression evaluation.
//!
//! A success expression is a boolean condition over collected step results,
//! e.g. `steps['source'][0]['cnt'] == steps['target'][0]['cnt']`. The
//! language is compiled to a restricted AST: one variable (`steps`), bracket
//! indexing, comparison/arithmetic/logical operators, and five builtin
//! functions. Everything else is rejected at parse time, so an expression
//! can never reach ambient capabilities.

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;

pub use ast::{BinaryOp, Builtin, Expr, UnaryOp};
pub use error::ExprError;
pub use eval::{evaluate, StepRows};
pub use parser::parse_expression;

use crate::model::{Row, Value};

/// Evaluate a success expression to a verdict and a human-readable message.
///
/// Never fails: parse and evaluation errors become a failing verdict whose
/// message carries the error. A falsy result reports the expression plus the
/// first row of each step's results for debugging.
pub fn check(source: &str, steps: &StepRows) -> (bool, String) {
    let verdict = parse_expression(source).and_then(|ast| evaluate(&ast, steps));

    match verdict {
        Ok(true) => (true, format!("Expression passed: {source}")),
        Ok(false) => {
            let details: Vec<String> = steps
                .iter()
                .filter_map(|(name, rows)| {
                    rows.first().map(|row| format!("{name}: {}", format_row(row)))
                })
                .collect();
            (
                false,
                format!(
                    "Expression failed: {source} | Values: {}",
                    details.join("; ")
                ),
            )
        }
        Err(err) => (false, format!("Expression error: {err}")),
    }
}

fn format_row(row: &Row) -> String {
    let fields: Vec<String> = row
        .iter()
        .map(|(column, value)| match value {
            Value::Text(text) => format!("{column}: '{text}'"),
            other => format!("{column}: {other}"),
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn count_steps(source: i64, target: i64) -> StepRows {
        let row = |n: i64| -> Row { BTreeMap::from([("cnt".to_string(), Value::Integer(n))]) };
        StepRows::from([
            ("source".to_string(), vec![row(source)]),
            ("target".to_string(), vec![row(target)]),
        ])
    }

    #[test]
    fn passing_expression_reports_the_expression() {
        let (passed, message) = check(
            "steps['source'][0]['cnt'] == steps['target'][0]['cnt']",
            &count_steps(10, 10),
        );
        assert!(passed);
        assert!(message.starts_with("Expression passed:"));
    }

    #[test]
    fn failing_expression_reports_first_rows_of_each_step() {
        let (passed, message) = check(
            "steps['source'][0]['cnt'] == steps['target'][0]['cnt']",
            &count_steps(10, 9),
        );
        assert!(!passed);
        assert!(message.contains("Expression failed:"));
        assert!(message.contains("source: {cnt: 10}"));
        assert!(message.contains("target: {cnt: 9}"));
    }

    #[test]
    fn evaluation_errors_become_failing_verdicts() {
        let (passed, message) = check("steps['missing'][0]['cnt'] == 1", &count_steps(1, 1));
        assert!(!passed);
        assert!(message.contains("Expression error:"));
        assert!(message.contains("'missing'"));
    }

    #[test]
    fn syntax_errors_become_failing_verdicts() {
        let (passed, message) = check("steps[", &count_steps(1, 1));
        assert!(!passed);
        assert!(message.contains("Expression error:"));
    }

    #[test]
    fn text_values_are_quoted_in_diagnostics() {
        let steps = StepRows::from([(
            "q".to_string(),
            vec![BTreeMap::from([
                ("state".to_string(), Value::Text("stale".to_string())),
            ])],
        )]);
        let (_, message) = check("false", &steps);
        assert!(message.contains("q: {state: 'stale'}"));
    }
}
