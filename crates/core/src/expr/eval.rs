//! Tree-walking evaluator for success expressions.
//!
//! Operates on collected step results only; there is no ambient state to
//! reach. Every fault is a typed [`ExprError`] so the orchestrator can fold
//! it into a failing verdict.

use std::collections::BTreeMap;

use crate::expr::ast::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::expr::error::ExprError;
use crate::model::{Row, Value};

/// Step name -> that step's collected rows; the evaluator's entire world.
pub type StepRows = BTreeMap<String, Vec<Row>>;

#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Scalar(Value),
    Row(Row),
    Rows(Vec<Row>),
    Steps(StepRows),
}

/// Evaluate an expression to its truthiness.
pub fn evaluate(expr: &Expr, steps: &StepRows) -> Result<bool, ExprError> {
    Ok(truthy(&eval(expr, steps)?))
}

fn eval(expr: &Expr, steps: &StepRows) -> Result<EvalValue, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(EvalValue::Scalar(value.clone())),
        Expr::Steps => Ok(EvalValue::Steps(steps.clone())),
        Expr::Index { target, key } => {
            let key = eval(key, steps)?;
            // `steps['name']` is the hot path; look it up without cloning
            // the whole map first.
            if matches!(**target, Expr::Steps) {
                let EvalValue::Scalar(Value::Text(name)) = &key else {
                    return Err(type_error("step lookup requires a string key"));
                };
                return steps
                    .get(name)
                    .cloned()
                    .map(EvalValue::Rows)
                    .ok_or_else(|| ExprError::UnknownStep { name: name.clone() });
            }
            index_value(eval(target, steps)?, key)
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, steps)?;
            match op {
                UnaryOp::Not => Ok(EvalValue::Scalar(Value::Bool(!truthy(&value)))),
                UnaryOp::Negate => match value {
                    EvalValue::Scalar(Value::Integer(i)) => {
                        Ok(EvalValue::Scalar(Value::Integer(-i)))
                    }
                    EvalValue::Scalar(Value::Float(f)) => Ok(EvalValue::Scalar(Value::Float(-f))),
                    other => Err(type_error(format!(
                        "cannot negate {}",
                        shape_name(&other)
                    ))),
                },
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, steps),
        Expr::Call { function, args } => eval_call(*function, args, steps),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    steps: &StepRows,
) -> Result<EvalValue, ExprError> {
    // Short-circuit logical operators before touching the right side.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = truthy(&eval(left, steps)?);
        let result = match op {
            BinaryOp::And => lhs && truthy(&eval(right, steps)?),
            BinaryOp::Or => lhs || truthy(&eval(right, steps)?),
            _ => unreachable!(),
        };
        return Ok(EvalValue::Scalar(Value::Bool(result)));
    }

    let lhs = eval(left, steps)?;
    let rhs = eval(right, steps)?;

    match op {
        BinaryOp::Equal => Ok(EvalValue::Scalar(Value::Bool(lhs == rhs))),
        BinaryOp::NotEqual => Ok(EvalValue::Scalar(Value::Bool(lhs != rhs))),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let (a, b) = scalar_pair(&lhs, &rhs, op)?;
            let ordering = a.partial_cmp(b).ok_or_else(|| {
                type_error(format!(
                    "cannot compare {} {op} {}",
                    shape_name(&lhs),
                    shape_name(&rhs)
                ))
            })?;
            let result = match op {
                BinaryOp::LessThan => ordering.is_lt(),
                BinaryOp::LessThanOrEqual => ordering.is_le(),
                BinaryOp::GreaterThan => ordering.is_gt(),
                BinaryOp::GreaterThanOrEqual => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(EvalValue::Scalar(Value::Bool(result)))
        }
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
            arithmetic(op, &lhs, &rhs)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Both operands of a comparison must be scalars.
fn scalar_pair<'a>(
    lhs: &'a EvalValue,
    rhs: &'a EvalValue,
    op: BinaryOp,
) -> Result<(&'a Value, &'a Value), ExprError> {
    match (lhs, rhs) {
        (EvalValue::Scalar(a), EvalValue::Scalar(b)) => Ok((a, b)),
        _ => Err(type_error(format!(
            "cannot compare {} {op} {}",
            shape_name(lhs),
            shape_name(rhs)
        ))),
    }
}

fn arithmetic(op: BinaryOp, lhs: &EvalValue, rhs: &EvalValue) -> Result<EvalValue, ExprError> {
    // String concatenation is the one non-numeric case.
    if op == BinaryOp::Add {
        if let (EvalValue::Scalar(Value::Text(a)), EvalValue::Scalar(Value::Text(b))) = (lhs, rhs)
        {
            return Ok(EvalValue::Scalar(Value::Text(format!("{a}{b}"))));
        }
    }

    let fail = || {
        type_error(format!(
            "cannot apply {op} to {} and {}",
            shape_name(lhs),
            shape_name(rhs)
        ))
    };

    let (EvalValue::Scalar(a), EvalValue::Scalar(b)) = (lhs, rhs) else {
        return Err(fail());
    };

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            // Overflow falls back to float rather than failing the test.
            let value = match op {
                BinaryOp::Add => x
                    .checked_add(*y)
                    .map(Value::Integer)
                    .unwrap_or(Value::Float(*x as f64 + *y as f64)),
                BinaryOp::Subtract => x
                    .checked_sub(*y)
                    .map(Value::Integer)
                    .unwrap_or(Value::Float(*x as f64 - *y as f64)),
                BinaryOp::Multiply => x
                    .checked_mul(*y)
                    .map(Value::Integer)
                    .unwrap_or(Value::Float(*x as f64 * *y as f64)),
                BinaryOp::Divide => {
                    if *y == 0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    Value::Float(*x as f64 / *y as f64)
                }
                _ => unreachable!(),
            };
            Ok(EvalValue::Scalar(value))
        }
        _ => {
            let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) else {
                return Err(fail());
            };
            let value = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Subtract => x - y,
                BinaryOp::Multiply => x * y,
                BinaryOp::Divide => {
                    if y == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    x / y
                }
                _ => unreachable!(),
            };
            Ok(EvalValue::Scalar(Value::Float(value)))
        }
    }
}

fn eval_call(function: Builtin, args: &[Expr], steps: &StepRows) -> Result<EvalValue, ExprError> {
    let values = args
        .iter()
        .map(|arg| eval(arg, steps))
        .collect::<Result<Vec<_>, _>>()?;

    match function {
        Builtin::Len => {
            let [value] = values.as_slice() else {
                return Err(wrong_args(function, "1", values.len()));
            };
            let len = match value {
                EvalValue::Rows(rows) => rows.len(),
                EvalValue::Row(row) => row.len(),
                EvalValue::Steps(map) => map.len(),
                EvalValue::Scalar(Value::Text(s)) => s.chars().count(),
                other => {
                    return Err(type_error(format!("len() of {}", shape_name(other))))
                }
            };
            Ok(EvalValue::Scalar(Value::Integer(len as i64)))
        }
        Builtin::Abs => {
            let [value] = values.as_slice() else {
                return Err(wrong_args(function, "1", values.len()));
            };
            match value {
                EvalValue::Scalar(Value::Integer(i)) => {
                    Ok(EvalValue::Scalar(Value::Integer(i.abs())))
                }
                EvalValue::Scalar(Value::Float(f)) => {
                    Ok(EvalValue::Scalar(Value::Float(f.abs())))
                }
                other => Err(type_error(format!("abs() of {}", shape_name(other)))),
            }
        }
        Builtin::Min | Builtin::Max => {
            if values.len() < 2 {
                return Err(wrong_args(function, "at least 2", values.len()));
            }
            let mut best: Option<&Value> = None;
            for value in &values {
                let EvalValue::Scalar(scalar) = value else {
                    return Err(type_error(format!(
                        "{}() of {}",
                        function.name(),
                        shape_name(value)
                    )));
                };
                best = Some(match best {
                    None => scalar,
                    Some(current) => {
                        let ordering = scalar.partial_cmp(current).ok_or_else(|| {
                            type_error(format!("{}() arguments are not comparable", function.name()))
                        })?;
                        let replace = match function {
                            Builtin::Min => ordering.is_lt(),
                            _ => ordering.is_gt(),
                        };
                        if replace {
                            scalar
                        } else {
                            current
                        }
                    }
                });
            }
            Ok(EvalValue::Scalar(
                best.expect("at least two arguments").clone(),
            ))
        }
        Builtin::Sum => {
            if values.is_empty() {
                return Err(wrong_args(function, "at least 1", 0));
            }
            let mut int_total: i64 = 0;
            let mut float_total: f64 = 0.0;
            let mut saw_float = false;
            for value in &values {
                match value {
                    EvalValue::Scalar(Value::Integer(i)) => {
                        int_total = int_total.saturating_add(*i);
                        float_total += *i as f64;
                    }
                    EvalValue::Scalar(Value::Float(f)) => {
                        saw_float = true;
                        float_total += *f;
                    }
                    other => {
                        return Err(type_error(format!("sum() of {}", shape_name(other))))
                    }
                }
            }
            Ok(EvalValue::Scalar(if saw_float {
                Value::Float(float_total)
            } else {
                Value::Integer(int_total)
            }))
        }
    }
}

fn index_value(target: EvalValue, key: EvalValue) -> Result<EvalValue, ExprError> {
    match (target, key) {
        (EvalValue::Steps(map), EvalValue::Scalar(Value::Text(name))) => map
            .get(&name)
            .cloned()
            .map(EvalValue::Rows)
            .ok_or(ExprError::UnknownStep { name }),
        (EvalValue::Rows(rows), EvalValue::Scalar(Value::Integer(index))) => {
            // Negative indices count from the end.
            let resolved = if index < 0 {
                index + rows.len() as i64
            } else {
                index
            };
            usize::try_from(resolved)
                .ok()
                .and_then(|i| rows.get(i))
                .cloned()
                .map(EvalValue::Row)
                .ok_or(ExprError::IndexOutOfRange {
                    index,
                    len: rows.len(),
                })
        }
        (EvalValue::Row(row), EvalValue::Scalar(Value::Text(column))) => row
            .get(&column)
            .cloned()
            .map(EvalValue::Scalar)
            .ok_or(ExprError::MissingColumn { column }),
        (target, key) => Err(type_error(format!(
            "cannot index {} with {}",
            shape_name(&target),
            shape_name(&key)
        ))),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn truthy(value: &EvalValue) -> bool {
    match value {
        EvalValue::Scalar(Value::Null) => false,
        EvalValue::Scalar(Value::Bool(b)) => *b,
        EvalValue::Scalar(Value::Integer(i)) => *i != 0,
        EvalValue::Scalar(Value::Float(f)) => *f != 0.0,
        EvalValue::Scalar(Value::Text(s)) => !s.is_empty(),
        EvalValue::Scalar(Value::Timestamp(_)) => true,
        EvalValue::Row(row) => !row.is_empty(),
        EvalValue::Rows(rows) => !rows.is_empty(),
        EvalValue::Steps(map) => !map.is_empty(),
    }
}

fn shape_name(value: &EvalValue) -> &'static str {
    match value {
        EvalValue::Scalar(Value::Null) => "null",
        EvalValue::Scalar(Value::Bool(_)) => "boolean",
        EvalValue::Scalar(Value::Integer(_)) => "integer",
        EvalValue::Scalar(Value::Float(_)) => "float",
        EvalValue::Scalar(Value::Text(_)) => "text",
        EvalValue::Scalar(Value::Timestamp(_)) => "timestamp",
        EvalValue::Row(_) => "row",
        EvalValue::Rows(_) => "row list",
        EvalValue::Steps(_) => "step results",
    }
}

fn type_error(message: impl Into<String>) -> ExprError {
    ExprError::Type {
        message: message.into(),
    }
}

fn wrong_args(function: Builtin, expected: &'static str, actual: usize) -> ExprError {
    ExprError::WrongArgumentCount {
        function: function.name(),
        expected,
        actual,
    }
}
