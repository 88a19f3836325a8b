//! Success-expression parser implementation using pest.

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::expr::ast::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::expr::error::ExprError;
use crate::model::Value;

#[derive(Parser)]
#[grammar = "expr/grammar.pest"]
struct SuccessExprParser;

lazy_static::lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = {
        use Assoc::*;
        use Rule::*;

        PrattParser::new()
            // Logical OR (lowest precedence)
            .op(Op::infix(or_op, Left))
            // Logical AND
            .op(Op::infix(and_op, Left))
            // Comparison operators
            .op(Op::infix(eq_op, Left) | Op::infix(ne_op, Left))
            .op(Op::infix(lt_op, Left) | Op::infix(le_op, Left) | Op::infix(gt_op, Left) | Op::infix(ge_op, Left))
            // Additive operators
            .op(Op::infix(add_op, Left) | Op::infix(sub_op, Left))
            // Multiplicative operators (highest precedence for infix)
            .op(Op::infix(mul_op, Left) | Op::infix(div_op, Left))
    };
}

/// Parse an expression string into an AST. Names and functions outside the
/// allow-list are rejected here, before anything can be evaluated.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    let pairs = SuccessExprParser::parse(Rule::expression, input).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ExprError::Syntax {
            line,
            column,
            message: format!("{}", e.variant),
        }
    })?;

    let expr_pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| ExprError::Internal {
            message: "no expression parsed".to_string(),
        })?
        .into_inner()
        .next()
        .ok_or_else(|| ExprError::Internal {
            message: "empty expression".to_string(),
        })?;

    parse_expr(expr_pair)
}

/// Parse an expression using the Pratt parser for precedence.
fn parse_expr(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    PRATT_PARSER
        .map_primary(parse_term)
        .map_infix(|lhs, op, rhs| {
            let lhs = lhs?;
            let rhs = rhs?;
            let binary_op = match op.as_rule() {
                Rule::add_op => BinaryOp::Add,
                Rule::sub_op => BinaryOp::Subtract,
                Rule::mul_op => BinaryOp::Multiply,
                Rule::div_op => BinaryOp::Divide,
                Rule::eq_op => BinaryOp::Equal,
                Rule::ne_op => BinaryOp::NotEqual,
                Rule::lt_op => BinaryOp::LessThan,
                Rule::le_op => BinaryOp::LessThanOrEqual,
                Rule::gt_op => BinaryOp::GreaterThan,
                Rule::ge_op => BinaryOp::GreaterThanOrEqual,
                Rule::and_op => BinaryOp::And,
                Rule::or_op => BinaryOp::Or,
                _ => {
                    return Err(ExprError::Internal {
                        message: format!("unknown infix operator: {:?}", op.as_rule()),
                    })
                }
            };
            Ok(Expr::binary(binary_op, lhs, rhs))
        })
        .parse(pair.into_inner())
}

/// Parse a term: leading unary operators, then a postfix chain.
fn parse_term(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut unary_ops = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::unary_op => {
                let op_pair = part.into_inner().next().ok_or_else(|| ExprError::Internal {
                    message: "empty unary operator".to_string(),
                })?;
                let op = match op_pair.as_rule() {
                    Rule::not_op => UnaryOp::Not,
                    Rule::negate_op => UnaryOp::Negate,
                    _ => {
                        return Err(ExprError::Internal {
                            message: format!("unknown unary operator: {:?}", op_pair.as_rule()),
                        })
                    }
                };
                unary_ops.push(op);
            }
            Rule::postfix => {
                let mut result = parse_postfix(part)?;
                // Apply unary operators in reverse order (right-to-left).
                for op in unary_ops.into_iter().rev() {
                    result = Expr::unary(op, result);
                }
                return Ok(result);
            }
            _ => {
                return Err(ExprError::Internal {
                    message: format!("unexpected term component: {:?}", part.as_rule()),
                })
            }
        }
    }

    Err(ExprError::Internal {
        message: "empty term".to_string(),
    })
}

/// Parse a primary followed by zero or more `[index]` accesses.
fn parse_postfix(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let primary = inner.next().ok_or_else(|| ExprError::Internal {
        message: "empty postfix".to_string(),
    })?;
    let mut result = parse_primary(primary)?;

    for index in inner {
        let key_pair = index.into_inner().next().ok_or_else(|| ExprError::Internal {
            message: "empty index".to_string(),
        })?;
        result = Expr::index(result, parse_expr(key_pair)?);
    }
    Ok(result)
}

/// Parse primary expressions (literals, the `steps` variable, calls,
/// parentheses).
fn parse_primary(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let inner = pair.into_inner().next().ok_or_else(|| ExprError::Internal {
        message: "empty primary".to_string(),
    })?;

    match inner.as_rule() {
        Rule::literal => parse_literal(inner),
        Rule::function_call => parse_call(inner),
        Rule::identifier => {
            let name = inner.as_str();
            if name == "steps" {
                Ok(Expr::Steps)
            } else {
                Err(ExprError::UnknownName {
                    name: name.to_string(),
                })
            }
        }
        Rule::expr => parse_expr(inner),
        _ => Err(ExprError::Internal {
            message: format!("unexpected primary rule: {:?}", inner.as_rule()),
        }),
    }
}

fn parse_literal(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let inner = pair.into_inner().next().ok_or_else(|| ExprError::Internal {
        message: "empty literal".to_string(),
    })?;

    match inner.as_rule() {
        Rule::number_literal => {
            let text = inner.as_str();
            let value = if text.contains('.') {
                text.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ExprError::InvalidNumber {
                        value: text.to_string(),
                    })?
            } else {
                text.parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| ExprError::InvalidNumber {
                        value: text.to_string(),
                    })?
            };
            Ok(Expr::Literal(value))
        }
        Rule::string_literal => {
            let s = inner.as_str();
            Ok(Expr::Literal(Value::Text(s[1..s.len() - 1].to_string())))
        }
        Rule::boolean_literal => Ok(Expr::Literal(Value::Bool(
            inner.as_str().eq_ignore_ascii_case("true"),
        ))),
        Rule::null_literal => Ok(Expr::Literal(Value::Null)),
        _ => Err(ExprError::Internal {
            message: format!("unknown literal type: {:?}", inner.as_rule()),
        }),
    }
}

fn parse_call(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| ExprError::Internal {
            message: "missing function name".to_string(),
        })?
        .as_str();

    let function = Builtin::from_name(name).ok_or_else(|| ExprError::UnknownFunction {
        name: name.to_string(),
    })?;

    let args = match inner.next() {
        Some(arg_list) => arg_list
            .into_inner()
            .map(parse_expr)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Expr::Call { function, args })
}
