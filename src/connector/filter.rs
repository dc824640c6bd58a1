//! Compiles a task's filter condition into a parameterized `WHERE` clause.
//!
//! The condition is parsed as a single SQL expression. Column references must
//! name columns of the counted table and are re-quoted for the target
//! dialect; every literal becomes a bind value. Anything outside a small
//! predicate grammar (function calls, subqueries, casts, qualified names,
//! trailing statements) is rejected.

use crate::connector::dialect::Dialect;
use crate::connector::ConnectorError;
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<FilterValue>,
}

pub fn compile(
    filter: &str,
    columns: &[&str],
    dialect: Dialect,
) -> Result<CompiledFilter, ConnectorError> {
    let parser_dialect = dialect.parser_dialect();
    let mut parser = Parser::new(parser_dialect.as_ref())
        .try_with_sql(filter)
        .map_err(invalid)?;
    let expr = parser.parse_expr().map_err(invalid)?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(ConnectorError::InvalidFilter(format!(
            "unexpected input after expression: {}",
            next.token
        )));
    }

    let mut compiler = FilterCompiler {
        columns,
        dialect,
        sql: String::new(),
        params: vec![],
    };
    compiler.write_expr(&expr)?;
    Ok(CompiledFilter {
        sql: compiler.sql,
        params: compiler.params,
    })
}

fn invalid(err: impl ToString) -> ConnectorError {
    ConnectorError::InvalidFilter(err.to_string())
}

struct FilterCompiler<'a> {
    columns: &'a [&'a str],
    dialect: Dialect,
    sql: String,
    params: Vec<FilterValue>,
}

impl<'a> FilterCompiler<'a> {
    fn write_expr(&mut self, expr: &Expr) -> Result<(), ConnectorError> {
        match expr {
            Expr::Identifier(ident) => self.write_column(&ident.value),
            Expr::CompoundIdentifier(_) => Err(ConnectorError::InvalidFilter(
                "qualified column names are not supported".to_string(),
            )),
            Expr::Value(value) => self.write_value(value, false),
            Expr::Nested(inner) => {
                self.sql.push('(');
                self.write_expr(inner)?;
                self.sql.push(')');
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => {
                if !is_allowed_operator(op) {
                    return Err(ConnectorError::InvalidFilter(format!(
                        "operator {} is not supported",
                        op
                    )));
                }
                self.sql.push('(');
                self.write_expr(left)?;
                self.sql.push_str(&format!(" {} ", op));
                self.write_expr(right)?;
                self.sql.push(')');
                Ok(())
            }
            Expr::UnaryOp { op, expr } => self.write_unary(op, expr),
            Expr::IsNull(inner) => {
                self.sql.push('(');
                self.write_expr(inner)?;
                self.sql.push_str(" IS NULL)");
                Ok(())
            }
            Expr::IsNotNull(inner) => {
                self.sql.push('(');
                self.write_expr(inner)?;
                self.sql.push_str(" IS NOT NULL)");
                Ok(())
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Err(ConnectorError::InvalidFilter(
                        "IN list must not be empty".to_string(),
                    ));
                }
                self.sql.push('(');
                self.write_expr(expr)?;
                self.sql
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (index, item) in list.iter().enumerate() {
                    if index > 0 {
                        self.sql.push_str(", ");
                    }
                    self.write_expr(item)?;
                }
                self.sql.push_str("))");
                Ok(())
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                self.sql.push('(');
                self.write_expr(expr)?;
                self.sql
                    .push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.write_expr(low)?;
                self.sql.push_str(" AND ");
                self.write_expr(high)?;
                self.sql.push(')');
                Ok(())
            }
            Expr::Like {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                if escape_char.is_some() {
                    return Err(ConnectorError::InvalidFilter(
                        "LIKE ... ESCAPE is not supported".to_string(),
                    ));
                }
                self.sql.push('(');
                self.write_expr(expr)?;
                self.sql
                    .push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                self.write_expr(pattern)?;
                self.sql.push(')');
                Ok(())
            }
            other => Err(ConnectorError::InvalidFilter(format!(
                "unsupported expression: {}",
                other
            ))),
        }
    }

    fn write_unary(&mut self, op: &UnaryOperator, expr: &Expr) -> Result<(), ConnectorError> {
        match (op, expr) {
            (UnaryOperator::Minus, Expr::Value(value)) => self.write_value(value, true),
            (UnaryOperator::Plus, _) => self.write_expr(expr),
            (UnaryOperator::Minus, _) => {
                self.sql.push_str("(-");
                self.write_expr(expr)?;
                self.sql.push(')');
                Ok(())
            }
            (UnaryOperator::Not, _) => {
                self.sql.push_str("(NOT ");
                self.write_expr(expr)?;
                self.sql.push(')');
                Ok(())
            }
            (other, _) => Err(ConnectorError::InvalidFilter(format!(
                "operator {} is not supported",
                other
            ))),
        }
    }

    fn write_column(&mut self, name: &str) -> Result<(), ConnectorError> {
        let column = self
            .columns
            .iter()
            .find(|column| **column == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|column| column.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| ConnectorError::InvalidFilter(format!("unknown column: {}", name)))?;
        self.sql.push_str(&self.dialect.quote_ident(column));
        Ok(())
    }

    fn write_value(&mut self, value: &Value, negate: bool) -> Result<(), ConnectorError> {
        let param = match value {
            Value::Number(number, _) => parse_number(number, negate)?,
            Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) if !negate => {
                FilterValue::Text(text.clone())
            }
            Value::Boolean(flag) if !negate => FilterValue::Boolean(*flag),
            Value::Null if !negate => {
                self.sql.push_str("NULL");
                return Ok(());
            }
            other => {
                return Err(ConnectorError::InvalidFilter(format!(
                    "unsupported literal: {}",
                    other
                )))
            }
        };
        self.params.push(param);
        self.sql
            .push_str(&self.dialect.placeholder(self.params.len()));
        Ok(())
    }
}

fn parse_number(number: &str, negate: bool) -> Result<FilterValue, ConnectorError> {
    if let Ok(value) = number.parse::<i64>() {
        return Ok(FilterValue::Integer(if negate { -value } else { value }));
    }
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(FilterValue::Float(if negate { -value } else { value })),
        _ => Err(ConnectorError::InvalidFilter(format!(
            "invalid number: {}",
            number
        ))),
    }
}

fn is_allowed_operator(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::And
            | BinaryOperator::Or
            | BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
    )
}
