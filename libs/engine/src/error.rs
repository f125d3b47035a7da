//! Expression evaluation errors
//!
//! Rule violations are not errors: predicates report them as verdicts and
//! the engine turns them into diagnostics. Only a broken `is_set_if` or
//! `refers_to` condition surfaces here, and the engine downgrades it to an
//! info diagnostic for the offending field.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Cannot parse expression '{expr}': {reason}")]
    Parse { expr: String, reason: String },

    #[error("Unknown name '{name}' in expression")]
    UnknownName { name: String },

    #[error("Unsupported operand types for '{op}': {left} and {right}")]
    Type {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,
}

impl ExprError {
    pub fn parse(expr: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ExprResult<T> = Result<T, ExprError>;
