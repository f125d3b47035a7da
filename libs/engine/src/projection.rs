//! Expression-friendly projection of a message
//!
//! Conditions such as `is_set_if: "type == 'TYPE_VEHICLE' and speed > 0"`
//! are evaluated against the enclosing message. Fields are projected on
//! demand and memoized per evaluation scope, so a condition only pays for
//! the fields it mentions.

use crate::error::{ExprError, ExprResult};
use codec::{Navigator, NavigatorError};
use prost_reflect::{EnumDescriptor, Kind, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// Value of a field as seen by the expression language
#[derive(Debug, Clone, PartialEq)]
pub enum ProjValue {
    /// Unset field
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Enum number plus its symbolic name when the schema knows it
    Enum { number: i32, name: Option<String> },
    List(Vec<ProjValue>),
    /// Populated sub-message; only its truthiness is observable
    Message,
}

impl ProjValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ProjValue::None => "NoneType",
            ProjValue::Bool(_) => "bool",
            ProjValue::Int(_) => "int",
            ProjValue::Float(_) => "float",
            ProjValue::Str(_) => "str",
            ProjValue::Enum { .. } => "enum",
            ProjValue::List(_) => "list",
            ProjValue::Message => "message",
        }
    }

    /// Python truthiness
    pub fn truthy(&self) -> bool {
        match self {
            ProjValue::None => false,
            ProjValue::Bool(b) => *b,
            ProjValue::Int(i) => *i != 0,
            ProjValue::Float(f) => *f != 0.0,
            ProjValue::Str(s) => !s.is_empty(),
            ProjValue::Enum { number, .. } => *number != 0,
            ProjValue::List(items) => !items.is_empty(),
            ProjValue::Message => true,
        }
    }

    /// Integer view of bools, ints and enum numbers
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ProjValue::Bool(b) => Some(i64::from(*b)),
            ProjValue::Int(i) => Some(*i),
            ProjValue::Enum { number, .. } => Some(i64::from(*number)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ProjValue::Float(f) => Some(*f),
            other => other.as_int().map(|i| i as f64),
        }
    }
}

/// Name resolution for expressions
pub trait Scope {
    /// Resolve a dotted name, already split into components
    fn lookup(&self, path: &[String]) -> ExprResult<ProjValue>;
}

impl Scope for HashMap<String, ProjValue> {
    fn lookup(&self, path: &[String]) -> ExprResult<ProjValue> {
        let key = path.join(".");
        self.get(&key)
            .cloned()
            .ok_or(ExprError::UnknownName { name: key })
    }
}

/// Lazily projected view of one message
pub struct Projection<'n, 'a> {
    nav: &'n Navigator<'a>,
    memo: RefCell<HashMap<String, ProjValue>>,
}

impl<'n, 'a> Projection<'n, 'a> {
    pub fn new(nav: &'n Navigator<'a>) -> Self {
        Self {
            nav,
            memo: RefCell::new(HashMap::new()),
        }
    }
}

impl Scope for Projection<'_, '_> {
    fn lookup(&self, path: &[String]) -> ExprResult<ProjValue> {
        let key = path.join("/");
        if let Some(hit) = self.memo.borrow().get(&key) {
            return Ok(hit.clone());
        }

        let field = self.nav.query(&key, false).map_err(|e| match e {
            NavigatorError::UnknownField { .. } | NavigatorError::NotAMessage { .. } => ExprError::UnknownName {
                name: path.join("."),
            },
            NavigatorError::PathEscapesRoot { path, .. } => ExprError::UnknownName { name: path },
        })?;
        let value = project(&field);
        self.memo.borrow_mut().insert(key, value.clone());
        Ok(value)
    }
}

/// Project a single navigator
pub fn project(nav: &Navigator<'_>) -> ProjValue {
    if !nav.is_present() {
        return ProjValue::None;
    }
    if nav.is_message() {
        return ProjValue::Message;
    }

    let enum_desc = nav.field_descriptor().and_then(|fd| match fd.kind() {
        Kind::Enum(desc) => Some(desc),
        _ => None,
    });

    match nav.value() {
        Some(Value::List(items)) => ProjValue::List(
            items
                .iter()
                .map(|v| project_value(v, enum_desc.as_ref()))
                .collect(),
        ),
        Some(value) => project_value(value, enum_desc.as_ref()),
        None => ProjValue::None,
    }
}

fn project_value(value: &Value, enum_desc: Option<&EnumDescriptor>) -> ProjValue {
    match value {
        Value::Bool(b) => ProjValue::Bool(*b),
        Value::I32(v) => ProjValue::Int(i64::from(*v)),
        Value::I64(v) => ProjValue::Int(*v),
        Value::U32(v) => ProjValue::Int(i64::from(*v)),
        Value::U64(v) => i64::try_from(*v)
            .map(ProjValue::Int)
            .unwrap_or(ProjValue::Float(*v as f64)),
        Value::F32(v) => ProjValue::Float(f64::from(*v)),
        Value::F64(v) => ProjValue::Float(*v),
        Value::String(s) => ProjValue::Str(s.clone()),
        Value::Bytes(b) => ProjValue::Str(String::from_utf8_lossy(b).into_owned()),
        Value::EnumNumber(number) => ProjValue::Enum {
            number: *number,
            name: enum_desc
                .and_then(|d| d.get_value(*number))
                .map(|v| v.name().to_string()),
        },
        Value::Message(_) => ProjValue::Message,
        Value::List(items) => ProjValue::List(items.iter().map(|v| project_value(v, enum_desc)).collect()),
        Value::Map(_) => ProjValue::Message,
    }
}
