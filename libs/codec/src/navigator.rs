//! # Message Navigator
//!
//! ## Purpose
//!
//! Wraps a decoded message (or one of its field values) together with a link
//! to the enclosing navigator and its field name, so that rules can ask for
//! the dotted path of whatever they are looking at and walk to siblings.
//!
//! ## Ownership
//!
//! ```text
//! &'a DynamicMessage ──borrow──► Navigator<'a> (root)
//!                                   ▲ Rc
//!                                   │ parent
//!                                Navigator<'a> (field "moving_object")
//!                                   ▲
//!                                Navigator<'a> (element, same name/parent)
//! ```
//!
//! Populated values are borrowed from the decoded trace message for `'a`.
//! Unset singular fields project to their default value, which is owned.
//! Parent links are reference counted so navigators are cheap to clone and
//! can be stored by the ID manager until the end of a top-level message.

use crate::descriptors;
use crate::error::NavigatorError;
use once_cell::unsync::OnceCell;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, ReflectMessage, Value};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
enum Node<'a> {
    Message(Cow<'a, DynamicMessage>),
    Value(Cow<'a, Value>),
    /// Field name the message type does not declare
    Missing,
}

struct Inner<'a> {
    name: String,
    parent: Option<Navigator<'a>>,
    field: Option<FieldDescriptor>,
    node: Node<'a>,
    path: OnceCell<String>,
}

/// Field-aware view into a decoded message tree
#[derive(Clone)]
pub struct Navigator<'a> {
    inner: Rc<Inner<'a>>,
}

impl<'a> Navigator<'a> {
    /// Root navigator named after the message type
    pub fn root(message: &'a DynamicMessage) -> Self {
        let name = message.descriptor().name().to_string();
        Self::build(name, None, None, Node::Message(Cow::Borrowed(message)))
    }

    /// Root navigator over an owned message
    pub fn root_owned(message: DynamicMessage) -> Self {
        let name = message.descriptor().name().to_string();
        Self::build(name, None, None, Node::Message(Cow::Owned(message)))
    }

    fn build(
        name: String,
        parent: Option<Navigator<'a>>,
        field: Option<FieldDescriptor>,
        node: Node<'a>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                name,
                parent,
                field,
                node,
                path: OnceCell::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Navigator<'a>> {
        self.inner.parent.as_ref()
    }

    /// Dotted path from the root, e.g. `GroundTruth.moving_object.base`
    pub fn path(&self) -> &str {
        self.inner.path.get_or_init(|| match &self.inner.parent {
            Some(parent) => format!("{}.{}", parent.path(), self.inner.name),
            None => self.inner.name.clone(),
        })
    }

    /// Descriptor of the field this navigator was reached through
    pub fn field_descriptor(&self) -> Option<&FieldDescriptor> {
        self.inner.field.as_ref()
    }

    pub fn is_message(&self) -> bool {
        matches!(self.inner.node, Node::Message(_))
    }

    /// True for a repeated container (not for its elements)
    pub fn is_repeated(&self) -> bool {
        matches!(&self.inner.node, Node::Value(v) if matches!(v.as_ref(), Value::List(_)))
    }

    pub fn message(&self) -> Option<&DynamicMessage> {
        match &self.inner.node {
            Node::Message(m) => Some(m.as_ref()),
            Node::Value(_) | Node::Missing => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.inner.node {
            Node::Value(v) => Some(v.as_ref()),
            Node::Message(_) | Node::Missing => None,
        }
    }

    /// Message descriptor of this node, or of the elements of a repeated
    /// message container
    pub fn descriptor(&self) -> Option<MessageDescriptor> {
        match &self.inner.node {
            Node::Message(m) => Some(m.descriptor()),
            Node::Missing => None,
            Node::Value(_) => match self.inner.field.as_ref().map(|f| f.kind()) {
                Some(Kind::Message(desc)) => Some(desc),
                _ => None,
            },
        }
    }

    /// Short protobuf type name (`MovingObject`), or the field name for scalars
    pub fn type_name(&self) -> String {
        self.descriptor()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| self.inner.name.clone())
    }

    /// Rule lookup path of the message type
    pub fn type_path(&self) -> Option<Vec<String>> {
        self.descriptor().map(|d| descriptors::type_path(&d))
    }

    /// Populated fields in declaration order
    pub fn fields(&self) -> Vec<Navigator<'a>> {
        let Some(message) = self.message() else {
            return Vec::new();
        };
        message
            .descriptor()
            .fields()
            .filter(|fd| is_populated(message, fd))
            .map(|fd| self.child(fd))
            .collect()
    }

    /// Navigator for a named field, populated or not.
    pub fn get_field(&self, name: &str) -> Result<Navigator<'a>, NavigatorError> {
        let Some(message) = self.message() else {
            return Err(NavigatorError::NotAMessage {
                at: self.path().to_string(),
            });
        };
        let descriptor = message.descriptor();
        let fd = descriptor
            .get_field_by_name(name)
            .ok_or_else(|| NavigatorError::UnknownField {
                field: name.to_string(),
                message: descriptor.full_name().to_string(),
            })?;
        Ok(self.child(fd))
    }

    /// Placeholder for a field name the message type does not declare.
    ///
    /// It has this navigator as parent, is never present and carries no
    /// value, so presence rules can still report on it.
    pub fn missing_field(&self, name: &str) -> Navigator<'a> {
        Self::build(name.to_string(), Some(self.clone()), None, Node::Missing)
    }

    /// Presence of a named field; unknown names and scalars are `false`
    pub fn has_field(&self, name: &str) -> bool {
        let Some(message) = self.message() else {
            return false;
        };
        message
            .descriptor()
            .get_field_by_name(name)
            .map(|fd| is_populated(message, &fd))
            .unwrap_or(false)
    }

    /// Whether this navigator's own field is populated in its parent
    pub fn is_present(&self) -> bool {
        if matches!(self.inner.node, Node::Missing) {
            return false;
        }
        match (&self.inner.parent, &self.inner.field) {
            (Some(parent), Some(fd)) => parent.message().map(|m| is_populated(m, fd)).unwrap_or(false),
            _ => true,
        }
    }

    /// One navigator per element of a repeated container, sharing the
    /// container's name and parent. Non-repeated navigators yield themselves.
    pub fn elements(&self) -> Vec<Navigator<'a>> {
        let items: Vec<Node<'a>> = match &self.inner.node {
            Node::Value(Cow::Borrowed(value)) => {
                let value: &'a Value = *value;
                match value {
                    Value::List(items) => items.iter().map(|v| lift(Cow::Borrowed(v))).collect(),
                    _ => return vec![self.clone()],
                }
            }
            Node::Value(Cow::Owned(Value::List(items))) => {
                items.iter().map(|v| lift(Cow::Owned(v.clone()))).collect()
            }
            _ => return vec![self.clone()],
        };

        items
            .into_iter()
            .map(|node| {
                Self::build(
                    self.inner.name.clone(),
                    self.inner.parent.clone(),
                    self.inner.field.clone(),
                    node,
                )
            })
            .collect()
    }

    /// Resolve a `/`-separated relative path.
    ///
    /// `.` and `this` stay in place, `..` climbs to the parent, and a leading
    /// `this.` is ignored. With `parent` set, the navigator enclosing the
    /// resolved node is returned instead.
    pub fn query(&self, path: &str, parent: bool) -> Result<Navigator<'a>, NavigatorError> {
        let trimmed = path.strip_prefix("this.").unwrap_or(path);
        let mut current = self.clone();

        for component in trimmed.split('/').filter(|c| !c.is_empty()) {
            current = match component {
                "." | "this" => current,
                ".." => current.parent().cloned().ok_or_else(|| NavigatorError::PathEscapesRoot {
                    path: path.to_string(),
                    at: current.path().to_string(),
                })?,
                name => current.get_field(name)?,
            };
        }

        if parent {
            current.parent().cloned().ok_or_else(|| NavigatorError::PathEscapesRoot {
                path: path.to_string(),
                at: current.path().to_string(),
            })
        } else {
            Ok(current)
        }
    }

    /// Numeric value of a scalar (integers, floats and enum numbers)
    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(value_as_f64)
    }

    /// Identifier-style unsigned value; negative numbers are rejected
    pub fn as_u64(&self) -> Option<u64> {
        match self.value()? {
            Value::U64(v) => Some(*v),
            Value::U32(v) => Some(u64::from(*v)),
            Value::I64(v) => u64::try_from(*v).ok(),
            Value::I32(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(|v| v.as_str())
    }

    /// Symbolic name of an enum value
    pub fn enum_name(&self) -> Option<String> {
        let number = self.value()?.as_enum_number()?;
        match self.inner.field.as_ref()?.kind() {
            Kind::Enum(desc) => desc.get_value(number).map(|v| v.name().to_string()),
            _ => None,
        }
    }

    fn child(&self, fd: FieldDescriptor) -> Navigator<'a> {
        let value: Cow<'a, Value> = match &self.inner.node {
            Node::Message(Cow::Borrowed(message)) => {
                let message: &'a DynamicMessage = *message;
                message.get_field(&fd)
            }
            Node::Message(Cow::Owned(message)) => Cow::Owned(message.get_field(&fd).into_owned()),
            Node::Value(_) | Node::Missing => Cow::Owned(Value::default_value_for_field(&fd)),
        };
        Self::build(fd.name().to_string(), Some(self.clone()), Some(fd), lift(value))
    }
}

impl fmt::Debug for Navigator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("path", &self.path())
            .field("node", &self.inner.node)
            .finish()
    }
}

fn lift(value: Cow<'_, Value>) -> Node<'_> {
    match value {
        Cow::Borrowed(Value::Message(message)) => Node::Message(Cow::Borrowed(message)),
        Cow::Owned(Value::Message(message)) => Node::Message(Cow::Owned(message)),
        other => Node::Value(other),
    }
}

/// Presence: set singular fields and non-empty repeated/map fields
fn is_populated(message: &DynamicMessage, fd: &FieldDescriptor) -> bool {
    if fd.is_list() || fd.is_map() {
        match message.get_field(fd).as_ref() {
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            _ => false,
        }
    } else {
        message.has_field(fd)
    }
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::F64(v) => Some(*v),
        Value::F32(v) => Some(f64::from(*v)),
        Value::I32(v) => Some(f64::from(*v)),
        Value::I64(v) => Some(*v as f64),
        Value::U32(v) => Some(f64::from(*v)),
        Value::U64(v) => Some(*v as f64),
        Value::EnumNumber(v) => Some(f64::from(*v)),
        _ => None,
    }
}
