//! The JSON-backed payload DOM.
//!
//! A [`Payload`] is a small, self-contained JSON object. Fields are accessed
//! through typed getters and setters that fail rather than coerce: asking
//! for an integer field that actually holds a string is an error, not an
//! implicit parse.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// A tagged union over the value kinds the DOM supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    /// Boolean.
    Bool(bool),
    /// Signed integer. Arcus messages do not use floats.
    Int(i32),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Array(Vec<Val>),
    /// Nested object.
    Object(Payload),
}

impl Val {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Val::to_json).collect()),
            Self::Object(obj) => Value::Object(obj.to_json_map()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().and_then(|i| i32::try_from(i).ok()).map(Self::Int),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => {
                items.iter().map(Val::from_json).collect::<Option<Vec<_>>>().map(Self::Array)
            },
            Value::Object(map) => Some(Self::Object(Payload::from_json_map(map.clone()))),
            Value::Null => None,
        }
    }
}

/// A structured, deep-copy-on-assignment JSON object.
///
/// Deep-copy semantics matter here: assigning a [`Payload`] into another
/// field copies its contents rather than aliasing them, so mutating the
/// original afterward never changes the copy sitting inside a [`Val::Object`]
/// elsewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    /// An empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_json_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    fn to_json_map(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    /// Whether the payload has no fields set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn get(&self, field: &str) -> Option<Val> {
        self.fields.get(field).and_then(Val::from_json)
    }

    const fn value_kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Inserts `value` under `field`, failing if `field` is already present
    /// with a different kind.
    ///
    /// Setting an absent key always succeeds. Setting an existing key back to
    /// the same kind overwrites it. No coercion ever happens here - this is
    /// the shared enforcement point behind every `set_*` method.
    fn set_checked(&mut self, field: impl Into<String>, value: Value, kind: &'static str) -> Result<&mut Self> {
        let field = field.into();
        if let Some(existing) = self.fields.get(&field) {
            let actual = Self::value_kind(existing);
            if actual != kind {
                return Err(ProtocolError::TypeMismatch { field, expected: kind, actual });
            }
        }
        self.fields.insert(field, value);
        Ok(self)
    }

    fn typed<T>(
        &self,
        field: &str,
        expected: &'static str,
        project: impl Fn(Val) -> Option<T>,
    ) -> Result<T> {
        let val = self
            .get(field)
            .ok_or_else(|| ProtocolError::MissingField(field.to_string()))?;
        let actual = val.kind();
        project(val).ok_or_else(|| ProtocolError::TypeMismatch {
            field: field.to_string(),
            expected,
            actual,
        })
    }

    /// Reads a boolean field.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingField`] if absent, [`ProtocolError::TypeMismatch`]
    /// if present but not a bool.
    pub fn bool_val(&self, field: &str) -> Result<bool> {
        self.typed(field, "bool", |v| if let Val::Bool(b) = v { Some(b) } else { None })
    }

    /// Reads an integer field.
    pub fn int_val(&self, field: &str) -> Result<i32> {
        self.typed(field, "int", |v| if let Val::Int(i) = v { Some(i) } else { None })
    }

    /// Reads a string field.
    pub fn string_val(&self, field: &str) -> Result<String> {
        self.typed(field, "string", |v| if let Val::String(s) = v { Some(s) } else { None })
    }

    /// Reads an array field.
    pub fn array_val(&self, field: &str) -> Result<Vec<Val>> {
        self.typed(field, "array", |v| if let Val::Array(a) = v { Some(a) } else { None })
    }

    /// Reads a nested object field.
    pub fn object_val(&self, field: &str) -> Result<Self> {
        self.typed(field, "object", |v| if let Val::Object(o) = v { Some(o) } else { None })
    }

    /// Whether `field` is present and holds a bool.
    #[must_use]
    pub fn is_bool(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Val::Bool(_)))
    }

    /// Whether `field` is present and holds an int.
    #[must_use]
    pub fn is_int(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Val::Int(_)))
    }

    /// Whether `field` is present and holds a string.
    #[must_use]
    pub fn is_string(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Val::String(_)))
    }

    /// Whether `field` is present and holds an array.
    #[must_use]
    pub fn is_array(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Val::Array(_)))
    }

    /// Whether `field` is present and holds an object.
    #[must_use]
    pub fn is_object(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Val::Object(_)))
    }

    /// Sets a boolean field.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TypeMismatch`] if `field` already holds a value of a
    /// different kind.
    pub fn set_bool(&mut self, field: impl Into<String>, value: bool) -> Result<&mut Self> {
        self.set_checked(field, Value::Bool(value), "bool")
    }

    /// Sets an integer field.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TypeMismatch`] if `field` already holds a value of a
    /// different kind.
    pub fn set_int(&mut self, field: impl Into<String>, value: i32) -> Result<&mut Self> {
        self.set_checked(field, Value::Number(value.into()), "int")
    }

    /// Sets a string field.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TypeMismatch`] if `field` already holds a value of a
    /// different kind.
    pub fn set_string(&mut self, field: impl Into<String>, value: impl Into<String>) -> Result<&mut Self> {
        self.set_checked(field, Value::String(value.into()), "string")
    }

    /// Sets an array field. Deep-copies each element.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TypeMismatch`] if `field` already holds a value of a
    /// different kind.
    pub fn set_array(&mut self, field: impl Into<String>, value: Vec<Val>) -> Result<&mut Self> {
        let json = Value::Array(value.iter().map(Val::to_json).collect());
        self.set_checked(field, json, "array")
    }

    /// Sets a nested-object field. Deep-copies `value`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TypeMismatch`] if `field` already holds a value of a
    /// different kind.
    pub fn set_object(&mut self, field: impl Into<String>, value: &Self) -> Result<&mut Self> {
        let json = Value::Object(value.to_json_map());
        self.set_checked(field, json, "object")
    }

    /// Serializes this payload to compact JSON bytes.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Json`] if serialization somehow fails (it cannot, in
    /// practice, for a DOM built entirely from this module's setters, but the
    /// signature stays fallible to track `serde_json`'s own).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.fields).map_err(|e| ProtocolError::Json(e.to_string()))
    }

    /// Parses a payload from JSON bytes.
    ///
    /// An empty byte slice is accepted and produces an empty payload - this
    /// is how opcodes with no payload (`Health`) round-trip through the
    /// codec.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Json`] if `bytes` is non-empty and not a JSON object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Json(e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ProtocolError::Json(format!(
                "payload root must be a JSON object, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.fields.clone()))
    }
}
