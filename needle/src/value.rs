//! Field values collected by dialog steps.

use crate::error::FinishError;
use crate::format::{format_date_long, format_number};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a photo held by the transport (e.g. a Telegram file id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

impl PhotoRef {
    /// Create a photo reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Decimal number.
    Number(f64),
    /// Whole number.
    Integer(i64),
    /// Calendar date.
    Date(NaiveDate),
    /// Photo reference.
    Photo(PhotoRef),
}

impl FieldValue {
    /// Short name of the value type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Integer(_) => "integer",
            Self::Date(_) => "date",
            Self::Photo(_) => "photo",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Integer(n) => f.write_str(&format_number(*n as f64)),
            Self::Date(d) => f.write_str(&format_date_long(*d)),
            Self::Photo(_) => f.write_str("📷"),
        }
    }
}

/// Ordered mapping from field name to collected value.
///
/// A field that was skipped is present with no value; a field whose step has
/// not been passed yet is not present at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    entries: Vec<(String, Option<FieldValue>)>,
}

impl Fields {
    /// Create an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value in place.
    pub fn set(&mut self, name: impl Into<String>, value: Option<FieldValue>) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`Fields::set`] with a present value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, Some(value));
        self
    }

    /// Whether the field has been recorded (with or without a value).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// The value of a field, if recorded and not skipped.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Number of recorded fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no field has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over recorded fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    /// Required text field.
    pub fn text(&self, name: &str) -> Result<&str, FinishError> {
        match self.require(name)? {
            FieldValue::Text(t) => Ok(t),
            _ => Err(wrong_type(name, "text")),
        }
    }

    /// Optional text field.
    pub fn opt_text(&self, name: &str) -> Result<Option<&str>, FinishError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::Text(t)) => Ok(Some(t)),
            Some(_) => Err(wrong_type(name, "text")),
        }
    }

    /// Required decimal field. Integers are widened.
    pub fn number(&self, name: &str) -> Result<f64, FinishError> {
        match self.require(name)? {
            FieldValue::Number(n) => Ok(*n),
            FieldValue::Integer(n) => Ok(*n as f64),
            _ => Err(wrong_type(name, "number")),
        }
    }

    /// Required integer field.
    pub fn integer(&self, name: &str) -> Result<i64, FinishError> {
        match self.require(name)? {
            FieldValue::Integer(n) => Ok(*n),
            _ => Err(wrong_type(name, "integer")),
        }
    }

    /// Required date field.
    pub fn date(&self, name: &str) -> Result<NaiveDate, FinishError> {
        match self.require(name)? {
            FieldValue::Date(d) => Ok(*d),
            _ => Err(wrong_type(name, "date")),
        }
    }

    /// Optional date field.
    pub fn opt_date(&self, name: &str) -> Result<Option<NaiveDate>, FinishError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::Date(d)) => Ok(Some(*d)),
            Some(_) => Err(wrong_type(name, "date")),
        }
    }

    /// Required photo field.
    pub fn photo(&self, name: &str) -> Result<&PhotoRef, FinishError> {
        match self.require(name)? {
            FieldValue::Photo(p) => Ok(p),
            _ => Err(wrong_type(name, "photo")),
        }
    }

    /// Optional photo field.
    pub fn opt_photo(&self, name: &str) -> Result<Option<&PhotoRef>, FinishError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::Photo(p)) => Ok(Some(p)),
            Some(_) => Err(wrong_type(name, "photo")),
        }
    }

    fn require(&self, name: &str) -> Result<&FieldValue, FinishError> {
        self.get(name)
            .ok_or_else(|| FinishError::MissingField(name.to_string()))
    }
}

fn wrong_type(field: &str, expected: &'static str) -> FinishError {
    FinishError::WrongType {
        field: field.to_string(),
        expected,
    }
}
