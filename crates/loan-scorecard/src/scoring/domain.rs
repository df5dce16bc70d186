use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable key naming a scorecard variable (e.g. `credit_score`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub String);

impl VariableId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariableId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VariableId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Raw attribute value as submitted by the intake collaborator. Arrays and objects are
/// kept as `Other` so an applicant record with extra nested fields still deserializes;
/// they never read as a number, category, or flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl AttributeValue {
    /// Numeric reading of the value. Accepts numeric text, thousands separators, and
    /// percentages (`"25%"` reads as `0.25`).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            AttributeValue::Number(value) => value.is_finite().then_some(*value),
            AttributeValue::Text(raw) => parse_numeric_text(raw),
            AttributeValue::Other(_) => None,
        }
    }

    /// Trimmed, non-empty text. Numbers and booleans are not categories.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(raw) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Null | AttributeValue::Other(_) => None,
            AttributeValue::Bool(flag) => Some(*flag),
            AttributeValue::Number(value) => Some(*value != 0.0),
            AttributeValue::Text(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Text(raw) => raw.trim().is_empty(),
            AttributeValue::Other(serde_json::Value::Array(items)) => items.is_empty(),
            AttributeValue::Other(serde_json::Value::Object(fields)) => fields.is_empty(),
            _ => false,
        }
    }
}

fn parse_numeric_text(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (digits, scale) = match trimmed.strip_suffix('%') {
        Some(prefix) => (prefix.trim(), 0.01),
        None => (trimmed, 1.0),
    };

    let cleaned: String = digits.chars().filter(|c| *c != ',' && *c != '_').collect();
    let value = cleaned.parse::<f64>().ok()?;
    value.is_finite().then_some(value * scale)
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Bool(flag) => write!(f, "{flag}"),
            AttributeValue::Number(value) => write!(f, "{value}"),
            AttributeValue::Text(raw) => f.write_str(raw),
            AttributeValue::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(f64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

/// Applicant attribute map keyed by variable id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantAttributes(BTreeMap<String, AttributeValue>);

impl ApplicantAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by fixtures and the CLI demo.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttributeValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_text)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttributeValue::as_flag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ApplicantAttributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Whether a variable score came from its strategy or from the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Scored,
    Fallback,
}

/// Lending decision attached to a risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoApprove,
    Recommend,
    Refer,
    Decline,
    /// Hard rejection raised by a failed clearance rule.
    Reject,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::AutoApprove => "auto_approve",
            Decision::Recommend => "recommend",
            Decision::Refer => "refer",
            Decision::Decline => "decline",
            Decision::Reject => "reject",
        }
    }
}
