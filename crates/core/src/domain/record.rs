use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A single collected value. Extraction writes values verbatim, so a field may
/// hold any JSON scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl FieldValue {
    /// Converts a JSON scalar. Arrays, objects and null have no field
    /// representation and yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => Some(Self::Number(number.clone())),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Empty strings, `false` and zero count as "not provided".
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(flag) => *flag,
            Self::Number(number) => number.as_f64().map(|value| value != 0.0).unwrap_or(true),
            Self::Text(text) => !text.is_empty(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Number(number) => Cow::Owned(number.to_string()),
            Self::Bool(flag) => Cow::Borrowed(if *flag { "true" } else { "false" }),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(flag) => f.write_str(if *flag { "Yes" } else { "No" }),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(Number::from(value))
    }
}

/// Collected client data keyed by schema field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ClientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON object, dropping entries that are not
    /// scalars. Anything other than an object yields an empty record.
    pub fn from_json_lenient(value: &Value) -> Self {
        let mut record = Self::default();
        if let Value::Object(entries) = value {
            for (name, raw) in entries {
                if let Some(field_value) = FieldValue::from_json(raw) {
                    record.fields.insert(name.clone(), field_value);
                }
            }
        }
        record
    }

    pub fn to_json(&self) -> Value {
        let entries: Map<String, Value> =
            self.fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect();
        Value::Object(entries)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// True when the key exists, whatever its value.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// True when the key exists and its value is truthy.
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).map(FieldValue::is_truthy).unwrap_or(false)
    }

    /// Text form of a truthy value.
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).filter(|value| value.is_truthy()).map(FieldValue::as_text)
    }

    /// Lower-cased text form, empty when the field is absent.
    pub fn normalized(&self, name: &str) -> String {
        self.get(name).map(|value| value.as_text().to_lowercase()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}
