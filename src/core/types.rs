use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, SecondsFormat, Utc};
use crate::core::error::{Error, ErrorKind, Result};

/// Generation tag carried by every task and response of one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl QueryId {
    pub fn new(id: u64) -> Self {
        QueryId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> QueryId {
        QueryId(self.0 + 1)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Textual form the substring predicate matches against
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            FieldValue::Null => "null".to_string(),
        }
    }

    /// Scalar conversion from JSON; arrays and objects keep their compact JSON text
    pub fn from_json_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => FieldValue::Text(s),
            nested => FieldValue::Text(nested.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

/// Schemaless record: field name to scalar value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.add_field(name, value);
        self
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Record {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json_value(v)))
                    .collect(),
            }),
            other => Err(Error::new(
                ErrorKind::Configuration,
                format!("record must be a JSON object, got {}", json_kind(&other)),
            )),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Parse a dataset from a JSON array of objects
pub fn dataset_from_json(json: &str) -> Result<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(Record::from_json_value).collect(),
        other => Err(Error::new(
            ErrorKind::Configuration,
            format!("dataset must be a JSON array, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
