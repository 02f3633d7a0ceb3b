use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::StoreError;

/// Key reserved for the ingestion timestamp. Any client-supplied value under
/// this key is discarded.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Open set of sensor fields, kept in submission order.
pub type Fields = Map<String, Value>;

/// One accepted sensor sample.
///
/// Serialises as a flat JSON object: the sensor fields in submission order
/// followed by `timestamp` (RFC3339, UTC), e.g.
/// `{"co": 1.0, "pm25": 42, "timestamp": "2026-10-16T12:00:00Z"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(flatten)]
    fields: Fields,
    timestamp: DateTime<Utc>,
}

impl Reading {
    /// Attach `timestamp` to `fields`, dropping any `timestamp` key the
    /// producer put there itself.
    pub fn stamped(fields: Fields, timestamp: DateTime<Utc>) -> Self {
        let fields = if fields.contains_key(TIMESTAMP_KEY) {
            fields
                .into_iter()
                .filter(|(key, _)| key != TIMESTAMP_KEY)
                .collect()
        } else {
            fields
        };
        Self { fields, timestamp }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn into_parts(self) -> (Fields, DateTime<Utc>) {
        (self.fields, self.timestamp)
    }
}

/// Parse a raw request body into a field map.
///
/// The body must be a JSON object whose values are scalars (number, string,
/// bool or null). Anything else is rejected with [`StoreError::InvalidInput`].
pub fn parse_fields(body: &[u8]) -> Result<Fields, StoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(StoreError::InvalidInput("request body is empty".into()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| StoreError::InvalidInput(format!("body is not valid JSON: {e}")))?;

    fields_from_value(value)
}

/// Validate an already-decoded JSON value as a field map.
pub fn fields_from_value(value: Value) -> Result<Fields, StoreError> {
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(StoreError::InvalidInput(format!(
                "expected a JSON object of sensor fields, got {}",
                kind(&other)
            )))
        }
    };

    if let Some((key, value)) = fields
        .iter()
        .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        return Err(StoreError::InvalidInput(format!(
            "field {key:?} must be a number, string, bool or null, got {}",
            kind(value)
        )));
    }

    Ok(fields)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
