use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::readings::Reading;

/// A stored reading: the submitted sensor fields plus the ingestion
/// `timestamp`, flattened into one JSON object.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"co": 1.25, "pm25": 42, "timestamp": "2026-10-16T12:00:00Z"}))]
pub struct ReadingDto {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Request body for `POST /readings`: any JSON object of sensor fields.
/// Values must be numbers, strings, booleans or null. A `timestamp` key is
/// ignored.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"co": 1.25, "pm25": 42}))]
pub struct SubmitReadingRequest {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_owned(),
        }
    }
}

/// Response for `GET /readings/last-update`. `timestamp` is `null` until the
/// first reading is accepted.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LastUpdateResponse {
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        let (fields, timestamp) = r.into_parts();
        Self { fields, timestamp }
    }
}
