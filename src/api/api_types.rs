//! Serde-deserializable types matching painminer API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::types::{Job, JobStatus};

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiJobInfo {
  pub job_id: String,
  pub status: JobStatus,
  #[serde(default)]
  pub progress: i64,
  #[serde(default)]
  pub message: String,
  #[serde(deserialize_with = "deserialize_timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub result: Option<serde_json::Value>,
  #[serde(default)]
  pub error: Option<String>,
}

impl From<ApiJobInfo> for Job {
  fn from(api: ApiJobInfo) -> Self {
    Job {
      id: api.job_id,
      status: api.status,
      progress: api.progress.clamp(0, 100) as u8,
      message: api.message,
      error: api.error,
      created_at: api.created_at,
      completed_at: api.completed_at,
      result: api.result,
    }
  }
}

// ============================================================================
// Mutation acknowledgements and errors
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiDeleteResponse {
  pub job_id: String,
}

/// Error body produced by the backend framework: `{"detail": "..."}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub detail: serde_json::Value,
}

impl ApiErrorBody {
  /// Flatten `detail`, which is a string for handled errors and a list of
  /// field errors for request validation failures.
  pub fn message(&self) -> String {
    match &self.detail {
      serde_json::Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }
}

// ============================================================================
// Timestamps
// ============================================================================

/// The backend emits naive UTC timestamps (`2024-05-01T12:00:00.123456`);
/// RFC 3339 with an offset is accepted as well.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|dt| dt.and_utc())
    .ok()
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let s = String::deserialize(deserializer)?;
  parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s)))
}

fn deserialize_optional_timestamp<'de, D>(
  deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  let s: Option<String> = Option::deserialize(deserializer)?;
  match s {
    Some(s) => parse_timestamp(&s)
      .map(Some)
      .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
    None => Ok(None),
  }
}
