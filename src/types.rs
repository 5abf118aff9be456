//! Record types shared by every fragment

use std::fmt;

use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, SimpleObject, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Record identifier
///
/// Identifiers cross a serialization boundary: the remote service and the
/// snapshot dump emit them as JSON numbers while page routes carry them as
/// path strings. Both forms are normalized to the decimal string on the way
/// in, so equality is always string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => RecordId(s),
            Raw::Unsigned(n) => RecordId(n.to_string()),
            Raw::Signed(n) => RecordId(n.to_string()),
        })
    }
}

#[Scalar(name = "RecordId")]
impl ScalarType for RecordId {
    fn parse(value: Value) -> InputValueResult<Self> {
        match value {
            Value::String(s) => Ok(RecordId(s)),
            Value::Number(n) => Ok(RecordId(n.to_string())),
            other => Err(InputValueError::expected_type(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

/// Review timestamp
///
/// The review service is loose about the format. RFC 3339 is read first,
/// then naive `YYYY-MM-DD[ T]HH:MM:SS[.fff]` and bare dates as UTC, and JSON
/// integers as epoch milliseconds. Output is always RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub DateTime<Utc>);

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl Timestamp {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(Timestamp(parsed.with_timezone(&Utc)));
        }

        NAIVE_TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|naive| Timestamp(naive.and_utc()))
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Timestamp)
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse_lenient(s),
            serde_json::Value::Number(n) => n.as_i64().and_then(Self::from_millis),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Timestamp::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp {}", value)))
    }
}

/// Timestamp field that reads as `None` when absent or unrecognized
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Timestamp::from_json))
}

#[Scalar(name = "DateTime")]
impl ScalarType for Timestamp {
    fn parse(value: Value) -> InputValueResult<Self> {
        let json = value.into_json().map_err(|e| format!("Invalid DateTime: {}", e))?;
        Timestamp::from_json(&json).ok_or_else(|| format!("Invalid DateTime: {}", json).into())
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.to_rfc3339())
    }
}

/// A book, the primary entity of a detail page
#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: RecordId,
    pub title: String,
    #[serde(rename = "subTitle", default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(rename = "coverImgUrl", default)]
    pub cover_image_url: String,
}

/// A review attached to a book through `book_id`
#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: RecordId,
    #[serde(rename = "bookId")]
    pub book_id: RecordId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// Result of resolving one fragment
///
/// Collections never report `NotFound`: an absent source and a source that
/// returned nothing both normalize to `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome<T> {
    Found(T),
    NotFound,
    Empty,
}

impl<T> ResolutionOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionOutcome::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            ResolutionOutcome::Found(value) => Some(value),
            ResolutionOutcome::NotFound | ResolutionOutcome::Empty => None,
        }
    }
}

impl<T> ResolutionOutcome<Vec<T>> {
    /// Wrap a collection, collapsing an empty one to `Empty`
    pub fn from_collection(items: Vec<T>) -> Self {
        if items.is_empty() {
            ResolutionOutcome::Empty
        } else {
            ResolutionOutcome::Found(items)
        }
    }

    /// Unwrap a collection outcome, treating every non-`Found` state as empty
    pub fn into_items(self) -> Vec<T> {
        self.into_option().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for ResolutionOutcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => ResolutionOutcome::Found(value),
            None => ResolutionOutcome::NotFound,
        }
    }
}
