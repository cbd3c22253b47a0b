//! Wire types for the Relic API.
//!
//! The server emits timestamps in several encodings depending on the
//! code path: RFC3339 with a zone, RFC3339 with fractional seconds, or
//! a zone-less ISO form with or without fractions. `ApiTime` accepts
//! all four and always re-serializes as RFC3339 UTC with a `Z` suffix.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp as the API speaks it. `None` covers absent, empty and
/// literal `"null"` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiTime(pub Option<DateTime<Utc>>);

impl ApiTime {
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

fn parse_api_time(s: &str) -> Result<Option<DateTime<Utc>>, String> {
    if s.is_empty() || s == "null" {
        return Ok(None);
    }

    // RFC3339 covers both plain and fractional-second forms.
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(t.with_timezone(&Utc)));
    }

    // Zone-less isoformat() output; taken as UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Some(DateTime::from_naive_utc_and_offset(naive, Utc)));
        }
    }

    Err(format!("unrecognized timestamp: {s}"))
}

impl<'de> Deserialize<'de> for ApiTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(ApiTime(None)),
            Some(s) => parse_api_time(&s)
                .map(ApiTime)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for ApiTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Some(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelicMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language_hint: String,
    pub size_bytes: u64,
    pub access_level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fork_of: String,
    pub created_at: ApiTime,
    #[serde(default, skip_serializing_if = "ApiTime::is_none")]
    pub expires_at: ApiTime,
    #[serde(default)]
    pub access_count: u64,
}

/// Body for `POST /api/v1/relics/{id}/fork`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelicCreateRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub access_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelicCreateResponse {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fork_of: String,
    pub created_at: ApiTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelicListResponse {
    pub relics: Vec<RelicMetadata>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub created_at: ApiTime,
    pub relic_count: u64,
}

/// Error envelope the server wraps failures in.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        let t: ApiTime = serde_json::from_str(&format!("\"{input}\"")).unwrap();
        serde_json::to_string(&t).unwrap().trim_matches('"').to_string()
    }

    #[test]
    fn timestamps_normalize_to_rfc3339_utc() {
        assert_eq!(roundtrip("2024-01-15T10:30:00Z"), "2024-01-15T10:30:00Z");
        assert_eq!(
            roundtrip("2024-01-15T10:30:00.123456"),
            "2024-01-15T10:30:00Z"
        );
        assert_eq!(roundtrip("2024-01-15T10:30:00"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn offset_timestamps_convert_to_utc() {
        assert_eq!(
            roundtrip("2024-01-15T12:30:00+02:00"),
            "2024-01-15T10:30:00Z"
        );
    }

    #[test]
    fn empty_and_null_strings_yield_none() {
        let t: ApiTime = serde_json::from_str("\"\"").unwrap();
        assert!(t.is_none());
        let t: ApiTime = serde_json::from_str("\"null\"").unwrap();
        assert!(t.is_none());
        let t: ApiTime = serde_json::from_str("null").unwrap();
        assert!(t.is_none());
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        assert!(serde_json::from_str::<ApiTime>("\"yesterday\"").is_err());
    }

    #[test]
    fn missing_expires_at_decodes_as_absent() {
        let body = r#"{
            "id": "abc123",
            "content_type": "text/plain",
            "size_bytes": 42,
            "access_level": "private",
            "created_at": "2024-01-15T10:30:00Z"
        }"#;
        let meta: RelicMetadata = serde_json::from_str(body).unwrap();
        assert!(meta.expires_at.is_none());
        assert!(!meta.created_at.is_none());
    }

    #[test]
    fn fork_request_omits_empty_optionals() {
        let req = RelicCreateRequest {
            name: String::new(),
            description: String::new(),
            access_level: "private".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"access_level":"private"}"#);
    }
}
