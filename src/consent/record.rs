//! Consent records and their cookie encoding.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Cookie read/write failure.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("cookie value is not valid UTF-8 after decoding: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("cookie value is not a consent record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cookie write rejected: {0}")]
    WriteRejected(String),
}

/// The user's answer, without bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsentChoice {
    pub analytics: bool,
    pub ads: bool,
    pub personalized: bool,
}

impl ConsentChoice {
    pub fn accept_all() -> Self {
        Self {
            analytics: true,
            ads: true,
            personalized: true,
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Record written when consent is granted by configuration: analytics only.
    pub fn default_grant() -> Self {
        Self {
            analytics: true,
            ..Self::default()
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match (self.analytics, self.ads, self.personalized) {
            (true, true, true) => "accept_all",
            (false, false, false) => "deny_all",
            _ => "custom",
        }
    }
}

/// Persisted consent. Always written whole, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub analytics: bool,
    pub ads: bool,
    pub personalized: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "v")]
    pub version: String,
}

impl ConsentRecord {
    pub fn new(choice: ConsentChoice, timestamp: i64, version: impl Into<String>) -> Self {
        Self {
            analytics: choice.analytics,
            ads: choice.ads,
            personalized: choice.personalized,
            timestamp,
            version: version.into(),
        }
    }

    pub fn choice(&self) -> ConsentChoice {
        ConsentChoice {
            analytics: self.analytics,
            ads: self.ads,
            personalized: self.personalized,
        }
    }

    /// Older than `ttl_days` at `now`.
    pub fn is_expired(&self, now_millis: i64, ttl_days: u32) -> bool {
        now_millis.saturating_sub(self.timestamp) > i64::from(ttl_days) * MILLIS_PER_DAY
    }

    /// URL-encoded JSON, as stored in the cookie.
    pub fn encode(&self) -> Result<String, CookieError> {
        let json = serde_json::to_string(self)?;
        Ok(utf8_percent_encode(&json, URI_COMPONENT).to_string())
    }

    pub fn decode(value: &str) -> Result<Self, CookieError> {
        let json = percent_decode_str(value).decode_utf8()?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_matches_browser_encoding() {
        let record = ConsentRecord::new(ConsentChoice::accept_all(), 1_700_000_000_000, "2");
        assert_eq!(
            record.encode().unwrap(),
            "%7B%22analytics%22%3Atrue%2C%22ads%22%3Atrue%2C%22personalized%22%3Atrue%2C\
             %22ts%22%3A1700000000000%2C%22v%22%3A%222%22%7D"
        );
    }

    #[test]
    fn test_decode_accepts_plain_json() {
        let record = ConsentRecord::decode(
            r#"{"analytics":false,"ads":true,"personalized":false,"ts":5,"v":"1"}"#,
        )
        .unwrap();
        assert!(record.ads);
        assert_eq!(record.timestamp, 5);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ConsentRecord::decode("%7Bnot-json"),
            Err(CookieError::Json(_))
        ));
        assert!(matches!(
            ConsentRecord::decode("%FF%FE"),
            Err(CookieError::Encoding(_))
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let record = ConsentRecord::new(ConsentChoice::deny_all(), 0, "1");
        assert!(!record.is_expired(MILLIS_PER_DAY, 1));
        assert!(record.is_expired(MILLIS_PER_DAY + 1, 1));
    }

    #[test]
    fn test_choice_labels() {
        assert_eq!(ConsentChoice::accept_all().label(), "accept_all");
        assert_eq!(ConsentChoice::deny_all().label(), "deny_all");
        let custom = ConsentChoice {
            analytics: true,
            ..Default::default()
        };
        assert_eq!(custom.label(), "custom");
    }
}
