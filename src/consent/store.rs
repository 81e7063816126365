//! Cookie-backed consent storage.
//!
//! # Responsibilities
//! - Read the consent cookie and decide whether it is still valid
//! - Replace the record on every user choice
//! - Remove records that outlived their TTL
//!
//! # Design Decisions
//! - A record with the wrong version or past its TTL is treated as absent
//! - Unreadable cookies are treated as absent, never surfaced
//! - Write failures are logged and swallowed (best effort)

use std::collections::HashMap;

use axum::http::{header, HeaderMap};

use crate::clock::Clock;
use crate::config::ConsentConfig;
use crate::consent::record::{ConsentChoice, ConsentRecord, CookieError};

/// Attributes of a written cookie. `Path=/` and `SameSite=Lax` are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieAttributes {
    pub max_age_secs: i64,
    pub secure: bool,
}

/// Render a `Set-Cookie` / `document.cookie` assignment.
pub fn set_cookie_string(name: &str, value: &str, attrs: &CookieAttributes) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age={}",
        name, value, attrs.max_age_secs
    );
    if attrs.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Split a `Cookie` header (or `document.cookie`) into name/value pairs.
pub fn parse_cookie_header(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name, value.trim()))
    })
}

/// Where cookies are read from and written to.
pub trait CookieJar {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&mut self, name: &str, value: &str, attrs: &CookieAttributes)
        -> Result<(), CookieError>;

    fn remove(&mut self, name: &str) -> Result<(), CookieError> {
        self.set(
            name,
            "",
            &CookieAttributes {
                max_age_secs: 0,
                secure: false,
            },
        )
    }
}

/// In-memory jar. Serves as the request/response jar on the server and as a
/// stand-in for `document.cookie` elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    values: HashMap<String, String>,
    set_cookies: Vec<String>,
    writes_blocked: bool,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a raw `Cookie` header value.
    pub fn from_cookie_header(raw: &str) -> Self {
        let values = parse_cookie_header(raw)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            values,
            ..Self::default()
        }
    }

    /// Seed from every `Cookie` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::default();
        for value in headers.get_all(header::COOKIE) {
            if let Ok(raw) = value.to_str() {
                for (name, value) in parse_cookie_header(raw) {
                    jar.values.insert(name.to_string(), value.to_string());
                }
            }
        }
        jar
    }

    /// Make every write fail, as a browser with cookies disabled would.
    pub fn block_writes(&mut self) {
        self.writes_blocked = true;
    }

    /// `Set-Cookie` strings produced so far, oldest first.
    pub fn set_cookie_headers(&self) -> &[String] {
        &self.set_cookies
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(
        &mut self,
        name: &str,
        value: &str,
        attrs: &CookieAttributes,
    ) -> Result<(), CookieError> {
        if self.writes_blocked {
            return Err(CookieError::WriteRejected(name.to_string()));
        }
        if attrs.max_age_secs <= 0 {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_string(), value.to_string());
        }
        self.set_cookies.push(set_cookie_string(name, value, attrs));
        Ok(())
    }
}

/// Reads and writes the consent record through a [`CookieJar`].
#[derive(Debug)]
pub struct ConsentStore<J, C> {
    jar: J,
    clock: C,
    config: ConsentConfig,
    secure: bool,
}

impl<J: CookieJar, C: Clock> ConsentStore<J, C> {
    /// `secure` marks cookies `Secure`; pass true when serving over HTTPS.
    pub fn new(config: ConsentConfig, jar: J, clock: C, secure: bool) -> Self {
        Self {
            jar,
            clock,
            config,
            secure,
        }
    }

    /// The stored record, if present, readable, current-version and unexpired.
    ///
    /// Expired records are removed from the jar.
    pub fn load(&mut self) -> Option<ConsentRecord> {
        let raw = self.jar.get(&self.config.cookie_name)?;
        if raw.is_empty() {
            return None;
        }

        let record = match ConsentRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable consent cookie");
                return None;
            }
        };

        if record.version != self.config.version {
            tracing::debug!(
                stored = %record.version,
                current = %self.config.version,
                "Ignoring consent record from another version"
            );
            return None;
        }

        if record.is_expired(self.clock.now_millis(), self.config.ttl_days) {
            tracing::debug!(timestamp = record.timestamp, "Consent record expired");
            self.clear();
            return None;
        }

        Some(record)
    }

    /// Replace the stored record with `choice`, stamped now.
    pub fn save(&mut self, choice: ConsentChoice) -> ConsentRecord {
        let record = ConsentRecord::new(choice, self.clock.now_millis(), &self.config.version);
        let attrs = CookieAttributes {
            max_age_secs: i64::from(self.config.ttl_days) * 24 * 60 * 60,
            secure: self.secure,
        };

        let written = record
            .encode()
            .and_then(|value| self.jar.set(&self.config.cookie_name, &value, &attrs));
        if let Err(e) = written {
            tracing::debug!(error = %e, "Consent cookie not persisted");
        }
        record
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.jar.remove(&self.config.cookie_name) {
            tracing::debug!(error = %e, "Consent cookie not removed");
        }
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    pub fn jar(&self) -> &J {
        &self.jar
    }

    pub fn into_jar(self) -> J {
        self.jar
    }
}
