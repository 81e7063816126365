//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTL > 0)
//! - Check the consent cookie name is a legal cookie token
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SiteConfig → Result<(), Vec<ValidationError>>
//! - The CSP report endpoint is NOT validated here: a bad endpoint only
//!   disables reporting, it never blocks startup

use std::net::SocketAddr;

use crate::config::schema::SiteConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("consent.ttl_days must be greater than zero")]
    ZeroConsentTtl,

    #[error("consent.version must not be empty")]
    EmptyConsentVersion,

    #[error("consent.cookie_name {0:?} is not a valid cookie name")]
    CookieName(String),

    #[error("analytics.dedup_window_ms {0} exceeds 60000")]
    DedupWindow(u64),

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SiteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.consent.ttl_days == 0 {
        errors.push(ValidationError::ZeroConsentTtl);
    }

    if config.consent.version.trim().is_empty() {
        errors.push(ValidationError::EmptyConsentVersion);
    }

    if !is_cookie_token(&config.consent.cookie_name) {
        errors.push(ValidationError::CookieName(config.consent.cookie_name.clone()));
    }

    if config.analytics.dedup_window_ms > 60_000 {
        errors.push(ValidationError::DedupWindow(config.analytics.dedup_window_ms));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// RFC 6265 token: visible ASCII minus separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"'
                        | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}'
                )
        })
}
