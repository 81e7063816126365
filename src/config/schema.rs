//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the site.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the site server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Site identity and static content.
    pub site: SiteSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Security headers and CSP feature flags.
    pub security: SecurityConfig,

    /// Consent cookie settings.
    pub consent: ConsentConfig,

    /// Analytics transport settings.
    pub analytics: AnalyticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Site identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Public base URL, used to resolve relative report endpoints.
    pub base_url: String,

    /// Name shown in page titles.
    pub name: String,

    /// Directory of prebuilt static assets.
    pub public_dir: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            name: "Apostille Services".to_string(),
            public_dir: "public".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Third-party features whose hosts are merged into the CSP.
///
/// Read once at startup; absent keys mean "disabled".
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    /// Google Tag Manager / GA4.
    pub analytics: bool,

    /// Google Ads conversion tracking.
    pub ads: bool,

    /// Google Fonts.
    pub fonts: bool,

    /// Cloudflare Turnstile site key. Present and non-blank enables the widget.
    pub turnstile_site_key: Option<String>,

    /// YouTube embeds.
    pub youtube: bool,

    /// Vimeo embeds.
    pub vimeo: bool,
}

impl FeatureFlags {
    /// Whether the bot-challenge widget is configured.
    pub fn turnstile(&self) -> bool {
        self.turnstile_site_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enforce the CSP. When false the policy is sent as report-only.
    pub production: bool,

    /// Feature flags driving host allow-lists.
    pub features: FeatureFlags,

    /// CSP violation report endpoint (absolute URL or path under `site.base_url`).
    pub report_endpoint: Option<String>,

    /// Cache-Control value for responses that do not set their own.
    pub cache_control: String,

    /// Emit Strict-Transport-Security.
    pub hsts: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            production: true,
            features: FeatureFlags::default(),
            report_endpoint: None,
            cache_control: "public, max-age=31536000, immutable".to_string(),
            hsts: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// Consent cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Cookie name.
    pub cookie_name: String,

    /// Record lifetime in days.
    pub ttl_days: u32,

    /// Consent form version. Records carrying any other version are ignored.
    pub version: String,

    /// Grant consent before the user has chosen.
    pub default_grant: bool,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            cookie_name: "cookie_consent".to_string(),
            ttl_days: 180,
            version: "1".to_string(),
            default_grant: false,
        }
    }
}

/// Which outbound analytics transport the page uses.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Direct `gtag('event', name, params)` call.
    Gtag,
    /// Push of `{event, ...params}` onto the tag-manager data layer.
    #[default]
    Datalayer,
}

/// Analytics buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Transport selected once per page load.
    pub transport: TransportKind,

    /// Identical events within this window are suppressed.
    pub dedup_window_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Datalayer,
            dedup_window_ms: 400,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
