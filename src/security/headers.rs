//! Security response headers.
//!
//! # Responsibilities
//! - Assemble the CSP header value from the per-request directive set
//! - Emit the fixed companion headers (framing, sniffing, referrer, permissions)
//! - Add `Reporting-Endpoints` / `report-uri` when a report endpoint is configured
//! - Generate a fresh nonce for every response and expose it to handlers
//!
//! # Design Decisions
//! - The policy is resolved once from config; only the nonce varies per request
//! - Bad configuration omits the affected header, never fails the request
//! - Cache-Control set by a handler wins over the configured default

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        Request,
    },
    middleware::Next,
    response::Response,
};
use url::Url;

use crate::config::{FeatureFlags, SecurityConfig, SiteSettings};
use crate::security::csp::{security_directives, Directive, DirectiveSet};
use crate::security::hosts::enabled_features;
use crate::security::nonce::Nonce;

pub const REPORTING_ENDPOINTS: HeaderName = HeaderName::from_static("reporting-endpoints");
pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");
pub const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");

const PERMISSIONS: &str = "accelerometer=(), camera=(), geolocation=(), gyroscope=(), \
magnetometer=(), microphone=(), payment=(), usb=(), interest-cohort=()";
const HSTS: &str = "max-age=63072000; includeSubDomains; preload";
const REPORT_GROUP: &str = "csp-endpoint";

/// Nonce of the current response, available as a request extension.
#[derive(Debug, Clone)]
pub struct CspNonce(pub Nonce);

/// Static security policy, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    flags: FeatureFlags,
    report_endpoint: Option<Url>,
    enforce: bool,
    cache_control: Option<HeaderValue>,
    hsts: bool,
}

impl SecurityPolicy {
    pub fn from_config(security: &SecurityConfig, site: &SiteSettings) -> Self {
        let report_endpoint = security
            .report_endpoint
            .as_deref()
            .and_then(|raw| resolve_report_endpoint(raw, &site.base_url));

        let cache_control = match HeaderValue::from_str(&security.cache_control) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(
                    cache_control = %security.cache_control,
                    "Invalid Cache-Control value, header omitted"
                );
                None
            }
        };

        tracing::info!(
            features = ?enabled_features(&security.features),
            enforce = security.production,
            report_endpoint = report_endpoint.as_ref().map(Url::as_str),
            "Security policy resolved"
        );

        Self {
            flags: security.features.clone(),
            report_endpoint,
            enforce: security.production,
            cache_control,
            hsts: security.hsts,
        }
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn report_endpoint(&self) -> Option<&Url> {
        self.report_endpoint.as_ref()
    }

    /// `Content-Security-Policy`, or the report-only variant outside production.
    pub fn csp_header_name(&self) -> HeaderName {
        if self.enforce {
            header::CONTENT_SECURITY_POLICY
        } else {
            header::CONTENT_SECURITY_POLICY_REPORT_ONLY
        }
    }

    /// Full directive set for one response.
    pub fn directives(&self, nonce: &Nonce) -> DirectiveSet {
        let mut set = security_directives(&self.flags, nonce);
        if let Some(endpoint) = &self.report_endpoint {
            set.extend(Directive::ReportUri, [endpoint.as_str()]);
        }
        set
    }

    /// Every header this policy emits for a response carrying `nonce`.
    pub fn headers(&self, nonce: &Nonce) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = Vec::with_capacity(10);

        let csp = self.directives(nonce).to_header_value();
        match HeaderValue::from_str(&csp) {
            Ok(value) => headers.push((self.csp_header_name(), value)),
            Err(_) => tracing::warn!(policy = %csp, "CSP value is not a valid header"),
        }

        headers.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")));
        headers.push((
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));
        headers.push((
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));
        headers.push((PERMISSIONS_POLICY, HeaderValue::from_static(PERMISSIONS)));
        if let Some(cache_control) = &self.cache_control {
            headers.push((header::CACHE_CONTROL, cache_control.clone()));
        }
        headers.push((
            CROSS_ORIGIN_RESOURCE_POLICY,
            HeaderValue::from_static("same-origin"),
        ));
        if self.hsts {
            headers.push((
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS),
            ));
        }
        if let Some(endpoint) = &self.report_endpoint {
            let value = format!("{}=\"{}\"", REPORT_GROUP, endpoint);
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.push((REPORTING_ENDPOINTS, value));
            }
        }

        headers
    }

    /// Write the headers into a response, keeping a handler-chosen Cache-Control.
    pub fn apply(&self, nonce: &Nonce, target: &mut HeaderMap) {
        for (name, value) in self.headers(nonce) {
            if name == header::CACHE_CONTROL && target.contains_key(&name) {
                continue;
            }
            target.insert(name, value);
        }
    }
}

/// Resolve the configured report endpoint, or `None` if unusable.
///
/// Relative paths are joined onto `base_url`. Only http(s) URLs without
/// characters that would split a CSP directive are accepted.
pub fn resolve_report_endpoint(raw: &str, base_url: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(base_url).and_then(|base| base.join(raw))
        }
        Err(e) => Err(e),
    };

    match parsed {
        Ok(url)
            if matches!(url.scheme(), "http" | "https")
                && !url.as_str().contains([';', ',', '"']) =>
        {
            Some(url)
        }
        Ok(url) => {
            tracing::warn!(endpoint = %url, "Unsupported CSP report endpoint, reporting disabled");
            None
        }
        Err(e) => {
            tracing::warn!(endpoint = raw, error = %e, "Invalid CSP report endpoint, reporting disabled");
            None
        }
    }
}

/// Middleware attaching the security headers with a fresh nonce per response.
pub async fn security_headers_middleware(
    State(policy): State<Arc<SecurityPolicy>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let nonce = Nonce::generate();
    request.extensions_mut().insert(CspNonce(nonce.clone()));

    let mut response = next.run(request).await;
    policy.apply(&nonce, response.headers_mut());
    response
}
