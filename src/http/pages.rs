//! Server-rendered pages.
//!
//! Inline `<style>` and `<script>` elements carry the response nonce so they
//! run under the strict CSP. The consent banner is rendered open only while
//! the visitor has not chosen, using the same cookie rules as the browser.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{AppendHeaders, Html, IntoResponse},
    Extension, Json,
};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::Serialize;

use crate::clock::SystemClock;
use crate::config::{SiteConfig, TransportKind};
use crate::consent::{
    ConsentChoice, ConsentMachine, ConsentState, ConsentStore, InitialSource, MemoryCookieJar,
};
use crate::http::consent::request_is_secure;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::{CspNonce, Nonce};

const PAGE_CSS: &str = "body{font-family:system-ui,sans-serif;margin:0;color:#1b1f24}\
main{max-width:48rem;margin:0 auto;padding:2rem 1rem}\
#consent-banner{position:fixed;bottom:0;left:0;right:0;background:#f4f5f7;padding:1rem;\
border-top:1px solid #d0d4da}\
#consent-banner label{margin-right:1rem}";

/// Settings the client-side consent and analytics scripts boot from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientBootstrap<'a> {
    cookie_name: &'a str,
    ttl_days: u32,
    version: &'a str,
    default_grant: bool,
    transport: TransportKind,
    dedup_window_ms: u64,
    consent_state: &'static str,
    turnstile_site_key: Option<&'a str>,
}

impl<'a> ClientBootstrap<'a> {
    fn new(config: &'a SiteConfig, state: ConsentState) -> Self {
        let features = &config.security.features;
        Self {
            cookie_name: &config.consent.cookie_name,
            ttl_days: config.consent.ttl_days,
            version: &config.consent.version,
            default_grant: config.consent.default_grant,
            transport: config.analytics.transport,
            dedup_window_ms: config.analytics.dedup_window_ms,
            consent_state: state.as_str(),
            turnstile_site_key: features
                .turnstile_site_key
                .as_deref()
                .filter(|_| features.turnstile()),
        }
    }

    /// JSON safe to embed inside a `<script>` element.
    fn to_script(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("window.__siteConfig={};", json.replace('<', "\\u003c"))
    }
}

/// Consent as seen from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConsent {
    pub state: ConsentState,
    /// Cookie writes the check produced: removal of an expired record, or
    /// the record written by a configured default grant.
    pub set_cookies: Vec<String>,
}

/// Consent implied by the request's cookie, applying the same load rules
/// the browser does.
pub fn request_consent(config: &SiteConfig, headers: &HeaderMap, secure: bool) -> RequestConsent {
    let mut store = ConsentStore::new(
        config.consent.clone(),
        MemoryCookieJar::from_headers(headers),
        SystemClock,
        secure,
    );
    let record = store.load();
    let (machine, source) = ConsentMachine::initial(record.as_ref(), config.consent.default_grant);
    if source == InitialSource::DefaultGrant {
        store.save(ConsentChoice::default_grant());
    }

    RequestConsent {
        state: machine.state(),
        set_cookies: store.into_jar().set_cookie_headers().to_vec(),
    }
}

fn render_home(config: &SiteConfig, state: ConsentState, nonce: &Nonce) -> Markup {
    let bootstrap = ClientBootstrap::new(config, state);
    let awaiting = state == ConsentState::AwaitingConsent;

    html! {
        (DOCTYPE)
        html lang="en" data-consent=(state.as_str()) {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (config.site.name) }
                meta name="description" content="Apostille, legalization and document attestation services.";
                style nonce=(nonce.as_str()) { (PreEscaped(PAGE_CSS)) }
            }
            body {
                main {
                    h1 { (config.site.name) }
                    p { "Apostille, legalization and document attestation for use abroad." }
                }
                section id="consent-banner" hidden[!awaiting] {
                    form method="post" action="/consent" {
                        p { "We use cookies to measure traffic and improve our services." }
                        label { input type="checkbox" name="analytics" value="on"; " Analytics" }
                        label { input type="checkbox" name="ads" value="on"; " Advertising" }
                        label { input type="checkbox" name="personalized" value="on"; " Personalization" }
                        button type="submit" name="action" value="accept_all" { "Accept all" }
                        button type="submit" name="action" value="deny_all" { "Deny all" }
                        button type="submit" name="action" value="save" { "Save choices" }
                    }
                }
                script nonce=(nonce.as_str()) { (PreEscaped(bootstrap.to_script())) }
            }
        }
    }
}

/// `GET /`
pub async fn home_page(
    State(state): State<AppState>,
    Extension(CspNonce(nonce)): Extension<CspNonce>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let secure = request_is_secure(state.tls_enabled, &headers);
    let consent = request_consent(&state.config, &headers, secure);
    let markup = render_home(&state.config, consent.state, &nonce);
    metrics::record_page_served("/");

    let cookies: Vec<_> = consent
        .set_cookies
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie))
        .collect();

    (
        AppendHeaders(cookies),
        [(header::CACHE_CONTROL, "no-store")],
        Html(markup.into_string()),
    )
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub csp_enforced: bool,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            csp_enforced: state.config.security.production,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{ConsentChoice, ConsentRecord};

    #[test]
    fn test_nonce_on_every_inline_element() {
        let nonce = Nonce::parse("n0nce").unwrap();
        let page = render_home(&SiteConfig::default(), ConsentState::AwaitingConsent, &nonce)
            .into_string();
        assert_eq!(page.matches("nonce=\"n0nce\"").count(), 2);
        assert!(page.contains("data-consent=\"awaiting\""));
        assert!(!page.contains("id=\"consent-banner\" hidden"));
    }

    #[test]
    fn test_banner_hidden_once_decided() {
        let nonce = Nonce::generate();
        let page =
            render_home(&SiteConfig::default(), ConsentState::Denied, &nonce).into_string();
        assert!(page.contains("id=\"consent-banner\" hidden"));
    }

    #[test]
    fn test_bootstrap_cannot_close_script_element() {
        let mut config = SiteConfig::default();
        config.consent.version = "</script><script>alert(1)".into();
        let script = ClientBootstrap::new(&config, ConsentState::Granted).to_script();
        assert!(!script.contains("</script>"));
        assert!(script.contains("\"transport\":\"datalayer\""));
        assert!(script.contains("\"turnstileSiteKey\":null"));
    }

    #[test]
    fn test_request_consent_reads_cookie() {
        let config = SiteConfig::default();
        let none = request_consent(&config, &HeaderMap::new(), false);
        assert_eq!(none.state, ConsentState::AwaitingConsent);
        assert!(none.set_cookies.is_empty());

        let now = chrono::Utc::now().timestamp_millis();
        let record = ConsentRecord::new(ConsentChoice::accept_all(), now, "1");
        let consent = request_consent(&config, &cookie_headers(&record), false);
        assert_eq!(consent.state, ConsentState::Granted);
        assert!(consent.set_cookies.is_empty());
    }

    #[test]
    fn test_expired_cookie_is_removed() {
        let record = ConsentRecord::new(ConsentChoice::accept_all(), 0, "1");
        let consent = request_consent(&SiteConfig::default(), &cookie_headers(&record), false);
        assert_eq!(consent.state, ConsentState::AwaitingConsent);
        assert_eq!(
            consent.set_cookies,
            ["cookie_consent=; Path=/; SameSite=Lax; Max-Age=0"]
        );
    }

    #[test]
    fn test_default_grant_writes_record() {
        let mut config = SiteConfig::default();
        config.consent.default_grant = true;
        let consent = request_consent(&config, &HeaderMap::new(), true);
        assert_eq!(consent.state, ConsentState::Granted);
        assert_eq!(consent.set_cookies.len(), 1);

        let cookie = &consent.set_cookies[0];
        assert!(cookie.ends_with("; Max-Age=15552000; Secure"));
        let value = cookie
            .strip_prefix("cookie_consent=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let record = ConsentRecord::decode(value).unwrap();
        assert_eq!(record.choice(), ConsentChoice::default_grant());
    }

    fn cookie_headers(record: &ConsentRecord) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("cookie_consent={}", record.encode().unwrap())
                .parse()
                .unwrap(),
        );
        headers
    }
}
