//! No-JS consent form.
//!
//! The banner posts here when scripts are blocked or disabled. The choice is
//! written with the same cookie format and attributes the client uses, then
//! the visitor is sent back to the page.

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, HeaderName},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use serde::Deserialize;

use crate::clock::SystemClock;
use crate::consent::{ConsentChoice, ConsentStore, MemoryCookieJar};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Body of `POST /consent`. Checkboxes are present only when ticked.
#[derive(Debug, Default, Deserialize)]
pub struct ConsentForm {
    pub action: String,
    #[serde(default)]
    pub analytics: Option<String>,
    #[serde(default)]
    pub ads: Option<String>,
    #[serde(default)]
    pub personalized: Option<String>,
}

impl ConsentForm {
    pub fn choice(&self) -> Result<ConsentChoice, ApiError> {
        match self.action.as_str() {
            "accept_all" => Ok(ConsentChoice::accept_all()),
            "deny_all" => Ok(ConsentChoice::deny_all()),
            "save" => Ok(ConsentChoice {
                analytics: self.analytics.is_some(),
                ads: self.ads.is_some(),
                personalized: self.personalized.is_some(),
            }),
            other => Err(ApiError::BadRequest(format!("unknown consent action `{other}`"))),
        }
    }
}

/// Whether the visitor reached us over HTTPS, directly or via a proxy.
pub(crate) fn request_is_secure(tls_enabled: bool, headers: &HeaderMap) -> bool {
    tls_enabled
        || headers
            .get(&X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// `POST /consent`
pub async fn submit_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Result<impl IntoResponse, ApiError> {
    let choice = form.choice()?;
    let secure = request_is_secure(state.tls_enabled, &headers);

    let mut store = ConsentStore::new(
        state.config.consent.clone(),
        MemoryCookieJar::new(),
        SystemClock,
        secure,
    );
    let record = store.save(choice);

    tracing::info!(
        choice = choice.label(),
        analytics = record.analytics,
        ads = record.ads,
        personalized = record.personalized,
        secure,
        "Consent saved from form"
    );
    metrics::record_consent_choice(choice.label());

    let cookies: Vec<_> = store
        .jar()
        .set_cookie_headers()
        .iter()
        .map(|cookie| (header::SET_COOKIE, cookie.clone()))
        .collect();

    Ok((
        AppendHeaders(cookies),
        [(header::CACHE_CONTROL, "no-store")],
        Redirect::to("/"),
    ))
}
