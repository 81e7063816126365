//! Page-load consent and analytics flows across reloads.

use std::cell::RefCell;
use std::rc::Rc;

use apostille_site::analytics::{select_transport, DataLayer, Gtag, PageContext, Params, TrackOutcome};
use apostille_site::clock::ManualClock;
use apostille_site::config::{AnalyticsConfig, ConsentConfig, TransportKind};
use apostille_site::consent::{
    ConsentChoice, ConsentRecord, ConsentState, CookieJar, InitialSource, MemoryCookieJar, UiState,
};
use serde_json::json;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn load<'a>(
    jar: MemoryCookieJar,
    clock: &'a ManualClock,
) -> PageContext<MemoryCookieJar, &'a ManualClock, DataLayer> {
    PageContext::init(
        &ConsentConfig::default(),
        &AnalyticsConfig::default(),
        jar,
        clock,
        DataLayer::new(),
        true,
    )
}

fn event_names(ctx: &PageContext<MemoryCookieJar, &ManualClock, DataLayer>) -> Vec<String> {
    ctx.buffer()
        .transport()
        .entries()
        .iter()
        .map(|e| e["event"].as_str().unwrap().to_string())
        .collect()
}

fn stored_jar(record: &ConsentRecord) -> MemoryCookieJar {
    MemoryCookieJar::from_cookie_header(&format!("cookie_consent={}", record.encode().unwrap()))
}

#[test]
fn first_visit_queues_then_accept_drains_in_order() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut page = load(MemoryCookieJar::new(), &clock);
    assert_eq!(page.state(), ConsentState::AwaitingConsent);
    assert_eq!(page.ui(), UiState::Open);

    for name in ["page_view", "cta_click", "form_start"] {
        assert_eq!(page.track(name, Params::new()), TrackOutcome::Queued);
        clock.advance(50);
    }
    page.accept_all();

    assert_eq!(event_names(&page), ["page_view", "cta_click", "form_start"]);
    assert_eq!(page.ui(), UiState::Closed);
    assert_eq!(page.teardown(), 0);
}

#[test]
fn accepted_choice_survives_reload() {
    let clock = ManualClock::new(0);
    let mut page = load(MemoryCookieJar::new(), &clock);
    page.accept_all();
    let jar = page.store().jar().clone();
    assert!(jar.set_cookie_headers()[0].ends_with("; Secure"));

    clock.advance(DAY_MS);
    let mut reload = load(jar, &clock);
    assert_eq!(reload.initial_source(), InitialSource::StoredRecord);
    assert_eq!(reload.state(), ConsentState::Granted);
    assert_eq!(reload.ui(), UiState::Closed);
    assert_eq!(reload.track("page_view", Params::new()), TrackOutcome::Sent);
}

#[test]
fn version_bump_asks_again() {
    let clock = ManualClock::new(0);
    let old = ConsentRecord::new(ConsentChoice::accept_all(), 0, "0");
    let mut page = load(stored_jar(&old), &clock);

    assert_eq!(page.initial_source(), InitialSource::Undecided);
    assert_eq!(page.state(), ConsentState::AwaitingConsent);
    assert_eq!(page.track("page_view", Params::new()), TrackOutcome::Queued);
}

#[test]
fn expired_record_is_cleared_and_asks_again() {
    let clock = ManualClock::new(0);
    let record = ConsentRecord::new(ConsentChoice::deny_all(), 0, "1");
    clock.advance(181 * DAY_MS);

    let page = load(stored_jar(&record), &clock);
    assert_eq!(page.state(), ConsentState::AwaitingConsent);
    assert!(page.store().jar().get("cookie_consent").is_none());
}

#[test]
fn record_inside_ttl_is_honored() {
    let clock = ManualClock::new(0);
    let record = ConsentRecord::new(ConsentChoice::deny_all(), 0, "1");
    clock.advance(179 * DAY_MS);

    let mut page = load(stored_jar(&record), &clock);
    assert_eq!(page.state(), ConsentState::Denied);
    assert_eq!(page.ui(), UiState::Closed);
    assert_eq!(page.track("page_view", Params::new()), TrackOutcome::Queued);
}

#[test]
fn corrupt_cookie_is_treated_as_absent() {
    let clock = ManualClock::new(0);
    let jar = MemoryCookieJar::from_cookie_header("cookie_consent=%7Bgarbage");
    let page = load(jar, &clock);
    assert_eq!(page.state(), ConsentState::AwaitingConsent);
}

#[test]
fn blocked_cookie_writes_still_apply_for_the_page() {
    let clock = ManualClock::new(0);
    let mut jar = MemoryCookieJar::new();
    jar.block_writes();
    let mut page = load(jar, &clock);

    page.track("page_view", Params::new());
    page.accept_all();
    assert_eq!(page.state(), ConsentState::Granted);
    assert_eq!(event_names(&page), ["page_view"]);
    assert!(page.store().jar().get("cookie_consent").is_none());
}

#[test]
fn double_submit_within_window_sends_once() {
    let clock = ManualClock::new(0);
    let mut page = load(MemoryCookieJar::new(), &clock);
    page.accept_all();

    let params = |v: serde_json::Value| v.as_object().unwrap().clone();
    assert_eq!(page.track("form_submit", params(json!({"form": "quote"}))), TrackOutcome::Sent);
    clock.advance(100);
    assert_eq!(
        page.track("form_submit", params(json!({"form": "quote"}))),
        TrackOutcome::Suppressed
    );
    clock.advance(400);
    assert_eq!(page.track("form_submit", params(json!({"form": "quote"}))), TrackOutcome::Sent);
}

#[test]
fn gtag_transport_selected_from_config() {
    let clock = ManualClock::new(0);
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let gtag = Gtag::new(move |name, _| sink.borrow_mut().push(name.to_string()));

    let analytics = AnalyticsConfig {
        transport: TransportKind::Gtag,
        ..Default::default()
    };
    let transport = select_transport(analytics.transport, Some(gtag), None);
    let mut page = PageContext::init(
        &ConsentConfig::default(),
        &analytics,
        MemoryCookieJar::new(),
        &clock,
        transport,
        false,
    );

    page.track("page_view", Params::new());
    page.save(ConsentChoice {
        analytics: true,
        ..ConsentChoice::deny_all()
    });
    assert_eq!(*calls.borrow(), ["page_view"]);
}

#[test]
fn analytics_declined_in_custom_choice_keeps_queue() {
    let clock = ManualClock::new(0);
    let mut page = load(MemoryCookieJar::new(), &clock);
    page.track("page_view", Params::new());
    page.save(ConsentChoice {
        ads: true,
        ..ConsentChoice::deny_all()
    });
    assert_eq!(page.state(), ConsentState::Denied);
    assert!(event_names(&page).is_empty());
    assert_eq!(page.teardown(), 1);
}
