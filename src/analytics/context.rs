//! Per-page-load consent and analytics context.
//!
//! One `PageContext` is built when a page loads and torn down when it is left.
//! It owns the consent store and the analytics buffer, so nothing about
//! consent lives in ambient globals.

use std::time::Duration;

use crate::analytics::buffer::{AnalyticsBuffer, TrackOutcome};
use crate::analytics::transport::{Params, Transport};
use crate::clock::Clock;
use crate::config::{AnalyticsConfig, ConsentConfig};
use crate::consent::{
    ConsentChoice, ConsentEvent, ConsentMachine, ConsentRecord, ConsentState, ConsentStore,
    CookieJar, InitialSource, UiState,
};

pub struct PageContext<J, C, T> {
    store: ConsentStore<J, C>,
    buffer: AnalyticsBuffer<T, C>,
    source: InitialSource,
}

impl<J, C, T> PageContext<J, C, T>
where
    J: CookieJar,
    C: Clock + Clone,
    T: Transport,
{
    /// Derive the initial consent state and set up the buffer.
    ///
    /// With no valid record and `default_grant` on, a default record
    /// (analytics only) is written immediately.
    pub fn init(
        consent: &ConsentConfig,
        analytics: &AnalyticsConfig,
        jar: J,
        clock: C,
        transport: T,
        secure: bool,
    ) -> Self {
        let mut store = ConsentStore::new(consent.clone(), jar, clock.clone(), secure);
        let record = store.load();
        let (machine, source) = ConsentMachine::initial(record.as_ref(), consent.default_grant);

        if source == InitialSource::DefaultGrant {
            store.save(ConsentChoice::default_grant());
        }

        tracing::debug!(
            state = machine.state().as_str(),
            source = ?source,
            transport = ?transport.kind(),
            "Page consent context initialized"
        );

        let buffer = AnalyticsBuffer::new(
            machine,
            transport,
            clock,
            Duration::from_millis(analytics.dedup_window_ms),
        );

        Self {
            store,
            buffer,
            source,
        }
    }

    pub fn track(&mut self, name: &str, params: Params) -> TrackOutcome {
        self.buffer.track(name, params)
    }

    pub fn accept_all(&mut self) -> ConsentRecord {
        self.save(ConsentChoice::accept_all())
    }

    pub fn deny_all(&mut self) -> ConsentRecord {
        self.save(ConsentChoice::deny_all())
    }

    /// Persist a full choice and apply it. Returns the written record.
    pub fn save(&mut self, choice: ConsentChoice) -> ConsentRecord {
        let record = self.store.save(choice);
        let event = if choice.analytics {
            ConsentEvent::AnalyticsGranted
        } else {
            ConsentEvent::AnalyticsDenied
        };
        self.dispatch(event);
        self.dispatch(ConsentEvent::CloseUi);
        record
    }

    /// Apply an event raised by the consent UI.
    ///
    /// Transitions the machine refuses (e.g. a second grant) are ignored.
    pub fn dispatch(&mut self, event: ConsentEvent) {
        if let Err(e) = self.buffer.handle(event) {
            tracing::debug!(event = %event, error = %e, "Consent event ignored");
        }
    }

    /// "Cookie preferences" link: re-open the UI, undoing a denial.
    pub fn reopen_preferences(&mut self) {
        if let Err(e) = self.buffer.reopen() {
            tracing::debug!(error = %e, "Preferences not reopened");
            self.buffer.handle(ConsentEvent::OpenUi).ok();
        }
    }

    pub fn state(&self) -> ConsentState {
        self.buffer.state()
    }

    pub fn ui(&self) -> UiState {
        self.buffer.ui()
    }

    pub fn initial_source(&self) -> InitialSource {
        self.source
    }

    pub fn buffer(&self) -> &AnalyticsBuffer<T, C> {
        &self.buffer
    }

    pub fn store(&self) -> &ConsentStore<J, C> {
        &self.store
    }

    /// End the page load. Returns the number of events that were never sent.
    pub fn teardown(self) -> usize {
        let unsent = self.buffer.into_pending().len();
        if unsent > 0 {
            tracing::debug!(unsent, "Page unloaded with queued analytics events");
        }
        unsent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::transport::DataLayer;
    use crate::clock::ManualClock;
    use crate::consent::MemoryCookieJar;

    type Ctx<'a> = PageContext<MemoryCookieJar, &'a ManualClock, DataLayer>;

    fn ctx<'a>(consent: ConsentConfig, jar: MemoryCookieJar, clock: &'a ManualClock) -> Ctx<'a> {
        PageContext::init(
            &consent,
            &AnalyticsConfig::default(),
            jar,
            clock,
            DataLayer::new(),
            false,
        )
    }

    #[test]
    fn test_default_grant_writes_analytics_only_record() {
        let clock = ManualClock::new(0);
        let consent = ConsentConfig {
            default_grant: true,
            ..Default::default()
        };
        let mut c = ctx(consent, MemoryCookieJar::new(), &clock);

        assert_eq!(c.state(), ConsentState::Granted);
        assert_eq!(c.initial_source(), InitialSource::DefaultGrant);
        assert_eq!(c.track("x", Params::new()), TrackOutcome::Sent);

        let jar = c.store().jar().clone();
        let mut reload = ctx(ConsentConfig::default(), jar, &clock);
        let raw = reload.store().jar().get("cookie_consent").unwrap();
        let record = ConsentRecord::decode(&raw).unwrap();
        assert!(record.analytics && !record.ads && !record.personalized);
        assert_eq!(reload.initial_source(), InitialSource::StoredRecord);
        assert_eq!(reload.track("y", Params::new()), TrackOutcome::Sent);
    }

    #[test]
    fn test_deny_then_reopen_then_accept() {
        let clock = ManualClock::new(0);
        let mut c = ctx(ConsentConfig::default(), MemoryCookieJar::new(), &clock);
        assert_eq!(c.ui(), UiState::Open);

        c.track("queued", Params::new());
        c.deny_all();
        assert_eq!(c.state(), ConsentState::Denied);
        assert_eq!(c.ui(), UiState::Closed);

        c.reopen_preferences();
        assert_eq!(c.state(), ConsentState::AwaitingConsent);
        assert_eq!(c.ui(), UiState::Open);

        let record = c.accept_all();
        assert!(record.analytics);
        assert_eq!(c.state(), ConsentState::Granted);
        assert_eq!(c.buffer().transport().entries().len(), 1);
        assert_eq!(c.teardown(), 0);
    }

    #[test]
    fn test_reopen_after_grant_only_opens_ui() {
        let clock = ManualClock::new(0);
        let mut c = ctx(ConsentConfig::default(), MemoryCookieJar::new(), &clock);
        c.accept_all();
        c.reopen_preferences();
        assert_eq!(c.state(), ConsentState::Granted);
        assert_eq!(c.ui(), UiState::Open);
    }

    #[test]
    fn test_teardown_reports_unsent_events() {
        let clock = ManualClock::new(0);
        let mut c = ctx(ConsentConfig::default(), MemoryCookieJar::new(), &clock);
        c.track("a", Params::new());
        c.track("b", Params::new());
        assert_eq!(c.teardown(), 2);
    }
}
