//! Consent-gated analytics event buffer.
//!
//! # Responsibilities
//! - Queue events while analytics consent is not granted
//! - Drain the queue, in order, the moment consent is granted
//! - Suppress an identical event repeated within the dedup window
//!
//! # Design Decisions
//! - Single-threaded: every call runs to completion, no locking
//! - Denial keeps queued events; only a later grant sends them
//! - Transport failures drop the event (no retry, no re-queue)
//! - The queue is unbounded and lives only as long as the page

use std::collections::VecDeque;
use std::time::Duration;

use crate::analytics::transport::{Params, Transport};
use crate::clock::Clock;
use crate::consent::{ConsentEvent, ConsentMachine, ConsentState, TransitionError, UiState};

/// An event captured before consent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub name: String,
    pub params: Params,
}

/// What happened to a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Queued,
    Sent,
    Suppressed,
    Dropped,
    Rejected,
}

/// Totals from draining the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub sent: usize,
    pub suppressed: usize,
    pub dropped: usize,
}

/// Last accepted (key, time). Only accepted sends move it.
#[derive(Debug, Clone)]
struct DedupWindow {
    window_ms: i64,
    last: Option<(String, i64)>,
}

impl DedupWindow {
    fn new(window: Duration) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            last: None,
        }
    }

    fn is_duplicate(&self, key: &str, now: i64) -> bool {
        match &self.last {
            Some((last_key, at)) => last_key == key && (0..self.window_ms).contains(&(now - at)),
            None => false,
        }
    }

    fn record(&mut self, key: String, now: i64) {
        self.last = Some((key, now));
    }
}

fn dedup_key(name: &str, params: &Params) -> String {
    // serde_json maps are ordered by key, so this is canonical.
    let serialized = serde_json::to_string(params).unwrap_or_default();
    format!("{name}{serialized}")
}

pub struct AnalyticsBuffer<T, C> {
    machine: ConsentMachine,
    queue: VecDeque<PendingEvent>,
    dedup: DedupWindow,
    transport: T,
    clock: C,
}

impl<T: Transport, C: Clock> AnalyticsBuffer<T, C> {
    pub fn new(machine: ConsentMachine, transport: T, clock: C, dedup_window: Duration) -> Self {
        Self {
            machine,
            queue: VecDeque::new(),
            dedup: DedupWindow::new(dedup_window),
            transport,
            clock,
        }
    }

    /// Record an event: queue it before consent, send it after.
    pub fn track(&mut self, name: &str, params: Params) -> TrackOutcome {
        if name.is_empty() {
            tracing::debug!("Ignoring analytics event without a name");
            return TrackOutcome::Rejected;
        }

        if !self.machine.is_granted() {
            tracing::trace!(event = name, queued = self.queue.len() + 1, "Analytics event queued");
            self.queue.push_back(PendingEvent {
                name: name.to_string(),
                params,
            });
            return TrackOutcome::Queued;
        }

        self.dispatch(name, &params)
    }

    /// React to a consent UI event.
    pub fn handle(&mut self, event: ConsentEvent) -> Result<(), TransitionError> {
        match event {
            ConsentEvent::AnalyticsGranted => self.grant().map(|_| ()),
            ConsentEvent::AnalyticsDenied => self.deny(),
            ConsentEvent::OpenUi => {
                self.machine.open_ui();
                Ok(())
            }
            ConsentEvent::CloseUi => {
                self.machine.close_ui();
                Ok(())
            }
        }
    }

    /// Transition to granted and drain the queue in FIFO order.
    pub fn grant(&mut self) -> Result<DrainSummary, TransitionError> {
        self.machine.grant()?;

        let mut summary = DrainSummary::default();
        let pending = std::mem::take(&mut self.queue);
        for event in pending {
            match self.dispatch(&event.name, &event.params) {
                TrackOutcome::Sent => summary.sent += 1,
                TrackOutcome::Suppressed => summary.suppressed += 1,
                _ => summary.dropped += 1,
            }
        }

        tracing::debug!(
            sent = summary.sent,
            suppressed = summary.suppressed,
            dropped = summary.dropped,
            "Analytics consent granted, queue drained"
        );
        Ok(summary)
    }

    /// Transition to denied. Queued events stay queued.
    pub fn deny(&mut self) -> Result<(), TransitionError> {
        self.machine.deny()?;
        tracing::debug!(held = self.queue.len(), "Analytics consent denied");
        Ok(())
    }

    /// Re-open the preference UI after a denial.
    pub fn reopen(&mut self) -> Result<(), TransitionError> {
        self.machine.reopen()
    }

    pub fn state(&self) -> ConsentState {
        self.machine.state()
    }

    pub fn ui(&self) -> UiState {
        self.machine.ui()
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &PendingEvent> {
        self.queue.iter()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the buffer, returning events that were never sent.
    pub fn into_pending(self) -> Vec<PendingEvent> {
        self.queue.into()
    }

    fn dispatch(&mut self, name: &str, params: &Params) -> TrackOutcome {
        let now = self.clock.now_millis();
        let key = dedup_key(name, params);
        if self.dedup.is_duplicate(&key, now) {
            tracing::trace!(event = name, "Duplicate analytics event suppressed");
            return TrackOutcome::Suppressed;
        }

        match self.transport.send(name, params) {
            Ok(()) => {
                self.dedup.record(key, now);
                TrackOutcome::Sent
            }
            Err(e) => {
                tracing::debug!(event = name, error = %e, "Analytics event dropped");
                TrackOutcome::Dropped
            }
        }
    }
}
