//! Consent state machine.
//!
//! ```text
//!                  grant
//!   AwaitingConsent ─────────▶ Granted (terminal for the page load)
//!         │   ▲                  ▲
//!    deny │   │ reopen           │ grant
//!         ▼   │                  │
//!        Denied ─────────────────┘
//! ```
//!
//! The preference UI has its own `Open`/`Closed` state; `reopen` moves a
//! denial back to awaiting and opens the UI.

use std::fmt;
use std::str::FromStr;

use crate::consent::record::ConsentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    AwaitingConsent,
    Granted,
    Denied,
}

impl ConsentState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentState::AwaitingConsent => "awaiting",
            ConsentState::Granted => "granted",
            ConsentState::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("analytics consent already granted")]
    AlreadyGranted,
    #[error("analytics consent already denied")]
    AlreadyDenied,
    #[error("granted consent cannot change during this page load")]
    GrantedIsTerminal,
}

/// Where the initial state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSource {
    StoredRecord,
    DefaultGrant,
    Undecided,
}

/// Custom DOM events exchanged with the consent UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentEvent {
    AnalyticsGranted,
    AnalyticsDenied,
    OpenUi,
    CloseUi,
}

impl ConsentEvent {
    pub fn name(self) -> &'static str {
        match self {
            ConsentEvent::AnalyticsGranted => "consent:analytics-granted",
            ConsentEvent::AnalyticsDenied => "consent:analytics-denied",
            ConsentEvent::OpenUi => "consent:open-ui",
            ConsentEvent::CloseUi => "consent:close-ui",
        }
    }
}

impl fmt::Display for ConsentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown consent event {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for ConsentEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consent:analytics-granted" => Ok(ConsentEvent::AnalyticsGranted),
            "consent:analytics-denied" => Ok(ConsentEvent::AnalyticsDenied),
            "consent:open-ui" => Ok(ConsentEvent::OpenUi),
            "consent:close-ui" => Ok(ConsentEvent::CloseUi),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentMachine {
    state: ConsentState,
    ui: UiState,
}

impl ConsentMachine {
    pub fn new(state: ConsentState) -> Self {
        let ui = match state {
            ConsentState::AwaitingConsent => UiState::Open,
            _ => UiState::Closed,
        };
        Self { state, ui }
    }

    /// Derive the page-load state from a valid stored record or the configured default.
    pub fn initial(record: Option<&ConsentRecord>, default_grant: bool) -> (Self, InitialSource) {
        match record {
            Some(r) if r.analytics => (Self::new(ConsentState::Granted), InitialSource::StoredRecord),
            Some(_) => (Self::new(ConsentState::Denied), InitialSource::StoredRecord),
            None if default_grant => (Self::new(ConsentState::Granted), InitialSource::DefaultGrant),
            None => (
                Self::new(ConsentState::AwaitingConsent),
                InitialSource::Undecided,
            ),
        }
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn ui(&self) -> UiState {
        self.ui
    }

    pub fn is_granted(&self) -> bool {
        self.state == ConsentState::Granted
    }

    pub fn grant(&mut self) -> Result<(), TransitionError> {
        if self.state == ConsentState::Granted {
            return Err(TransitionError::AlreadyGranted);
        }
        self.state = ConsentState::Granted;
        self.ui = UiState::Closed;
        Ok(())
    }

    pub fn deny(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ConsentState::Granted => Err(TransitionError::GrantedIsTerminal),
            ConsentState::Denied => Err(TransitionError::AlreadyDenied),
            ConsentState::AwaitingConsent => {
                self.state = ConsentState::Denied;
                self.ui = UiState::Closed;
                Ok(())
            }
        }
    }

    /// Re-open the preference UI, returning a denial to awaiting.
    pub fn reopen(&mut self) -> Result<(), TransitionError> {
        if self.state == ConsentState::Granted {
            return Err(TransitionError::GrantedIsTerminal);
        }
        self.state = ConsentState::AwaitingConsent;
        self.ui = UiState::Open;
        Ok(())
    }

    pub fn open_ui(&mut self) {
        self.ui = UiState::Open;
    }

    pub fn close_ui(&mut self) {
        self.ui = UiState::Closed;
    }
}
