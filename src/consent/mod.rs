//! Consent subsystem.
//!
//! # Data Flow
//! ```text
//! Page load:
//!     cookie → store.rs (decode, version + TTL check)
//!     → machine.rs (AwaitingConsent | Granted | Denied)
//!
//! User choice (accept all / deny all / save):
//!     → store.rs (replace whole record)
//!     → machine.rs transition
//!     → ConsentEvent broadcast to the analytics buffer
//! ```

pub mod machine;
pub mod record;
pub mod store;

pub use machine::{ConsentEvent, ConsentMachine, ConsentState, InitialSource, TransitionError, UiState};
pub use record::{ConsentChoice, ConsentRecord, CookieError};
pub use store::{ConsentStore, CookieAttributes, CookieJar, MemoryCookieJar};
