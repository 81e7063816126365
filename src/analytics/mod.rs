//! Consent-gated analytics.
//!
//! # Data Flow
//! ```text
//! DOM handler (click / submit / navigation)
//!     → context.rs (PageContext::track)
//!     → buffer.rs
//!         not granted → pending queue
//!         granted     → dedup window → transport.rs (gtag | data layer)
//!
//! consent:analytics-granted
//!     → buffer.rs drains the queue, FIFO, through the same dedup check
//! ```

pub mod buffer;
pub mod context;
pub mod transport;

pub use buffer::{AnalyticsBuffer, DrainSummary, PendingEvent, TrackOutcome};
pub use context::PageContext;
pub use transport::{select_transport, DataLayer, Gtag, Params, Transport, TransportError};
