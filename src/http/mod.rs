//! HTTP surface of the site.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, tracing span)
//!     → security headers middleware (fresh nonce per response)
//!     → pages.rs | consent.rs | reports.rs | static files
//!     → Send to client
//! ```

pub mod consent;
pub mod error;
pub mod pages;
pub mod reports;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, SiteServer};
