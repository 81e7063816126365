//! Apostille services marketing site.
//!
//! Serves the site behind a strict, nonce-based Content Security Policy and
//! carries the consent-gated analytics pipeline the pages run on.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod consent;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::SiteConfig;
pub use http::SiteServer;
pub use lifecycle::Shutdown;
