//! Network layer.
//!
//! Plain TCP listeners are bound in `main.rs`; `tls.rs` loads the optional
//! rustls configuration served through `axum-server`.

pub mod tls;

pub use tls::load_tls_config;
