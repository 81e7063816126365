//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     SecurityConfig → headers.rs (resolve report endpoint, freeze flags)
//!
//! Every response:
//!     → nonce.rs (fresh token)
//!     → csp.rs (baseline + hosts.rs lookup table + nonce)
//!     → headers.rs (serialize, add companion headers)
//! ```
//!
//! # Design Decisions
//! - Stateless per request: nothing is cached between responses
//! - `script-src-elem` mirrors `script-src` after every mutation
//! - Misconfiguration omits a feature, it never fails a request

pub mod csp;
pub mod headers;
pub mod hosts;
pub mod nonce;

pub use csp::{build_directives, security_directives, Directive, DirectiveSet, DirectiveValue};
pub use headers::{security_headers_middleware, CspNonce, SecurityPolicy};
pub use nonce::{Nonce, NonceError};
