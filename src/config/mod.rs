//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SiteConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; feature flags never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AnalyticsConfig, ConsentConfig, FeatureFlags, ListenerConfig, LogFormat,
    ObservabilityConfig, SecurityConfig, SiteConfig, SiteSettings, TimeoutConfig, TlsConfig,
    TransportKind,
};
pub use validation::{validate_config, ValidationError};
