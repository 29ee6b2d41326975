//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, UUID / PROXYIP overrides)
//!     → validation.rs (semantic checks)
//!     → TunnelConfig (validated, immutable)
//!     → SessionSettings shared via Arc to every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the user id never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{active_env_overrides, load_config, ConfigError};
pub use schema::{
    AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, OutboundConfig, ShareConfig,
    TimeoutConfig, TunnelConfig, WebSocketConfig,
};
pub use validation::ValidationError;
