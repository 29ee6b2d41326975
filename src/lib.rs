//! VLESS-over-WebSocket tunnel endpoint library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod tunnel;

pub use config::TunnelConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
