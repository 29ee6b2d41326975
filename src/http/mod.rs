//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, dispatch)
//!         Upgrade: websocket → websocket.rs (split into chunk halves)
//!                            → tunnel::run_session
//!         GET /              → service document
//!         GET /{user_id}     → share.rs (client link)
//!         otherwise          → 404
//! ```

pub mod server;
pub mod share;
pub mod websocket;

pub use server::{AppState, HttpServer};
pub use share::share_link;
