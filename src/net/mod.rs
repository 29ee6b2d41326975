//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → connection.rs (admission, session id, live count)
//!     → Hand off to tunnel session
//!
//! Session States:
//!     AwaitingHeader → Relaying → Closed
//!                    ↘ Failed
//! ```
//!
//! # Design Decisions
//! - Admission is checked before the upgrade so refused clients get a 503
//! - Each session tracked for graceful shutdown

pub mod connection;

pub use connection::{SessionGuard, SessionId, SessionTracker};
