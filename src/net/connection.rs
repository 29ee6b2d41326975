//! Session identity and admission tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for log context
//! - Count live sessions and refuse admission past the limit
//! - Let shutdown wait until every session has ended

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Global atomic counter for session IDs.
/// Relaxed: ids only need to be unique.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tunnel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Tracks live sessions against an admission limit.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    active_count: Arc<AtomicU64>,
    max_sessions: u64,
}

impl SessionTracker {
    /// Create a tracker admitting at most `max_sessions` concurrent sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            max_sessions: max_sessions as u64,
        }
    }

    /// Admit a new session. Returns `None` when the limit is reached.
    pub fn try_track(&self) -> Option<SessionGuard> {
        let admitted = self
            .active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_sessions).then_some(n + 1)
            });

        match admitted {
            Ok(prev) => {
                metrics::set_active_sessions(prev + 1);
                Some(SessionGuard {
                    active_count: Arc::clone(&self.active_count),
                    id: SessionId::new(),
                })
            }
            Err(_) => None,
        }
    }

    /// Get current live session count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all sessions have ended.
    pub async fn wait_idle(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements the live count when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    active_count: Arc<AtomicU64>,
    id: SessionId,
}

impl SessionGuard {
    /// Get this session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let remaining = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_sessions(remaining);
        tracing::trace!(session_id = %self.id, "Session released");
    }
}
