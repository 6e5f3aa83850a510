//! # Lifecycle events published to observers.
//!
//! The [`EventKind`] enum classifies the three observable feeds:
//! - **`Running`**: the set of live instances changed (edge-triggered on
//!   registry add/remove); carries the full snapshot array.
//! - **`LifeStatusChanged`**: one instance moved to a new life status.
//! - **`LifeEvent`**: the coarse-grained life event derived from the same
//!   change, for clients that only follow launch/foreground/stop edges.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. For a given instance, status events are published in
//! state-transition order; `seq` lets observers re-order across async
//! channel boundaries.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde_json::Value;

use crate::apps::LifeStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The set of running instances changed.
    Running,
    /// An instance's life status changed.
    LifeStatusChanged,
    /// Coarse life event for an instance (derived from the status change).
    LifeEvent,
}

/// Lifecycle event with optional per-instance metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Instance the event concerns, if any.
    pub instance_id: Option<String>,
    /// App the event concerns, if any.
    pub app_id: Option<String>,
    /// Life status carried by status events.
    pub status: Option<LifeStatus>,
    /// Event payload (snapshot array for `Running`, event object otherwise).
    pub payload: Option<Value>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            instance_id: None,
            app_id: None,
            status: None,
            payload: None,
        }
    }

    /// Attaches an instance id.
    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Attaches an app id.
    pub fn with_app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Attaches a life status.
    pub fn with_status(mut self, status: LifeStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::Running);
        let b = Event::now(EventKind::LifeEvent);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builder_attaches_metadata() {
        let ev = Event::now(EventKind::LifeStatusChanged)
            .with_instance("abc0")
            .with_app("tv.menu")
            .with_status(LifeStatus::Launching);
        assert_eq!(ev.instance_id.as_deref(), Some("abc0"));
        assert_eq!(ev.app_id.as_deref(), Some("tv.menu"));
        assert_eq!(ev.status, Some(LifeStatus::Launching));
    }
}
