//! # Runtime events emitted by the supervisor and supervision units.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: one per component state transition
//! - **Shutdown events**: shutdown requested, grace outcome
//! - **Subscriber events**: overflow and panics of subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! component name, phase and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use cephvisor::{ComponentError, Event, EventKind, Phase};
//!
//! let err = ComponentError::NoDeviceAvailable { class: "nbd".into() };
//! let ev = Event::new(EventKind::ComponentFailed)
//!     .with_component("osd.0")
//!     .with_phase(Phase::Configure)
//!     .with_reason(err.to_string());
//!
//! assert_eq!(ev.kind, EventKind::ComponentFailed);
//! assert_eq!(ev.reason.as_deref(), Some("no free nbd devices found"));
//! assert_eq!(ev.component.as_deref(), Some("osd.0"));
//! assert_eq!(ev.phase, Some(Phase::Configure));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::Phase;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `component`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `component`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or shutdown token).
    ///
    /// Sets:
    /// - `reason`: what triggered it
    ShutdownRequested,

    /// All components stopped within the configured grace period.
    ///
    /// Sets:
    /// - `grace_ms`: configured grace
    AllStoppedWithin,

    /// Grace period exceeded; some components were aborted.
    ///
    /// Sets:
    /// - `grace_ms`: configured grace
    /// - `reason`: names of the stuck components
    GraceExceeded,

    // === Component lifecycle events ===
    /// Configure phase entered.
    ComponentConfiguring,

    /// Configure phase succeeded.
    ComponentConfigured,

    /// Start phase about to be entered.
    ComponentStarting,

    /// Start phase entered; the daemon is running.
    ComponentRunning,

    /// Component finished cleanly (completed, or stopped by cancellation).
    ///
    /// Sets:
    /// - `reason`: optional detail (e.g., "canceled")
    ComponentStopped,

    /// Component failed.
    ///
    /// Sets:
    /// - `phase`: failing phase
    /// - `reason`: failure message
    ComponentFailed,

    /// The component's log stream could not be opened; the component keeps running.
    ///
    /// Sets:
    /// - `reason`: open failure
    LogsUnavailable,
}

impl EventKind {
    /// True for the two terminal lifecycle events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::ComponentStopped | EventKind::ComponentFailed)
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Component label (or subscriber name for subscriber events).
    pub component: Option<Arc<str>>,
    /// Lifecycle phase, for failures.
    pub phase: Option<Phase>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Shutdown grace in milliseconds (compact).
    pub grace_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            component: None,
            phase: None,
            reason: None,
            grace_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a component name.
    #[inline]
    pub fn with_component(mut self, component: impl Into<Arc<str>>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches a grace duration (stored as milliseconds).
    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.grace_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_component(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_component(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ComponentConfiguring);
        let b = Event::new(EventKind::ComponentConfigured);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn grace_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::GraceExceeded).with_grace(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.grace_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_event_names_the_subscriber() {
        let ev = Event::subscriber_overflow("log-writer", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.component.as_deref(), Some("log-writer"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=log-writer reason=full"));
    }
}
