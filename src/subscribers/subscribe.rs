//! # Subscriber trait
//!
//! `Subscribe` plugs an observer into the lifecycle event stream. Each
//! subscriber gets its own bounded queue and worker inside the
//! [`SubscriberSet`](crate::SubscriberSet), so a slow observer never delays
//! the components or the other observers.
//!
//! ## Contract
//! - `on_event` may await I/O; it runs on the subscriber's own worker.
//! - [`Subscribe::accepts`] filters before queueing; rejected events never
//!   take queue space.
//! - When the queue is full the event is dropped for this subscriber only and
//!   a `SubscriberOverflow` event is published.
//!
//! ## Example (skeleton)
//! ```rust
//! use cephvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureAudit;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for FailureAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         // write audit record...
//!         let _ = ev.seq;
//!     }
//!     fn accepts(&self, ev: &Event) -> bool {
//!         ev.kind == EventKind::ComponentFailed
//!     }
//!     fn name(&self) -> &'static str { "failure-audit" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of lifecycle events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Whether this subscriber wants `event` at all. Defaults to every event.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    /// Human-readable name (for overflow/panic reports).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
