//! # LogWriter: lifecycle events as `tracing` records.
//!
//! Progress is logged at `info`, failures and dropped subscriber events at
//! `warn`/`error`. Records carry the component as a structured field.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO cephvisor: configuring component=monitor
//! INFO cephvisor: running component=monitor
//! ERROR cephvisor: failed component=osd.0 phase=configure reason="no free nbd devices found"
//! INFO cephvisor: stopped component=manager reason=canceled
//! WARN cephvisor: shutdown requested reason="signal"
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let component = e.component.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ComponentConfiguring => info!(target: "cephvisor", component, "configuring"),
            EventKind::ComponentConfigured => info!(target: "cephvisor", component, "configured"),
            EventKind::ComponentStarting => info!(target: "cephvisor", component, "starting"),
            EventKind::ComponentRunning => info!(target: "cephvisor", component, "running"),
            EventKind::ComponentStopped => {
                info!(target: "cephvisor", component, reason, "stopped")
            }
            EventKind::ComponentFailed => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("-");
                error!(target: "cephvisor", component, phase, reason, "failed")
            }
            EventKind::LogsUnavailable => {
                warn!(target: "cephvisor", component, reason, "log forwarding unavailable")
            }
            EventKind::ShutdownRequested => {
                warn!(target: "cephvisor", reason, "shutdown requested")
            }
            EventKind::AllStoppedWithin => {
                info!(target: "cephvisor", grace_ms = e.grace_ms, "all components stopped within grace")
            }
            EventKind::GraceExceeded => {
                error!(target: "cephvisor", grace_ms = e.grace_ms, stuck = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "cephvisor", subscriber = component, reason, "subscriber dropped an event")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "cephvisor", subscriber = component, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;

    #[tokio::test]
    async fn handles_every_event_kind_without_a_subscriber() {
        let kinds = [
            EventKind::ComponentConfiguring,
            EventKind::ComponentConfigured,
            EventKind::ComponentStarting,
            EventKind::ComponentRunning,
            EventKind::ComponentStopped,
            EventKind::ComponentFailed,
            EventKind::LogsUnavailable,
            EventKind::ShutdownRequested,
            EventKind::AllStoppedWithin,
            EventKind::GraceExceeded,
            EventKind::SubscriberOverflow,
            EventKind::SubscriberPanicked,
        ];
        for kind in kinds {
            let ev = Event::new(kind)
                .with_component("osd.0")
                .with_phase(Phase::Start)
                .with_reason("boom");
            LogWriter.on_event(&ev).await;
        }
    }
}
