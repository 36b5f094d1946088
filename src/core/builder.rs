use std::sync::Arc;

use crate::{
    core::SupervisorConfig,
    events::Bus,
    logs::{LogMultiplexer, LogSink, TracingSink},
    subscribers::{Subscribe, SubscriberSet},
};
use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            sink: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the shared sink for forwarded daemon logs (default: [`TracingSink`]).
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the supervisor.
    ///
    /// Spawns the subscriber workers and the log writer, so it must be called
    /// from within a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let mux = LogMultiplexer::new(sink, self.cfg.log_capacity_clamped());

        Arc::new(Supervisor::new_internal(self.cfg, bus, subs, mux))
    }
}
