//! # Supervisor runtime configuration.
//!
//! Provides [`SupervisorConfig`]: settings of the supervision runtime itself.
//! Cluster paths, accounts and component timeouts live in
//! [`Config`](crate::Config).

use std::time::Duration;

/// Settings for the supervision runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for components to stop after cancellation
///   (`0s` = abort stragglers immediately)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `log_capacity`: queue between log forwarders and the sink writer (min 1)
/// - `handle_signals`: listen for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// When the shared token is cancelled:
    /// - components observe cancellation through their tokens
    /// - the supervisor waits up to `grace` for every unit to finish
    /// - units still running are aborted and `GraceExceeded` is reported
    pub grace: Duration,

    /// Lagging listeners skip the oldest events beyond this capacity.
    pub bus_capacity: usize,

    /// A full queue applies backpressure to forwarders; lines are not dropped.
    pub log_capacity: usize,

    pub handle_signals: bool,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn log_capacity_clamped(&self) -> usize {
        self.log_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `log_capacity = 1024`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            log_capacity: 1024,
            handle_signals: true,
        }
    }
}
