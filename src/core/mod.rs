//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`] (with its builder and
//! config), the lifecycle state types and the [`ReadySignal`] barrier.
//!
//! Internal modules:
//! - [`supervisor`]: spawns one unit per component, first-error-wins join, grace;
//! - [`unit`]: drives one component through Configure and Start;
//! - [`state`]: lifecycle state machine and tracker;
//! - [`barrier`]: readiness barriers between components;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`builder`]: supervisor construction.
//!
//! ## Wiring
//! ```text
//! SupervisorBuilder ──► Supervisor ─┬─► Bus ──► listener ──► SubscriberSet ──► LogWriter, ...
//!                                   ├─► LogMultiplexer ──► LogSink
//!                                   ├─► StateTracker
//!                                   └─► CancellationToken (shared)
//!                                            │
//!                  ┌─────────────────────────┼─────────────────────────┐
//!                  ▼                         ▼                         ▼
//!          SupervisionUnit           SupervisionUnit           SupervisionUnit
//!            (monitor)  ──ReadySignal──►  (manager)                 (osd.0)
//! ```

mod barrier;
mod builder;
mod config;
mod shutdown;
mod state;
mod supervisor;
mod unit;

pub use barrier::ReadySignal;
pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use shutdown::ShutdownSignal;
pub use state::{ComponentState, LifecycleState};
pub use supervisor::Supervisor;
