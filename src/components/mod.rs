//! Components and their wiring.
//!
//! ## Contents
//! - [`Component`] the two-phase lifecycle contract, shared as [`ComponentRef`]
//! - [`ComponentSpec`] a component plus its readiness barriers
//! - [`ComponentFn`] closure-backed component for embedding and tests
//! - [`Daemon`] the closed set of cluster components: [`Monitor`],
//!   [`Manager`], [`StorageDaemon`], [`Gateway`] and [`Dashboard`]
//! - [`Topology`] which components a run starts and how they are wired

use std::time::Duration;

mod component;
mod component_fn;
mod daemon;
mod dashboard;
mod gateway;
mod manager;
mod monitor;
mod spec;
mod steps;
mod storage;
mod topology;

pub use component::{Component, ComponentRef};
pub use component_fn::{ComponentFn, LogSource};
pub use daemon::Daemon;
pub use dashboard::Dashboard;
pub use gateway::Gateway;
pub use manager::Manager;
pub use monitor::Monitor;
pub use spec::ComponentSpec;
pub use storage::StorageDaemon;
pub use topology::Topology;

/// Poll interval used when following a log file.
pub(crate) const FOLLOW_POLL: Duration = Duration::from_millis(250);
