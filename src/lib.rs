//! # cephvisor
//!
//! **cephvisor** bootstraps and supervises the daemons of a single-node Ceph
//! cluster: a monitor, a manager, one or more storage daemons, an object
//! gateway and the manager dashboard.
//!
//! Every component is configured and started concurrently. The first failure
//! cancels everyone else; an orderly stop caused by that cancellation (or by a
//! termination signal) is never reported as a failure.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ComponentSpec │   │ComponentSpec │   │ComponentSpec │
//!     │  (monitor)   │   │  (manager)   │   │   (osd.0)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single-shot orchestrator)                            │
//! │  - shared CancellationToken (first error or signal cancels it)    │
//! │  - StateTracker (one lifecycle state per component)               │
//! │  - LogMultiplexer (tagged daemon log lines to one sink)           │
//! │  - Bus + SubscriberSet (lifecycle events to subscribers)          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//! ┌────────────────┐ ┌────────────────┐ ┌────────────────┐
//! │SupervisionUnit │ │SupervisionUnit │ │SupervisionUnit │
//! │fulfils monitor │ │ waits monitor  │ │ waits monitor  │
//! └┬───────────────┘ └┬───────────────┘ └┬───────────────┘
//!  │ configure         │ configure         │ configure (DeviceAllocator)
//!  │ forward logs      │ forward logs      │ forward logs
//!  │ start             │ start             │ start
//!  ▼                   ▼                   ▼
//! ceph-mon           ceph-mgr            ceph-osd        (own process groups)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Unconfigured ─► Configuring ─► Configured ─► Starting ─► Running ─► Stopped | Failed
//! ```
//! A unit ends `Failed` only for a genuine fault observed while the shared
//! token was still live; everything else ends `Stopped`.
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Components**    | Two-phase lifecycle contract and the five cluster daemons.       | [`Component`], [`Daemon`], [`Topology`]     |
//! | **Supervision**   | First-error-wins join, readiness barriers, shutdown grace.       | [`Supervisor`], [`ComponentSpec`], [`ReadySignal`] |
//! | **Resources**     | Free block-device discovery, manager module readiness.           | [`DeviceAllocator`], [`ReadinessPoller`]    |
//! | **Logs**          | Follow daemon log files into one tagged sink.                    | [`LogStream`], [`LogSink`]                  |
//! | **Subscriber API**| Hook into lifecycle events.                                      | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for components and the runtime.                     | [`ComponentError`], [`RuntimeError`]        |
//! | **Configuration** | Paths, ownership and timeouts resolved once at startup.          | [`Config`], [`SupervisorConfig`]            |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use cephvisor::{ComponentError, ComponentFn, ComponentSpec, Supervisor, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         grace: Duration::from_secs(5),
//!         handle_signals: false,
//!         ..SupervisorConfig::default()
//!     };
//!     let sup = Supervisor::builder(cfg).build();
//!
//!     let noop = |_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) };
//!     let hello = ComponentFn::arc("hello", noop, |_ctx: CancellationToken| async {
//!         println!("Hello from a component!");
//!         Ok::<_, ComponentError>(())
//!     });
//!
//!     sup.run(vec![ComponentSpec::new(hello)]).await?;
//!     Ok(())
//! }
//! ```

mod cluster;
mod components;
mod config;
mod core;
mod device;
mod error;
mod events;
mod exec;
mod logs;
mod ownership;
mod readiness;
mod subscribers;

// ---- Public re-exports ----

pub use cluster::{ClusterIdentity, render_cluster_config, write_cluster_config};
pub use components::{
    Component, ComponentFn, ComponentRef, ComponentSpec, Daemon, Dashboard, Gateway, LogSource,
    Manager, Monitor, StorageDaemon, Topology,
};
pub use config::{CEPH_CONF_ENV, Config};
pub use self::core::{
    ComponentState, LifecycleState, ReadySignal, ShutdownSignal, Supervisor, SupervisorBuilder,
    SupervisorConfig,
};
pub use device::{DeviceAllocator, DeviceEntry, DeviceHandle};
pub use error::{ComponentError, Phase, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use exec::{ExecError, Invocation, OUTPUT_TAIL_LIMIT, output, run_until_exit};
pub use logs::{LogLine, LogMultiplexer, LogSink, LogStream, MemorySink, TracingSink};
pub use ownership::Owner;
pub use readiness::{DisabledModule, MgrModuleQuery, ModuleList, ModuleQuery, ReadinessPoller};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
