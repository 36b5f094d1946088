//! Readiness polling for manager modules.
//!
//! ## Contents
//! - [`ModuleQuery`] source of the classified module lists (the manager CLI in
//!   production, stubs in tests)
//! - [`ModuleList`] parsed `always_on` / `enabled` / `disabled` lists
//! - [`ReadinessPoller`] bounded constant-interval polling loop
//!
//! ## State machine
//! ```text
//! Waiting ──(module listed)──────────────► Ready
//!    │ ──(query failed)────────────────► Failed(QueryFailed)
//!    │ ──(deadline reached)────────────► Failed(ReadinessTimeout)
//!    └──(token cancelled)──────────────► Failed(Canceled)
//! ```

mod poller;
mod query;

pub use poller::ReadinessPoller;
pub use query::{DisabledModule, MgrModuleQuery, ModuleList, ModuleQuery};
