//! # Component abstraction.
//!
//! A [`Component`] wraps one external long-running process plus its one-time
//! setup. The supervisor drives every component through the same lifecycle:
//!
//! ```text
//! Unconfigured ─► Configuring ─► Configured ─► Starting ─► Running ─► Stopped | Failed
//! ```
//!
//! The shared handle type is [`ComponentRef`], an `Arc<dyn Component>`.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;
use crate::logs::LogStream;

/// # Supervised unit with a two-phase lifecycle.
///
/// # Example
/// ```
/// use std::io;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use cephvisor::{Component, ComponentError, LogStream};
///
/// struct Sleeper;
///
/// #[async_trait]
/// impl Component for Sleeper {
///     fn name(&self) -> &str { "sleeper" }
///
///     async fn configure(&self, _ctx: CancellationToken) -> Result<(), ComponentError> {
///         Ok(())
///     }
///
///     async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
///         ctx.cancelled().await;
///         Err(ComponentError::Canceled)
///     }
///
///     async fn logs(&self) -> io::Result<LogStream> {
///         Ok(LogStream::idle())
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Stable label, used only for logging and attribution.
    fn name(&self) -> &str;

    /// One-time setup. Invoked at most once per instance.
    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError>;

    /// Runs until the underlying process exits or `ctx` is cancelled.
    ///
    /// A stop caused by `ctx` must be reported as `Err(Canceled)` (or `Ok`),
    /// never as a start failure.
    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError>;

    /// Line stream bound to this component's log destination.
    ///
    /// Releasing the stream must not affect the running component.
    async fn logs(&self) -> io::Result<LogStream>;
}

/// Shared handle to a component.
pub type ComponentRef = Arc<dyn Component>;
