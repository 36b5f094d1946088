//! # Closure-backed component (`ComponentFn`)
//!
//! [`ComponentFn`] wraps two closures `Fn(CancellationToken) -> Fut`, one per
//! phase. Each call produces a fresh future that owns its state; share state
//! across phases explicitly with `Arc<...>` inside the closures.
//!
//! Log output comes from a [`LogSource`]: nothing (idle), a file that is
//! followed, or a factory producing a stream.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use cephvisor::{ComponentError, ComponentFn, ComponentRef};
//!
//! let c: ComponentRef = ComponentFn::arc(
//!     "worker",
//!     |_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) },
//!     |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Err::<(), _>(ComponentError::Canceled)
//!     },
//! );
//!
//! assert_eq!(c.name(), "worker");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::components::{Component, FOLLOW_POLL};
use crate::error::ComponentError;
use crate::logs::LogStream;

type StreamFactory = Box<dyn Fn() -> io::Result<LogStream> + Send + Sync>;

/// Where a [`ComponentFn`]'s log lines come from.
pub enum LogSource {
    /// No log output.
    Idle,
    /// Follow a log file.
    File(PathBuf),
    /// Build a stream on demand.
    Factory(StreamFactory),
}

impl fmt::Debug for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Idle => f.write_str("Idle"),
            LogSource::File(path) => f.debug_tuple("File").field(path).finish(),
            LogSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Function-backed component implementation.
#[derive(Debug)]
pub struct ComponentFn<C, S> {
    name: Cow<'static, str>,
    configure: C,
    start: S,
    logs: LogSource,
}

impl<C, S> ComponentFn<C, S> {
    pub fn new(name: impl Into<Cow<'static, str>>, configure: C, start: S) -> Self {
        Self {
            name: name.into(),
            configure,
            start,
            logs: LogSource::Idle,
        }
    }

    /// Creates the component and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, configure: C, start: S) -> Arc<Self> {
        Arc::new(Self::new(name, configure, start))
    }

    /// Follows `path` as this component's log.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.logs = LogSource::File(path.into());
        self
    }

    /// Produces the log stream with `factory`.
    pub fn with_log_stream<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> io::Result<LogStream> + Send + Sync + 'static,
    {
        self.logs = LogSource::Factory(Box::new(factory));
        self
    }
}

#[async_trait]
impl<C, CF, S, SF> Component for ComponentFn<C, S>
where
    C: Fn(CancellationToken) -> CF + Send + Sync + 'static,
    CF: Future<Output = Result<(), ComponentError>> + Send + 'static,
    S: Fn(CancellationToken) -> SF + Send + Sync + 'static,
    SF: Future<Output = Result<(), ComponentError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        (self.configure)(ctx).await
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        (self.start)(ctx).await
    }

    async fn logs(&self) -> io::Result<LogStream> {
        match &self.logs {
            LogSource::Idle => Ok(LogStream::idle()),
            LogSource::File(path) => LogStream::follow(path, FOLLOW_POLL).await,
            LogSource::Factory(factory) => factory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn phases_call_their_closures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (c1, c2) = (calls.clone(), calls.clone());

        let comp = ComponentFn::new(
            "counter",
            move |_ctx: CancellationToken| {
                let calls = c1.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ComponentError>(())
                }
            },
            move |_ctx: CancellationToken| {
                let calls = c2.clone();
                async move {
                    calls.fetch_add(10, Ordering::SeqCst);
                    Err::<(), _>(ComponentError::Start {
                        reason: "exit status: 1".into(),
                        output: "fatal".into(),
                    })
                }
            },
        );

        comp.configure(CancellationToken::new()).await.unwrap();
        let err = comp.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ComponentError::Start { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn log_factory_is_used() {
        let ok = |_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) };
        let comp = ComponentFn::new("chatty", ok, ok).with_log_stream(|| {
            let (tx, stream) = LogStream::channel(1);
            tx.try_send("hello".into()).map_err(io::Error::other)?;
            Ok(stream)
        });

        let mut stream = comp.logs().await.unwrap();
        assert_eq!(stream.next_line().await.as_deref(), Some("hello"));
        assert_eq!(stream.next_line().await, None);
    }

    #[tokio::test]
    async fn unreadable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let ok = |_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) };
        let comp = ComponentFn::new("broken", ok, ok).with_log_file(blocker.join("log"));
        assert!(comp.logs().await.is_err());
    }
}
