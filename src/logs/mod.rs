//! Daemon log forwarding.
//!
//! Each component exposes its log file as a [`LogStream`]; the
//! [`LogMultiplexer`] forwards every stream into one shared [`LogSink`],
//! tagging each line with the owning component's name.
//!
//! ## Contents
//! - [`LogStream`] follow-mode line source (file follower, channel, idle)
//! - [`LogMultiplexer`] one forwarder per component, one writer at the sink
//! - [`LogSink`], [`TracingSink`], [`MemorySink`] sink implementations
//!
//! ## Wiring
//! ```text
//! ceph-mon.a.log ──► LogStream ──► forwarder("monitor") ──┐
//! ceph-mgr.a.log ──► LogStream ──► forwarder("manager") ──┼──► [mpsc] ──► writer ──► LogSink
//! ceph-osd.0.log ──► LogStream ──► forwarder("osd.0")  ──┘
//! ```

mod multiplexer;
mod sink;
mod stream;

pub use multiplexer::LogMultiplexer;
pub use sink::{LogLine, LogSink, MemorySink, TracingSink};
pub use stream::LogStream;
