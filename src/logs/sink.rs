//! # Shared log sinks.
//!
//! A [`LogSink`] receives every forwarded line from the multiplexer's single
//! writer task, so implementations never see concurrent calls.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// One forwarded line, tagged with its component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub component: Arc<str>,
    pub text: String,
}

/// Destination of forwarded log lines.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    /// Writes one line. Text must be written as-is.
    async fn write(&self, line: &LogLine);

    /// Human-readable name (for diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Emits lines as `tracing` events under the `daemon` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl LogSink for TracingSink {
    async fn write(&self, line: &LogLine) {
        tracing::info!(target: "daemon", component = %line.component, "{}", line.text);
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Keeps every line in memory; used in tests and for embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all lines written so far, in sink order.
    pub fn lines(&self) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Texts written for `component`, in sink order.
    pub fn lines_of(&self, component: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| &*l.component == component)
            .map(|l| l.text)
            .collect()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, line: &LogLine) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.clone());
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
