//! # Log multiplexer.
//!
//! [`LogMultiplexer`] owns one writer task draining a bounded queue into the
//! shared [`LogSink`]. [`forward`](LogMultiplexer::forward) spawns one
//! forwarder per component that copies lines from its [`LogStream`] into the
//! queue.
//!
//! ## Rules
//! - **Single writer**: concurrent components serialize at the sink, never at
//!   the source.
//! - **Per-component FIFO**: one forwarder per stream sends sequentially, and
//!   the queue preserves each sender's order.
//! - **Lossless**: a full queue applies backpressure; lines are never dropped,
//!   coalesced or transformed.
//! - **Fire-and-forget**: forwarders are not joined by the supervision units;
//!   [`shutdown`](LogMultiplexer::shutdown) stops them and drains the queue.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::logs::{LogLine, LogSink, LogStream};

/// Fans component log streams into one sink.
pub struct LogMultiplexer {
    tx: Mutex<Option<mpsc::Sender<LogLine>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    forwarders: Mutex<JoinSet<()>>,
    stop: CancellationToken,
    sink_name: &'static str,
}

impl LogMultiplexer {
    /// Spawns the writer task. `capacity` bounds the shared queue (min 1).
    pub fn new(sink: Arc<dyn LogSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogLine>(capacity.max(1));
        let sink_name = sink.name();
        let writer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                sink.write(&line).await;
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            forwarders: Mutex::new(JoinSet::new()),
            stop: CancellationToken::new(),
            sink_name,
        }
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink_name
    }

    /// Starts forwarding `stream` tagged with `component`.
    ///
    /// Forwarding ends when the stream ends or is released, or at shutdown.
    /// Returns false if the multiplexer is already shut down.
    pub fn forward(&self, component: impl Into<Arc<str>>, mut stream: LogStream) -> bool {
        let Some(tx) = lock(&self.tx).clone() else {
            return false;
        };
        let component = component.into();
        let stop = self.stop.clone();

        lock(&self.forwarders).spawn(async move {
            loop {
                let text = tokio::select! {
                    biased;
                    line = stream.next_line() => match line {
                        Some(text) => text,
                        None => return,
                    },
                    _ = stop.cancelled() => return,
                };
                let line = LogLine {
                    component: Arc::clone(&component),
                    text,
                };
                if tx.send(line).await.is_err() {
                    return;
                }
            }
        });
        true
    }

    /// Stops every forwarder, then waits until queued lines reach the sink.
    ///
    /// Lines already buffered in a stream are forwarded before its forwarder
    /// observes the stop. Idempotent.
    pub async fn shutdown(&self) {
        self.stop.cancel();

        let mut forwarders = std::mem::take(&mut *lock(&self.forwarders));
        while forwarders.join_next().await.is_some() {}

        drop(lock(&self.tx).take());
        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            let _ = writer.await;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MemorySink;

    fn mux() -> (Arc<MemorySink>, LogMultiplexer) {
        let sink = Arc::new(MemorySink::new());
        let mux = LogMultiplexer::new(sink.clone(), 8);
        (sink, mux)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn preserves_order_per_component_under_concurrency() {
        let (sink, mux) = mux();
        let mut producers = Vec::new();

        for name in ["monitor", "manager", "osd.0"] {
            let (tx, stream) = LogStream::channel(4);
            assert!(mux.forward(name, stream));
            producers.push(tokio::spawn(async move {
                for i in 0..500 {
                    tx.send(format!("{name} line {i}")).await.unwrap();
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for p in producers {
            p.await.unwrap();
        }
        mux.shutdown().await;

        for name in ["monitor", "manager", "osd.0"] {
            let expected: Vec<String> = (0..500).map(|i| format!("{name} line {i}")).collect();
            assert_eq!(sink.lines_of(name), expected);
        }
        assert_eq!(sink.lines().len(), 1500);
    }

    #[tokio::test]
    async fn text_is_forwarded_untouched() {
        let (sink, mux) = mux();
        let (tx, stream) = LogStream::channel(4);
        mux.forward("rgw.gateway", stream);

        let raw = "  2024-01-01T00:00:00 7f1 -1 \tbeast: frontend\u{1b}[0m  ";
        tx.send(raw.to_string()).await.unwrap();
        drop(tx);
        mux.shutdown().await;

        assert_eq!(
            sink.lines(),
            vec![LogLine {
                component: Arc::from("rgw.gateway"),
                text: raw.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn shutdown_stops_idle_forwarders() {
        let (_sink, mux) = mux();
        mux.forward("dashboard", LogStream::idle());

        tokio::time::timeout(std::time::Duration::from_secs(5), mux.shutdown())
            .await
            .expect("shutdown hung on an idle stream");
        assert!(!mux.forward("late", LogStream::idle()));
    }

    #[tokio::test]
    async fn released_stream_ends_its_forwarder() {
        let (sink, mux) = mux();
        let (tx, stream) = LogStream::channel(4);
        let release = stream.release_handle();
        mux.forward("manager", stream);

        tx.send("before".into()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        release.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), tx.closed())
            .await
            .expect("released stream kept accepting lines");
        assert!(tx.send("after".into()).await.is_err());
        mux.shutdown().await;

        assert_eq!(sink.lines_of("manager"), vec!["before".to_string()]);
    }
}
