//! # Supervisor: runs components concurrently with first-error-wins semantics.
//!
//! The [`Supervisor`] owns the event bus, the subscriber fan-out, the log
//! multiplexer, the lifecycle state table and the shared cancellation token.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<ComponentSpec>  ──►  Supervisor::run()
//!
//! Spawn units (all at once, order is only for enumeration):
//!   spec[0]   spec[1]   ...   spec[N-1]
//!      │         │               │
//!      └──► SupervisionUnit::run(shared token)   (one task per component, JoinSet)
//!
//! Join policy (first-error-wins):
//!   unit returns Err(e) ──► (unit already cancelled the token)
//!                         ──► e kept if it is the first non-cancellation error
//!   OS signal / shutdown_token().cancel() ──► token cancelled, no error value
//!
//! After cancellation:
//!   wait for remaining units up to cfg.grace
//!     ├─ all joined   → publish AllStoppedWithin
//!     └─ grace passed → abort stragglers (children die via kill_on_drop),
//!                       mark them Failed, publish GraceExceeded
//!
//! Teardown:
//!   LogMultiplexer::shutdown() (drain) ─► listener drains bus ─► SubscriberSet::shutdown()
//! ```
//!
//! A supervisor is single-shot: no component is ever restarted, and `run`
//! consumes the subscriber set, so later runs publish to no subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::components::ComponentSpec;
use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::shutdown;
use crate::core::state::{ComponentState, LifecycleState, StateTracker, UnitId};
use crate::core::unit::SupervisionUnit;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::logs::LogMultiplexer;
use crate::subscribers::SubscriberSet;

type UnitResult = Result<(), RuntimeError>;

/// Coordinates supervision units, event delivery and shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Mutex<Option<SubscriberSet>>,
    states: Arc<StateTracker>,
    mux: Arc<LogMultiplexer>,
    token: CancellationToken,
}

impl Supervisor {
    /// Starts building a supervisor with `cfg`.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: SubscriberSet,
        mux: LogMultiplexer,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs: Mutex::new(Some(subs)),
            states: Arc::new(StateTracker::new()),
            mux: Arc::new(mux),
            token: CancellationToken::new(),
        }
    }

    /// The shared cancellation token. Cancelling it stops every component, the
    /// same way a termination signal does.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Lifecycle state of every component, in spec order.
    pub fn states(&self) -> Vec<ComponentState> {
        self.states.snapshot()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Runs every component until all have finished.
    ///
    /// Returns the first non-cancellation error, `GraceExceeded` if units had
    /// to be aborted and nothing failed earlier, or `Ok(())`.
    pub async fn run(&self, specs: Vec<ComponentSpec>) -> Result<(), RuntimeError> {
        let listener = self.subscriber_listener();

        let mut set = JoinSet::new();
        let units = self.spawn_units(&mut set, specs);
        let mut first: Option<RuntimeError> = None;

        self.drive(&mut set, &units, &mut first).await;
        if !set.is_empty() {
            self.wait_all_with_grace(&mut set, &units, &mut first).await;
        }

        self.mux.shutdown().await;
        listener.stop().await;

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn_units(
        &self,
        set: &mut JoinSet<UnitResult>,
        specs: Vec<ComponentSpec>,
    ) -> HashMap<task::Id, (UnitId, Arc<str>)> {
        let mut units = HashMap::with_capacity(specs.len());
        for spec in specs {
            let name: Arc<str> = Arc::from(spec.name());
            let id = self.states.register(Arc::clone(&name));
            let unit = SupervisionUnit::new(
                id,
                spec,
                self.bus.clone(),
                Arc::clone(&self.states),
                Arc::clone(&self.mux),
            );
            let handle = set.spawn(unit.run(self.token.clone()));
            units.insert(handle.id(), (id, name));
        }
        units
    }

    /// Joins units until all are done or the shared token is cancelled.
    async fn drive(
        &self,
        set: &mut JoinSet<UnitResult>,
        units: &HashMap<task::Id, (UnitId, Arc<str>)>,
        first: &mut Option<RuntimeError>,
    ) {
        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);
        let mut listen = self.cfg.handle_signals;

        loop {
            tokio::select! {
                joined = set.join_next_with_id() => match joined {
                    Some(joined) => self.absorb(joined, units, first),
                    None => return,
                },
                received = &mut signal, if listen => {
                    listen = false;
                    match received {
                        Ok(sig) => {
                            self.bus.publish(
                                Event::new(EventKind::ShutdownRequested).with_reason(sig.as_str()),
                            );
                            self.token.cancel();
                        }
                        Err(e) => tracing::warn!(error = %e, "could not install signal handlers"),
                    }
                }
                _ = self.token.cancelled() => return,
            }
        }
    }

    /// Waits up to `grace` for the remaining units, then aborts the rest.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<UnitResult>,
        units: &HashMap<task::Id, (UnitId, Arc<str>)>,
        first: &mut Option<RuntimeError>,
    ) {
        let grace = self.cfg.grace;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = set.join_next_with_id().await {
                self.absorb(joined, units, first);
            }
        })
        .await;

        if drained.is_ok() {
            self.bus
                .publish(Event::new(EventKind::AllStoppedWithin).with_grace(grace));
            return;
        }

        let stuck = self.states.unfinished();
        set.abort_all();
        while let Some(joined) = set.join_next_with_id().await {
            self.absorb(joined, units, first);
        }
        self.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_grace(grace)
                .with_reason(stuck.join(",")),
        );
        if first.is_none() {
            *first = Some(RuntimeError::GraceExceeded { grace, stuck });
        }
    }

    /// Records one joined unit; keeps only the first non-cancellation error.
    fn absorb(
        &self,
        joined: Result<(task::Id, UnitResult), JoinError>,
        units: &HashMap<task::Id, (UnitId, Arc<str>)>,
        first: &mut Option<RuntimeError>,
    ) {
        let err = match joined {
            Ok((_, Ok(()))) => return,
            Ok((_, Err(e))) => e,
            Err(join_err) => {
                let Some((id, name)) = units.get(&join_err.id()) else {
                    return;
                };
                let reason = if join_err.is_panic() {
                    "supervision unit panicked"
                } else {
                    "aborted after shutdown grace"
                };
                if self.states.transition(*id, LifecycleState::Failed) {
                    self.bus.publish(
                        Event::new(EventKind::ComponentFailed)
                            .with_component(Arc::clone(name))
                            .with_reason(reason),
                    );
                }
                if !join_err.is_panic() {
                    return;
                }
                self.token.cancel();
                RuntimeError::ComponentPanicked {
                    component: name.to_string(),
                }
            }
        };

        if first.is_none() && !err.is_canceled() {
            *first = Some(err);
        }
    }

    /// Forwards bus events to the subscriber set until stopped.
    fn subscriber_listener(&self) -> Listener {
        let mut rx = self.bus.subscribe();
        let subs = self
            .subs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => {
                            if let Some(subs) = &subs {
                                subs.emit(ev);
                            }
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => break,
                }
            }
            if let Some(subs) = subs {
                subs.shutdown().await;
            }
        });
        Listener { stop, handle }
    }
}

struct Listener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    /// Delivers every event already on the bus, then shuts the subscribers down.
    async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
