//! # Supervision unit: drives one component through its lifecycle.
//!
//! ## Flow
//! ```text
//! wait barriers (after) ──► Configuring ──► configure(ctx)
//!                                              │
//!                       ┌──── Err ─────────────┤
//!                       ▼                      ▼ Ok
//!                  classify           Configured, fulfil barrier (signals)
//!                                              │
//!                                     attach logs (best effort)
//!                                              │
//!                                 Starting ─► Running ─► start(ctx)
//!                                                            │
//!                                                 release logs, classify
//! ```
//!
//! ## Classification
//! - `Ok` → `Stopped` (a completed Start does not cancel its peers)
//! - `Err(Canceled)`, or any error once the shared token is cancelled →
//!   `Stopped`; the cause was the orchestrator's own stop
//! - any other error → `Failed`, the shared token is cancelled and the error
//!   is returned wrapped with component name and phase
//!
//! Exactly one terminal event (`ComponentStopped` or `ComponentFailed`) is
//! published per unit.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::components::{Component, ComponentSpec};
use crate::core::state::{LifecycleState, StateTracker, UnitId};
use crate::error::{ComponentError, Phase, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::logs::LogMultiplexer;

pub(crate) struct SupervisionUnit {
    id: UnitId,
    name: Arc<str>,
    spec: ComponentSpec,
    bus: Bus,
    states: Arc<StateTracker>,
    mux: Arc<LogMultiplexer>,
}

impl SupervisionUnit {
    pub fn new(
        id: UnitId,
        spec: ComponentSpec,
        bus: Bus,
        states: Arc<StateTracker>,
        mux: Arc<LogMultiplexer>,
    ) -> Self {
        Self {
            id,
            name: Arc::from(spec.name()),
            spec,
            bus,
            states,
            mux,
        }
    }

    /// Runs the unit to a terminal state. `token` is the shared group token.
    pub async fn run(self, token: CancellationToken) -> Result<(), RuntimeError> {
        for barrier in self.spec.waits_for() {
            if let Err(e) = barrier.wait(&token).await {
                return self.finish(Phase::Configure, Err(e), &token);
            }
        }

        let component = Arc::clone(self.spec.component());

        self.enter(LifecycleState::Configuring, EventKind::ComponentConfiguring);
        if let Err(e) = component.configure(token.child_token()).await {
            return self.finish(Phase::Configure, Err(e), &token);
        }
        self.enter(LifecycleState::Configured, EventKind::ComponentConfigured);
        if let Some(barrier) = self.spec.fulfils() {
            barrier.fulfill();
        }

        let release = self.attach_logs(component.as_ref()).await;

        self.enter(LifecycleState::Starting, EventKind::ComponentStarting);
        let res = if token.is_cancelled() {
            Err(ComponentError::Canceled)
        } else {
            self.enter(LifecycleState::Running, EventKind::ComponentRunning);
            component.start(token.child_token()).await
        };
        if let Some(release) = release {
            release.cancel();
        }
        self.finish(Phase::Start, res, &token)
    }

    /// Forwards the component's logs; returns the handle releasing them.
    async fn attach_logs(&self, component: &dyn Component) -> Option<CancellationToken> {
        match component.logs().await {
            Ok(stream) => {
                let release = stream.release_handle();
                self.mux.forward(Arc::clone(&self.name), stream);
                Some(release)
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::LogsUnavailable)
                        .with_component(Arc::clone(&self.name))
                        .with_reason(e.to_string()),
                );
                None
            }
        }
    }

    fn enter(&self, state: LifecycleState, kind: EventKind) {
        if self.states.transition(self.id, state) {
            self.bus
                .publish(Event::new(kind).with_component(Arc::clone(&self.name)));
        }
    }

    fn finish(
        &self,
        phase: Phase,
        res: Result<(), ComponentError>,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let err = match res {
            Ok(()) => {
                self.stopped(None);
                return Ok(());
            }
            Err(e) if e.is_canceled() => {
                self.stopped(Some("canceled".to_string()));
                return Ok(());
            }
            Err(e) if token.is_cancelled() => {
                self.stopped(Some(format!("canceled during {phase}: {e}")));
                return Ok(());
            }
            Err(e) => e,
        };

        if self.states.transition(self.id, LifecycleState::Failed) {
            self.bus.publish(
                Event::new(EventKind::ComponentFailed)
                    .with_component(Arc::clone(&self.name))
                    .with_phase(phase)
                    .with_reason(err.to_string()),
            );
        }
        token.cancel();

        Err(RuntimeError::Component {
            component: self.name.to_string(),
            phase,
            source: err,
        })
    }

    fn stopped(&self, reason: Option<String>) {
        if self.states.transition(self.id, LifecycleState::Stopped) {
            let mut ev = Event::new(EventKind::ComponentStopped).with_component(Arc::clone(&self.name));
            if let Some(reason) = reason {
                ev = ev.with_reason(reason);
            }
            self.bus.publish(ev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentFn;
    use crate::core::ReadySignal;
    use crate::logs::{LogStream, MemorySink};
    use std::sync::Mutex;
    use std::time::Duration;

    fn harness() -> (Bus, Arc<StateTracker>, Arc<LogMultiplexer>) {
        let mux = LogMultiplexer::new(Arc::new(MemorySink::new()), 16);
        (Bus::new(64), Arc::new(StateTracker::new()), Arc::new(mux))
    }

    fn unit(spec: ComponentSpec) -> (SupervisionUnit, Arc<StateTracker>, Bus) {
        let (bus, states, mux) = harness();
        let id = states.register(Arc::from(spec.name()));
        let unit = SupervisionUnit::new(id, spec, bus.clone(), states.clone(), mux);
        (unit, states, bus)
    }

    fn ok(_ctx: CancellationToken) -> std::future::Ready<Result<(), ComponentError>> {
        std::future::ready(Ok(()))
    }

    #[tokio::test]
    async fn configure_failure_cancels_the_group() {
        let spec = ComponentSpec::new(ComponentFn::arc(
            "osd.0",
            |_ctx: CancellationToken| async {
                Err::<(), _>(ComponentError::NoDeviceAvailable { class: "nbd".into() })
            },
            ok,
        ));
        let (unit, states, _bus) = unit(spec);
        let token = CancellationToken::new();

        let err = unit.run(token.clone()).await.unwrap_err();

        assert!(token.is_cancelled());
        assert!(matches!(
            err,
            RuntimeError::Component { phase: Phase::Configure, source: ComponentError::NoDeviceAvailable { .. }, .. }
        ));
        assert_eq!(states.get(0), Some(LifecycleState::Failed));
    }

    #[tokio::test]
    async fn cancelled_start_is_a_clean_stop() {
        let spec = ComponentSpec::new(ComponentFn::arc("monitor", ok, |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(ComponentError::Start {
                reason: "signal: killed".into(),
                output: String::new(),
            })
        }));
        let (unit, states, _bus) = unit(spec);
        let token = CancellationToken::new();

        let handle = tokio::spawn(unit.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(states.get(0), Some(LifecycleState::Stopped));
    }

    #[tokio::test]
    async fn completed_start_does_not_cancel_peers() {
        let spec = ComponentSpec::new(ComponentFn::arc("dashboard", ok, ok));
        let (unit, states, _bus) = unit(spec);
        let token = CancellationToken::new();

        unit.run(token.clone()).await.unwrap();
        assert!(!token.is_cancelled());
        assert_eq!(states.get(0), Some(LifecycleState::Stopped));
    }

    #[tokio::test]
    async fn barrier_gates_configure_and_is_fulfilled_after_it() {
        let monitor_up = ReadySignal::new("monitor");
        let (bus, states, mux) = harness();
        let mut events = bus.subscribe();

        let manager = ComponentSpec::new(ComponentFn::arc("manager", ok, ok)).after(monitor_up.clone());
        let monitor = ComponentSpec::new(ComponentFn::arc("monitor", ok, ok)).signals(monitor_up.clone());

        let token = CancellationToken::new();
        let mgr_id = states.register("manager".into());
        let mon_id = states.register("monitor".into());
        let mgr = tokio::spawn(
            SupervisionUnit::new(mgr_id, manager, bus.clone(), states.clone(), mux.clone()).run(token.clone()),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(states.get(mgr_id), Some(LifecycleState::Unconfigured));

        SupervisionUnit::new(mon_id, monitor, bus.clone(), states.clone(), mux)
            .run(token.clone())
            .await
            .unwrap();
        mgr.await.unwrap().unwrap();
        assert!(monitor_up.is_ready());

        let mut configured = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ComponentConfiguring {
                configured.push(ev.component.as_deref().unwrap_or_default().to_string());
            }
        }
        assert_eq!(configured, ["monitor", "manager"]);
    }

    #[tokio::test]
    async fn logs_are_released_once_start_returns() {
        let (tx, stream) = LogStream::channel(4);
        let stream = Mutex::new(Some(stream));
        let early = tx.clone();
        let spec = ComponentSpec::new(Arc::new(
            ComponentFn::new("dashboard", ok, move |_ctx: CancellationToken| {
                let early = early.clone();
                async move {
                    early.send("module enabled".to_string()).await.unwrap();
                    Ok::<_, ComponentError>(())
                }
            })
            .with_log_stream(move || {
                stream
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| std::io::Error::other("stream already taken"))
            }),
        ));
        let (bus, states, mux) = harness();
        let sink_mux = mux.clone();
        let id = states.register(Arc::from(spec.name()));

        SupervisionUnit::new(id, spec, bus, states, mux)
            .run(CancellationToken::new())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), tx.closed())
            .await
            .expect("log stream still open after start returned");
        sink_mux.shutdown().await;
    }

    #[tokio::test]
    async fn unopenable_logs_do_not_abort_start() {
        let spec = ComponentSpec::new(Arc::new(
            ComponentFn::new("rgw.gateway", ok, ok)
                .with_log_stream(|| Err(std::io::Error::other("permission denied"))),
        ));
        let (unit, states, bus) = unit(spec);
        let mut events = bus.subscribe();

        unit.run(CancellationToken::new()).await.unwrap();

        assert_eq!(states.get(0), Some(LifecycleState::Stopped));
        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::LogsUnavailable));
        assert!(kinds.contains(&EventKind::ComponentRunning));
    }
}
