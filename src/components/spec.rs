//! # Component specification for supervised execution.
//!
//! [`ComponentSpec`] pairs a component with the readiness barriers around its
//! Configure phase:
//! - `after`: barriers awaited before Configure begins
//! - `signals`: barrier fulfilled once Configure succeeds
//!
//! Without barriers all components configure concurrently.

use crate::components::ComponentRef;
use crate::core::ReadySignal;

/// A component plus its readiness wiring.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use cephvisor::{ComponentError, ComponentFn, ComponentSpec, ReadySignal};
///
/// let monitor_up = ReadySignal::new("monitor");
/// let noop = |_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) };
///
/// let monitor = ComponentSpec::new(ComponentFn::arc("monitor", noop, noop))
///     .signals(monitor_up.clone());
/// let manager = ComponentSpec::new(ComponentFn::arc("manager", noop, noop))
///     .after(monitor_up);
///
/// assert_eq!(manager.waits_for().len(), 1);
/// assert!(monitor.fulfils().is_some());
/// ```
#[derive(Clone)]
pub struct ComponentSpec {
    component: ComponentRef,
    after: Vec<ReadySignal>,
    signals: Option<ReadySignal>,
}

impl ComponentSpec {
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            after: Vec::new(),
            signals: None,
        }
    }

    /// Waits for `barrier` before Configure.
    pub fn after(mut self, barrier: ReadySignal) -> Self {
        self.after.push(barrier);
        self
    }

    /// Fulfils `barrier` once Configure succeeds.
    pub fn signals(mut self, barrier: ReadySignal) -> Self {
        self.signals = Some(barrier);
        self
    }

    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    /// Convenience: returns the component name.
    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn waits_for(&self) -> &[ReadySignal] {
        &self.after
    }

    pub fn fulfils(&self) -> Option<&ReadySignal> {
        self.signals.as_ref()
    }
}

impl From<ComponentRef> for ComponentSpec {
    fn from(component: ComponentRef) -> Self {
        Self::new(component)
    }
}
