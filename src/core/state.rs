//! # Per-component lifecycle state.
//!
//! [`StateTracker`] holds the authoritative [`LifecycleState`] of every
//! supervised component, keyed by registration index (component names are
//! labels only and may repeat).
//!
//! ## Rules
//! - Forward progress follows the chain
//!   `Unconfigured → Configuring → Configured → Starting → Running`.
//! - `Stopped` and `Failed` are reachable from every non-terminal state.
//! - Once terminal, every further transition is **rejected**, so each
//!   component ends in exactly one of `Stopped` / `Failed`.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle state of one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unconfigured,
    Configuring,
    Configured,
    Starting,
    Running,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Configured => "configured",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_become(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Stopped | Failed)
                | (Unconfigured, Configuring)
                | (Configuring, Configured)
                | (Configured, Starting)
                | (Starting, Running)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time state of one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentState {
    pub component: Arc<str>,
    pub state: LifecycleState,
}

/// Index of a registered component.
pub(crate) type UnitId = usize;

/// Thread-safe table of lifecycle states.
#[derive(Debug, Default)]
pub(crate) struct StateTracker {
    entries: RwLock<Vec<ComponentState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component in `Unconfigured` and returns its id.
    pub fn register(&self, component: Arc<str>) -> UnitId {
        let mut entries = self.write();
        entries.push(ComponentState {
            component,
            state: LifecycleState::Unconfigured,
        });
        entries.len() - 1
    }

    /// Applies `next` if legal; returns false for rejected transitions.
    pub fn transition(&self, id: UnitId, next: LifecycleState) -> bool {
        let mut entries = self.write();
        match entries.get_mut(id) {
            Some(entry) if entry.state.can_become(next) => {
                entry.state = next;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: UnitId) -> Option<LifecycleState> {
        self.read().get(id).map(|e| e.state)
    }

    /// States of all components, in registration order.
    pub fn snapshot(&self) -> Vec<ComponentState> {
        self.read().clone()
    }

    /// Sorted names of components that have not reached a terminal state.
    pub fn unfinished(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .iter()
            .filter(|e| !e.state.is_terminal())
            .map(|e| e.component.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ComponentState>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ComponentState>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn full_forward_chain_is_accepted() {
        let t = StateTracker::new();
        let id = t.register("monitor".into());
        for next in [Configuring, Configured, Starting, Running, Stopped] {
            assert!(t.transition(id, next), "{next}");
        }
        assert_eq!(t.get(id), Some(Stopped));
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let t = StateTracker::new();
        let id = t.register("manager".into());
        assert!(!t.transition(id, Running));
        assert!(!t.transition(id, Configured));
        assert_eq!(t.get(id), Some(Unconfigured));
    }

    #[test]
    fn exactly_one_terminal_state() {
        let t = StateTracker::new();
        let id = t.register("osd.0".into());
        assert!(t.transition(id, Configuring));
        assert!(t.transition(id, Failed));

        for next in [Stopped, Failed, Configuring, Running] {
            assert!(!t.transition(id, next));
        }
        assert_eq!(t.get(id), Some(Failed));
    }

    #[test]
    fn duplicate_names_are_tracked_separately() {
        let t = StateTracker::new();
        let a = t.register("osd".into());
        let b = t.register("osd".into());
        t.transition(a, Stopped);

        assert_eq!(t.get(b), Some(Unconfigured));
        assert_eq!(t.unfinished(), vec!["osd".to_string()]);
    }

    #[test]
    fn unknown_id_is_rejected() {
        let t = StateTracker::new();
        assert!(!t.transition(7, Stopped));
        assert_eq!(t.get(7), None);
    }
}
