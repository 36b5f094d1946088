//! Error types used by the orchestrator and by components.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors surfaced by the orchestrator itself (the single
//!   top-level failure of a run).
//! - [`ComponentError`]: errors raised by one component's Configure or Start
//!   phase, including the resource-allocation and readiness subtypes.
//!
//! Both types provide `as_label` for logs. [`ComponentError::Canceled`] is the
//! designated outcome of an orchestrator-initiated stop and is never surfaced
//! as the result of a run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Lifecycle phase a component error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// One-shot setup.
    Configure,
    /// Long-running execution.
    Start,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Start => "start",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Errors produced by the orchestrator.
///
/// Exactly one of these is returned by a failed run: the first component
/// failure, or a failure of the orchestrator's own setup and shutdown steps.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A component failed during one of its phases.
    #[error("{component}: {phase} failed: {source}")]
    Component {
        /// Label of the failing component.
        component: String,
        /// Phase the failure happened in.
        phase: Phase,
        /// The underlying component error.
        source: ComponentError,
    },

    /// The supervision unit of a component panicked.
    #[error("{component}: supervision unit panicked")]
    ComponentPanicked {
        /// Label of the component.
        component: String,
    },

    /// The cluster configuration file could not be written.
    #[error("could not write cluster configuration {path:?}: {source}")]
    ClusterConfig {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The service account could not be resolved.
    #[error("could not resolve service account {account:?}: {reason}")]
    Ownership {
        /// Account (user and group) name.
        account: String,
        /// Resolution failure.
        reason: String,
    },

    /// Components did not stop within the shutdown grace period.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Components that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use cephvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Component { .. } => "runtime_component_failed",
            RuntimeError::ComponentPanicked { .. } => "runtime_component_panicked",
            RuntimeError::ClusterConfig { .. } => "runtime_cluster_config",
            RuntimeError::Ownership { .. } => "runtime_ownership",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// True if this error only records an orchestrator-initiated stop.
    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            RuntimeError::Component {
                source: ComponentError::Canceled,
                ..
            }
        )
    }

    /// Label of the component this error is attributed to, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            RuntimeError::Component { component, .. }
            | RuntimeError::ComponentPanicked { component } => Some(component),
            _ => None,
        }
    }
}

/// # Errors produced by a component phase.
///
/// `UnsupportedKernelFeature`, `NoDeviceAvailable`, `ReadinessTimeout` and
/// `QueryFailed` are subtypes of a configuration failure; see
/// [`ComponentError::is_configuration_failure`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ComponentError {
    /// A setup step failed.
    #[error("{step}: {reason}")]
    Configuration {
        /// Short description of the step.
        step: String,
        /// What went wrong.
        reason: String,
    },

    /// The underlying process could not be launched or exited abnormally.
    #[error("{reason}: {output}")]
    Start {
        /// Exit status or launch failure.
        reason: String,
        /// Captured diagnostic output of the process.
        output: String,
    },

    /// The host does not support the device class.
    #[error("kernel does not support {class} devices")]
    UnsupportedKernelFeature {
        /// Device class prefix, e.g. `nbd`.
        class: String,
    },

    /// Every device of the class carries an in-use marker.
    #[error("no free {class} devices found")]
    NoDeviceAvailable {
        /// Device class prefix, e.g. `nbd`.
        class: String,
    },

    /// A capability did not appear before the deadline.
    #[error("timed out after {waited:?} waiting for module {module:?}")]
    ReadinessTimeout {
        /// Capability name.
        module: String,
        /// The deadline that expired.
        waited: Duration,
    },

    /// The capability query itself failed.
    #[error("module query failed: {reason}")]
    QueryFailed {
        /// Query failure.
        reason: String,
    },

    /// The phase ended because the orchestrator asked it to stop.
    #[error("context cancelled")]
    Canceled,
}

impl ComponentError {
    /// Builds a [`ComponentError::Configuration`].
    pub fn configuration(step: impl Into<String>, reason: impl fmt::Display) -> Self {
        ComponentError::Configuration {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use cephvisor::ComponentError;
    ///
    /// let err = ComponentError::NoDeviceAvailable { class: "nbd".into() };
    /// assert_eq!(err.as_label(), "component_no_device_available");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ComponentError::Configuration { .. } => "component_configuration",
            ComponentError::Start { .. } => "component_start",
            ComponentError::UnsupportedKernelFeature { .. } => "component_unsupported_kernel_feature",
            ComponentError::NoDeviceAvailable { .. } => "component_no_device_available",
            ComponentError::ReadinessTimeout { .. } => "component_readiness_timeout",
            ComponentError::QueryFailed { .. } => "component_query_failed",
            ComponentError::Canceled => "component_canceled",
        }
    }

    /// True for [`ComponentError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, ComponentError::Canceled)
    }

    /// True for setup failures and their allocation/readiness subtypes.
    pub fn is_configuration_failure(&self) -> bool {
        matches!(
            self,
            ComponentError::Configuration { .. }
                | ComponentError::UnsupportedKernelFeature { .. }
                | ComponentError::NoDeviceAvailable { .. }
                | ComponentError::ReadinessTimeout { .. }
                | ComponentError::QueryFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_and_readiness_errors_are_configuration_failures() {
        let errs = [
            ComponentError::configuration("mkdir", "denied"),
            ComponentError::UnsupportedKernelFeature { class: "nbd".into() },
            ComponentError::NoDeviceAvailable { class: "nbd".into() },
            ComponentError::ReadinessTimeout {
                module: "dashboard".into(),
                waited: Duration::from_secs(120),
            },
            ComponentError::QueryFailed { reason: "boom".into() },
        ];
        for err in errs {
            assert!(err.is_configuration_failure(), "{}", err.as_label());
        }

        assert!(!ComponentError::Canceled.is_configuration_failure());
        let start = ComponentError::Start {
            reason: "exit status: 1".into(),
            output: String::new(),
        };
        assert!(!start.is_configuration_failure());
    }

    #[test]
    fn canceled_component_error_is_not_a_failure() {
        let err = RuntimeError::Component {
            component: "monitor".into(),
            phase: Phase::Start,
            source: ComponentError::Canceled,
        };
        assert!(err.is_canceled());
        assert_eq!(err.component(), Some("monitor"));

        let err = RuntimeError::Component {
            component: "monitor".into(),
            phase: Phase::Configure,
            source: ComponentError::configuration("create keyring", "exit status: 1"),
        };
        assert!(!err.is_canceled());
        assert_eq!(
            err.to_string(),
            "monitor: configure failed: create keyring: exit status: 1"
        );
    }
}
