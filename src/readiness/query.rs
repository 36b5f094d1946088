//! # Manager module listing.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::{self, ExecError, Invocation};

/// Module lists as reported by `ceph mgr module ls --format=json`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ModuleList {
    #[serde(default, rename = "always_on_modules")]
    pub always_on: Vec<String>,
    #[serde(default, rename = "enabled_modules")]
    pub enabled: Vec<String>,
    #[serde(default, rename = "disabled_modules")]
    pub disabled: Vec<DisabledModule>,
}

/// A registered but disabled module; other reported fields are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DisabledModule {
    pub name: String,
}

impl ModuleList {
    /// Parses the JSON document printed by the manager.
    pub fn parse(raw: &str) -> Result<Self, ComponentError> {
        serde_json::from_str(raw).map_err(|e| ComponentError::QueryFailed {
            reason: format!("could not parse module list: {e}"),
        })
    }

    /// True if `name` is present in any of the three lists.
    pub fn contains(&self, name: &str) -> bool {
        self.always_on.iter().any(|m| m == name)
            || self.enabled.iter().any(|m| m == name)
            || self.disabled.iter().any(|m| m.name == name)
    }
}

/// Source of module lists.
#[async_trait]
pub trait ModuleQuery: Send + Sync + 'static {
    /// Returns the current lists, or `QueryFailed` if the query itself failed.
    async fn list(&self, token: &CancellationToken) -> Result<ModuleList, ComponentError>;
}

/// Lists modules through the `ceph` CLI.
#[derive(Clone, Debug)]
pub struct MgrModuleQuery {
    invocation: Invocation,
}

impl MgrModuleQuery {
    pub fn new(cfg: &Config) -> Self {
        Self {
            invocation: cfg
                .ceph_command("ceph")
                .args(["mgr", "module", "ls", "--format=json"]),
        }
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Uses a different command that prints the same JSON document.
    pub fn with_invocation(invocation: Invocation) -> Self {
        Self { invocation }
    }
}

#[async_trait]
impl ModuleQuery for MgrModuleQuery {
    async fn list(&self, token: &CancellationToken) -> Result<ModuleList, ComponentError> {
        match exec::output(&self.invocation, token).await {
            Ok(raw) => ModuleList::parse(&raw),
            Err(ExecError::Canceled) => Err(ComponentError::Canceled),
            Err(e) => Err(ComponentError::QueryFailed {
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "always_on_modules": ["balancer", "crash", "status"],
        "enabled_modules": ["iostat", "restful"],
        "disabled_modules": [
            {"name": "dashboard", "can_run": true, "error_string": "", "module_options": {}},
            {"name": "prometheus", "can_run": true, "error_string": ""}
        ]
    }"#;

    #[test]
    fn parses_manager_output() {
        let list = ModuleList::parse(SAMPLE).unwrap();
        assert_eq!(list.always_on, ["balancer", "crash", "status"]);
        assert_eq!(list.enabled, ["iostat", "restful"]);
        assert_eq!(list.disabled.len(), 2);
    }

    #[test]
    fn contains_searches_all_three_lists() {
        let list = ModuleList::parse(SAMPLE).unwrap();
        for present in ["crash", "restful", "dashboard"] {
            assert!(list.contains(present), "{present}");
        }
        assert!(!list.contains("rgw"));
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let list = ModuleList::parse(r#"{"enabled_modules": ["dashboard"]}"#).unwrap();
        assert!(list.contains("dashboard"));
        assert!(list.always_on.is_empty());
    }

    #[test]
    fn garbage_is_a_query_failure() {
        let err = ModuleList::parse("Error initializing cluster client").unwrap_err();
        assert!(matches!(err, ComponentError::QueryFailed { .. }));
    }

    #[tokio::test]
    async fn cli_query_parses_command_output() {
        let token = CancellationToken::new();
        let query = MgrModuleQuery::with_invocation(
            Invocation::new("echo").arg(r#"{"always_on_modules": ["status"]}"#),
        );
        let list = query.list(&token).await.unwrap();
        assert!(list.contains("status"));
    }

    #[tokio::test]
    async fn failing_cli_is_a_query_failure() {
        let token = CancellationToken::new();
        let query = MgrModuleQuery::with_invocation(
            Invocation::new("sh").args(["-c", "echo 'monclient: authenticate timed out' >&2; exit 1"]),
        );
        let err = query.list(&token).await.unwrap_err();
        match err {
            ComponentError::QueryFailed { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
