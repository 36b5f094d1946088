//! Manager dashboard module.
//!
//! There is no dashboard process: Configure waits until the manager lists the
//! `dashboard` module, Start enables it with SSL off and then completes. Its
//! output goes to the manager's log, so the dashboard's own stream is idle.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::components::Component;
use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::{self, Invocation};
use crate::logs::LogStream;
use crate::readiness::{MgrModuleQuery, ModuleQuery, ReadinessPoller};

const MODULE: &str = "dashboard";

pub struct Dashboard {
    cfg: Arc<Config>,
    poller: ReadinessPoller,
    query: Arc<dyn ModuleQuery>,
}

impl Dashboard {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self {
            poller: ReadinessPoller::from_config(&cfg),
            query: Arc::new(MgrModuleQuery::new(&cfg)),
            cfg,
        }
    }

    /// Replaces the module listing used while waiting for the manager.
    pub fn with_query(mut self, query: Arc<dyn ModuleQuery>) -> Self {
        self.query = query;
        self
    }

    pub fn with_poller(mut self, poller: ReadinessPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn enable_commands(&self) -> Vec<(&'static str, Invocation)> {
        vec![
            (
                "enable dashboard",
                self.cfg.ceph_command("ceph").args(["mgr", "module", "enable", MODULE]),
            ),
            (
                "disable dashboard ssl",
                self.cfg.ceph_command("ceph").args(["config", "set", "mgr", "mgr/dashboard/ssl", "false"]),
            ),
        ]
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Component for Dashboard {
    fn name(&self) -> &str {
        MODULE
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        self.poller.wait_for(self.query.as_ref(), MODULE, &ctx).await
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        for (step, inv) in self.enable_commands() {
            tracing::debug!(step, command = %inv, "dashboard");
            exec::output(&inv, &ctx)
                .await
                .map_err(|e| e.into_start())?;
        }
        Ok(())
    }

    async fn logs(&self) -> io::Result<LogStream> {
        Ok(LogStream::idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::{DisabledModule, ModuleList};
    use std::time::Duration;

    struct Listed(ModuleList);

    #[async_trait]
    impl ModuleQuery for Listed {
        async fn list(&self, _token: &CancellationToken) -> Result<ModuleList, ComponentError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl ModuleQuery for Broken {
        async fn list(&self, _token: &CancellationToken) -> Result<ModuleList, ComponentError> {
            Err(ComponentError::QueryFailed {
                reason: "connection refused".into(),
            })
        }
    }

    fn dashboard(query: Arc<dyn ModuleQuery>) -> Dashboard {
        Dashboard::new(Arc::new(Config::default()))
            .with_poller(ReadinessPoller::new(Duration::from_secs(3), Duration::from_secs(1)))
            .with_query(query)
    }

    #[tokio::test]
    async fn disabled_but_registered_module_is_ready() {
        let list = ModuleList {
            disabled: vec![DisabledModule { name: "dashboard".into() }],
            ..ModuleList::default()
        };
        dashboard(Arc::new(Listed(list)))
            .configure(CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_module_times_out() {
        let err = dashboard(Arc::new(Listed(ModuleList::default())))
            .configure(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ComponentError::ReadinessTimeout { ref module, .. } if module == "dashboard"));
    }

    #[tokio::test]
    async fn query_failure_is_not_masked() {
        let err = dashboard(Arc::new(Broken))
            .configure(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ComponentError::QueryFailed { .. }));
    }

    #[tokio::test]
    async fn logs_come_from_the_manager() {
        let stream = dashboard(Arc::new(Broken)).logs().await.unwrap();
        assert!(!stream.is_released());
    }

    #[test]
    fn start_enables_the_module_without_ssl() {
        let cmds = dashboard(Arc::new(Broken)).enable_commands();
        assert_eq!(cmds[0].1.to_string(), "ceph mgr module enable dashboard");
        assert_eq!(cmds[1].1.to_string(), "ceph config set mgr mgr/dashboard/ssl false");
    }
}
