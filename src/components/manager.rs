//! Manager daemon (`mgr.<id>`).

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::components::{Component, steps};
use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::Invocation;
use crate::logs::LogStream;

use super::FOLLOW_POLL;

const CAPS: &[&str] = &["mon", "allow profile mgr", "osd", "allow *", "mds", "allow *"];

#[derive(Clone, Debug)]
pub struct Manager {
    cfg: Arc<Config>,
    id: String,
    name: String,
}

impl Manager {
    pub fn new(cfg: Arc<Config>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            cfg,
            name: format!("manager (mgr.{id})"),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn dir(&self) -> PathBuf {
        self.cfg.daemon_dir("mgr", &self.id)
    }

    /// Fetches the manager's key from the monitor into `<dir>/keyring`.
    pub fn keyring_command(&self) -> Invocation {
        let entity = format!("mgr.{}", self.id);
        steps::auth_get_or_create(&self.cfg, &entity, CAPS, &self.dir().join("keyring"))
    }

    pub fn daemon(&self) -> Invocation {
        self.cfg.ceph_command("ceph-mgr").args(["-f", "-i", self.id.as_str()])
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        let dir = self.dir();
        steps::make_dir(&dir).await?;
        steps::run_step_within(
            &self.keyring_command(),
            "create manager keyring",
            self.cfg.auth_timeout,
            &ctx,
        )
        .await?;
        steps::hand_over_tree(&self.cfg.owner, &dir)
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        steps::run_daemon(&self.daemon(), &ctx).await
    }

    async fn logs(&self) -> io::Result<LogStream> {
        LogStream::follow(self.cfg.log_file(&format!("mgr.{}", self.id)), FOLLOW_POLL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn manager(id: &str) -> Manager {
        let cfg = Config::default().rooted_at(Path::new("/scratch"));
        Manager::new(Arc::new(cfg), id)
    }

    #[test]
    fn name_carries_the_instance() {
        assert_eq!(manager("x").name(), "manager (mgr.x)");
    }

    #[test]
    fn keyring_is_written_into_the_daemon_dir() {
        let inv = manager("a").keyring_command();
        assert_eq!(inv.program(), "ceph");
        assert_eq!(inv.arguments()[2], "mgr.a");
        assert_eq!(
            inv.stdout_path().map(|p| p.as_path()),
            Some(Path::new("/scratch/var/lib/ceph/mgr/ceph-a/keyring"))
        );
    }

    #[test]
    fn daemon_uses_the_instance_id() {
        assert_eq!(manager("b").daemon().to_string(), "ceph-mgr -f -i b");
    }
}
