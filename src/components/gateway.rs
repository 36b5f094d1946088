//! Object gateway (`client.radosgw.gateway`).

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

const ENTITY: &str = "client.radosgw.gateway";
const CAPS: &[&str] = &["osd", "allow rwx", "mon", "allow rw"];

#[derive(Clone, Debug)]
pub struct Gateway {
    cfg: Arc<Config>,
}

impl Gateway {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self { cfg }
    }

    fn dir(&self) -> PathBuf {
        self.cfg.daemon_dir("radosgw", "radosgw.gateway")
    }

    pub fn keyring_command(&self) -> Invocation {
        steps::auth_get_or_create(&self.cfg, ENTITY, CAPS, &self.dir().join("keyring"))
    }

    pub fn daemon(&self) -> Invocation {
        self.cfg.ceph_command("radosgw").args(["-f", "-n", ENTITY])
    }
}

#[async_trait]
impl Component for Gateway {
    fn name(&self) -> &str {
        "rgw.gateway"
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        let dir = self.dir();
        steps::make_dir(&dir).await?;
        steps::run_step_within(
            &self.keyring_command(),
            "create gateway keyring",
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
        LogStream::follow(self.cfg.log_file(ENTITY), FOLLOW_POLL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn paths_follow_the_gateway_entity() {
        let cfg = Arc::new(Config::default());
        let gw = Gateway::new(cfg.clone());

        assert_eq!(
            gw.keyring_command().stdout_path().map(|p| p.as_path()),
            Some(Path::new("/var/lib/ceph/radosgw/ceph-radosgw.gateway/keyring"))
        );
        assert_eq!(
            cfg.log_file(ENTITY),
            Path::new("/var/log/ceph/ceph-client.radosgw.gateway.log")
        );
        assert_eq!(gw.daemon().to_string(), "radosgw -f -n client.radosgw.gateway");
    }
}
