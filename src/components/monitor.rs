//! Monitor daemon (`mon.a`).
//!
//! Configure creates the monitor's keyrings, the initial monmap carrying the
//! cluster identity and the monitor store. The admin and bootstrap keyrings it
//! writes are what every other component authenticates with.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterIdentity;
use crate::components::{Component, steps};
use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::Invocation;
use crate::logs::LogStream;

use super::FOLLOW_POLL;

const MON_ID: &str = "a";

/// The cluster's single monitor.
#[derive(Clone, Debug)]
pub struct Monitor {
    cfg: Arc<Config>,
    identity: ClusterIdentity,
}

impl Monitor {
    pub fn new(cfg: Arc<Config>, identity: ClusterIdentity) -> Self {
        Self { cfg, identity }
    }

    fn mon_dir(&self) -> PathBuf {
        self.cfg.daemon_dir("mon", MON_ID)
    }

    fn mon_keyring(&self) -> PathBuf {
        self.cfg.run_dir.join("ceph.mon.keyring")
    }

    fn monmap(&self) -> PathBuf {
        self.cfg.run_dir.join("monmap")
    }

    /// Ordered Configure commands, each with the step it reports on failure.
    pub fn setup_commands(&self) -> Vec<(&'static str, Invocation)> {
        let mon_keyring = self.mon_keyring().display().to_string();
        let admin = self.cfg.admin_keyring().display().to_string();
        let bootstrap = self.cfg.bootstrap_osd_keyring().display().to_string();
        let monmap = self.monmap().display().to_string();
        let fsid = self.identity.to_string();

        vec![
            (
                "create monitor keyring",
                self.cfg.ceph_command("ceph-authtool").args([
                    "--create-keyring",
                    mon_keyring.as_str(),
                    "--gen-key",
                    "-n",
                    "mon.",
                    "--cap",
                    "mon",
                    "allow *",
                ]),
            ),
            (
                "create admin keyring",
                self.cfg.ceph_command("ceph-authtool").args([
                    "--create-keyring",
                    admin.as_str(),
                    "--gen-key",
                    "-n",
                    "client.admin",
                    "--cap",
                    "mon",
                    "allow *",
                    "--cap",
                    "osd",
                    "allow *",
                    "--cap",
                    "mds",
                    "allow *",
                    "--cap",
                    "mgr",
                    "allow *",
                ]),
            ),
            (
                "create bootstrap-osd keyring",
                self.cfg.ceph_command("ceph-authtool").args([
                    "--create-keyring",
                    bootstrap.as_str(),
                    "--gen-key",
                    "-n",
                    "client.bootstrap-osd",
                    "--cap",
                    "mon",
                    "profile bootstrap-osd",
                    "--cap",
                    "mgr",
                    "allow r",
                ]),
            ),
            (
                "import admin keyring",
                self.cfg.ceph_command("ceph-authtool").args([mon_keyring.as_str(), "--import-keyring", admin.as_str()]),
            ),
            (
                "import bootstrap-osd keyring",
                self.cfg.ceph_command("ceph-authtool").args([mon_keyring.as_str(), "--import-keyring", bootstrap.as_str()]),
            ),
            (
                "create monmap",
                self.cfg.ceph_command("monmaptool").args([
                    "--create",
                    "--addv",
                    MON_ID,
                    self.cfg.mon_addr.as_str(),
                    "--fsid",
                    fsid.as_str(),
                    monmap.as_str(),
                ]),
            ),
            (
                "create monitor store",
                self.cfg.ceph_command("ceph-mon").args([
                    "--mkfs",
                    "-i",
                    MON_ID,
                    "--monmap",
                    monmap.as_str(),
                    "--keyring",
                    mon_keyring.as_str(),
                ]),
            ),
        ]
    }

    pub fn daemon(&self) -> Invocation {
        self.cfg.ceph_command("ceph-mon").args(["-f", "-i", MON_ID])
    }
}

#[async_trait]
impl Component for Monitor {
    fn name(&self) -> &str {
        "monitor"
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        steps::make_dir(&self.mon_dir()).await?;
        steps::make_dir(&self.cfg.conf_dir).await?;
        steps::make_dir(&self.cfg.run_dir).await?;
        if let Some(parent) = self.cfg.bootstrap_osd_keyring().parent() {
            steps::make_dir(parent).await?;
        }

        for (step, inv) in self.setup_commands() {
            steps::run_step(&inv, step, &ctx).await?;
        }

        steps::hand_over_tree(&self.cfg.owner, &self.cfg.conf_dir)?;
        steps::hand_over(&self.cfg.owner, &self.mon_dir())
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        steps::run_daemon(&self.daemon(), &ctx).await
    }

    async fn logs(&self) -> io::Result<LogStream> {
        LogStream::follow(self.cfg.log_file(&format!("mon.{MON_ID}")), FOLLOW_POLL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn monitor() -> Monitor {
        let cfg = Config::default().rooted_at(Path::new("/scratch"));
        Monitor::new(Arc::new(cfg), ClusterIdentity::generate())
    }

    #[test]
    fn monmap_carries_the_cluster_identity() {
        let mon = monitor();
        let fsid = mon.identity.to_string();
        let (_, monmap) = mon
            .setup_commands()
            .into_iter()
            .find(|(step, _)| *step == "create monmap")
            .unwrap();

        let args = monmap.arguments();
        let at = args.iter().position(|a| a == "--fsid").unwrap();
        assert_eq!(args[at + 1], fsid);
        assert!(args.contains(&"/scratch/tmp/monmap".to_string()));
    }

    #[test]
    fn keyrings_are_created_before_the_store() {
        let steps: Vec<_> = monitor().setup_commands().into_iter().map(|(s, _)| s).collect();
        assert_eq!(steps.first(), Some(&"create monitor keyring"));
        assert_eq!(steps.last(), Some(&"create monitor store"));
        assert_eq!(steps.len(), 7);
    }

    #[test]
    fn admin_keyring_lands_in_the_conf_dir() {
        let (_, admin) = monitor().setup_commands().swap_remove(1);
        assert_eq!(admin.arguments()[1], "/scratch/etc/ceph/ceph.client.admin.keyring");
    }

    #[test]
    fn daemon_runs_in_the_foreground() {
        assert_eq!(monitor().daemon().to_string(), "ceph-mon -f -i a");
        assert_eq!(monitor().name(), "monitor");
    }
}
