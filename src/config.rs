//! # Cluster configuration.
//!
//! Provides [`Config`]: every path, account and timeout the components need,
//! resolved once at startup and shared read-only (`Arc<Config>`) by all
//! component constructors.
//!
//! The supervisor runtime has its own settings in
//! [`SupervisorConfig`](crate::SupervisorConfig).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::Invocation;
use crate::ownership::Owner;

/// Environment variable every Ceph tool reads its configuration path from.
pub const CEPH_CONF_ENV: &str = "CEPH_CONF";

/// Paths, ownership and timeouts shared by all components.
///
/// ## Field semantics
/// - `conf_dir`: cluster configuration and admin keyring (`/etc/ceph`)
/// - `data_dir`: per-daemon state directories (`/var/lib/ceph`)
/// - `log_dir`: daemon log files, followed by the log multiplexer (`/var/log/ceph`)
/// - `run_dir`: scratch files used only while bootstrapping the monitor (`/tmp`)
/// - `device_table` / `device_root`: block-device table and node directory
/// - `auth_timeout`: bound on credential exchanges with the monitor
/// - `readiness_timeout` / `poll_interval`: manager module readiness polling
#[derive(Clone, Debug)]
pub struct Config {
    pub conf_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub run_dir: PathBuf,

    /// Host table of block devices (`/sys/block`).
    pub device_table: PathBuf,
    /// Directory holding device nodes (`/dev`).
    pub device_root: PathBuf,

    /// Account owning the cluster's files.
    pub owner: Owner,

    pub auth_timeout: Duration,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,

    /// Size of each storage daemon's backing image, in `qemu-img` notation.
    pub image_size: String,
    /// Monitor address vector written into the monmap and the config file.
    pub mon_addr: String,
}

impl Config {
    /// `<conf_dir>/ceph.conf`
    pub fn cluster_config_file(&self) -> PathBuf {
        self.conf_dir.join("ceph.conf")
    }

    /// A Ceph tool invocation pointed at [`cluster_config_file`](Self::cluster_config_file).
    pub fn ceph_command(&self, program: &str) -> Invocation {
        Invocation::new(program).env(CEPH_CONF_ENV, self.cluster_config_file().to_string_lossy())
    }

    /// `<conf_dir>/ceph.client.admin.keyring`
    pub fn admin_keyring(&self) -> PathBuf {
        self.conf_dir.join("ceph.client.admin.keyring")
    }

    /// `<data_dir>/bootstrap-osd/ceph.keyring`
    pub fn bootstrap_osd_keyring(&self) -> PathBuf {
        self.data_dir.join("bootstrap-osd").join("ceph.keyring")
    }

    /// Daemon log file `<log_dir>/ceph-<entity>.log`.
    pub fn log_file(&self, entity: &str) -> PathBuf {
        self.log_dir.join(format!("ceph-{entity}.log"))
    }

    /// Daemon state directory `<data_dir>/<kind>/ceph-<id>`.
    pub fn daemon_dir(&self, kind: &str, id: &str) -> PathBuf {
        self.data_dir.join(kind).join(format!("ceph-{id}"))
    }

    /// Re-roots every directory under `root`; used to run against a scratch tree.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.conf_dir = root.join("etc/ceph");
        self.data_dir = root.join("var/lib/ceph");
        self.log_dir = root.join("var/log/ceph");
        self.run_dir = root.join("tmp");
        self.device_table = root.join("sys/block");
        self.device_root = root.join("dev");
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - standard Ceph directories under `/etc`, `/var/lib` and `/var/log`
    /// - owner = the running process (replace with [`Owner::lookup`])
    /// - `auth_timeout = 2m`, `readiness_timeout = 2m`, `poll_interval = 1s`
    /// - `image_size = 10G`
    fn default() -> Self {
        Self {
            conf_dir: PathBuf::from("/etc/ceph"),
            data_dir: PathBuf::from("/var/lib/ceph"),
            log_dir: PathBuf::from("/var/log/ceph"),
            run_dir: PathBuf::from("/tmp"),
            device_table: PathBuf::from("/sys/block"),
            device_root: PathBuf::from("/dev"),
            owner: Owner::current(),
            auth_timeout: Duration::from_secs(120),
            readiness_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
            image_size: "10G".to_string(),
            mon_addr: "[v2:127.0.0.1:3300,v1:127.0.0.1:6789]".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_follow_ceph_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.cluster_config_file(), Path::new("/etc/ceph/ceph.conf"));
        assert_eq!(cfg.log_file("mgr.a"), Path::new("/var/log/ceph/ceph-mgr.a.log"));
        assert_eq!(cfg.daemon_dir("mon", "a"), Path::new("/var/lib/ceph/mon/ceph-a"));
        assert_eq!(
            cfg.bootstrap_osd_keyring(),
            Path::new("/var/lib/ceph/bootstrap-osd/ceph.keyring")
        );
    }

    #[test]
    fn ceph_commands_name_the_cluster_config() {
        let cfg = Config::default().rooted_at(Path::new("/srv/cluster"));
        let inv = cfg.ceph_command("ceph-mon");
        assert_eq!(inv.program(), "ceph-mon");
        assert_eq!(
            inv.envs(),
            [(CEPH_CONF_ENV.to_string(), "/srv/cluster/etc/ceph/ceph.conf".to_string())]
        );
    }

    #[test]
    fn rooted_at_moves_every_directory() {
        let cfg = Config::default().rooted_at(Path::new("/scratch"));
        for dir in [
            &cfg.conf_dir,
            &cfg.data_dir,
            &cfg.log_dir,
            &cfg.run_dir,
            &cfg.device_table,
            &cfg.device_root,
        ] {
            assert!(dir.starts_with("/scratch"), "{dir:?}");
        }
    }
}
