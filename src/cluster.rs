//! # Cluster identity and configuration file.
//!
//! A [`ClusterIdentity`] is generated once per run and written into the
//! cluster configuration file, which every daemon and CLI tool reads from its
//! well-known location.

use std::fmt;
use std::path::PathBuf;

use uuid::Uuid;

use crate::config::Config;
use crate::error::RuntimeError;

const CLUSTER_CONFIG_TEMPLATE: &str = include_str!("../assets/ceph.conf.tmpl");

/// Unique identifier of the cluster (the fsid). Immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterIdentity(Uuid);

impl ClusterIdentity {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Renders the configuration template for `identity`.
pub fn render_cluster_config(cfg: &Config, identity: &ClusterIdentity) -> String {
    CLUSTER_CONFIG_TEMPLATE
        .replace("{{FSID}}", &identity.to_string())
        .replace("{{MON_HOST}}", &cfg.mon_addr)
        .replace("{{CONF_DIR}}", &cfg.conf_dir.to_string_lossy())
        .replace("{{LOG_DIR}}", &cfg.log_dir.to_string_lossy())
        .replace("{{DATA_DIR}}", &cfg.data_dir.to_string_lossy())
}

/// Writes `<conf_dir>/ceph.conf` and hands it to the service account.
pub async fn write_cluster_config(
    cfg: &Config,
    identity: &ClusterIdentity,
) -> Result<PathBuf, RuntimeError> {
    let path = cfg.cluster_config_file();
    let fail = |source| RuntimeError::ClusterConfig {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(&cfg.conf_dir).await.map_err(fail)?;
    tokio::fs::write(&path, render_cluster_config(cfg, identity))
        .await
        .map_err(fail)?;
    cfg.owner.chown(&path).map_err(fail)?;

    Ok(path)
}
