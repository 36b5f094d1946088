use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cephvisor::{
    ClusterIdentity, Config, LogWriter, Owner, RuntimeError, Subscribe, Supervisor,
    SupervisorConfig, Topology, write_cluster_config,
};

#[derive(Parser, Debug)]
#[command(name = "cephvisor")]
#[command(about = "Bootstraps and supervises a single-node Ceph cluster", long_about = None)]
struct Cli {
    /// Number of storage daemons.
    #[arg(long, default_value_t = 1)]
    osds: u32,

    #[arg(long, default_value = "a")]
    manager_id: String,

    /// Seconds to wait for components to stop after shutdown begins.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    grace: u64,

    #[arg(long, value_name = "DIR")]
    conf_dir: Option<PathBuf>,

    /// Daemon state directory; storage daemons only run with the default.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Size of each storage daemon's image (qemu-img notation).
    #[arg(long, default_value = "10G")]
    image_size: String,

    #[arg(long)]
    no_dashboard: bool,

    #[arg(long)]
    no_gateway: bool,

    /// Service account owning the cluster's files.
    #[arg(long, default_value = "ceph")]
    account: String,
}

impl Cli {
    fn config(&self, owner: Owner) -> Config {
        let mut cfg = Config {
            owner,
            image_size: self.image_size.clone(),
            ..Config::default()
        };
        if let Some(dir) = &self.conf_dir {
            cfg.conf_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            cfg.log_dir = dir.clone();
        }
        cfg
    }

    fn topology(&self) -> Topology {
        Topology {
            manager_id: self.manager_id.clone(),
            osds: self.osds,
            gateway: !self.no_gateway,
            dashboard: !self.no_dashboard,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "cephvisor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RuntimeError> {
    let owner = Owner::lookup(&cli.account)?;
    let cfg = Arc::new(cli.config(owner));

    let identity = ClusterIdentity::generate();
    let path = write_cluster_config(&cfg, &identity).await?;
    tracing::info!(fsid = %identity, path = %path.display(), "wrote cluster configuration");

    let sup_cfg = SupervisorConfig {
        grace: Duration::from_secs(cli.grace),
        ..SupervisorConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
    let sup = Supervisor::builder(sup_cfg).with_subscribers(subs).build();

    sup.run(cli.topology().specs(cfg, identity)).await
}
