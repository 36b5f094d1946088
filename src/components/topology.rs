//! The component set of a single-node cluster.

use std::sync::Arc;

use crate::cluster::ClusterIdentity;
use crate::components::{ComponentSpec, Daemon, Dashboard, Gateway, Manager, Monitor, StorageDaemon};
use crate::config::Config;
use crate::core::ReadySignal;
use crate::device::DeviceAllocator;

/// Which components to run.
#[derive(Clone, Debug)]
pub struct Topology {
    pub manager_id: String,
    /// Number of storage daemons; ids are `0..osds`.
    pub osds: u32,
    pub gateway: bool,
    pub dashboard: bool,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            manager_id: "a".to_string(),
            osds: 1,
            gateway: true,
            dashboard: true,
        }
    }
}

impl Topology {
    /// Builds the specs in enumeration order: monitor, manager, storage
    /// daemons, gateway, dashboard.
    ///
    /// Every component except the monitor configures only after the monitor
    /// has configured. Storage daemons share one device allocator.
    pub fn specs(&self, cfg: Arc<Config>, identity: ClusterIdentity) -> Vec<ComponentSpec> {
        let monitor_up = ReadySignal::new("monitor");
        let devices = DeviceAllocator::nbd(&cfg);

        let mut daemons: Vec<Daemon> = vec![Manager::new(cfg.clone(), self.manager_id.clone()).into()];
        daemons.extend((0..self.osds).map(|id| Daemon::from(StorageDaemon::new(cfg.clone(), id, devices.clone()))));
        if self.gateway {
            daemons.push(Gateway::new(cfg.clone()).into());
        }
        if self.dashboard {
            daemons.push(Dashboard::new(cfg.clone()).into());
        }

        let monitor = ComponentSpec::new(Arc::new(Daemon::from(Monitor::new(cfg, identity))))
            .signals(monitor_up.clone());

        std::iter::once(monitor)
            .chain(
                daemons
                    .into_iter()
                    .map(|d| ComponentSpec::new(Arc::new(d)).after(monitor_up.clone())),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(specs: &[ComponentSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn default_topology_runs_every_kind() {
        let specs = Topology::default().specs(Arc::new(Config::default()), ClusterIdentity::generate());
        assert_eq!(
            names(&specs),
            ["monitor", "manager (mgr.a)", "osd (osd.0)", "rgw.gateway", "dashboard"]
        );
    }

    #[test]
    fn only_the_monitor_fulfils_the_barrier() {
        let topology = Topology {
            osds: 3,
            ..Topology::default()
        };
        let specs = topology.specs(Arc::new(Config::default()), ClusterIdentity::generate());

        assert_eq!(specs.len(), 7);
        assert!(specs[0].fulfils().is_some());
        assert!(specs[0].waits_for().is_empty());
        for spec in &specs[1..] {
            assert!(spec.fulfils().is_none());
            assert_eq!(spec.waits_for().len(), 1);
            assert_eq!(spec.waits_for()[0].name(), "monitor");
        }
    }

    #[test]
    fn optional_components_can_be_left_out() {
        let topology = Topology {
            manager_id: "x".into(),
            osds: 2,
            gateway: false,
            dashboard: false,
        };
        let specs = topology.specs(Arc::new(Config::default()), ClusterIdentity::generate());
        assert_eq!(
            names(&specs),
            ["monitor", "manager (mgr.x)", "osd (osd.0)", "osd (osd.1)"]
        );
    }
}
