//! The closed set of cluster components.

use std::io;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::components::{Component, Dashboard, Gateway, Manager, Monitor, StorageDaemon};
use crate::error::ComponentError;
use crate::logs::LogStream;

/// One of the five component kinds a single-node cluster is made of.
#[derive(Debug)]
pub enum Daemon {
    Monitor(Monitor),
    Manager(Manager),
    Storage(StorageDaemon),
    Gateway(Gateway),
    Dashboard(Dashboard),
}

impl Daemon {
    fn inner(&self) -> &dyn Component {
        match self {
            Daemon::Monitor(c) => c,
            Daemon::Manager(c) => c,
            Daemon::Storage(c) => c,
            Daemon::Gateway(c) => c,
            Daemon::Dashboard(c) => c,
        }
    }

    /// Short kind label, e.g. `osd`.
    pub fn kind(&self) -> &'static str {
        match self {
            Daemon::Monitor(_) => "mon",
            Daemon::Manager(_) => "mgr",
            Daemon::Storage(_) => "osd",
            Daemon::Gateway(_) => "rgw",
            Daemon::Dashboard(_) => "dashboard",
        }
    }
}

#[async_trait]
impl Component for Daemon {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        self.inner().configure(ctx).await
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        self.inner().start(ctx).await
    }

    async fn logs(&self) -> io::Result<LogStream> {
        self.inner().logs().await
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for Daemon {
            fn from(c: $ty) -> Self {
                Daemon::$variant(c)
            }
        })*
    };
}

impl_from!(
    Monitor(Monitor),
    Manager(Manager),
    Storage(StorageDaemon),
    Gateway(Gateway),
    Dashboard(Dashboard),
);
