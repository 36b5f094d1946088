//! # Device allocator.
//!
//! A device of the allocator's class (e.g. `nbd3`) is **free** when its entry
//! in the device table has no `pid` marker file, and **busy** otherwise.
//! [`DeviceAllocator::next_free`] picks uniformly at random among the free
//! devices, which lowers the chance that concurrent callers collide.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::{self, ExecError, Invocation};

/// Marker file present while a device is attached.
const IN_USE_MARKER: &str = "pid";

/// Path of a selected device node, e.g. `/dev/nbd1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(PathBuf);

impl DeviceHandle {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for DeviceHandle {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One device table entry of the allocator's class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEntry {
    pub name: String,
    pub busy: bool,
}

/// Finds free block devices of one class.
///
/// Cloning is cheap; clones share the attach lock.
#[derive(Clone, Debug)]
pub struct DeviceAllocator {
    class: String,
    table: PathBuf,
    dev_root: PathBuf,
    loader: Invocation,
    attach: Arc<Mutex<()>>,
}

impl DeviceAllocator {
    /// Creates an allocator for devices named `<class><n>` in `table`.
    pub fn new(class: impl Into<String>, table: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        let class = class.into();
        Self {
            loader: Invocation::new("/sbin/modprobe").arg(class.clone()),
            class,
            table: table.into(),
            dev_root: dev_root.into(),
            attach: Arc::new(Mutex::new(())),
        }
    }

    /// Network block devices from the configured device table.
    pub fn nbd(cfg: &Config) -> Self {
        Self::new("nbd", &cfg.device_table, &cfg.device_root)
    }

    /// Replaces the command that loads the kernel module.
    pub fn with_loader(mut self, loader: Invocation) -> Self {
        self.loader = loader;
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Loads the kernel module (best effort) and checks the class exists.
    ///
    /// Only the existence check of `<table>/<class>0` is authoritative; a
    /// failing loader is ignored since the module may be built in.
    pub async fn ensure_support(&self, token: &CancellationToken) -> Result<(), ComponentError> {
        match exec::output(&self.loader, token).await {
            Ok(_) => {}
            Err(ExecError::Canceled) => return Err(ComponentError::Canceled),
            Err(e) => tracing::debug!(class = %self.class, error = %e, "module loader failed"),
        }

        let probe = self.table.join(format!("{}0", self.class));
        if tokio::fs::try_exists(&probe).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(ComponentError::UnsupportedKernelFeature {
                class: self.class.clone(),
            })
        }
    }

    /// Classifies every device of the class currently in the table.
    pub async fn scan(&self) -> io::Result<Vec<DeviceEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.table).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&self.class) {
                continue;
            }
            let busy = match tokio::fs::metadata(entry.path().join(IN_USE_MARKER)).await {
                Ok(_) => true,
                Err(e) => e.kind() != io::ErrorKind::NotFound,
            };
            entries.push(DeviceEntry { name, busy });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Returns the node path of a device that had no in-use marker.
    pub async fn next_free(&self) -> Result<DeviceHandle, ComponentError> {
        let entries = self
            .scan()
            .await
            .map_err(|e| ComponentError::configuration("scan device table", e))?;
        let free: Vec<&DeviceEntry> = entries.iter().filter(|e| !e.busy).collect();

        let picked = free
            .choose(&mut rand::rng())
            .ok_or_else(|| ComponentError::NoDeviceAvailable {
                class: self.class.clone(),
            })?;
        Ok(DeviceHandle(self.dev_root.join(&picked.name)))
    }

    /// Serializes select-and-attach sequences within this process.
    pub async fn lock_attach(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.attach).lock_owned().await
    }
}
