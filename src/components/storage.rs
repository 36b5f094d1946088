//! Storage daemon (`osd.<id>`) backed by a qcow2 image on a network block device.
//!
//! ## Configure
//! ```text
//! dmsetup remove (stale mapping, ignored) ─► rm -r /dev/ceph-vg-<id>
//!   ─► qemu-img create ─► ensure nbd support
//!   ─► [attach lock] next_free ─► qemu-nbd --connect [/attach lock]
//!   ─► pvcreate ─► vgcreate ─► lvcreate ─► ceph-volume lvm create
//! ```
//!
//! The attach lock is shared by all storage daemons built from the same
//! [`DeviceAllocator`], so two of them never pick the same device in-process.
//!
//! `ceph-volume` keeps the osd directory and reads the bootstrap keyring under
//! a fixed `/var/lib/ceph`, so Configure refuses any other data dir up front.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::components::{Component, steps};
use crate::config::Config;
use crate::device::{DeviceAllocator, DeviceHandle};
use crate::error::ComponentError;
use crate::exec::{self, ExecError, Invocation};
use crate::logs::LogStream;

use super::FOLLOW_POLL;

/// Data dir `ceph-volume` uses regardless of configuration.
const VOLUME_DATA_DIR: &str = "/var/lib/ceph";

/// LVM must not wait for udev inside a container.
const LVM_ENV: (&str, &str) = ("DM_DISABLE_UDEV", "1");

#[derive(Clone, Debug)]
pub struct StorageDaemon {
    cfg: Arc<Config>,
    id: u32,
    name: String,
    devices: DeviceAllocator,
}

impl StorageDaemon {
    pub fn new(cfg: Arc<Config>, id: u32, devices: DeviceAllocator) -> Self {
        Self {
            cfg,
            id,
            name: format!("osd (osd.{id})"),
            devices,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn volume_group(&self) -> String {
        format!("ceph-vg-{}", self.id)
    }

    fn image(&self) -> PathBuf {
        self.cfg
            .data_dir
            .join("disk")
            .join(format!("osd-{}.qcow2", self.id))
    }

    fn lvm(&self, program: &str) -> Invocation {
        Invocation::new(program).env(LVM_ENV.0, LVM_ENV.1)
    }

    /// Removes the device-mapper node a previous run may have left behind.
    pub fn stale_mapping_command(&self) -> Invocation {
        Invocation::new("/usr/sbin/dmsetup").args([
            "remove".to_string(),
            "-v".to_string(),
            format!("ceph--vg--{}-osd", self.id),
        ])
    }

    pub fn image_command(&self) -> Invocation {
        Invocation::new("qemu-img").args([
            "create".to_string(),
            "-f".to_string(),
            "qcow2".to_string(),
            self.image().display().to_string(),
            self.cfg.image_size.clone(),
        ])
    }

    pub fn attach_command(&self, device: &DeviceHandle) -> Invocation {
        Invocation::new("qemu-nbd").args([
            format!("--connect={device}"),
            self.image().display().to_string(),
        ])
    }

    /// pvcreate, vgcreate and lvcreate on the attached device.
    pub fn volume_commands(&self, device: &DeviceHandle) -> Vec<(&'static str, Invocation)> {
        let vg = self.volume_group();
        let dev = device.to_string();
        vec![
            ("create physical volume", self.lvm("pvcreate").arg(dev.clone())),
            ("create volume group", self.lvm("vgcreate").args([vg.clone(), dev])),
            (
                "create logical volume",
                self.lvm("lvcreate").args(["-l", "100%FREE", "-n", "osd", vg.as_str()]),
            ),
        ]
    }

    pub fn prepare_command(&self) -> Invocation {
        self.cfg.ceph_command("ceph-volume").args([
            "lvm".to_string(),
            "create".to_string(),
            "--no-systemd".to_string(),
            "--data".to_string(),
            format!("{}/osd", self.volume_group()),
            "--osd-id".to_string(),
            self.id.to_string(),
        ])
    }

    pub fn daemon(&self) -> Invocation {
        self.cfg.ceph_command("ceph-osd").args(["-f".to_string(), "--id".to_string(), self.id.to_string()])
    }

    fn check_volume_layout(&self) -> Result<(), ComponentError> {
        if self.cfg.data_dir == Path::new(VOLUME_DATA_DIR) {
            return Ok(());
        }
        Err(ComponentError::configuration(
            "check data dir",
            format!(
                "ceph-volume keeps osd state under {VOLUME_DATA_DIR}, not {}",
                self.cfg.data_dir.display()
            ),
        ))
    }

    async fn clear_stale_state(&self, ctx: &CancellationToken) -> Result<(), ComponentError> {
        match exec::output(&self.stale_mapping_command(), ctx).await {
            Ok(_) => {}
            Err(ExecError::Canceled) => return Err(ComponentError::Canceled),
            Err(e) => tracing::debug!(osd = self.id, error = %e, "no stale device mapping"),
        }

        let vg_dir = self.cfg.device_root.join(self.volume_group());
        match tokio::fs::remove_dir_all(&vg_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ComponentError::configuration(
                format!("remove {}", vg_dir.display()),
                e,
            )),
        }
    }

    /// Picks a free device and attaches the image to it, one daemon at a time.
    async fn attach(&self, ctx: &CancellationToken) -> Result<DeviceHandle, ComponentError> {
        self.devices.ensure_support(ctx).await?;

        let _guard = self.devices.lock_attach().await;
        let device = self.devices.next_free().await?;
        tracing::info!(osd = self.id, device = %device, "attaching image");
        steps::run_step(&self.attach_command(&device), "attach image", ctx).await?;
        Ok(device)
    }
}

#[async_trait]
impl Component for StorageDaemon {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        self.check_volume_layout()?;
        self.clear_stale_state(&ctx).await?;

        if let Some(disk_dir) = self.image().parent() {
            steps::make_dir(disk_dir).await?;
        }
        steps::run_step(&self.image_command(), "create image", &ctx).await?;

        let device = self.attach(&ctx).await?;
        for (step, inv) in self.volume_commands(&device) {
            steps::run_step(&inv, step, &ctx).await?;
        }

        steps::run_step(&self.prepare_command(), "prepare storage daemon", &ctx).await?;
        Ok(())
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        steps::run_daemon(&self.daemon(), &ctx).await
    }

    async fn logs(&self) -> io::Result<LogStream> {
        LogStream::follow(self.cfg.log_file(&format!("osd.{}", self.id)), FOLLOW_POLL).await
    }
}
