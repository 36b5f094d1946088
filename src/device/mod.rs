//! Block-device allocation for storage daemon images.
//!
//! ## Contents
//! - [`DeviceAllocator`] ensures kernel support for a device class and picks a
//!   free device from the host device table
//! - [`DeviceHandle`] the path of a selected device node
//!
//! ## Quick wiring
//! ```text
//! StorageDaemon::configure()
//!      ├─► allocator.ensure_support()          (modprobe, then existence check)
//!      ├─► allocator.lock_attach().await       (one attachment at a time in-process)
//!      ├─► allocator.next_free()               (random pick among unmarked devices)
//!      └─► qemu-nbd --connect=<handle> <image> (marks the device busy)
//! ```
//!
//! The allocator itself only reads the device table: selection is advisory and
//! another process can still claim the same device between selection and
//! attachment.

mod allocator;

pub use allocator::{DeviceAllocator, DeviceEntry, DeviceHandle};
