//! The core, UI-agnostic library for the `sunxi-flash` provisioning utility.
//!
//! `sunxi-flash-core` turns a removable USB stick or SD card into boot
//! media for an Allwinner A13 (sun5i) board: it writes a U-Boot SPL image
//! at the fixed sunxi boot offset on the raw device, and copies the kernel
//! image, device-tree blob, and boot scripts onto the device's first
//! partition.
//!
//! The library is structured into several key modules:
//! - [`config`]: Artifact path configuration from TOML files and overrides.
//! - [`artifacts`]: Resolution and existence reporting of the configured
//!   artifacts.
//! - [`device`]: The `BlockDevice` record and the removability predicate.
//! - [`lsblk`]: Removable device discovery via `lsblk`.
//! - [`uboot`]: Raw SPL writes at the sunxi boot offset.
//! - [`provision`]: Mount, copy, sync, unmount of the boot partition, with
//!   guaranteed teardown.
//! - [`privilege`]: The root-privilege startup precondition.
//!
//! Long-running operations report progress via callbacks and never print,
//! so any front-end can render them however it chooses.
//!
//! ## Example: flashing U-Boot to the first removable device
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::{Arc, atomic::AtomicBool};
//! use anyhow::Result;
//! use sunxi_flash_core::{lsblk, uboot};
//!
//! fn main() -> Result<()> {
//!     let devices = lsblk::removable_devices()?;
//!     let device = devices.first().expect("no removable devices found");
//!
//!     // A shared flag to allow for graceful cancellation.
//!     let running = Arc::new(AtomicBool::new(true));
//!
//!     uboot::flash(
//!         Path::new("u-boot-sunxi-with-spl.bin"),
//!         &device.path(),
//!         running,
//!         |total| println!("writing {total} bytes"),
//!         |written| println!("{written} bytes written"),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod device;
pub mod lsblk;
pub mod privilege;
pub mod provision;
pub mod uboot;
