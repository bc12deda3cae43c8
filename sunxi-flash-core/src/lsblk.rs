//! Removable block device discovery via `lsblk`.
//!
//! `lsblk -J` emits a JSON tree whose top level holds whole disks (plus
//! loop and rom devices); partitions only appear nested under their parent
//! disk, so filtering the top level by the removability predicate in
//! [`BlockDevice::is_removable`] is sufficient to exclude them.

use crate::device::BlockDevice;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::process::Command;

/// Columns requested from lsblk, matching the fields of [`BlockDevice`].
const LSBLK_COLUMNS: &str = "NAME,SIZE,TYPE,TRAN,MODEL,MOUNTPOINT,HOTPLUG";

#[derive(Debug, Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

/// Enumerates removable disks attached to the system.
///
/// Invokes `lsblk` and returns every whole disk that passes the
/// removability predicate, in enumeration order. The returned list may be
/// empty; that means no removable device is present.
///
/// # Errors
///
/// A failed invocation, a non-zero lsblk exit, or unparseable JSON is
/// returned as an error rather than an empty list, so callers can tell a
/// broken inventory query apart from "nothing plugged in".
pub fn removable_devices() -> Result<Vec<BlockDevice>> {
    let output = Command::new("lsblk")
        .args(["-J", "-o", LSBLK_COLUMNS])
        .output()
        .context("failed to invoke lsblk")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "lsblk exited with {}: {}",
            output.status,
            stderr.trim()
        );
    }

    let report: LsblkReport =
        serde_json::from_slice(&output.stdout).context("failed to parse lsblk JSON output")?;

    Ok(filter_removable(report.blockdevices))
}

fn filter_removable(devices: Vec<BlockDevice>) -> Vec<BlockDevice> {
    devices.into_iter().filter(BlockDevice::is_removable).collect()
}
