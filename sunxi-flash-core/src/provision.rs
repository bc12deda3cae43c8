//! Boot partition provisioning: mount, copy, sync, unmount.
//!
//! The mount is held by a guard so the partition is unmounted and the
//! mount point removed on every exit path, including mid-copy failures.

use crate::artifacts::{ArtifactRole, ArtifactSet};
use crate::device::BlockDevice;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Fixed mount point used while provisioning the boot partition.
pub const BOOT_MOUNT_POINT: &str = "/mnt/sunxi-flash-boot";

/// Name the kernel image takes on the boot partition.
pub const KERNEL_TARGET_NAME: &str = "zImage";
/// Name of the legacy-U-Boot hardware description on the boot partition.
pub const SCRIPT_BIN_TARGET_NAME: &str = "script.bin";
/// Name of the compiled boot script on the boot partition.
pub const BOOT_SCR_TARGET_NAME: &str = "boot.scr";

/// A mounted partition that is unmounted when dropped.
///
/// Dropping also removes the mount point directory. Both teardown steps
/// are best-effort; a failed unmount cannot be propagated out of drop.
pub struct MountGuard {
    mountpoint: PathBuf,
}

impl MountGuard {
    /// Creates the mount point (if needed) and mounts `partition` on it.
    ///
    /// On mount failure no guard is returned and the mount point
    /// directory is left in place; there is nothing mounted to clean up.
    pub fn mount(partition: &Path, mountpoint: &Path) -> Result<Self> {
        fs::create_dir_all(mountpoint)
            .with_context(|| format!("failed to create mount point {}", mountpoint.display()))?;

        let status = Command::new("mount")
            .arg(partition)
            .arg(mountpoint)
            .status()
            .context("failed to invoke mount")?;
        if !status.success() {
            bail!(
                "failed to mount {} at {} ({}); the partition may need formatting",
                partition.display(),
                mountpoint.display(),
                status
            );
        }

        Ok(Self {
            mountpoint: mountpoint.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.mountpoint
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        let _ = Command::new("umount").arg(&self.mountpoint).status();
        let _ = fs::remove_dir(&self.mountpoint);
    }
}

/// Copies the kernel set onto the first partition of `device`.
///
/// Steps: verify the partition node exists, mount it at
/// [`BOOT_MOUNT_POINT`], copy the kernel image and DTB (plus `script.bin`
/// and `boot.scr` when their sources exist), sync, and unmount. The
/// unmount and mount-point removal run regardless of how the copy or sync
/// stages end.
///
/// `on_copy` is called with the target file name just before each copy.
///
/// # Errors
///
/// Fails if the partition node is absent (the device likely needs
/// partitioning), the mount fails, a mandatory artifact is unconfigured
/// or missing, or a copy or sync step fails. None of these leave the
/// partition mounted.
pub fn copy_kernel_set<F>(
    artifacts: &ArtifactSet,
    device: &BlockDevice,
    on_copy: F,
) -> Result<()>
where
    F: FnMut(&str),
{
    let partition = device.partition(1);
    if !partition.exists() {
        bail!(
            "partition 1 ({}) not found; partition the device before copying boot files",
            partition.display()
        );
    }

    let guard = MountGuard::mount(&partition, Path::new(BOOT_MOUNT_POINT))?;
    copy_boot_files(artifacts, guard.path(), on_copy)?;
    flush_writes()?;
    Ok(())
}

/// Copies the boot files into `target`.
///
/// The kernel image and DTB are mandatory; `script.bin` and `boot.scr`
/// are copied only when their sources exist and are skipped silently
/// otherwise. Split out from the mount handling so the copy rules are
/// testable against a plain directory.
fn copy_boot_files<F>(artifacts: &ArtifactSet, target: &Path, mut on_copy: F) -> Result<()>
where
    F: FnMut(&str),
{
    let kernel = artifacts.require(ArtifactRole::Kernel)?;
    on_copy(KERNEL_TARGET_NAME);
    copy_file(kernel, &target.join(KERNEL_TARGET_NAME))?;

    let dtb = artifacts.require(ArtifactRole::DeviceTree)?;
    let dtb_name = dtb
        .file_name()
        .with_context(|| format!("DTB path {} has no file name", dtb.display()))?;
    on_copy(&dtb_name.to_string_lossy());
    copy_file(dtb, &target.join(dtb_name))?;

    let optional = [
        (ArtifactRole::ScriptBin, SCRIPT_BIN_TARGET_NAME),
        (ArtifactRole::BootScr, BOOT_SCR_TARGET_NAME),
    ];
    for (role, name) in optional {
        if let Some(source) = artifacts.path(role) {
            if source.exists() {
                on_copy(name);
                copy_file(source, &target.join(name))?;
            }
        }
    }

    Ok(())
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            target.display()
        )
    })?;
    Ok(())
}

/// Flushes buffered writes to the medium before the unmount.
///
/// Unmounting alone does not guarantee the data has reached a removable
/// device.
fn flush_writes() -> Result<()> {
    let status = Command::new("sync")
        .status()
        .context("failed to invoke sync")?;
    if !status.success() {
        bail!("sync exited with {status}");
    }
    Ok(())
}
