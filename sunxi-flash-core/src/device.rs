use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// A block device discovered on the system.
///
/// The fields mirror the columns requested from `lsblk` in the
/// [`crate::lsblk`] module. A fresh set of records is produced on every
/// enumeration call; nothing is cached or mutated afterwards.
#[derive(Clone, Debug, Deserialize)]
pub struct BlockDevice {
    /// The kernel-provided name of the device (e.g. "sdb").
    pub name: String,
    /// Human-readable capacity as reported by lsblk (e.g. "7.5G").
    #[serde(default)]
    pub size: Option<String>,
    /// Device type: "disk", "part", "loop", "rom", ...
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    /// Transport the device is attached over (e.g. "usb", "sata").
    #[serde(default)]
    pub tran: Option<String>,
    /// Device model string, if the hardware reports one.
    #[serde(default)]
    pub model: Option<String>,
    /// Current mount point of the device node itself, if any.
    #[serde(default)]
    pub mountpoint: Option<String>,
    /// Whether the kernel flags the device as hot-pluggable.
    #[serde(default)]
    pub hotplug: Option<bool>,
}

impl BlockDevice {
    /// Whether this device is a removable whole-disk target.
    ///
    /// A candidate must be a disk (not a partition or loop device) and
    /// either be flagged hot-pluggable or sit on the USB transport.
    pub fn is_removable(&self) -> bool {
        let is_disk = self.device_type.as_deref() == Some("disk");
        let removable =
            self.hotplug.unwrap_or(false) || self.tran.as_deref() == Some("usb");
        is_disk && removable
    }

    /// The raw device node, e.g. `/dev/sdb`.
    pub fn path(&self) -> PathBuf {
        PathBuf::from("/dev").join(&self.name)
    }

    /// The device node of the given partition.
    ///
    /// Devices whose name ends in a digit (`mmcblk0`, `nvme0n1`) separate
    /// the partition index with a `p`; `sdX`-style names append it directly.
    pub fn partition(&self, index: u32) -> PathBuf {
        let node = if self.name.ends_with(|c: char| c.is_ascii_digit()) {
            format!("{}p{}", self.name, index)
        } else {
            format!("{}{}", self.name, index)
        };
        PathBuf::from("/dev").join(node)
    }

    /// Capacity string for display, falling back to "?" when lsblk
    /// reported none.
    pub fn size_display(&self) -> &str {
        self.size.as_deref().unwrap_or("?")
    }
}

impl fmt::Display for BlockDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("Unknown model");

        let mount_info = match self.mountpoint.as_deref() {
            Some(mp) if !mp.is_empty() => format!("[Mounted at {mp}]"),
            _ => "[Not mounted]".to_string(),
        };

        write!(
            f,
            "{:<12} {:>8}  {}  {}",
            self.path().display(),
            self.size_display(),
            model,
            mount_info
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, device_type: &str, tran: Option<&str>, hotplug: bool) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            size: Some("7.5G".to_string()),
            device_type: Some(device_type.to_string()),
            tran: tran.map(str::to_string),
            model: Some("Cruzer ".to_string()),
            mountpoint: None,
            hotplug: Some(hotplug),
        }
    }

    #[test]
    fn usb_disk_is_removable() {
        assert!(device("sdb", "disk", Some("usb"), false).is_removable());
    }

    #[test]
    fn hotplug_disk_without_usb_transport_is_removable() {
        // SD cards behind an mmc controller report hotplug but not usb.
        assert!(device("mmcblk0", "disk", Some("mmc"), true).is_removable());
    }

    #[test]
    fn fixed_internal_disk_is_not_removable() {
        assert!(!device("sda", "disk", Some("sata"), false).is_removable());
    }

    #[test]
    fn partitions_and_loop_devices_are_never_removable() {
        assert!(!device("sdb1", "part", Some("usb"), true).is_removable());
        assert!(!device("loop0", "loop", None, false).is_removable());
    }

    #[test]
    fn partition_node_for_sd_style_names() {
        assert_eq!(
            device("sdb", "disk", Some("usb"), true).partition(1),
            PathBuf::from("/dev/sdb1")
        );
    }

    #[test]
    fn partition_node_for_digit_terminated_names() {
        assert_eq!(
            device("mmcblk0", "disk", None, true).partition(1),
            PathBuf::from("/dev/mmcblk0p1")
        );
    }

    #[test]
    fn display_trims_model_and_shows_mount_state() {
        let mut d = device("sdb", "disk", Some("usb"), true);
        let line = d.to_string();
        assert!(line.contains("/dev/sdb"));
        assert!(line.contains("Cruzer"));
        assert!(line.contains("[Not mounted]"));

        d.mountpoint = Some("/media/usb0".to_string());
        assert!(d.to_string().contains("[Mounted at /media/usb0]"));
    }
}
