//! Raw U-Boot SPL writes to the device node.
//!
//! The Allwinner boot ROM loads the SPL from a fixed location on the
//! medium: 8 KiB in, leaving the first sectors free for the partition
//! table. The offset is expressed in 1024-byte blocks to match the layout
//! documents; moving it renders the device non-bootable.

use crate::artifacts::ArtifactRole;
use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Block size the sunxi SPL offset is specified in.
pub const SPL_BLOCK_SIZE: u64 = 1024;
/// SPL location in [`SPL_BLOCK_SIZE`] blocks from the start of the medium.
pub const SPL_OFFSET_BLOCKS: u64 = 8;
/// SPL location in bytes: 8 KiB.
pub const SPL_BYTE_OFFSET: u64 = SPL_BLOCK_SIZE * SPL_OFFSET_BLOCKS;

/// The two mutually exclusive U-Boot builds a device can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UbootVariant {
    Legacy,
    Modern,
}

impl UbootVariant {
    /// The artifact slot this variant is flashed from.
    pub fn role(self) -> ArtifactRole {
        match self {
            UbootVariant::Legacy => ArtifactRole::LegacyUboot,
            UbootVariant::Modern => ArtifactRole::ModernUboot,
        }
    }
}

impl fmt::Display for UbootVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UbootVariant::Legacy => write!(f, "legacy"),
            UbootVariant::Modern => write!(f, "modern"),
        }
    }
}

/// Writes a U-Boot SPL image to a device node at the sunxi boot offset.
///
/// The image is copied byte for byte in a single sequential pass starting
/// at [`SPL_BYTE_OFFSET`]; everything before the offset is left untouched.
/// The device file is fsynced before returning so a subsequent unplug
/// cannot lose the tail of the write.
///
/// # Arguments
///
/// * `source` - Path to the SPL image (`u-boot-sunxi-with-spl.bin`).
/// * `device` - Path to the raw device node (e.g. `/dev/sdb`).
/// * `running` - Cancellation flag; clearing it aborts the write.
/// * `on_start` - Called once with the total number of bytes to write.
/// * `on_progress` - Called with the running byte count as data is written.
///
/// # Errors
///
/// Fails if the source or device cannot be opened, an I/O error occurs,
/// or the operation is cancelled. A partially written bootloader is not
/// rolled back.
pub fn flash<F>(
    source: &Path,
    device: &Path,
    running: Arc<AtomicBool>,
    on_start: impl FnOnce(u64),
    mut on_progress: F,
) -> Result<()>
where
    F: FnMut(u64),
{
    let mut source_file = File::open(source)
        .with_context(|| format!("failed to open U-Boot image {}", source.display()))?;
    let image_len = source_file.metadata()?.len();

    let mut device_file = OpenOptions::new()
        .write(true)
        .open(device)
        .with_context(|| format!("failed to open device {} for writing", device.display()))?;
    device_file.seek(SeekFrom::Start(SPL_BYTE_OFFSET))?;

    on_start(image_len);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written: u64 = 0;
    while written < image_len {
        if !running.load(Ordering::SeqCst) {
            return Err(anyhow!("Operation cancelled by user"));
        }

        let to_read = std::cmp::min(BUFFER_SIZE as u64, image_len - written) as usize;
        source_file.read_exact(&mut buffer[..to_read])?;
        device_file.write_all(&buffer[..to_read])?;

        written += to_read as u64;
        on_progress(written);
    }

    device_file.flush()?;
    device_file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn flag(value: bool) -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(value))
    }

    #[test]
    fn spl_offset_is_eight_one_k_blocks() {
        assert_eq!(SPL_BYTE_OFFSET, 8192);
    }

    #[test]
    fn image_lands_at_the_spl_offset_and_preserves_the_prefix() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("u-boot-sunxi-with-spl.bin");
        let device = dir.path().join("fake-device");

        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&image, &payload).unwrap();
        // Pre-fill the "device" so untouched regions are detectable.
        fs::write(&device, vec![0xAAu8; 16 * 1024]).unwrap();

        flash(&image, &device, flag(true), |_| {}, |_| {}).unwrap();

        let contents = fs::read(&device).unwrap();
        assert!(contents[..8192].iter().all(|&b| b == 0xAA));
        assert_eq!(&contents[8192..8192 + payload.len()], &payload[..]);
        assert!(contents[8192 + payload.len()..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn progress_reports_total_then_counts_up_to_it() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("spl.bin");
        let device = dir.path().join("fake-device");
        fs::write(&image, vec![1u8; 4096]).unwrap();
        fs::write(&device, vec![0u8; 16 * 1024]).unwrap();

        let mut total = 0;
        let mut last = 0;
        flash(&image, &device, flag(true), |len| total = len, |n| last = n).unwrap();

        assert_eq!(total, 4096);
        assert_eq!(last, 4096);
    }

    #[test]
    fn missing_source_image_fails_before_touching_the_device() {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("fake-device");
        fs::write(&device, vec![0xAAu8; 16 * 1024]).unwrap();

        let missing = dir.path().join("nope.bin");
        assert!(flash(&missing, &device, flag(true), |_| {}, |_| {}).is_err());
        assert!(fs::read(&device).unwrap().iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn cleared_running_flag_cancels_the_write() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("spl.bin");
        let device = dir.path().join("fake-device");
        fs::write(&image, vec![1u8; 4096]).unwrap();
        fs::write(&device, vec![0u8; 16 * 1024]).unwrap();

        let err = flash(&image, &device, flag(false), |_| {}, |_| {}).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
