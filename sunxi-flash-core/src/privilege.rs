//! Startup privilege precondition.

use anyhow::{Result, bail};

/// Verifies the process is running with root privileges.
///
/// Writing to raw device nodes and mounting partitions both require root,
/// so this is checked once before any device work starts.
pub fn check_root() -> Result<()> {
    if !is_root() {
        bail!("root privileges are required to write to block devices (try: sudo sunxi-flash)");
    }
    Ok(())
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
