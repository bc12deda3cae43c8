//! Artifact path configuration.
//!
//! The tool never assumes a build workspace layout; every artifact it can
//! write to a device has its path supplied explicitly, either from a TOML
//! file or from command-line flags. An operation that needs a path which
//! was never configured fails at the point of use, not at startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Source paths for the artifacts that can be written to a device.
///
/// All options default to none. Unknown keys in a config file are rejected
/// so typos surface at startup instead of as "missing artifact" failures
/// later.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlashConfig {
    /// Compressed kernel image (zImage).
    pub kernel: Option<PathBuf>,
    /// Device-tree blob for the target board.
    pub dtb: Option<PathBuf>,
    /// Legacy U-Boot SPL image.
    pub uboot_legacy: Option<PathBuf>,
    /// Modern (mainline) U-Boot SPL image.
    pub uboot_modern: Option<PathBuf>,
    /// Legacy-U-Boot hardware description (script.bin). Optional on the
    /// boot partition.
    pub script_bin: Option<PathBuf>,
    /// Compiled mainline boot script (boot.scr). Optional on the boot
    /// partition.
    pub boot_scr: Option<PathBuf>,
}

impl FlashConfig {
    /// Loads a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Returns `self` with any path set in `overrides` taking precedence.
    ///
    /// Used to layer command-line flags over a config file.
    pub fn merged_with(self, overrides: FlashConfig) -> FlashConfig {
        FlashConfig {
            kernel: overrides.kernel.or(self.kernel),
            dtb: overrides.dtb.or(self.dtb),
            uboot_legacy: overrides.uboot_legacy.or(self.uboot_legacy),
            uboot_modern: overrides.uboot_modern.or(self.uboot_modern),
            script_bin: overrides.script_bin.or(self.script_bin),
            boot_scr: overrides.boot_scr.or(self.boot_scr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_a_full_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
kernel = "/build/linux/arch/arm/boot/zImage"
dtb = "/build/linux/arch/arm/boot/dts/sun5i-a13-inet-86ve-rev02.dtb"
uboot_legacy = "/build/u-boot-legacy/u-boot-sunxi-with-spl.bin"
uboot_modern = "/build/u-boot/u-boot-sunxi-with-spl.bin"
script_bin = "/build/configs/script.bin"
boot_scr = "/build/u-boot/boot.scr"
"#
        )
        .unwrap();

        let config = FlashConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.kernel.as_deref(),
            Some(Path::new("/build/linux/arch/arm/boot/zImage"))
        );
        assert!(config.boot_scr.is_some());
    }

    #[test]
    fn all_options_default_to_none() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"kernel = "/k/zImage""#).unwrap();

        let config = FlashConfig::from_file(file.path()).unwrap();
        assert!(config.kernel.is_some());
        assert!(config.dtb.is_none());
        assert!(config.uboot_legacy.is_none());
        assert!(config.script_bin.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"kernel_path = "/k/zImage""#).unwrap();

        assert!(FlashConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(FlashConfig::from_file(Path::new("/no/such/config.toml")).is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let base = FlashConfig {
            kernel: Some(PathBuf::from("/file/zImage")),
            dtb: Some(PathBuf::from("/file/board.dtb")),
            ..Default::default()
        };
        let overrides = FlashConfig {
            kernel: Some(PathBuf::from("/flag/zImage")),
            ..Default::default()
        };

        let merged = base.merged_with(overrides);
        assert_eq!(merged.kernel.as_deref(), Some(Path::new("/flag/zImage")));
        assert_eq!(merged.dtb.as_deref(), Some(Path::new("/file/board.dtb")));
    }
}
