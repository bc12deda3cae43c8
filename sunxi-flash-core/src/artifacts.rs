//! Resolution and reporting of the build artifacts a run can write.

use crate::config::FlashConfig;
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// The roles an artifact can play on the provisioned device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactRole {
    Kernel,
    DeviceTree,
    LegacyUboot,
    ModernUboot,
    ScriptBin,
    BootScr,
}

impl ArtifactRole {
    pub const ALL: [ArtifactRole; 6] = [
        ArtifactRole::Kernel,
        ArtifactRole::DeviceTree,
        ArtifactRole::LegacyUboot,
        ArtifactRole::ModernUboot,
        ArtifactRole::ScriptBin,
        ArtifactRole::BootScr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ArtifactRole::Kernel => "Kernel (zImage)",
            ArtifactRole::DeviceTree => "Device tree (DTB)",
            ArtifactRole::LegacyUboot => "U-Boot legacy",
            ArtifactRole::ModernUboot => "U-Boot modern",
            ArtifactRole::ScriptBin => "script.bin",
            ArtifactRole::BootScr => "boot.scr",
        }
    }

    /// Whether the boot partition works without this artifact.
    pub fn is_optional(self) -> bool {
        matches!(self, ArtifactRole::ScriptBin | ArtifactRole::BootScr)
    }
}

/// Resolution state of one artifact at startup.
#[derive(Clone, Debug)]
pub struct ArtifactStatus {
    pub role: ArtifactRole,
    pub path: Option<PathBuf>,
    pub exists: bool,
}

/// The artifact paths for a run, resolved once at startup.
///
/// The existence flags in [`statuses`](ArtifactSet::statuses) are a
/// point-in-time report for the startup check; [`require`](ArtifactSet::require)
/// re-checks the filesystem at the moment an operation actually needs a
/// file.
#[derive(Clone, Debug)]
pub struct ArtifactSet {
    statuses: Vec<ArtifactStatus>,
}

impl ArtifactSet {
    pub fn resolve(config: &FlashConfig) -> Self {
        let statuses = ArtifactRole::ALL
            .into_iter()
            .map(|role| {
                let path = match role {
                    ArtifactRole::Kernel => config.kernel.clone(),
                    ArtifactRole::DeviceTree => config.dtb.clone(),
                    ArtifactRole::LegacyUboot => config.uboot_legacy.clone(),
                    ArtifactRole::ModernUboot => config.uboot_modern.clone(),
                    ArtifactRole::ScriptBin => config.script_bin.clone(),
                    ArtifactRole::BootScr => config.boot_scr.clone(),
                };
                let exists = path.as_deref().is_some_and(Path::exists);
                ArtifactStatus { role, path, exists }
            })
            .collect();
        Self { statuses }
    }

    /// Startup report, one entry per role in a fixed order.
    pub fn statuses(&self) -> &[ArtifactStatus] {
        &self.statuses
    }

    /// The configured path for a role, whether or not the file exists.
    pub fn path(&self, role: ArtifactRole) -> Option<&Path> {
        self.statuses
            .iter()
            .find(|s| s.role == role)
            .and_then(|s| s.path.as_deref())
    }

    /// The path for a role, failing if it is unconfigured or the file is
    /// missing right now.
    pub fn require(&self, role: ArtifactRole) -> Result<&Path> {
        let Some(path) = self.path(role) else {
            bail!("no path configured for {}", role.label());
        };
        if !path.exists() {
            bail!("{} not found at {}", role.label(), path.display());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolve_flags_existing_and_missing_paths() {
        let dir = TempDir::new().unwrap();
        let kernel = dir.path().join("zImage");
        fs::write(&kernel, b"kernel").unwrap();

        let config = FlashConfig {
            kernel: Some(kernel),
            dtb: Some(dir.path().join("missing.dtb")),
            ..Default::default()
        };
        let artifacts = ArtifactSet::resolve(&config);

        let by_role = |role| {
            artifacts
                .statuses()
                .iter()
                .find(|s| s.role == role)
                .unwrap()
                .clone()
        };
        assert!(by_role(ArtifactRole::Kernel).exists);
        assert!(!by_role(ArtifactRole::DeviceTree).exists);
        assert!(by_role(ArtifactRole::LegacyUboot).path.is_none());
    }

    #[test]
    fn statuses_cover_every_role_in_order() {
        let artifacts = ArtifactSet::resolve(&FlashConfig::default());
        let roles: Vec<ArtifactRole> = artifacts.statuses().iter().map(|s| s.role).collect();
        assert_eq!(roles, ArtifactRole::ALL);
    }

    #[test]
    fn require_fails_for_unconfigured_role() {
        let artifacts = ArtifactSet::resolve(&FlashConfig::default());
        let err = artifacts.require(ArtifactRole::LegacyUboot).unwrap_err();
        assert!(err.to_string().contains("no path configured"));
    }

    #[test]
    fn require_rechecks_existence_at_point_of_use() {
        let dir = TempDir::new().unwrap();
        let kernel = dir.path().join("zImage");
        fs::write(&kernel, b"kernel").unwrap();

        let config = FlashConfig {
            kernel: Some(kernel.clone()),
            ..Default::default()
        };
        let artifacts = ArtifactSet::resolve(&config);
        assert!(artifacts.require(ArtifactRole::Kernel).is_ok());

        // The startup snapshot said it existed; deletion must still be
        // caught when the operation runs.
        fs::remove_file(&kernel).unwrap();
        assert!(artifacts.require(ArtifactRole::Kernel).is_err());
    }

    #[test]
    fn only_the_boot_scripts_are_optional() {
        for role in ArtifactRole::ALL {
            let optional = matches!(role, ArtifactRole::ScriptBin | ArtifactRole::BootScr);
            assert_eq!(role.is_optional(), optional);
        }
    }
}
