use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sunxi_flash_core::artifacts::ArtifactSet;
use sunxi_flash_core::config::FlashConfig;
use sunxi_flash_core::device::BlockDevice;
use sunxi_flash_core::uboot::UbootVariant;
use sunxi_flash_core::{lsblk, privilege, provision, uboot};

/// Pause between a raw bootloader write and mounting the boot partition
/// in the composite modes, so the device can settle.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "sunxi-flash")]
#[command(about = "Provision Allwinner A13 boot media interactively", version)]
struct Cli {
    /// TOML file with artifact paths
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Kernel image (zImage)
    #[arg(long, value_name = "PATH")]
    kernel: Option<PathBuf>,

    /// Device-tree blob
    #[arg(long, value_name = "PATH")]
    dtb: Option<PathBuf>,

    /// Legacy U-Boot SPL image
    #[arg(long, value_name = "PATH")]
    uboot_legacy: Option<PathBuf>,

    /// Modern U-Boot SPL image
    #[arg(long, value_name = "PATH")]
    uboot_modern: Option<PathBuf>,

    /// Hardware description for legacy U-Boot (script.bin)
    #[arg(long, value_name = "PATH")]
    script_bin: Option<PathBuf>,

    /// Compiled boot script for modern U-Boot (boot.scr)
    #[arg(long, value_name = "PATH")]
    boot_scr: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available removable devices
    List,
}

/// One run provisions the selected device in one of these modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    CopyKernelSet,
    FlashLegacy,
    FlashModern,
    FlashLegacyThenCopy,
    FlashModernThenCopy,
    Exit,
}

impl Mode {
    const MENU: [(Mode, &'static str); 6] = [
        (Mode::CopyKernelSet, "Copy kernel (zImage), DTB and boot scripts"),
        (Mode::FlashLegacy, "Flash legacy U-Boot"),
        (Mode::FlashModern, "Flash modern U-Boot"),
        (Mode::FlashLegacyThenCopy, "Flash legacy U-Boot, then copy kernel set"),
        (Mode::FlashModernThenCopy, "Flash modern U-Boot, then copy kernel set"),
        (Mode::Exit, "Exit"),
    ];

    /// The bootloader variant this mode flashes, if any.
    fn bootloader(self) -> Option<UbootVariant> {
        match self {
            Mode::FlashLegacy | Mode::FlashLegacyThenCopy => Some(UbootVariant::Legacy),
            Mode::FlashModern | Mode::FlashModernThenCopy => Some(UbootVariant::Modern),
            Mode::CopyKernelSet | Mode::Exit => None,
        }
    }

    /// Whether this mode copies the kernel set onto the boot partition.
    fn copies_kernel_set(self) -> bool {
        matches!(
            self,
            Mode::CopyKernelSet | Mode::FlashLegacyThenCopy | Mode::FlashModernThenCopy
        )
    }
}

fn selection_in_range(selection: usize, count: usize) -> bool {
    (1..=count).contains(&selection)
}

/// Renders the numbered device table and reads a 1-based selection.
///
/// Invalid input (non-integer or out of range) re-prompts indefinitely.
/// An empty candidate list is fatal; there is nothing to provision.
fn select_device(devices: &[BlockDevice]) -> Result<&BlockDevice> {
    if devices.is_empty() {
        bail!("no removable USB/SD devices detected");
    }

    println!();
    println!("{}", style("Removable devices").bold());
    for (index, device) in devices.iter().enumerate() {
        println!("  {}. {}", index + 1, device);
    }
    println!();

    let count = devices.len();
    let selection: usize = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Device number (1-{count})"))
        .validate_with(move |selection: &usize| {
            if selection_in_range(*selection, count) {
                Ok(())
            } else {
                Err("selection out of range")
            }
        })
        .interact_text()?;

    Ok(&devices[selection - 1])
}

/// Presents the operation menu; the last entry exits cleanly.
fn select_mode() -> Result<Mode> {
    let items: Vec<&str> = Mode::MENU.iter().map(|(_, label)| *label).collect();

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What do you want to do?")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(Mode::MENU[choice].0)
}

fn report_artifacts(artifacts: &ArtifactSet) {
    println!("{}", style("Checking build artifacts").bold());
    for status in artifacts.statuses() {
        let label = status.role.label();
        match (&status.path, status.exists) {
            (Some(path), true) => {
                println!("  {} {} ({})", style("[OK]").green(), label, path.display());
            }
            (Some(path), false) => {
                // Optional boot partition extras are skipped when absent,
                // so their absence is not an error.
                let marker = if status.role.is_optional() {
                    style("[ABSENT]").yellow()
                } else {
                    style("[MISSING]").red()
                };
                println!("  {} {} not found at {}", marker, label, path.display());
            }
            (None, _) => {
                println!(
                    "  {} {} (no path configured)",
                    style("[UNSET]").yellow(),
                    label
                );
            }
        }
    }
}

fn flash_uboot(
    artifacts: &ArtifactSet,
    device: &BlockDevice,
    variant: UbootVariant,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let source = artifacts.require(variant.role())?;

    println!();
    println!(
        "{}",
        style(format!(
            ">>> Flashing {variant} U-Boot to {} (offset {} bytes)",
            device.path().display(),
            uboot::SPL_BYTE_OFFSET
        ))
        .bold()
    );

    let pb = ProgressBar::new(0);
    let on_start = |len| {
        pb.set_length(len);
        pb.set_prefix("Flashing");
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap()
                .progress_chars("■ "),
        );
    };
    let on_progress = |bytes| pb.set_position(bytes);

    match uboot::flash(source, &device.path(), running, on_start, on_progress) {
        Ok(()) => {
            pb.finish_with_message("Write complete.");
            println!(
                "{} {variant} U-Boot flashed.",
                style("Done:").green().bold()
            );
            Ok(())
        }
        Err(e) => {
            pb.finish_and_clear();
            Err(e)
        }
    }
}

fn copy_kernel_set(artifacts: &ArtifactSet, device: &BlockDevice) -> Result<()> {
    println!();
    println!(
        "{}",
        style(format!(
            ">>> Copying kernel set to {}",
            device.partition(1).display()
        ))
        .bold()
    );

    provision::copy_kernel_set(artifacts, device, |name| {
        println!("Copying {name}...");
    })?;

    println!(
        "{} Boot files copied and synced.",
        style("Done:").green().bold()
    );
    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = lsblk::removable_devices()?;
    if devices.is_empty() {
        println!("No removable devices found.");
        return Ok(());
    }

    println!("Found {} removable devices:", devices.len());
    println!();
    for device in devices {
        println!("  {device}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::List) = cli.command {
        return list_devices();
    }

    privilege::check_root()?;

    // This flag allows for graceful cancellation of the raw write.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let base = match &cli.config {
        Some(path) => FlashConfig::from_file(path)?,
        None => FlashConfig::default(),
    };
    let overrides = FlashConfig {
        kernel: cli.kernel.clone(),
        dtb: cli.dtb.clone(),
        uboot_legacy: cli.uboot_legacy.clone(),
        uboot_modern: cli.uboot_modern.clone(),
        script_bin: cli.script_bin.clone(),
        boot_scr: cli.boot_scr.clone(),
    };
    let config = base.merged_with(overrides);

    let artifacts = ArtifactSet::resolve(&config);
    report_artifacts(&artifacts);

    let devices = lsblk::removable_devices()?;
    let device = select_device(&devices)?;

    println!();
    println!(
        "Selected {} ({})",
        style(device.path().display()).cyan().bold(),
        device.size_display()
    );
    println!(
        "{} all data on this device may be overwritten; make sure it is the right one.",
        style("WARNING:").red().bold()
    );
    println!();

    let mode = select_mode()?;
    if mode == Mode::Exit {
        println!("Exiting.");
        return Ok(());
    }

    let mut failed = false;

    if let Some(variant) = mode.bootloader() {
        if let Err(e) = flash_uboot(&artifacts, device, variant, running.clone()) {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            failed = true;
        }
        if mode.copies_kernel_set() {
            thread::sleep(SETTLE_DELAY);
        }
    }

    if mode.copies_kernel_set() {
        if let Err(e) = copy_kernel_set(&artifacts, device) {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            failed = true;
        }
    }

    println!();
    println!("{}", style("Process finished.").green().bold());

    // Individual operation failures do not abort the run, but they are
    // reflected in the exit status.
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
