//! Installer module
//!
//! Runs the installation pipeline from preflight to reboot, one
//! [`InstallStage`] at a time. All external programs go through the
//! [`CommandRunner`] and all questions through the [`Prompter`], so the
//! whole pipeline can be driven from tests.

use crate::commands::chroot::{ArchChroot, Reboot};
use crate::commands::disk::{FdiskList, ListBlockDevices};
use crate::commands::encryption::{LuksFormat, LuksOpen, PvCreate, VgCreate};
use crate::commands::pacman::{Genfstab, PacmanKey, PacmanRefresh, Pacstrap, Reflector};
use crate::commands::{SystemCommand, dev_path};
use crate::config::{self, DEFAULT_SWAP_SIZE, InstallConfig};
use crate::config_file::{self, InstallationConfig};
use crate::engine::storage::{self, DiskLayout};
use crate::error::InstallError;
use crate::hardware::{self, CpuVendor, NetworkState};
use crate::install_state::{InstallStage, InstallerContext};
use crate::logic::chroot_script::{self, CHROOT_SCRIPT_IN_TARGET, CHROOT_SCRIPT_PATH};
use crate::logic::resume::{self, ResumeOutcome};
use crate::logic::{accounts, resolver};
use crate::prompt::{self, Prompter};
use crate::runner::{self, CommandRunner, OutputMode};
use crate::sanity::{self, PreflightOptions, SanityCheckResult};
use crate::target::TargetRoot;
use crate::validation;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Mount point of the new system on the live ISO
pub const DEFAULT_TARGET_ROOT: &str = "/mnt";

const DISK_PROMPT: &str = "Enter the installation drive (e.g., sda or nvme0n1): ";

/// Everything the pipeline reads from outside the config file
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub dry_run: bool,
    /// Answer every confirmation with yes
    pub auto_yes: bool,
    pub skip_root_check: bool,
    pub config_path: Option<PathBuf>,
    /// Takes precedence over the config file's `disk`
    pub disk: Option<String>,
    pub target_root: PathBuf,
    pub zoneinfo_root: PathBuf,
    pub efi_path: PathBuf,
    pub cpuinfo_path: PathBuf,
    /// Directory searched for `default_config.json`
    pub search_dir: PathBuf,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            auto_yes: false,
            skip_root_check: false,
            config_path: None,
            disk: None,
            target_root: PathBuf::from(DEFAULT_TARGET_ROOT),
            zoneinfo_root: PathBuf::from(validation::ZONEINFO_ROOT),
            efi_path: PathBuf::from(hardware::EFI_SYSFS_PATH),
            cpuinfo_path: PathBuf::from(hardware::CPUINFO_PATH),
            search_dir: PathBuf::from("."),
        }
    }
}

/// Checks of the live system that tests replace
#[derive(Debug, Clone, Copy)]
pub struct Probes {
    pub preflight: fn(&PreflightOptions) -> crate::error::Result<SanityCheckResult>,
    pub network: fn() -> NetworkState,
}

impl Default for Probes {
    fn default() -> Self {
        Self {
            preflight: sanity::run_preflight_checks,
            network: hardware::detect_internet,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub layout: DiskLayout,
    pub cpu: CpuVendor,
    pub resume: ResumeOutcome,
    pub rebooted: bool,
}

/// The installation pipeline.
pub struct Installer<'a> {
    runner: &'a mut dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    options: InstallOptions,
    probes: Probes,
    state: InstallerContext,
}

impl<'a> Installer<'a> {
    pub fn new(
        runner: &'a mut dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
        options: InstallOptions,
    ) -> Self {
        Self {
            runner,
            prompter,
            options,
            probes: Probes::default(),
            state: InstallerContext::new(),
        }
    }

    pub fn with_probes(mut self, probes: Probes) -> Self {
        self.probes = probes;
        self
    }

    pub fn state(&self) -> &InstallerContext {
        &self.state
    }

    /// Run every stage. A failure marks the state machine failed; a user
    /// abort does not. The stage error is always the one returned.
    pub fn run(&mut self) -> Result<InstallReport> {
        let result = self.run_stages();
        if let Err(e) = &result {
            let aborted = matches!(e.downcast_ref::<InstallError>(), Some(InstallError::Aborted));
            if !aborted {
                if let Err(state_err) = self.state.fail() {
                    warn!("Could not record the failure: {}", state_err);
                }
            }
        }
        result
    }

    fn enter(&mut self, stage: InstallStage) -> Result<()> {
        self.state.transition_to(stage).map_err(InstallError::from)?;
        Ok(())
    }

    fn run_stages(&mut self) -> Result<InstallReport> {
        self.enter(InstallStage::Preflight)?;
        let cpu = self.preflight()?;

        self.enter(InstallStage::CollectingInput)?;
        let raw = InstallationConfig::locate(self.options.config_path.as_deref(), &self.options.search_dir);
        let config = config::resolve(&raw, self.prompter, &self.options.zoneinfo_root)?;
        info!(
            "Installing for {}@{} (timezone {}, GPU {}, swap {})",
            config.username, config.hostname, config.timezone, config.gpu, config.swap_size
        );

        self.enter(InstallStage::SelectingDisk)?;
        let preset = self
            .options
            .disk
            .clone()
            .or_else(|| config_file::trimmed(&raw.disk).map(str::to_string));
        let disk = select_disk(self.runner, self.prompter, preset.as_deref())?;
        confirm_partitioning(self.runner, self.prompter, &disk, &config.swap_size, self.options.auto_yes)?;
        self.state.confirm_destructive_operations();

        self.enter(InstallStage::PartitioningDisk)?;
        let target = TargetRoot::new(&self.options.target_root, self.options.dry_run);
        let root = target.root_arg();
        let plan = storage::calculate_storage_plan(&disk, &config.swap_size, &root)?;
        storage::apply_storage_plan(&plan, self.runner)?;

        self.enter(InstallStage::PreparingMirrors)?;
        self.prepare_mirrors(&config.country)?;

        self.enter(InstallStage::InstallingBaseSystem)?;
        runner::run_checked(
            self.runner,
            &Pacstrap {
                root: root.clone(),
                packages: resolver::pacstrap_packages(),
            },
        )
        .context("pacstrap failed")?;

        self.enter(InstallStage::GeneratingFstab)?;
        let fstab = runner::capture_checked(self.runner, &Genfstab { root: root.clone() })?;
        target.write_file("etc/fstab", &fstab.stdout, 0o644)?;

        self.enter(InstallStage::ConfiguringChroot)?;
        let microcode = resolver::microcode_package(cpu);
        run_chroot_script(self.runner, &target, &config, microcode)?;

        self.enter(InstallStage::SettingPasswords)?;
        accounts::set_passwords(self.runner, &root, &config)?;

        self.enter(InstallStage::ConfiguringResume)?;
        let resume = resume::configure_resume(self.runner, &target, &plan.layout.swap)?;

        self.enter(InstallStage::Completed)?;
        println!("\nInstallation complete.");

        let rebooted = if prompt::confirm(self.prompter, "Do you want to reboot?", self.options.auto_yes)? {
            runner::run_checked(self.runner, &Reboot)?;
            true
        } else {
            false
        };

        Ok(InstallReport {
            layout: plan.layout,
            cpu,
            resume,
            rebooted,
        })
    }

    fn preflight(&mut self) -> Result<CpuVendor> {
        let options = PreflightOptions {
            dry_run: self.options.dry_run,
            skip_root_check: self.options.skip_root_check,
            efi_path: self.options.efi_path.clone(),
        };
        (self.probes.preflight)(&options)?;

        let network = (self.probes.network)();
        if !network.is_online() {
            warn!("No network connectivity detected; mirror refresh and pacstrap will likely fail");
        }

        let cpu = hardware::detect_cpu_vendor_at(&self.options.cpuinfo_path);
        info!("Firmware: UEFI, Network: {}, CPU: {}", network, cpu);
        Ok(cpu)
    }

    fn prepare_mirrors(&mut self, country: &str) -> Result<()> {
        let reflector = Reflector {
            country: country.to_string(),
        };
        let failure = match self.runner.run(&reflector, OutputMode::Inherit) {
            Ok(output) if output.success => None,
            Ok(output) => Some(format!(
                "{} exited with {:?}",
                reflector.describe(),
                output.exit_code
            )),
            Err(e @ InstallError::CommandNotFound(_)) => Some(e.to_string()),
            Err(e) => return Err(e.into()),
        };

        match failure {
            None => println!("Mirrorlist updated successfully"),
            Some(reason) => {
                println!(" Warning: Failed to update mirrorlist with reflector: {}", reason);
                println!("This could affect download speeds, but the installation can continue.");
                if !prompt::confirm(
                    self.prompter,
                    "Do you want to continue with the installation?",
                    self.options.auto_yes,
                )? {
                    return Err(InstallError::Aborted.into());
                }
                println!("Continuing with installation...");
            }
        }

        runner::run_checked(self.runner, &PacmanRefresh)?;
        runner::run_checked(self.runner, &PacmanKey::Init)?;
        runner::run_checked(self.runner, &PacmanKey::Populate)?;
        Ok(())
    }
}

/// Show the disks, then take `preset` if it names a valid disk or prompt
/// until one is given. Returns the `/dev/...` path.
pub fn select_disk(
    runner: &mut dyn CommandRunner,
    prompter: &mut dyn Prompter,
    preset: Option<&str>,
) -> Result<String> {
    println!("Available disks:");
    runner::run_unchecked(runner, &ListBlockDevices)?;

    let bare = |name: &str| validation::bare_disk_name(name).to_string();
    let name = match preset.map(bare) {
        Some(name) if validation::is_valid_disk_name(&name) => {
            info!("Using disk {} from configuration", name);
            name
        }
        other => {
            if let Some(name) = other {
                warn!("Configured disk {:?} is not valid: {}", name, validation::DISK_HINT);
            }
            let answer = prompt::prompt_until(prompter, DISK_PROMPT, validation::DISK_HINT, |s| {
                validation::is_valid_disk_name(&bare(s))
            })?;
            bare(&answer)
        }
    };
    Ok(dev_path(&name))
}

/// Print the current table and ask before anything is written.
fn confirm_partitioning(
    runner: &mut dyn CommandRunner,
    prompter: &mut dyn Prompter,
    disk: &str,
    swap_size: &str,
    auto_yes: bool,
) -> Result<()> {
    println!("\nCurrent partition table for {}:", disk);
    runner::run_unchecked(runner, &FdiskList { device: disk.to_string() })?;

    let question = format!(
        "Proceed to create GPT with 256MB EFI, {} swap, and rest root on {}?",
        swap_size, disk
    );
    if !prompt::confirm(prompter, &question, auto_yes)? {
        return Err(InstallError::Aborted.into());
    }
    Ok(())
}

/// Write the configuration script, run it in the chroot, and remove it
/// whether or not it succeeded.
pub fn run_chroot_script(
    runner: &mut dyn CommandRunner,
    target: &TargetRoot,
    config: &InstallConfig,
    microcode: Option<&str>,
) -> Result<()> {
    let script = chroot_script::render_chroot_script(config, microcode);
    target.write_file(CHROOT_SCRIPT_PATH, &script, 0o755)?;

    let command = ArchChroot::new(&target.root_arg(), &["bash", CHROOT_SCRIPT_IN_TARGET]);
    let outcome = runner::run_checked(runner, &command);
    let cleanup = target.remove_file(CHROOT_SCRIPT_PATH);

    match (outcome, cleanup) {
        (Ok(_), cleanup) => cleanup,
        (Err(e), Ok(())) => Err(anyhow::Error::from(e).context("Chroot configuration failed")),
        (Err(e), Err(cleanup_err)) => {
            warn!("Could not remove {}: {:#}", CHROOT_SCRIPT_PATH, cleanup_err);
            Err(anyhow::Error::from(e).context("Chroot configuration failed"))
        }
    }
}

/// Partition a disk with the standard layout and stop.
pub fn partition_only(
    runner: &mut dyn CommandRunner,
    prompter: &mut dyn Prompter,
    disk: Option<&str>,
    swap_size: Option<&str>,
    auto_yes: bool,
) -> Result<DiskLayout> {
    let swap_size = swap_size.unwrap_or(DEFAULT_SWAP_SIZE);
    validation::check_swap_size(swap_size)?;

    println!("This will DESTROY ALL DATA on the selected disk.");
    let disk = select_disk(runner, prompter, disk)?;
    confirm_partitioning(runner, prompter, &disk, swap_size, auto_yes)?;

    let plan = storage::calculate_partition_plan(&disk, swap_size)?;
    storage::apply_storage_plan(&plan, runner)?;

    let layout = plan.layout;
    println!("\nNext steps (example):");
    println!("mkfs.fat -F32 {}", layout.efi);
    println!("mkswap {0} && swapon {0}", layout.swap);
    println!("mkfs.btrfs {}", layout.root);
    println!("\nDone.");
    Ok(layout)
}

/// Names for [`luks_usb`]; missing values are prompted for
#[derive(Debug, Clone, Default)]
pub struct LuksUsbOptions {
    pub device: Option<String>,
    pub mapper: Option<String>,
    pub volume_group: Option<String>,
    pub auto_yes: bool,
}

/// Encrypt a USB stick with LUKS and put an LVM volume group on it.
pub fn luks_usb(
    runner: &mut dyn CommandRunner,
    prompter: &mut dyn Prompter,
    options: &LuksUsbOptions,
) -> Result<()> {
    println!("Available disks:");
    runner::run_unchecked(runner, &ListBlockDevices)?;

    let device = dev_path(
        &pick(
            prompter,
            options.device.as_deref().map(validation::bare_disk_name),
            "Enter the USB device (e.g., sdb): ",
            validation::DISK_HINT,
            validation::is_valid_disk_name,
        )?,
    );
    let mapper = pick(
        prompter,
        options.mapper.as_deref(),
        "Enter a name for the unlocked device: ",
        validation::VOLUME_NAME_HINT,
        validation::is_valid_volume_name,
    )?;
    let volume_group = pick(
        prompter,
        options.volume_group.as_deref(),
        "Enter your Volume Group name: ",
        validation::VOLUME_NAME_HINT,
        validation::is_valid_volume_name,
    )?;

    let question = format!("This will DESTROY ALL DATA on {}. Continue?", device);
    if !prompt::confirm(prompter, &question, options.auto_yes)? {
        return Err(InstallError::Aborted.into());
    }

    let mapped = format!("/dev/mapper/{}", mapper);
    runner::run_checked(runner, &LuksFormat { device: device.clone() })?;
    runner::run_checked(
        runner,
        &LuksOpen {
            device,
            name: mapper,
        },
    )?;
    runner::run_checked(runner, &PvCreate { device: mapped.clone() })?;
    runner::run_checked(
        runner,
        &VgCreate {
            name: volume_group,
            device: mapped,
        },
    )?;

    println!("All steps completed successfully.");
    Ok(())
}

fn pick(
    prompter: &mut dyn Prompter,
    given: Option<&str>,
    prompt_text: &str,
    hint: &str,
    accept: fn(&str) -> bool,
) -> Result<String> {
    match given.map(str::trim) {
        Some(value) if accept(value) => Ok(value.to_string()),
        Some(value) => {
            warn!("{:?} rejected: {}", value, hint);
            Ok(prompt::prompt_until(prompter, prompt_text, hint, accept)?)
        }
        None => Ok(prompt::prompt_until(prompter, prompt_text, hint, accept)?),
    }
}

/// Strictly validate a config file.
pub fn validate_config(path: &Path, zoneinfo_root: &Path) -> Result<InstallConfig> {
    let raw = InstallationConfig::load_from_file(path)?;
    let config = InstallConfig::from_validated(&raw, zoneinfo_root)
        .with_context(|| format!("{} is not a complete configuration", path.display()))?;
    Ok(config)
}

/// The chroot script a config file would produce on this machine.
pub fn render_script(path: &Path, zoneinfo_root: &Path, cpuinfo_path: &Path) -> Result<String> {
    let config = validate_config(path, zoneinfo_root)?;
    let cpu = hardware::detect_cpu_vendor_at(cpuinfo_path);
    Ok(chroot_script::render_chroot_script(
        &config,
        resolver::microcode_package(cpu),
    ))
}

/// Write the sample config.
pub fn write_template(path: &Path) -> Result<()> {
    InstallationConfig::template().save_to_file(path)?;
    println!("Wrote template to {}", path.display());
    println!(
        "Replace the {} passwords before using it.",
        config_file::PASSWORD_PLACEHOLDER
    );
    Ok(())
}
