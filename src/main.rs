//! archhypr - Main entry point
//!
//! Parses the command line, sets up logging and child-process cleanup, and
//! dispatches to the installer.

use std::path::Path;

use archhypr::cli::{Cli, Commands};
use archhypr::error::InstallError;
use archhypr::hardware::CPUINFO_PATH;
use archhypr::installer::{self, InstallOptions, Installer, LuksUsbOptions};
use archhypr::process_guard::{self, ProcessGuard};
use archhypr::prompt::TerminalPrompter;
use archhypr::runner::SystemRunner;
use archhypr::sanity::{self, PreflightOptions};
use archhypr::validation::ZONEINFO_ROOT;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the logger with appropriate settings
fn init_tracing() {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Exit status for an error anywhere in the chain
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<InstallError>())
        .map_or(1, InstallError::exit_code)
}

fn is_abort(err: &anyhow::Error) -> bool {
    matches!(
        err.chain().find_map(|cause| cause.downcast_ref::<InstallError>()),
        Some(InstallError::Aborted)
    )
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut runner = SystemRunner::new(cli.dry_run);
    let tool_checks = PreflightOptions {
        dry_run: cli.dry_run,
        skip_root_check: cli.skip_root_check,
        ..Default::default()
    };

    match cli.command_or_default() {
        Commands::Install { config, disk, target } => {
            info!("Running installation (dry run: {})", cli.dry_run);
            let options = InstallOptions {
                dry_run: cli.dry_run,
                auto_yes: cli.yes,
                skip_root_check: cli.skip_root_check,
                config_path: config,
                disk,
                target_root: target,
                ..Default::default()
            };
            let mut prompter = TerminalPrompter::new();
            let report = Installer::new(&mut runner, &mut prompter, options).run()?;
            debug!("Install report: {:?}", report);
        }
        Commands::Validate { config } => {
            info!("Validating configuration file: {}", config.display());
            installer::validate_config(&config, Path::new(ZONEINFO_ROOT))?;
            println!("✓ Configuration file is valid: {}", config.display());
        }
        Commands::Partition { disk, swap_size } => {
            sanity::require_tools(&["lsblk", "fdisk"], &tool_checks)?;
            let mut prompter = TerminalPrompter::new();
            installer::partition_only(
                &mut runner,
                &mut prompter,
                disk.as_deref(),
                swap_size.as_deref(),
                cli.yes,
            )?;
        }
        Commands::LuksUsb {
            device,
            mapper,
            volume_group,
        } => {
            sanity::require_tools(&["lsblk", "cryptsetup", "pvcreate", "vgcreate"], &tool_checks)?;
            let mut prompter = TerminalPrompter::new();
            let options = LuksUsbOptions {
                device,
                mapper: Some(mapper),
                volume_group: Some(volume_group),
                auto_yes: cli.yes,
            };
            installer::luks_usb(&mut runner, &mut prompter, &options)?;
        }
        Commands::RenderScript { config } => {
            let script =
                installer::render_script(&config, Path::new(ZONEINFO_ROOT), Path::new(CPUINFO_PATH))?;
            print!("{}", script);
        }
        Commands::Template { output } => {
            installer::write_template(&output)?;
        }
    }
    Ok(())
}

fn main() {
    init_tracing();
    info!("archhypr starting up");

    // Terminate tracked children on SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let guard = ProcessGuard::new();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(e) if is_abort(&e) => {
            println!("Aborted.");
            0
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    };

    // process::exit skips destructors
    drop(guard);
    std::process::exit(code);
}
