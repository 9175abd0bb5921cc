#![forbid(unsafe_code)]

mod catalog;
mod commit;
mod config;
mod constants;
mod daemon;
mod exec;
mod frontend;
mod persistence;
mod staging;
mod sync;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use commit::{CommitChannel, DirectChannel, PkexecChannel};
use config::{FrontendConfig, Paths};
use persistence::ConfigStore;
use sync::ConfigService;

/// Manage hardware behavior profiles and their assignment to operating states
#[derive(Parser, Debug)]
#[command(name = "hwprofile", version)]
struct Cli {
    /// Directory holding the authoritative settings and profiles files
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Install a staged settings file (privileged helper)
    #[arg(long, value_name = "PATH", conflicts_with = "new_profiles")]
    new_settings: Option<PathBuf>,

    /// Install a staged custom profiles file (privileged helper)
    #[arg(long, value_name = "PATH")]
    new_profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show state assignments and global settings
    Status,
    /// List built-in and custom profiles
    List,
    /// Print a profile as JSON
    Show { name: String },
    /// Assign a profile to an operating state (e.g. power_ac, power_bat)
    Activate { profile: String, state: String },
    /// Copy a profile to a new custom profile
    Copy { from: String, to: String },
    /// Delete a custom profile
    Delete { name: String },
    /// Change fields of a custom profile
    Edit {
        name: String,
        /// Field assignment such as fan.minimum_speed=80 (repeatable)
        #[arg(long = "set", value_name = "PATH=VALUE", required = true)]
        set: Vec<String>,
    },
    /// Run the privileged daemon
    Daemon,
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var(constants::env::LOG_LEVEL)
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn require_root(role: &str) -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        bail!("{role} must run as root (invoke it through pkexec)");
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let helper_mode = cli.new_settings.is_some() || cli.new_profiles.is_some();
    if helper_mode && cli.command.is_some() {
        bail!("--new-settings/--new-profiles cannot be combined with a command");
    }

    let cli_paths = cli
        .config_dir
        .clone()
        .map(Paths::with_config_dir)
        .unwrap_or_default();

    // Privileged helper: adopt a staged file and signal the daemon
    if helper_mode {
        require_root("The helper")?;
        daemon::helper::authorize_config_dir(
            &cli_paths,
            Path::new(constants::paths::ALLOWED_CONFIG_DIRS),
        )?;
    }
    match (&cli.new_settings, &cli.new_profiles) {
        (Some(staged), _) => return daemon::helper::apply_new_settings(&cli_paths, staged),
        (None, Some(staged)) => return daemon::helper::apply_new_profiles(&cli_paths, staged),
        (None, None) => {}
    }

    let Some(command) = cli.command else {
        bail!("No command given, see --help");
    };

    if let Command::Daemon = command {
        info!(config_dir = %cli_paths.config_dir.display(), "Starting daemon");
        return daemon::run(cli_paths);
    }

    let mut frontend_config = FrontendConfig::load();
    if let Some(dir) = cli.config_dir {
        frontend_config.config_dir = Some(dir);
    }
    let paths = frontend_config.paths();
    let store = ConfigStore::from_paths(&paths);

    match frontend_config.escalation() {
        Some(escalation) if !nix::unistd::geteuid().is_root() => {
            let daemon_exec = frontend_config.daemon_exec()?;
            let channel = PkexecChannel::new(escalation, daemon_exec, paths);
            run_frontend(command, ConfigService::new(store, channel))
        }
        _ => run_frontend(command, ConfigService::new(store, DirectChannel::new(paths))),
    }
}

fn run_frontend<C: CommitChannel>(command: Command, mut service: ConfigService<C>) -> Result<()> {
    match command {
        Command::Status => frontend::status(&service),
        Command::List => frontend::list(&service),
        Command::Show { name } => frontend::show(&service, &name)?,
        Command::Activate { profile, state } => frontend::activate(&mut service, &profile, &state)?,
        Command::Copy { from, to } => frontend::copy(&mut service, &from, &to)?,
        Command::Delete { name } => frontend::delete(&mut service, &name)?,
        Command::Edit { name, set } => frontend::edit(&mut service, &name, &set)?,
        Command::Daemon => bail!("The daemon is not a front-end command"),
    }
    Ok(())
}
