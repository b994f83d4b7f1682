//! confsync command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use confsync::settings::{resolve_settings_path, Settings, SETTINGS_ENV_VAR};
use confsync::{ConfigError, Controller, Result, Stdout, SyncError, WatchSupervisor};

#[derive(Parser, Debug)]
#[command(
    name = "confsync",
    version,
    about = "Keep local configuration files in sync with a remote configuration service"
)]
struct Cli {
    /// Settings file to use instead of searching the default locations.
    #[arg(short, long, env = SETTINGS_ENV_VAR, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value of a configuration object.
    Get {
        key: String,
        /// Keep printing the value whenever it changes.
        #[arg(short, long)]
        poll: bool,
    },
    /// Write configuration objects to their destinations (all when none are named).
    Apply {
        keys: Vec<String>,
        /// Keep writing whenever the values change.
        #[arg(short, long)]
        poll: bool,
    },
    /// Apply every configuration object and keep them current.
    Monitor,
    /// Inspect this tool's own settings.
    #[command(name = "self", subcommand)]
    SelfCmd(SelfCommand),
    /// Print the version and exit.
    Version,
}

#[derive(Subcommand, Debug)]
enum SelfCommand {
    /// Print the configured objects.
    Print,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = confsync::logging::init(cli.verbose, cli.log_json) {
        eprintln!("WARNING: failed to initialize logging: {}", e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ERROR: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("interrupted, shutting down");
        on_interrupt.cancel();
    }) {
        warn!("failed to install Ctrl-C handler: {}", e);
    }

    match runtime.block_on(run(cli, cancel)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    match cli.command {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::SelfCmd(SelfCommand::Print) => print_self(cli.config),
        Command::Get { key, poll } => {
            let settings = load_settings(cli.config)?;
            let controller = Controller::from_settings(&settings, &key).await?;
            if poll {
                controller.watch_get(&Stdout, &cancel).await
            } else {
                until_cancelled(&cancel, controller.get(&Stdout)).await
            }
        }
        Command::Apply { keys, poll } => {
            let settings = load_settings(cli.config)?;
            let keys = if keys.is_empty() {
                settings.keys().map(str::to_string).collect()
            } else {
                keys
            };
            let controllers = prepare(&settings, &keys).await?;

            if poll {
                WatchSupervisor::new(controllers).run(&cancel).await
            } else {
                for controller in &controllers {
                    until_cancelled(&cancel, controller.write()).await?;
                }
                Ok(())
            }
        }
        Command::Monitor => {
            let settings = load_settings(cli.config)?;
            let keys: Vec<String> = settings.keys().map(str::to_string).collect();
            let controllers = prepare(&settings, &keys).await?;

            info!(count = controllers.len(), "begin monitoring");
            WatchSupervisor::new(controllers).run(&cancel).await
        }
    }
}

/// Runs a one-shot operation, treating an interrupt as a clean exit.
async fn until_cancelled(
    cancel: &CancellationToken,
    operation: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    cancel.run_until_cancelled(operation).await.unwrap_or(Ok(()))
}

fn load_settings(explicit: Option<PathBuf>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => path,
        None => resolve_settings_path()?,
    };
    debug!(path = %path.display(), "loading settings");
    Ok(Settings::load(&path)?)
}

/// Builds controllers for `keys` and creates their destination directories.
async fn prepare(settings: &Settings, keys: &[String]) -> Result<Vec<Controller>> {
    let mut controllers = Vec::with_capacity(keys.len());
    for key in keys {
        let controller = Controller::from_settings(settings, key).await?;
        controller.prepare_destination().await?;
        println!("{}", controller.describe());
        controllers.push(controller);
    }
    Ok(controllers)
}

fn print_self(explicit: Option<PathBuf>) -> Result<()> {
    match load_settings(explicit) {
        Ok(settings) => {
            print!("{}", settings.objects_yaml()?);
            Ok(())
        }
        Err(SyncError::Config(ConfigError::SettingsNotFound { searched })) => {
            eprintln!("WARNING: Could not find the settings file at any of the following locations:");
            for path in searched {
                eprintln!("    {}", path.display());
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
