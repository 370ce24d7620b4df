use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info};
use std::fs;
use std::path::PathBuf;

use punctprep::cli::{Cli, Commands, ShowFormat};
use punctprep::{Config, Launcher};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("punctprep")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("punctprep.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // Without RUST_LOG the filter stays open and log::max_level does the gating
    let env = env_logger::Env::default().default_filter_or("trace");
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Apply the configured `log_level` unless RUST_LOG already decided it
fn apply_log_level(level: Option<&str>) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(level) = level else {
        return;
    };
    match level.parse::<LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("Unknown log_level '{}', keeping info", level),
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<i32> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    let launcher = Launcher::new(config.program.clone());

    match &cli.command {
        None => handle_run_command(&launcher, config, false, cli.is_verbose()).await,
        Some(Commands::Run { dry_run }) => handle_run_command(&launcher, config, *dry_run, cli.is_verbose()).await,
        Some(Commands::Show { format }) => handle_show_command(&launcher, config, *format),
        Some(Commands::Config) => handle_config_command(config),
    }
}

async fn handle_run_command(launcher: &Launcher, config: &Config, dry_run: bool, verbose: bool) -> Result<i32> {
    // A dry run must reject what a real run would reject
    if let Err(e) = config.invocation.validate() {
        log::error!("Invalid invocation: {}", e);
        eprintln!("{} {}", "Error:".red(), e);
        return Ok(e.exit_code());
    }

    let command_line = launcher.display_command_line(&config.invocation);

    if dry_run {
        info!("Dry run: {}", command_line);
        println!("{}", command_line);
        return Ok(0);
    }

    if verbose {
        eprintln!("{} {}", "Running:".cyan(), command_line);
    }

    match launcher.run(&config.invocation).await {
        Ok(code) => {
            if code != 0 {
                info!("Data preparation exited with code {}", code);
            }
            Ok(code)
        }
        Err(e) => {
            log::error!("Launch failed: {}", e);
            eprintln!("{} {}", "Error:".red(), e);
            Ok(e.exit_code())
        }
    }
}

fn handle_show_command(launcher: &Launcher, config: &Config, format: ShowFormat) -> Result<i32> {
    info!("Showing invocation as {:?}", format);
    match format {
        ShowFormat::Text => println!("{}", launcher.display_command_line(&config.invocation)),
        ShowFormat::Json => println!("{}", config.invocation.to_json()?),
        ShowFormat::Yaml => print!("{}", config.invocation.to_yaml()?),
    }
    Ok(0)
}

fn handle_config_command(config: &Config) -> Result<i32> {
    info!("Printing effective configuration");
    print!("{}", config.to_yaml()?);
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(config.log_level.as_deref());

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let code = run_application(&cli, &config).await.context("Application failed")?;

    // The data-preparation program's exit code is ours
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
