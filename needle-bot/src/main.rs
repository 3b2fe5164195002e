//! Needle - stitch diary bot.
//!
//! Command-line entry point for running the bot gateway or a terminal chat.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use needle_bot::config::{
    DATA_DIR_ENV, IssueLevel, TOKEN_ENV, config_path as default_config_path,
    init_config_at, load_config_from, load_validated,
};
use needle_bot::error::{DisplayError, ErrorContext, Result};
use needle_bot::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Needle - stitch diary bot for Telegram and the terminal
#[derive(Parser)]
#[command(name = "needle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "NEEDLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration
    Init(InitArgs),

    /// Start the bot with all configured channels
    Run(RunArgs),

    /// Talk to the bot in the terminal
    Chat(ChatArgs),

    /// Show configuration and environment status
    Status,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Disable CLI channel
    #[arg(long)]
    no_cli: bool,

    /// Disable Telegram channel
    #[arg(long)]
    no_telegram: bool,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Owner id to act as (overrides config)
    #[arg(short, long)]
    owner: Option<i64>,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "needle_bot={level},needle={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let config_file = cli.config.unwrap_or_else(default_config_path);
    match cli.command {
        Commands::Init(args) => cmd_init(args, &config_file).await,
        Commands::Run(args) => cmd_run(args, &config_file).await,
        Commands::Chat(args) => cmd_chat(args, &config_file).await,
        Commands::Status => cmd_status(&config_file).await,
        Commands::Config(args) => cmd_config(args, &config_file).await,
    }
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs, config_file: &Path) -> Result<()> {
    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let config = init_config_at(config_file)
        .await
        .context("failed to initialize config")?;

    println!("Configuration created: {}", config_file.display());
    println!("Data directory:        {}", config.storage.resolved_dir().display());
    println!();
    println!("Next steps:");
    println!("  1. export {TOKEN_ENV}=<token>");
    println!("  2. set telegram.enabled and telegram.allow_from in the config");
    println!("  3. needle run");

    Ok(())
}

/// Start the gateway with every configured channel.
async fn cmd_run(args: RunArgs, config_file: &Path) -> Result<()> {
    let config = load_validated(config_file).await?;
    let cli_config = CliChannelConfig::new()
        .prompt(config.cli.prompt.clone())
        .owner(config.cli.owner_id);

    tracing::info!("Starting needle...");

    let gateway = GatewayBuilder::new()
        .bot_config(config)
        .enable_cli(!args.no_cli)
        .enable_telegram(!args.no_telegram)
        .build()?;

    println!("Needle running. Press Ctrl+C to stop.\n");

    let input = async {
        if args.no_cli {
            std::future::pending::<()>().await;
        }
        run_interactive(gateway.bus(), &cli_config)
            .await
            .map_err(BotError::from)
    };

    let result = tokio::select! {
        result = gateway.run() => result,
        result = input => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    };
    gateway.shutdown().await;
    result
}

/// Start an interactive terminal chat.
async fn cmd_chat(args: ChatArgs, config_file: &Path) -> Result<()> {
    let mut config = load_validated(config_file).await?;
    if let Some(owner) = args.owner {
        config.cli.owner_id = owner;
    }
    let cli_config = CliChannelConfig::new()
        .prompt(config.cli.prompt.clone())
        .owner(config.cli.owner_id);

    let gateway = Arc::new(
        GatewayBuilder::new()
            .bot_config(config)
            .enable_cli(true)
            .enable_telegram(false)
            .build()?,
    );

    println!("Needle chat | /start for the menu, !token presses a button, 'exit' to quit\n");

    let runner = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.run().await })
    };

    let result = run_interactive(gateway.bus(), &cli_config).await;
    gateway.shutdown().await;
    runner.await??;
    result.map_err(Into::into)
}

/// Show status.
async fn cmd_status(config_file: &Path) -> Result<()> {
    println!("Needle Status\n");

    println!("Configuration:");
    println!("  Path:   {}", config_file.display());
    println!(
        "  Exists: {}",
        if config_file.exists() { "yes" } else { "no" }
    );

    match load_config_from(config_file).await {
        Ok(config) => {
            let errors = config
                .validate()
                .iter()
                .filter(|i| i.level == IssueLevel::Error)
                .count();
            println!("  Valid:  {}", if errors == 0 { "yes" } else { "no" });
            println!();
            println!("Channels:");
            println!(
                "  Telegram: {}",
                if config.telegram.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  Allowed:  {}", config.telegram.allow_from.len());
            println!();
            println!("Dialogs:");
            let priority: Vec<String> =
                config.dialog.priority.iter().map(ToString::to_string).collect();
            println!("  Priority:    {}", priority.join(", "));
            match config.dialog.session_ttl_secs {
                Some(secs) => println!("  Session TTL: {secs}s"),
                None => println!("  Session TTL: none"),
            }
            println!();
            println!("Storage:");
            println!("  Data dir: {}", config.storage.resolved_dir().display());
        }
        Err(e) => println!("  Valid:  no ({e})"),
    }

    println!();
    println!("Environment:");
    print_env_status(TOKEN_ENV);
    print_env_status(DATA_DIR_ENV);
    print_env_status("NEEDLE_CONFIG");

    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_file: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            if config_file.exists() {
                let content = tokio::fs::read_to_string(config_file)
                    .await
                    .context("failed to read config")?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'needle init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            if !config_file.exists() {
                println!("note: configuration file does not exist, checking defaults");
            }
            match load_config_from(config_file).await {
                Ok(config) => {
                    let issues = config.validate();
                    if issues.is_empty() {
                        println!("Configuration is valid");
                    }
                    for issue in issues {
                        let label = match issue.level {
                            IssueLevel::Error => "error",
                            IssueLevel::Warning => "warning",
                        };
                        println!("{label}: {}", issue.message);
                    }
                }
                Err(e) => println!("error: {e}"),
            }
        }
    }

    Ok(())
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok() {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
