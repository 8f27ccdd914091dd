use anyhow::Result;
use clap::{Parser, Subcommand};
use mapi_client::{ClientSettings, ManagementClient, spaces};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod assets;
mod components;
mod stories;

/// Manage spaces, stories, components and assets of a content platform
#[derive(Parser)]
#[command(name = "mapi")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List spaces visible to the token
    Spaces,
    Stories(stories::StoriesArgs),
    Components(components::ComponentsArgs),
    Assets(assets::AssetsArgs),
    /// Print the effective configuration (without the token) and exit
    PrintConfig,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // defaults -> YAML (if provided) -> env (MAPI_*)
    let settings = ClientSettings::load(cli.config.as_deref())?;

    if matches!(cli.command, Commands::PrintConfig) {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let client = ManagementClient::from_settings(settings)?;
    tracing::info!(space_id = ?client.credentials().space_id(), "client ready");

    match cli.command {
        Commands::Spaces => print_json(&serde_json::Value::Array(
            spaces::list_spaces(&client).await?,
        )),
        Commands::Stories(args) => args.run(&client).await,
        Commands::Components(args) => args.run(&client).await,
        Commands::Assets(args) => args.run(&client).await,
        Commands::PrintConfig => Ok(()),
    }
}
