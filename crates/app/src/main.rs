use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::settings::ProfileKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod server;
mod terminal;
mod utils;

#[derive(Parser)]
#[command(name = "onesearch", version, about = "LC Waikiki OneSearch assistant")]
struct Cli {
    /// Settings file (defaults to settings.json in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Assistant persona: office, search or api
    #[arg(long, global = true)]
    profile: Option<ProfileKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat in the terminal
    Chat,
    /// Serve POST /api/chat over HTTP
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:3000
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = utils::load_settings(cli.config.as_deref())?;
    if let Some(profile) = cli.profile {
        settings.profile = profile;
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    match cli.command {
        Command::Chat => runtime.block_on(terminal::run(settings)),
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind_address = bind;
            }
            server::run(&settings, runtime.handle().clone())
        }
    }
}
