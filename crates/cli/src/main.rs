//! SousChef CLI: the main entry point.
//!
//! Commands:
//! - `init`    write a default config file
//! - `serve`   start the HTTP gateway
//! - `chat`    run one conversation turn from the terminal
//! - `import`  bulk-import recipes from a YAML file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use souschef_config::AppConfig;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "souschef",
    about = "SousChef: a recipe assistant with a per-tenant recipe library",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file to ~/.souschef/config.toml
    Init,

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message as a tenant
    Chat {
        /// Tenant to act as
        #[arg(short, long, env = "SOUSCHEF_TENANT")]
        tenant: String,

        /// The message text
        #[arg(short, long)]
        message: String,

        /// Continue an existing thread
        #[arg(long)]
        thread: Option<String>,

        /// Attach an image file
        #[arg(long)]
        image: Option<PathBuf>,

        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,
    },

    /// Import recipes from a .yaml/.yml file
    Import {
        /// Tenant whose library receives the recipes
        #[arg(short, long, env = "SOUSCHEF_TENANT")]
        tenant: String,

        /// The YAML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => AppConfig::default(),
        _ => AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?,
    };

    let filter = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Chat { tenant, message, thread, image, stream } => {
            let args = commands::chat::ChatArgs { tenant, message, thread, image, stream };
            commands::chat::run(config, args).await?
        }
        Commands::Import { tenant, file } => commands::import::run(config, tenant, file).await?,
    }

    Ok(())
}
