mod chat_client;
mod commands;
mod config;
mod server;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::chat_client::ChatCompletionClient;
use crate::commands::{cmd_analyze, cmd_config, cmd_ingredient, cmd_session};
use crate::config::Config;
use clearplate_core::service::AnalysisService;

#[derive(Parser)]
#[command(
    name = "clearplate",
    version,
    about = "Log meals and see which ingredients may trigger acne"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Break foods into dishes and rate the acne risk of their ingredients
    Analyze {
        /// Foods or dishes eaten (e.g. "Pepperoni pizza" "Coke")
        #[arg(required = true)]
        foods: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate the acne risk of a single ingredient
    Ingredient {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log meals interactively
    Session,
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "clearplate=info,clearplate_core=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let client = ChatCompletionClient::new(&config)?;
    if !client.has_api_key() {
        tracing::warn!("no API key configured; analysis requests will fail");
    }
    let service = Arc::new(AnalysisService::new(client));

    match cli.command {
        Commands::Analyze { foods, json } => cmd_analyze(&service, &foods, json).await,
        Commands::Ingredient { name, json } => cmd_ingredient(&service, &name, json).await,
        Commands::Session => cmd_session(service).await,
        Commands::Serve { port, bind } => server::start_server(service, port, &bind).await,
        Commands::Config { json } => cmd_config(&config, json),
    }
}
