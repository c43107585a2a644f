//! AutoPart CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use autopart::auth::AuthEvent;
use autopart::cli::{Cli, Commands};
use autopart::client::AutoPartClient;
use autopart::config::ClientConfig;
use autopart::error::ApiError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.status {
            Some(status) => eprintln!("Error ({status}): {}", e.message),
            None => eprintln!("Error: {}", e.message),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }

    let client = AutoPartClient::new(config)?;
    client.on_auth_event(|event| match event {
        AuthEvent::SessionExpired { reason, .. } => {
            eprintln!("🔒 Session expired ({reason}); run `autopart auth login`");
        }
    });

    match cli.command {
        Commands::Auth(args) => autopart::cli::auth::handle(&client, args.command).await,
        Commands::Warehouses { command } => autopart::cli::resources::warehouses(&client, command).await,
        Commands::PartLocations { command } => {
            autopart::cli::resources::part_locations(&client, command).await
        }
        Commands::Customers { command } => autopart::cli::resources::customers(&client, command).await,
    }
}
