//! Login bridge - OAuth PKCE exchange, identity bridging and webhook verification

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use login_bridge::{
    cli::{Cli, Command},
    config::Config,
    oauth::to_local_identity,
    server::Bridge,
    setup_tracing,
    webhook::WebhookVerifier,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::MapIdentity { ref external_id }) => {
            println!("{}", to_local_identity(external_id));
            ExitCode::SUCCESS
        }
        Some(Command::InspectToken { ref token }) => run_inspect_token(token),
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Print the unverified `kid` of a token
fn run_inspect_token(token: &str) -> ExitCode {
    match WebhookVerifier::extract_key_id(token.trim()) {
        Some(kid) => {
            println!("kid: {kid}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Token is malformed or has no key id");
            ExitCode::FAILURE
        }
    }
}

/// Run the bridge server
async fn run_server(cli: Cli) -> ExitCode {
    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        secrets = ?config.secrets.backend,
        "Starting login bridge"
    );

    let bridge = match Bridge::new(config) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to create bridge: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = bridge.run().await {
        error!("Bridge error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Bridge shutdown complete");
    ExitCode::SUCCESS
}
