//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// OAuth login bridge between a client app, an identity provider and a local auth system
#[derive(Parser, Debug)]
#[command(name = "login-bridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "LOGIN_BRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "LOGIN_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "LOGIN_BRIDGE_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "LOGIN_BRIDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOGIN_BRIDGE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the bridge server (default)
    Serve,

    /// Print the local identity for a provider external id
    MapIdentity {
        /// Standard-base64 external id as returned by the provider
        #[arg(required = true)]
        external_id: String,
    },

    /// Print the key id of a webhook token without verifying it
    InspectToken {
        /// Compact JWT
        #[arg(required = true)]
        token: String,
    },
}
