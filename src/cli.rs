//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Modbus/TCP security gateway - role-tagged mTLS with register authorization
#[derive(Parser, Debug)]
#[command(name = "modbus-sentry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MODBUS_SENTRY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "MODBUS_SENTRY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MODBUS_SENTRY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap the PKI and start the Modbus security server (default)
    Serve,

    /// Run a Modbus security client operation
    #[command(subcommand)]
    Client(ClientCommand),
}

/// Client subcommands
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Read Holding Registers
    Rhr {
        /// Connection options
        #[command(flatten)]
        connect: ConnectArgs,

        /// First register address to read
        address: u16,

        /// Number of registers to read
        quantity: u16,
    },

    /// Write Single Register
    Wsr {
        /// Connection options
        #[command(flatten)]
        connect: ConnectArgs,

        /// Register address to write
        address: u16,

        /// Value to write
        value: u16,
    },
}

/// Connection options shared by the client subcommands
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Host to connect to
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to connect to
    #[arg(short, long, default_value_t = 802)]
    pub port: u16,

    /// Unit ID to address
    #[arg(short, long, default_value_t = 1)]
    pub unit_id: u8,

    /// Credential alias to connect with
    #[arg(long, default_value = "client1")]
    pub alias: String,
}
