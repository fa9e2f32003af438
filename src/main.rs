//! Modbus security gateway binary.
//!
//! `serve` bootstraps the PKI and runs the TLS listener; `client rhr` /
//! `client wsr` run one register operation with a stored client credential.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, warn};

use modbus_sentry::{
    Result, bootstrap,
    cli::{Cli, ClientCommand, Command, ConnectArgs},
    client::ModbusTlsClient,
    config::Config,
    pki::store,
    server::{ModbusTlsServer, ServerContext, tls},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Command::Client(client_cmd)) => run_client(&config, client_cmd).await,
        Some(Command::Serve) | None => run_server(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Bootstrap the PKI and serve until killed.
async fn run_server(config: &Config) -> Result<()> {
    let material = bootstrap::bootstrap(&config.pki.dir, &config.pki.clients)?;
    for (alias, error) in &material.failed_clients {
        warn!(alias = %alias, error = %error, "Serving without this client credential");
    }

    let tls_config = tls::build_server_tls(
        &material.server,
        &material.authority,
        config.server.require_client_cert,
    )?;
    let context = Arc::new(ServerContext::new());
    let server = ModbusTlsServer::bind(&config.server.listen, tls_config, context).await?;
    server.run().await
}

/// Run one client operation against a (possibly remote) server.
///
/// Mirrors the reference tool: the PKI is ensured first, so a fresh checkout
/// can generate its credentials and immediately connect to a server sharing
/// the same PKI directory.
async fn run_client(config: &Config, command: ClientCommand) -> Result<()> {
    let material = bootstrap::bootstrap(&config.pki.dir, &config.pki.clients)?;

    match command {
        ClientCommand::Rhr {
            connect,
            address,
            quantity,
        } => {
            let mut client = connect_client(config, &material, &connect).await?;
            let registers = client
                .read_holding_registers(connect.unit_id, address, quantity)
                .await?;
            println!("ReadHoldingRegisters({address}, {quantity}) -> {registers:?}");
        }
        ClientCommand::Wsr {
            connect,
            address,
            value,
        } => {
            let mut client = connect_client(config, &material, &connect).await?;
            client
                .write_single_register(connect.unit_id, address, value)
                .await?;
            println!("WriteSingleRegister({address}, {value}) -> ok");
        }
    }

    Ok(())
}

async fn connect_client(
    config: &Config,
    material: &bootstrap::PkiMaterial,
    connect: &ConnectArgs,
) -> Result<ModbusTlsClient> {
    let path = bootstrap::archive_path(&config.pki.dir, &connect.alias);
    let credential = store::load(&path, &connect.alias)?;
    let tls = tls::build_client_tls(&credential, &material.authority)?;
    ModbusTlsClient::connect(&connect.host, connect.port, tls).await
}
