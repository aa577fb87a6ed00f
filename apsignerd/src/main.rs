//! Remote Algorand signing daemon (spec §1, §6): wires the keystore and
//! broker actors to the HTTP signing transport and the admin IPC
//! transport, then runs until shut down.

mod cli;
mod config;
mod mlock;
mod token;

use apsigner_broker::BrokerHandle;
use apsigner_keystore::Keystore;
use apsigner_lsig::LsigRegistry;
use apsigner_providers::ProviderRegistry;
use apsigner_transport_http::AppState;
use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroize;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = cli::Cli::parse();

    let config = match config::Config::load(&cli.data_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    if !mlock::lock_memory() {
        if config.require_memory_protection {
            tracing::error!("require_memory_protection is set but locking the process's memory failed");
            return ExitCode::from(2);
        }
        tracing::warn!("failed to lock process memory against swap; continuing best-effort");
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "runtime error");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: cli::Cli, config: config::Config) -> std::io::Result<()> {
    let store_root = config.store.clone().unwrap_or_else(|| cli.data_dir.clone());
    let keystore = Arc::new(Keystore::new(&store_root, &cli.identity));

    if let Some(argv) = &config.passphrase_command_argv {
        let mut passphrase = apsigner_keystore::passphrase_command::read_passphrase(argv)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        let result = keystore.initialize_or_unlock(&passphrase).await;
        passphrase.zeroize();
        match result {
            Ok(count) => tracing::info!(key_count = count, "unlocked via passphrase_command_argv"),
            Err(e) => tracing::error!(error = %e, "passphrase_command_argv did not unlock the store"),
        }
    }

    let providers = Arc::new(ProviderRegistry::new());
    let lsig = Arc::new(LsigRegistry::new());
    let broker: BrokerHandle = apsigner_broker::spawn(keystore.clone(), config.approval_policy());

    let token_path = apsigner_keystore::store::IdentityStore::new(&store_root, &cli.identity).token_path();
    let bearer_token: Arc<str> = Arc::from(token::load_or_generate(&token_path)?.as_str());

    let http_state = AppState {
        keystore: keystore.clone(),
        providers,
        lsig,
        broker: broker.clone(),
        allow_group_modification: config.allow_group_modification,
        bearer_token,
    };
    let app = apsigner_transport_http::router(http_state);
    let http_addr = SocketAddr::from(([127, 0, 0, 1], config.signer_port));
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "signing HTTP API listening");
    let http_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server exited");
        }
    });

    let ipc_path = config.resolved_ipc_path(&cli.data_dir);
    let ipc_keystore = keystore.clone();
    let ipc_broker = broker.clone();
    let ipc_server = tokio::spawn(async move {
        if let Err(e) = apsigner_transport_ipc::serve(&ipc_path, ipc_keystore, ipc_broker).await {
            tracing::error!(error = %e, "admin IPC server exited");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
        _ = http_server => {
            tracing::error!("HTTP server task ended unexpectedly");
        }
        _ = ipc_server => {
            tracing::error!("admin IPC server task ended unexpectedly");
        }
    }

    Ok(())
}
