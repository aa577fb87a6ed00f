//! Accept loop for the admin Unix socket (spec §6). One task per accepted
//! connection; the listener itself never blocks on a connection's lifetime.

use crate::conn::handle_connection;
use crate::error::Result;
use apsigner_broker::BrokerHandle;
use apsigner_keystore::Keystore;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing::{info, warn};

pub async fn serve(socket_path: &Path, keystore: Arc<Keystore>, broker: BrokerHandle) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "admin IPC listening");

    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "admin IPC accept failed");
                continue;
            }
        };
        let keystore = Arc::clone(&keystore);
        let broker = broker.clone();
        tokio::spawn(async move {
            handle_connection(stream, keystore, broker).await;
        });
    }
}
