//! One admin connection's lifecycle (spec §6, §4.3): authenticate, claim
//! (or queue behind) the admin singleton, then forward broker events to the
//! wire while dispatching keystore/broker commands from it. One
//! `tokio::task` per accepted connection (spec §5's "one connection task
//! per accepted connection").

use crate::frame::{ClientFrame, ClientMessage, ServerFrame, SignerState};
use apsigner_broker::{AdminConnection, AdminEvent, BrokerError, BrokerHandle};
use apsigner_keystore::Keystore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::{info, warn};
use uuid::Uuid;

type LineReader = Lines<BufReader<OwnedReadHalf>>;

/// `ServerFrame` variants that already carry their own `id` (`SignRequest`,
/// `TokenProvisioningRequest`) keep it; every other frame gets the
/// correlation `id` passed in here merged onto its JSON object. Done by
/// hand on a `serde_json::Value` rather than via a flattened wrapper struct,
/// since flatten + a same-named field would write `"id"` twice into the
/// output object.
async fn send(writer: &mut OwnedWriteHalf, id: Option<Uuid>, frame: ServerFrame) -> std::io::Result<()> {
    let mut value = serde_json::to_value(&frame).expect("ServerFrame always serializes");
    if let serde_json::Value::Object(map) = &mut value {
        map.entry("id").or_insert_with(|| match id {
            Some(id) => serde_json::Value::String(id.to_string()),
            None => serde_json::Value::Null,
        });
    }
    let mut line = serde_json::to_vec(&value).expect("value always serializes");
    line.push(b'\n');
    writer.write_all(&line).await
}

/// Parses the envelope `id` and the tagged `ClientFrame` from the same
/// `serde_json::Value` independently, for the same reason `send` avoids a
/// flattened struct: `SignResponse`/`TokenProvisioningResponse` reuse the
/// wire's single `id` key as their own field, which a flatten-deserialize
/// can't split between two Rust fields.
async fn read_frame(lines: &mut LineReader) -> Option<ClientMessage> {
    let line = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) | Err(_) => return None,
    };
    let value: serde_json::Value = match serde_json::from_str(&line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "malformed admin IPC frame");
            return None;
        }
    };
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    match serde_json::from_value::<ClientFrame>(value) {
        Ok(frame) => Some(ClientMessage { id, frame }),
        Err(e) => {
            warn!(error = %e, "malformed admin IPC frame");
            None
        }
    }
}

pub async fn handle_connection(stream: UnixStream, keystore: Arc<Keystore>, broker: BrokerHandle) {
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    if send(&mut writer, None, ServerFrame::AuthRequired).await.is_err() {
        return;
    }

    if !authenticate(&mut lines, &mut writer, &keystore).await {
        return;
    }

    let conn = match claim_admin_slot(&mut lines, &mut writer, &broker).await {
        Some(conn) => conn,
        None => return,
    };

    run_admin_session(conn, lines, writer, keystore, broker).await;
}

/// Loops on `Auth{passphrase}` until one verifies, rejecting any other
/// frame with `Error` (spec §6: the handshake must complete before
/// anything else is accepted). Returns `false` on disconnect.
async fn authenticate(lines: &mut LineReader, writer: &mut OwnedWriteHalf, keystore: &Keystore) -> bool {
    loop {
        let Some(msg) = read_frame(lines).await else { return false };
        match msg.frame {
            ClientFrame::Auth { passphrase } => match keystore.verify_passphrase(passphrase.as_bytes()).await {
                Ok(()) => {
                    if send(writer, msg.id, ServerFrame::AuthResult { success: true, error: None }).await.is_err() {
                        return false;
                    }
                    return true;
                }
                Err(e) => {
                    if send(writer, msg.id, ServerFrame::AuthResult { success: false, error: Some(e.to_string()) })
                        .await
                        .is_err()
                    {
                        return false;
                    }
                }
            },
            _ => {
                if send(writer, msg.id, ServerFrame::Error { error: "authenticate first".to_string() }).await.is_err() {
                    return false;
                }
            }
        }
    }
}

/// Claims the admin singleton, or — if one is already connected — sends
/// `ClientExists` and waits for an explicit `DisplaceConfirm` before
/// forcing the displacement (spec §4.3, §6). Returns `None` on disconnect
/// or a second rejected attempt.
async fn claim_admin_slot(lines: &mut LineReader, writer: &mut OwnedWriteHalf, broker: &BrokerHandle) -> Option<AdminConnection> {
    match broker.admin_connect("ipc-admin".to_string()).await {
        Ok(conn) => Some(conn),
        Err(BrokerError::ClientExists) => {
            send(writer, None, ServerFrame::ClientExists).await.ok()?;
            loop {
                let msg = read_frame(lines).await?;
                match msg.frame {
                    ClientFrame::DisplaceConfirm => return Some(broker.admin_displace("ipc-admin".to_string()).await.ok()?),
                    _ => {
                        send(writer, msg.id, ServerFrame::Error { error: "send DisplaceConfirm or disconnect".to_string() })
                            .await
                            .ok()?;
                    }
                }
            }
        }
        Err(_) => None,
    }
}

async fn run_admin_session(conn: AdminConnection, mut lines: LineReader, mut writer: OwnedWriteHalf, keystore: Arc<Keystore>, broker: BrokerHandle) {
    let AdminConnection { session_id, mut events } = conn;
    info!(%session_id, "admin IPC session established");

    let state = if keystore.is_unlocked().await { SignerState::Unlocked } else { SignerState::Locked };
    let key_count = keystore.list().await.map(|(keys, _)| keys.len()).unwrap_or(0);
    if send(&mut writer, None, ServerFrame::Status { state, key_count }).await.is_err() {
        broker.admin_disconnect(session_id).await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let frame = match event {
                    AdminEvent::SignRequest { id, address, txn_sender, description, timestamp, first_valid, last_valid, violations } => {
                        ServerFrame::SignRequest { id, address, txn_sender, description, timestamp, first_valid, last_valid, violations }
                    }
                    AdminEvent::SignerLocked => ServerFrame::SignerLocked,
                    AdminEvent::Displaced { reason } => {
                        let _ = send(&mut writer, None, ServerFrame::Displaced { reason }).await;
                        break;
                    }
                    AdminEvent::KeysChanged => ServerFrame::KeysChanged,
                };
                if send(&mut writer, None, frame).await.is_err() {
                    break;
                }
            }
            frame = read_frame(&mut lines) => {
                let Some(msg) = frame else { break };
                if !dispatch(msg, &mut writer, &keystore, &broker, session_id).await {
                    break;
                }
            }
        }
    }

    broker.admin_disconnect(session_id).await;
    info!(%session_id, "admin IPC session closed");
}

/// Handles one post-authentication client frame. Returns `false` if the
/// connection should close (write failure only — protocol errors are
/// reported back as `Error` frames and the session continues).
async fn dispatch(msg: ClientMessage, writer: &mut OwnedWriteHalf, keystore: &Keystore, broker: &BrokerHandle, session_id: Uuid) -> bool {
    let id = msg.id;
    match msg.frame {
        ClientFrame::Auth { .. } => send(writer, id, ServerFrame::Error { error: "already authenticated".to_string() }).await.is_ok(),
        ClientFrame::Unlock { passphrase } => match keystore.initialize_or_unlock(passphrase.as_bytes()).await {
            Ok(count) => send(writer, id, ServerFrame::UnlockResult { success: true, key_count: Some(count), error: None }).await.is_ok(),
            Err(e) => send(writer, id, ServerFrame::UnlockResult { success: false, key_count: None, error: Some(e.to_string()) }).await.is_ok(),
        },
        ClientFrame::SignResponse { id: request_id, approved, .. } => {
            if let Err(e) = broker.admin_decision(session_id, request_id, approved).await {
                return send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok();
            }
            true
        }
        ClientFrame::TokenProvisioningResponse { .. } => {
            warn!("received TokenProvisioningResponse but no provisioning request is ever issued; ignoring");
            true
        }
        ClientFrame::ListKeys => match keystore.list().await {
            Ok((keys, _)) => send(writer, id, ServerFrame::KeysList { keys }).await.is_ok(),
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::GenerateKey { key_type, parameters, .. } => match keystore.generate(&key_type, parameters).await {
            Ok((address, mnemonic)) => {
                broker.notify_keys_changed().await;
                send(writer, id, ServerFrame::GenerateResult { address, key_type, mnemonic }).await.is_ok()
            }
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::DeleteKey { address } => match keystore.delete(&address).await {
            Ok(()) => {
                broker.notify_keys_changed().await;
                send(writer, id, ServerFrame::DeleteResult { success: true }).await.is_ok()
            }
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::ExportKey { address, passphrase } => match keystore.export(&address, passphrase.as_bytes()).await {
            Ok(mnemonic) => send(writer, id, ServerFrame::ExportResult { address, mnemonic }).await.is_ok(),
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::ImportKey { key_type, mnemonic, parameters } => match keystore.import(&key_type, &mnemonic, parameters).await {
            Ok((address, _)) => {
                broker.notify_keys_changed().await;
                send(writer, id, ServerFrame::ImportResult { address }).await.is_ok()
            }
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::GetKeyDetails { address } => match keystore.list().await {
            Ok((keys, _)) => {
                let key = keys.into_iter().find(|k| k.address == address);
                send(writer, id, ServerFrame::KeyDetails { key }).await.is_ok()
            }
            Err(e) => send(writer, id, ServerFrame::Error { error: e.to_string() }).await.is_ok(),
        },
        ClientFrame::DisplaceConfirm => true,
    }
}
