//! End-to-end exercise of the admin IPC transport (spec §4.3, §6) over a
//! real Unix socket: authenticate, receive a pushed `SignRequest`, approve
//! it, and exercise the `ClientExists` / `DisplaceConfirm` / `Displaced`
//! exclusivity dance — the same black-box style the teacher's
//! `wallet_remote_signer` example is driven with, adapted from HTTP to a
//! line-delimited Unix socket client.

use apsigner_broker::{spawn, ApprovalPolicy};
use apsigner_keystore::Keystore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

async fn connect(path: &std::path::Path) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("could not connect to admin IPC socket at {}", path.display());
}

async fn send(stream: &mut UnixStream, frame: Value) {
    let mut line = serde_json::to_vec(&frame).unwrap();
    line.push(b'\n');
    stream.write_all(&line).await.unwrap();
}

async fn recv(reader: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>) -> Value {
    let line = timeout(Duration::from_secs(2), reader.next_line())
        .await
        .expect("timed out waiting for a frame")
        .unwrap()
        .expect("connection closed unexpectedly");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn authenticate_then_approve_a_pushed_sign_request() {
    let data_dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(Keystore::new(data_dir.path(), "default"));
    keystore.initialize_or_unlock(b"pw").await.unwrap();
    let broker = spawn(keystore.clone(), ApprovalPolicy::default());

    let socket_dir = tempfile::tempdir().unwrap();
    let socket_path = socket_dir.path().join("aplane.sock");
    let serve_keystore = keystore.clone();
    let serve_broker = broker.clone();
    let serve_path = socket_path.clone();
    tokio::spawn(async move {
        apsigner_transport_ipc::serve(&serve_path, serve_keystore, serve_broker).await.unwrap();
    });

    let stream = connect(&socket_path).await;
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    assert_eq!(recv(&mut lines).await["type"], "AuthRequired");

    send(&mut writer, json!({"type": "Auth", "passphrase": "pw"})).await;
    let auth_result = recv(&mut lines).await;
    assert_eq!(auth_result["type"], "AuthResult");
    assert_eq!(auth_result["success"], true);

    let status = recv(&mut lines).await;
    assert_eq!(status["type"], "Status");
    assert_eq!(status["state"], "unlocked");
    assert_eq!(status["key_count"], 0);

    let submit = tokio::spawn({
        let handle = broker.clone();
        async move {
            handle
                .submit(
                    vec![apsigner_broker::EntrySummary::new(apsigner_broker::EntryRole::Sign)],
                    "1 payment".to_string(),
                )
                .await
        }
    });

    let sign_request = recv(&mut lines).await;
    assert_eq!(sign_request["type"], "SignRequest");
    let request_id = sign_request["id"].clone();

    send(&mut writer, json!({"type": "SignResponse", "id": request_id, "approved": true})).await;
    submit.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_admin_is_told_client_exists_and_first_is_displaced_on_confirm() {
    let data_dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(Keystore::new(data_dir.path(), "default"));
    keystore.initialize_or_unlock(b"pw").await.unwrap();
    let broker = spawn(keystore.clone(), ApprovalPolicy::default());

    let socket_dir = tempfile::tempdir().unwrap();
    let socket_path = socket_dir.path().join("aplane.sock");
    let serve_keystore = keystore.clone();
    let serve_broker = broker.clone();
    let serve_path = socket_path.clone();
    tokio::spawn(async move {
        apsigner_transport_ipc::serve(&serve_path, serve_keystore, serve_broker).await.unwrap();
    });

    let first = connect(&socket_path).await;
    let (first_read, mut first_writer) = first.into_split();
    let mut first_lines = BufReader::new(first_read).lines();
    assert_eq!(recv(&mut first_lines).await["type"], "AuthRequired");
    send(&mut first_writer, json!({"type": "Auth", "passphrase": "pw"})).await;
    assert_eq!(recv(&mut first_lines).await["success"], true);
    assert_eq!(recv(&mut first_lines).await["type"], "Status");

    let second = connect(&socket_path).await;
    let (second_read, mut second_writer) = second.into_split();
    let mut second_lines = BufReader::new(second_read).lines();
    assert_eq!(recv(&mut second_lines).await["type"], "AuthRequired");
    send(&mut second_writer, json!({"type": "Auth", "passphrase": "pw"})).await;
    assert_eq!(recv(&mut second_lines).await["success"], true);
    assert_eq!(recv(&mut second_lines).await["type"], "ClientExists");

    send(&mut second_writer, json!({"type": "DisplaceConfirm"})).await;
    let displaced = recv(&mut first_lines).await;
    assert_eq!(displaced["type"], "Displaced");
    assert_eq!(recv(&mut second_lines).await["type"], "Status");
}
