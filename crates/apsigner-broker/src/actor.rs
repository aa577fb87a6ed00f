//! The broker actor (spec §4.3, §5): a single `tokio::task` owning the
//! admin session singleton, the per-request `AWAITING_DECISION` queue, and
//! the inactivity timer, behind one `mpsc::Sender<Command>` mailbox.
//! Callers never lock anything — they send a command and await a
//! `oneshot::Receiver` reply, the same request/response-over-channel shape
//! `wallet::remote_signer::RemoteSigner` uses over HTTP but turned inward
//! (spec §4.3's AMBIENT STACK note).

use crate::error::{BrokerError, Result};
use crate::linter::HardLinter;
use crate::policy::ApprovalPolicy;
use crate::request::{EntrySummary, RejectReason, Resolution};
use crate::warnings::generate_warnings;
use crate::events::AdminEvent;
use apsigner_keystore::Keystore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

const ADMIN_EVENT_CHANNEL_DEPTH: usize = 256;
const COMMAND_CHANNEL_DEPTH: usize = 256;
const INACTIVITY_TICK: Duration = Duration::from_millis(500);

struct PendingRequest {
    id: Uuid,
    event: AdminEvent,
    decision_tx: oneshot::Sender<Resolution>,
}

struct AdminSlot {
    id: Uuid,
    #[allow(dead_code)]
    identity: String,
    tx: mpsc::Sender<AdminEvent>,
}

enum Command {
    Submit {
        batch: Vec<EntrySummary>,
        description: String,
        reply: oneshot::Sender<Result<()>>,
    },
    TryAdminConnect {
        identity: String,
        reply: oneshot::Sender<Result<(Uuid, mpsc::Receiver<AdminEvent>)>>,
    },
    DisplaceAdmin {
        identity: String,
        reply: oneshot::Sender<(Uuid, mpsc::Receiver<AdminEvent>)>,
    },
    AdminDecision {
        session_id: Uuid,
        id: Uuid,
        approved: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    AdminDisconnect {
        session_id: Uuid,
    },
    ExpireRequest {
        id: Uuid,
    },
    KeysChanged,
}

/// A freshly (re)connected admin session: its id (carried on every future
/// disconnect/decision call) and the event stream to forward to the wire.
pub struct AdminConnection {
    pub session_id: Uuid,
    pub events: mpsc::Receiver<AdminEvent>,
}

/// Cheaply cloned handle to the broker actor's mailbox.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<Command>,
}

impl BrokerHandle {
    /// Submit a decoded batch for linting, warning generation, and
    /// approval (spec §4.3's full `RECEIVED -> ... -> RESOLVED`
    /// transition). Resolves once a decision — automatic, human, timeout,
    /// or lock — has been reached; callers run the planner/signing stage
    /// themselves only after this returns `Ok`.
    pub async fn submit(&self, batch: Vec<EntrySummary>, description: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Submit { batch, description, reply })
            .await
            .map_err(|_| BrokerError::ShuttingDown)?;
        rx.await.map_err(|_| BrokerError::ShuttingDown)?
    }

    /// `Err(ClientExists)` if an admin is already connected (spec §4.3:
    /// "A second connection receives `ClientExists`").
    pub async fn admin_connect(&self, identity: String) -> Result<AdminConnection> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::TryAdminConnect { identity, reply })
            .await
            .map_err(|_| BrokerError::ShuttingDown)?;
        let (session_id, events) = rx.await.map_err(|_| BrokerError::ShuttingDown)??;
        Ok(AdminConnection { session_id, events })
    }

    /// Forcibly replace whatever admin session is connected, sending it a
    /// `Displaced` event first (spec §4.3: only after `DisplaceConfirm`
    /// from the second side; the caller — `apsigner-transport-ipc` — is
    /// responsible for having received that confirmation before calling
    /// this). Never fails: there may be nothing to displace.
    pub async fn admin_displace(&self, identity: String) -> Result<AdminConnection> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::DisplaceAdmin { identity, reply })
            .await
            .map_err(|_| BrokerError::ShuttingDown)?;
        let (session_id, events) = rx.await.map_err(|_| BrokerError::ShuttingDown)?;
        Ok(AdminConnection { session_id, events })
    }

    pub async fn admin_decision(&self, session_id: Uuid, id: Uuid, approved: bool) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::AdminDecision { session_id, id, approved, reply })
            .await
            .map_err(|_| BrokerError::ShuttingDown)?;
        rx.await.map_err(|_| BrokerError::ShuttingDown)?
    }

    pub async fn admin_disconnect(&self, session_id: Uuid) {
        let _ = self.tx.send(Command::AdminDisconnect { session_id }).await;
    }

    /// Forwarded from a `apsigner_keystore::Keystore::subscribe_changes()`
    /// listener task in `apsignerd`, not called directly by transports.
    pub async fn notify_keys_changed(&self) {
        let _ = self.tx.send(Command::KeysChanged).await;
    }
}

struct Actor {
    keystore: Arc<Keystore>,
    policy: ApprovalPolicy,
    linter: HardLinter,
    admin: Option<AdminSlot>,
    pending: Vec<PendingRequest>,
    last_activity: Instant,
    self_tx: mpsc::Sender<Command>,
}

impl Actor {
    fn touch_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { batch, description, reply } => self.handle_submit(batch, description, reply).await,
            Command::TryAdminConnect { identity, reply } => {
                let result = if self.admin.is_some() {
                    Err(BrokerError::ClientExists)
                } else {
                    Ok(self.connect_admin(identity))
                };
                let _ = reply.send(result);
            }
            Command::DisplaceAdmin { identity, reply } => {
                if let Some(old) = self.admin.take() {
                    warn!(old_session = %old.id, "admin session displaced");
                    let _ = old
                        .tx
                        .send(AdminEvent::Displaced {
                            reason: "displaced by a newer admin connection".to_string(),
                        })
                        .await;
                }
                let _ = reply.send(self.connect_admin(identity));
            }
            Command::AdminDecision { session_id, id, approved, reply } => {
                let result = self.handle_decision(session_id, id, approved).await;
                let _ = reply.send(result);
            }
            Command::AdminDisconnect { session_id } => self.handle_disconnect(session_id).await,
            Command::ExpireRequest { id } => {
                self.pending.retain(|p| p.id != id);
            }
            Command::KeysChanged => {
                if let Some(admin) = &self.admin {
                    let _ = admin.tx.send(AdminEvent::KeysChanged).await;
                }
            }
        }
    }

    fn connect_admin(&mut self, identity: String) -> (Uuid, mpsc::Receiver<AdminEvent>) {
        let (tx, rx) = mpsc::channel(ADMIN_EVENT_CHANNEL_DEPTH);
        let session_id = Uuid::new_v4();
        info!(%session_id, %identity, "admin session connected");
        self.touch_activity();
        // Anything still AWAITING_DECISION from a prior session (plain
        // disconnect or displacement) is replayed so the new operator sees
        // it again (spec §5: pending requests "are resolved by a later
        // admin session").
        for pending in &self.pending {
            let _ = tx.try_send(pending.event.clone());
        }
        self.admin = Some(AdminSlot { id: session_id, identity, tx });
        (session_id, rx)
    }

    async fn handle_submit(&mut self, batch: Vec<EntrySummary>, description: String, reply: oneshot::Sender<Result<()>>) {
        self.touch_activity();

        if let Err(message) = self.linter.lint(&batch) {
            let _ = reply.send(Err(BrokerError::PolicyHard(message)));
            return;
        }

        let violations = generate_warnings(&batch);
        let auto_approve = (batch.len() == 1 && self.policy.txn_auto_approve)
            || (batch.len() > 1 && self.policy.group_auto_approve);
        if auto_approve {
            let _ = reply.send(Ok(()));
            return;
        }

        let Some(admin) = self.admin.as_ref() else {
            let _ = reply.send(Err(BrokerError::NoAdminSession));
            return;
        };

        let id = Uuid::new_v4();
        let event = AdminEvent::SignRequest {
            id,
            address: batch.iter().find_map(|e| e.sender.clone()),
            txn_sender: batch.iter().find_map(|e| e.auth_address.clone()),
            description,
            timestamp: time::OffsetDateTime::now_utc(),
            first_valid: batch.iter().find_map(|e| e.first_valid),
            last_valid: batch.iter().find_map(|e| e.last_valid),
            violations,
        };
        if admin.tx.send(event.clone()).await.is_err() {
            let _ = reply.send(Err(BrokerError::NoAdminSession));
            return;
        }

        let (decision_tx, decision_rx) = oneshot::channel();
        self.pending.push(PendingRequest { id, event, decision_tx });

        let timeout = self.policy.request_timeout;
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, decision_rx).await {
                Ok(Ok(Resolution::Approved)) => Ok(()),
                Ok(Ok(Resolution::Rejected(RejectReason::RejectedByUser))) => Err(BrokerError::ApprovalRejected),
                Ok(Ok(Resolution::Rejected(RejectReason::SignerLocked))) => Err(BrokerError::SignerLocked),
                Ok(Err(_)) => Err(BrokerError::ShuttingDown),
                Err(_elapsed) => {
                    let _ = self_tx.send(Command::ExpireRequest { id }).await;
                    Err(BrokerError::ApprovalTimeout)
                }
            };
            let _ = reply.send(outcome);
        });
    }

    async fn handle_decision(&mut self, session_id: Uuid, id: Uuid, approved: bool) -> Result<()> {
        match &self.admin {
            Some(admin) if admin.id == session_id => {}
            _ => return Err(BrokerError::Displaced),
        }
        self.touch_activity();
        let Some(pos) = self.pending.iter().position(|p| p.id == id) else {
            return Err(BrokerError::UnknownRequest(id));
        };
        let pending = self.pending.remove(pos);
        let resolution = if approved {
            Resolution::Approved
        } else {
            Resolution::Rejected(RejectReason::RejectedByUser)
        };
        let _ = pending.decision_tx.send(resolution);
        Ok(())
    }

    async fn handle_disconnect(&mut self, session_id: Uuid) {
        let Some(admin) = &self.admin else { return };
        if admin.id != session_id {
            return;
        }
        info!(%session_id, "admin session disconnected");
        self.admin = None;
        if self.policy.lock_on_disconnect {
            self.do_lock().await;
        }
    }

    /// Zeroizes the keystore and resolves every in-flight
    /// `AWAITING_DECISION` request as `reject(signer_locked)` (spec §9's
    /// Open Question: resolved, not parked, because a locked signer cannot
    /// produce a signature regardless of who reconnects).
    async fn do_lock(&mut self) {
        self.keystore.lock().await;
        for pending in self.pending.drain(..) {
            let _ = pending.decision_tx.send(Resolution::Rejected(RejectReason::SignerLocked));
        }
        if let Some(admin) = &self.admin {
            let _ = admin.tx.send(AdminEvent::SignerLocked).await;
        }
    }

    async fn check_inactivity(&mut self) {
        if self.policy.passphrase_timeout.is_zero() {
            return;
        }
        if !self.keystore.is_unlocked().await {
            return;
        }
        if self.last_activity.elapsed() >= self.policy.passphrase_timeout {
            info!("inactivity timeout elapsed, locking signer");
            self.do_lock().await;
        }
    }
}

/// Spawn the broker actor as its own `tokio::task`, returning a cheaply
/// cloned handle to its mailbox.
pub fn spawn(keystore: Arc<Keystore>, policy: ApprovalPolicy) -> BrokerHandle {
    let (tx, mut rx) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
    let mut actor = Actor {
        keystore,
        policy,
        linter: HardLinter::new(),
        admin: None,
        pending: Vec::new(),
        last_activity: Instant::now(),
        self_tx: tx.clone(),
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(INACTIVITY_TICK);
        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => actor.handle(cmd).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => actor.check_inactivity().await,
            }
        }
    });
    BrokerHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::EntryRole;
    use std::time::Duration as StdDuration;

    async fn fresh_keystore() -> (tempfile::TempDir, Arc<Keystore>) {
        let dir = tempfile::tempdir().unwrap();
        let ks = Keystore::new(dir.path(), "default");
        ks.initialize_or_unlock(b"pw").await.unwrap();
        (dir, Arc::new(ks))
    }

    #[tokio::test]
    async fn single_txn_auto_approve_needs_no_admin() {
        let (_dir, ks) = fresh_keystore().await;
        let policy = ApprovalPolicy { txn_auto_approve: true, ..Default::default() };
        let handle = spawn(ks, policy);
        let batch = vec![EntrySummary::new(EntryRole::Sign)];
        handle.submit(batch, "1 payment".into()).await.unwrap();
    }

    #[tokio::test]
    async fn without_admin_or_auto_approve_request_is_rejected() {
        let (_dir, ks) = fresh_keystore().await;
        let handle = spawn(ks, ApprovalPolicy::default());
        let batch = vec![EntrySummary::new(EntryRole::Sign)];
        let err = handle.submit(batch, "1 payment".into()).await.unwrap_err();
        assert_eq!(err, BrokerError::NoAdminSession);
    }

    #[tokio::test]
    async fn admin_approves_pending_request() {
        let (_dir, ks) = fresh_keystore().await;
        let handle = spawn(ks, ApprovalPolicy::default());
        let conn = handle.admin_connect("op".into()).await.unwrap();
        let mut events = conn.events;

        let submit = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(vec![EntrySummary::new(EntryRole::Sign)], "1 payment".into()).await }
        });

        let event = events.recv().await.unwrap();
        let AdminEvent::SignRequest { id, .. } = event else { panic!("expected SignRequest") };
        handle.admin_decision(conn.session_id, id, true).await.unwrap();
        submit.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn admin_rejection_surfaces_as_rejected_by_user() {
        let (_dir, ks) = fresh_keystore().await;
        let handle = spawn(ks, ApprovalPolicy::default());
        let conn = handle.admin_connect("op".into()).await.unwrap();
        let mut events = conn.events;

        let submit = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(vec![EntrySummary::new(EntryRole::Sign)], "1 payment".into()).await }
        });

        let AdminEvent::SignRequest { id, .. } = events.recv().await.unwrap() else { panic!() };
        handle.admin_decision(conn.session_id, id, false).await.unwrap();
        let result = submit.await.unwrap();
        assert_eq!(result.unwrap_err(), BrokerError::ApprovalRejected);
    }

    #[tokio::test]
    async fn second_admin_connect_is_rejected_until_displaced() {
        let (_dir, ks) = fresh_keystore().await;
        let handle = spawn(ks, ApprovalPolicy::default());
        let first = handle.admin_connect("op1".into()).await.unwrap();

        let err = handle.admin_connect("op2".into()).await.unwrap_err();
        assert_eq!(err, BrokerError::ClientExists);

        let mut first_events = first.events;
        let second = handle.admin_displace("op2".into()).await.unwrap();
        let event = first_events.recv().await.unwrap();
        assert!(matches!(event, AdminEvent::Displaced { .. }));
        assert_ne!(second.session_id, first.session_id);
    }

    #[tokio::test(start_paused = true)]
    async fn request_times_out_when_admin_never_decides() {
        let (_dir, ks) = fresh_keystore().await;
        let mut policy = ApprovalPolicy::default();
        policy.request_timeout = StdDuration::from_millis(10);
        let handle = spawn(ks, policy);
        let _conn = handle.admin_connect("op".into()).await.unwrap();

        let submit = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(vec![EntrySummary::new(EntryRole::Sign)], "1 payment".into()).await }
        });
        tokio::time::advance(StdDuration::from_millis(50)).await;
        let result = submit.await.unwrap();
        assert_eq!(result.unwrap_err(), BrokerError::ApprovalTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_timeout_locks_and_rejects_pending() {
        let (_dir, ks) = fresh_keystore().await;
        let mut policy = ApprovalPolicy::default();
        policy.passphrase_timeout = StdDuration::from_millis(20);
        policy.request_timeout = StdDuration::from_secs(60);
        let handle = spawn(ks.clone(), policy);
        let conn = handle.admin_connect("op".into()).await.unwrap();
        let mut events = conn.events;

        let submit = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(vec![EntrySummary::new(EntryRole::Sign)], "1 payment".into()).await }
        });
        let _ = events.recv().await.unwrap();

        tokio::time::advance(StdDuration::from_millis(600)).await;
        let locked_event = events.recv().await.unwrap();
        assert!(matches!(locked_event, AdminEvent::SignerLocked));
        let result = submit.await.unwrap();
        assert_eq!(result.unwrap_err(), BrokerError::SignerLocked);
        assert!(!ks.is_unlocked().await);
    }
}
