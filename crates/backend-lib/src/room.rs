// ============================
// crates/backend-lib/src/room.rs
// ============================
//! Per-room actor: owns the member set and serializes fan-out.
//!
//! Each room runs one task consuming three channels (`register`,
//! `unregister`, `broadcast`). All broadcasts within a room are totally
//! ordered by that task's receive order. Delivery is best-effort and
//! non-blocking: a member whose outbound queue is full is evicted so one
//! slow peer cannot stall the room.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use uuid::Uuid;

/// One serialized frame ready for the wire.
pub type Frame = String;

/// Capacity of the membership channels. Joins and leaves are rare compared
/// to broadcasts, so a small buffer suffices.
const MEMBERSHIP_QUEUE_DEPTH: usize = 16;

struct Registration {
    id: Uuid,
    sender: mpsc::Sender<Frame>,
    ack: oneshot::Sender<()>,
}

struct Unregistration {
    id: Uuid,
    ack: oneshot::Sender<()>,
}

type Members = Arc<RwLock<HashMap<Uuid, mpsc::Sender<Frame>>>>;

pub struct Room {
    key: String,
    members: Members,
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<Unregistration>,
    broadcast_tx: mpsc::Sender<Frame>,
}

impl Room {
    /// Create the room and start its owning task.
    pub fn spawn(key: impl Into<String>, broadcast_depth: usize) -> Arc<Self> {
        let key = key.into();
        let members: Members = Arc::new(RwLock::new(HashMap::new()));

        let (register_tx, register_rx) = mpsc::channel(MEMBERSHIP_QUEUE_DEPTH);
        let (unregister_tx, unregister_rx) = mpsc::channel(MEMBERSHIP_QUEUE_DEPTH);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(broadcast_depth);

        tokio::spawn(run(
            members.clone(),
            register_rx,
            unregister_rx,
            broadcast_rx,
        ));

        Arc::new(Self {
            key,
            members,
            register_tx,
            unregister_tx,
            broadcast_tx,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current member count.
    pub fn size(&self) -> usize {
        self.members.read().unwrap().len()
    }

    /// Admit a member. Resolves once the room task has applied the change.
    pub async fn register(&self, id: Uuid, sender: mpsc::Sender<Frame>) {
        let (ack, done) = oneshot::channel();
        if self
            .register_tx
            .send(Registration { id, sender, ack })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    /// Remove a member and close its outbound queue. Resolves once the room
    /// task has applied the change, so a following empty-check is accurate.
    pub async fn unregister(&self, id: Uuid) {
        let (ack, done) = oneshot::channel();
        if self
            .unregister_tx
            .send(Unregistration { id, ack })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    /// Queue one frame for delivery to every current member.
    pub async fn broadcast(&self, frame: Frame) {
        let _ = self.broadcast_tx.send(frame).await;
    }
}

async fn run(
    members: Members,
    mut register_rx: mpsc::Receiver<Registration>,
    mut unregister_rx: mpsc::Receiver<Unregistration>,
    mut broadcast_rx: mpsc::Receiver<Frame>,
) {
    loop {
        tokio::select! {
            registration = register_rx.recv() => {
                let Some(Registration { id, sender, ack }) = registration else { break };
                members.write().unwrap().insert(id, sender);
                let _ = ack.send(());
            },
            unregistration = unregister_rx.recv() => {
                let Some(Unregistration { id, ack }) = unregistration else { break };
                members.write().unwrap().remove(&id);
                let _ = ack.send(());
            },
            frame = broadcast_rx.recv() => {
                let Some(frame) = frame else { break };
                // Non-blocking enqueue per member. Dropping a member's sender
                // here is what closes its queue and ends its write pump.
                members.write().unwrap().retain(|_, sender| {
                    match sender.try_send(frame.clone()) {
                        Ok(()) => true,
                        Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
                    }
                });
            },
        }
    }
}
