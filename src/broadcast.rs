//! Public message bus and its fan-out consumer
//!
//! Any number of `Broadcaster` handles publish onto one bounded bus. A single
//! `Fanout` task drains it in arrival order and copies each message into every
//! registered mailbox, so all sessions see public messages in the same order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::registry::Registry;

/// Create the bus with the given capacity
pub fn channel(capacity: usize) -> (Broadcaster, Fanout) {
    let (tx, rx) = mpsc::channel(capacity);
    (Broadcaster { tx }, Fanout { rx })
}

/// Publishing handle, cheap to clone
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::Sender<ServerMessage>,
}

impl Broadcaster {
    /// Queue a message for every online session
    ///
    /// Waits only for room on the bus, never on an individual session.
    pub async fn publish(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.tx.send(msg).await.map_err(|_| SendError::Closed)
    }
}

/// The single bus consumer
#[derive(Debug)]
pub struct Fanout {
    rx: mpsc::Receiver<ServerMessage>,
}

impl Fanout {
    /// Run until every `Broadcaster` has been dropped
    pub async fn run(mut self, registry: Arc<Registry>) {
        info!("Broadcaster started");

        while let Some(msg) = self.rx.recv().await {
            deliver(&registry, &msg);
        }

        info!("Broadcaster shutting down");
    }
}

/// Copy `msg` into every mailbox registered right now
fn deliver(registry: &Registry, msg: &ServerMessage) {
    let sessions = registry.sessions();
    debug!("Broadcasting to {} sessions: {}", sessions.len(), msg);

    for session in sessions {
        match session.send(msg.clone()) {
            Ok(()) => {}
            Err(SendError::Full) => {
                warn!("Mailbox full for {}, dropping broadcast", session.id);
            }
            Err(SendError::Closed) => {
                debug!("Session {} closing, skipped broadcast", session.id);
            }
        }
    }
}
