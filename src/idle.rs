//! Idle session eviction
//!
//! The reader sends a pulse for every line it handles; the monitor waits for
//! either the next pulse or the idle window to elapse. Once the window
//! elapses the session is told, its mailbox is closed, and the monitor stops.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::session::Session;

/// Create a linked heartbeat/monitor pair
pub fn channel(window: Duration) -> (Heartbeat, IdleMonitor) {
    let (tx, rx) = mpsc::channel(1);
    (
        Heartbeat { tx },
        IdleMonitor {
            state: IdleState::Active,
            window,
            pulses: rx,
            outcome: None,
        },
    )
}

/// Liveness pulse sender, owned by the reader
#[derive(Debug)]
pub struct Heartbeat {
    tx: mpsc::Sender<()>,
}

impl Heartbeat {
    /// Signal activity; pulses coalesce, so this never waits
    pub fn beat(&self) {
        let _ = self.tx.try_send(());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    TimedOut,
    Closed,
}

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// No pulse within the window; session was notified and its mailbox closed
    TimedOut,
    /// The heartbeat was dropped (reader finished first)
    ReaderGone,
}

#[derive(Debug)]
pub struct IdleMonitor {
    state: IdleState,
    window: Duration,
    pulses: mpsc::Receiver<()>,
    outcome: Option<IdleOutcome>,
}

impl IdleMonitor {
    pub fn state(&self) -> IdleState {
        self.state
    }

    /// Watch `session` until it times out or its reader goes away
    ///
    /// Closed is terminal: later calls return the same outcome without
    /// touching the session again.
    pub async fn watch(&mut self, session: &Session) -> IdleOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        loop {
            match tokio::time::timeout(self.window, self.pulses.recv()).await {
                Ok(Some(())) => {}
                Ok(None) => {
                    debug!("Reader gone for {}, idle monitor stopping", session.id);
                    return self.close(IdleOutcome::ReaderGone);
                }
                Err(_) => break,
            }
        }

        self.state = IdleState::TimedOut;
        info!("Session {} ({}) idle timeout", session.id, session.name());
        match session.send(ServerMessage::TimedOut) {
            Ok(()) => {}
            Err(SendError::Full) => warn!("Mailbox full for {}, timeout notice dropped", session.id),
            Err(SendError::Closed) => debug!("Session {} already closing", session.id),
        }
        session.mailbox().close();
        self.close(IdleOutcome::TimedOut)
    }

    fn close(&mut self, outcome: IdleOutcome) -> IdleOutcome {
        self.state = IdleState::Closed;
        self.outcome = Some(outcome);
        outcome
    }
}
