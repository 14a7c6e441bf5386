//! Per-session outbound queue
//!
//! Many producers (fan-out, router, idle monitor) push into one bounded queue
//! that is drained by exactly one writer task. Pushes never wait: a full queue
//! drops the message. Closing is a one-way, idempotent signal; the writer
//! drains whatever is already queued and then stops.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::message::ServerMessage;

/// Create a mailbox with the given capacity
pub fn channel(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let closed = CancellationToken::new();
    (
        Mailbox {
            tx,
            closed: closed.clone(),
        },
        MailboxReceiver { rx, closed },
    )
}

/// Producer side of a session's mailbox
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<ServerMessage>,
    closed: CancellationToken,
}

impl Mailbox {
    /// Queue a message without waiting
    pub fn push(&self, msg: ServerMessage) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Stop accepting messages and tell the writer to finish
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

/// Consumer side, owned by the writer task
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<ServerMessage>,
    closed: CancellationToken,
}

impl MailboxReceiver {
    /// Next queued message, or `None` once the mailbox is closed and drained
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        tokio::select! {
            biased;
            msg = self.rx.recv() => msg,
            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> ServerMessage {
        ServerMessage::Chat {
            address: "127.0.0.1:1".to_string(),
            name: "a".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_push_and_recv_in_order() {
        let (mailbox, mut rx) = channel(8);
        mailbox.push(chat("one")).unwrap();
        mailbox.push(chat("two")).unwrap();

        assert_eq!(rx.recv().await, Some(chat("one")));
        assert_eq!(rx.recv().await, Some(chat("two")));
    }

    #[tokio::test]
    async fn test_full_mailbox_drops() {
        let (mailbox, mut rx) = channel(1);
        mailbox.push(chat("kept")).unwrap();
        assert_eq!(mailbox.push(chat("dropped")), Err(SendError::Full));

        assert_eq!(rx.recv().await, Some(chat("kept")));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (mailbox, mut rx) = channel(8);
        mailbox.push(ServerMessage::TimedOut).unwrap();
        mailbox.close();
        // Idempotent
        mailbox.close();

        assert!(mailbox.is_closed());
        assert_eq!(mailbox.push(chat("late")), Err(SendError::Closed));
        assert_eq!(rx.recv().await, Some(ServerMessage::TimedOut));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_writer() {
        let (mailbox, mut rx) = channel(8);
        let writer = tokio::spawn(async move { rx.recv().await });

        tokio::task::yield_now().await;
        mailbox.close();

        assert_eq!(writer.await.unwrap(), None);
    }
}
