//! Session struct definition
//!
//! Represents one connected client: its identity, current display name and
//! outbound mailbox. The socket halves live with the connection handler and
//! the writer task; everything shared between tasks is here.

use parking_lot::RwLock;

use crate::error::SendError;
use crate::mailbox::Mailbox;
use crate::message::ServerMessage;
use crate::types::{Presence, SessionId};

/// Connected session information
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub id: SessionId,
    /// Peer socket address, fixed for the session's lifetime
    pub address: String,
    /// Display name; only `Registry::rename` changes it
    name: RwLock<String>,
    /// Server → Client queue
    mailbox: Mailbox,
}

impl Session {
    /// Create a session whose name defaults to its address
    pub fn new(address: String, mailbox: Mailbox) -> Self {
        Self {
            id: SessionId::new(),
            name: RwLock::new(address.clone()),
            address,
            mailbox,
        }
    }

    /// Current display name
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write() = name;
    }

    /// Queue a message for this client
    ///
    /// Never waits; returns an error if the mailbox is full or closed.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.mailbox.push(msg)
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn presence(&self) -> Presence {
        Presence {
            address: self.address.clone(),
            name: self.name(),
        }
    }

    /// `[address]name 已上线`
    pub fn online_notice(&self) -> ServerMessage {
        ServerMessage::Online {
            address: self.address.clone(),
            name: self.name(),
        }
    }

    /// `[address]name 下线`
    pub fn offline_notice(&self) -> ServerMessage {
        ServerMessage::Offline {
            address: self.address.clone(),
            name: self.name(),
        }
    }

    /// `[address]name text`
    pub fn chat(&self, text: String) -> ServerMessage {
        ServerMessage::Chat {
            address: self.address.clone(),
            name: self.name(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox;

    #[tokio::test]
    async fn test_session_creation() {
        let (tx, _rx) = mailbox::channel(8);
        let session = Session::new("10.0.0.1:1111".to_string(), tx);

        assert_eq!(session.name(), "10.0.0.1:1111");
        assert_eq!(session.address, "10.0.0.1:1111");
        assert_eq!(
            session.online_notice().to_string(),
            "[10.0.0.1:1111]10.0.0.1:1111 已上线"
        );
    }

    #[tokio::test]
    async fn test_session_send() {
        let (tx, mut rx) = mailbox::channel(8);
        let session = Session::new("10.0.0.1:1111".to_string(), tx);
        session.set_name("alice".to_string());

        session.send(session.chat("hello".to_string())).unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.to_string(), "[10.0.0.1:1111]alice hello");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (tx, _rx) = mailbox::channel(8);
        let session = Session::new("10.0.0.1:1111".to_string(), tx);
        session.mailbox().close();

        assert_eq!(session.send(ServerMessage::TimedOut), Err(SendError::Closed));
    }
}
