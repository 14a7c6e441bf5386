//! Command dispatch
//!
//! Turns one parsed `Command` into registry changes, a bus publish, or a
//! direct reply. Protocol errors are answered to the sender only.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::broadcast::Broadcaster;
use crate::error::{AppError, SendError};
use crate::message::{Command, ServerMessage};
use crate::registry::Registry;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
}

impl Router {
    pub fn new(registry: Arc<Registry>, broadcaster: Broadcaster) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Parse and handle one inbound line from `session`
    pub async fn dispatch(&self, session: &Arc<Session>, line: &str) {
        match Command::parse(line) {
            Command::Who => {
                reply(session, ServerMessage::OnlineList(self.registry.snapshot()));
            }
            Command::Rename { name } => self.handle_rename(session, name),
            Command::Private { target, content } => {
                self.handle_private(session, &target, content);
            }
            Command::MalformedPrivate => {
                reply(session, AppError::InvalidPrivateMessage.into());
            }
            Command::Public { text } => {
                if self.broadcaster.publish(session.chat(text)).await.is_err() {
                    warn!("Broadcast bus closed, message from {} lost", session.id);
                }
            }
        }
    }

    fn handle_rename(&self, session: &Arc<Session>, name: String) {
        match self.registry.rename(session, &name) {
            Ok(_) => reply(session, ServerMessage::Renamed { name }),
            Err(e) => {
                debug!("Rename to '{}' rejected for {}: {}", name, session.id, e);
                reply(session, e.into());
            }
        }
    }

    fn handle_private(&self, session: &Session, target: &str, content: String) {
        let recipient = match self.registry.lookup(target) {
            Ok(recipient) => recipient,
            Err(e) => {
                reply(session, e.into());
                return;
            }
        };

        let msg = ServerMessage::Private {
            from: session.name(),
            content,
        };
        if let Err(e) = recipient.send(msg) {
            warn!("Private message to '{}' not delivered: {}", target, e);
        }
    }
}

/// Answer the sender; a full or closing mailbox only costs this reply
fn reply(session: &Session, msg: ServerMessage) {
    match session.send(msg) {
        Ok(()) => {}
        Err(SendError::Full) => warn!("Mailbox full for {}, reply dropped", session.id),
        Err(SendError::Closed) => debug!("Session {} closing, reply dropped", session.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{self, Fanout};
    use crate::mailbox::{self, MailboxReceiver};

    struct Harness {
        registry: Arc<Registry>,
        router: Router,
        _fanout: Fanout,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(Registry::new());
            let (broadcaster, fanout) = broadcast::channel(16);
            Self {
                router: Router::new(Arc::clone(&registry), broadcaster),
                registry,
                _fanout: fanout,
            }
        }

        fn join(&self, address: &str) -> (Arc<Session>, MailboxReceiver) {
            let (tx, rx) = mailbox::channel(16);
            let session = Arc::new(Session::new(address.to_string(), tx));
            self.registry.register(Arc::clone(&session)).unwrap();
            (session, rx)
        }
    }

    async fn next_line(rx: &mut MailboxReceiver) -> String {
        rx.recv().await.unwrap().to_string()
    }

    /// Closes the mailbox and checks nothing else was queued
    async fn assert_empty(session: &Session, rx: &mut MailboxReceiver) {
        session.mailbox().close();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_who_lists_everyone_to_sender_only() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");
        let (b, mut b_rx) = h.join("10.0.0.2:2222");

        h.router.dispatch(&a, "who").await;

        assert_eq!(
            next_line(&mut a_rx).await,
            "[10.0.0.1:1111]10.0.0.1:1111 在线...\n[10.0.0.2:2222]10.0.0.2:2222 在线..."
        );
        assert_empty(&b, &mut b_rx).await;
        assert_eq!(h.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_rename_success() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");

        h.router.dispatch(&a, "rename|alice").await;

        assert_eq!(next_line(&mut a_rx).await, "您已更新用户名：alice");
        assert!(h.registry.lookup("10.0.0.1:1111").is_err());
        assert_eq!(h.registry.lookup("alice").unwrap().id, a.id);
    }

    #[tokio::test]
    async fn test_rename_collision_notifies_requester_only() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");
        let (b, mut b_rx) = h.join("10.0.0.2:2222");
        h.router.dispatch(&a, "rename|alice").await;
        next_line(&mut a_rx).await;

        h.router.dispatch(&b, "rename|alice").await;

        assert_eq!(next_line(&mut b_rx).await, "当前用户名已被使用");
        assert_eq!(b.name(), "10.0.0.2:2222");
        assert_empty(&a, &mut a_rx).await;
    }

    #[tokio::test]
    async fn test_private_message_reaches_target_only() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");
        let (b, mut b_rx) = h.join("10.0.0.2:2222");
        let (c, mut c_rx) = h.join("10.0.0.3:3333");
        h.registry.rename(&a, "alice").unwrap();

        h.router.dispatch(&b, "to|alice|hi").await;

        assert_eq!(next_line(&mut a_rx).await, "[私聊]10.0.0.2:2222: hi");
        assert_empty(&b, &mut b_rx).await;
        assert_empty(&c, &mut c_rx).await;
    }

    #[tokio::test]
    async fn test_private_message_unknown_target() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");

        h.router.dispatch(&a, "to|ghost|boo").await;

        assert_eq!(next_line(&mut a_rx).await, "该用户不存在");
    }

    #[tokio::test]
    async fn test_private_message_bad_format() {
        let h = Harness::new();
        let (a, mut a_rx) = h.join("10.0.0.1:1111");

        h.router.dispatch(&a, "to||hi").await;

        assert_eq!(
            next_line(&mut a_rx).await,
            "消息格式不正确，请使用\"to|张三|你好呀\""
        );
    }

    #[tokio::test]
    async fn test_public_message_goes_to_bus() {
        let registry = Arc::new(Registry::new());
        let (broadcaster, fanout) = broadcast::channel(16);
        let router = Router::new(Arc::clone(&registry), broadcaster);

        let (tx, mut rx) = mailbox::channel(16);
        let a = Arc::new(Session::new("10.0.0.1:1111".to_string(), tx));
        registry.register(Arc::clone(&a)).unwrap();

        router.dispatch(&a, "hello all").await;
        router.dispatch(&a, "").await;
        drop(router);
        fanout.run(Arc::clone(&registry)).await;

        assert_eq!(
            next_line(&mut rx).await,
            "[10.0.0.1:1111]10.0.0.1:1111 hello all"
        );
        assert_eq!(next_line(&mut rx).await, "[10.0.0.1:1111]10.0.0.1:1111 ");
    }
}
