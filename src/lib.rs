//! Multi-user TCP Chat Relay Library
//!
//! A line-based chat server built on tokio. Clients connect over plain TCP and
//! send one command per line.
//!
//! # Protocol
//! - `who`: list online users
//! - `rename|<name>`: change your display name
//! - `to|<name>|<content>`: private message
//! - anything else: public broadcast
//!
//! # Architecture
//! - `Registry` maps display names to sessions behind one read/write lock
//! - A single `Fanout` task drains the broadcast bus, so every session sees
//!   public messages in the same order
//! - Each session has a bounded `Mailbox` drained by its own writer task;
//!   producers never wait on a slow client
//! - An `IdleMonitor` per session evicts connections that stay silent for
//!   the configured window (60 seconds by default)
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::AppError> {
//!     let server = ChatServer::new(ServerConfig::default());
//!     let listener = server.bind().await?;
//!     server.run(listener).await
//! }
//! ```

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod idle;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::{Broadcaster, Fanout};
pub use codec::{Inbound, LineCodec};
pub use config::ServerConfig;
pub use error::{AppError, ConfigError, SendError};
pub use handler::{handle_connection, DisconnectReason};
pub use idle::{Heartbeat, IdleMonitor, IdleOutcome, IdleState};
pub use mailbox::{Mailbox, MailboxReceiver};
pub use message::{Command, ErrorCode, ServerMessage};
pub use registry::Registry;
pub use router::Router;
pub use server::{ChatServer, ServerContext};
pub use session::Session;
pub use types::{Presence, SessionId};
