//! Error types for the chat relay
//!
//! Defines application-level errors, mailbox send errors and config errors.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// Covers both transport errors (session teardown) and protocol errors
/// (reply to the sender, connection stays open).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (session-local)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested display name belongs to another session
    #[error("name already in use")]
    NameTaken,

    /// Private message target is not online
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// `to|` line without a target or without content
    #[error("malformed private message")]
    InvalidPrivateMessage,
}

/// Mailbox send errors
///
/// Pushes never block, so a slow reader shows up as `Full`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The mailbox is at capacity; the message was dropped
    #[error("Mailbox full")]
    Full,
    /// The mailbox has been closed (session is shutting down)
    #[error("Mailbox closed")]
    Closed,
}

/// Errors raised while loading `ServerConfig`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
}
