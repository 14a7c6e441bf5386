//! Message protocol definitions
//!
//! Plain-text, newline-delimited protocol. `Command` is what a client line
//! parses into; `ServerMessage` is everything the server pushes back, rendered
//! through `Display` into its exact wire form.

use std::fmt;

use crate::error::AppError;
use crate::types::Presence;

const RENAME_PREFIX: &str = "rename|";
const PRIVATE_PREFIX: &str = "to|";

/// Client → Server command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `who`: list online users
    Who,
    /// `rename|<name>`: change own display name
    Rename { name: String },
    /// `to|<target>|<content>`: private message
    Private { target: String, content: String },
    /// `to|...` line missing its target or content
    MalformedPrivate,
    /// Any other text, broadcast to everyone
    Public { text: String },
}

impl Command {
    /// Parse one inbound line (delimiter already stripped)
    pub fn parse(line: &str) -> Self {
        if line == "who" {
            return Command::Who;
        }

        if let Some(name) = line.strip_prefix(RENAME_PREFIX) {
            if !name.is_empty() {
                return Command::Rename {
                    name: name.to_string(),
                };
            }
        }

        if let Some(rest) = line.strip_prefix(PRIVATE_PREFIX) {
            if !rest.is_empty() {
                let mut fields = rest.splitn(2, '|');
                let target = fields.next().unwrap_or_default();
                return match fields.next() {
                    Some(content) if !target.is_empty() => Command::Private {
                        target: target.to_string(),
                        content: content.to_string(),
                    },
                    _ => Command::MalformedPrivate,
                };
            }
        }

        Command::Public {
            text: line.to_string(),
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A user connected
    Online { address: String, name: String },
    /// A user left (disconnect, timeout or error)
    Offline { address: String, name: String },
    /// Public chat line
    Chat {
        address: String,
        name: String,
        text: String,
    },
    /// Reply to `who`
    OnlineList(Vec<Presence>),
    /// Private message delivered to its target
    Private { from: String, content: String },
    /// Rename succeeded
    Renamed { name: String },
    /// Recoverable protocol error
    Error(ErrorCode),
    /// Final notice before an idle session is closed
    TimedOut,
}

/// Error codes for `ServerMessage::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NameTaken,
    UserNotFound,
    InvalidFormat,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NameTaken => f.write_str("当前用户名已被使用"),
            ErrorCode::UserNotFound => f.write_str("该用户不存在"),
            ErrorCode::InvalidFormat => f.write_str("消息格式不正确，请使用\"to|张三|你好呀\""),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Online { address, name } => write!(f, "[{address}]{name} 已上线"),
            ServerMessage::Offline { address, name } => write!(f, "[{address}]{name} 下线"),
            ServerMessage::Chat {
                address,
                name,
                text,
            } => write!(f, "[{address}]{name} {text}"),
            ServerMessage::OnlineList(users) => {
                for (i, user) in users.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "[{}]{} 在线...", user.address, user.name)?;
                }
                Ok(())
            }
            ServerMessage::Private { from, content } => write!(f, "[私聊]{from}: {content}"),
            ServerMessage::Renamed { name } => write!(f, "您已更新用户名：{name}"),
            ServerMessage::Error(code) => write!(f, "{code}"),
            ServerMessage::TimedOut => f.write_str("你已超时离线了"),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let code = match err {
            AppError::NameTaken => ErrorCode::NameTaken,
            AppError::UserNotFound(_) => ErrorCode::UserNotFound,
            // Transport and config errors never reach a client
            _ => ErrorCode::InvalidFormat,
        };
        ServerMessage::Error(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_who() {
        assert_eq!(Command::parse("who"), Command::Who);
        assert_eq!(
            Command::parse("who "),
            Command::Public {
                text: "who ".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rename() {
        assert_eq!(
            Command::parse("rename|alice"),
            Command::Rename {
                name: "alice".to_string()
            }
        );
        // Nothing to rename to: plain text
        assert_eq!(
            Command::parse("rename|"),
            Command::Public {
                text: "rename|".to_string()
            }
        );
    }

    #[test]
    fn test_parse_private() {
        assert_eq!(
            Command::parse("to|alice|hi"),
            Command::Private {
                target: "alice".to_string(),
                content: "hi".to_string()
            }
        );
        assert_eq!(
            Command::parse("to|alice|a|b"),
            Command::Private {
                target: "alice".to_string(),
                content: "a|b".to_string()
            }
        );
        assert_eq!(
            Command::parse("to|alice|"),
            Command::Private {
                target: "alice".to_string(),
                content: String::new()
            }
        );
    }

    #[test]
    fn test_parse_malformed_private() {
        assert_eq!(Command::parse("to||hi"), Command::MalformedPrivate);
        assert_eq!(Command::parse("to|alice"), Command::MalformedPrivate);
        assert_eq!(
            Command::parse("to|"),
            Command::Public {
                text: "to|".to_string()
            }
        );
    }

    #[test]
    fn test_parse_public() {
        assert_eq!(
            Command::parse("hello"),
            Command::Public {
                text: "hello".to_string()
            }
        );
        assert_eq!(
            Command::parse(""),
            Command::Public {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_server_message_wire_format() {
        let online = ServerMessage::Online {
            address: "10.0.0.1:1111".to_string(),
            name: "10.0.0.1:1111".to_string(),
        };
        assert_eq!(online.to_string(), "[10.0.0.1:1111]10.0.0.1:1111 已上线");

        let private = ServerMessage::Private {
            from: "bob".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(private.to_string(), "[私聊]bob: hi");

        assert_eq!(
            ServerMessage::Renamed {
                name: "alice".to_string()
            }
            .to_string(),
            "您已更新用户名：alice"
        );
        assert_eq!(ServerMessage::TimedOut.to_string(), "你已超时离线了");
    }

    #[test]
    fn test_online_list_one_user_per_line() {
        let list = ServerMessage::OnlineList(vec![
            Presence {
                address: "10.0.0.1:1111".to_string(),
                name: "alice".to_string(),
            },
            Presence {
                address: "10.0.0.2:2222".to_string(),
                name: "bob".to_string(),
            },
        ]);
        assert_eq!(
            list.to_string(),
            "[10.0.0.1:1111]alice 在线...\n[10.0.0.2:2222]bob 在线..."
        );
    }

    #[test]
    fn test_error_conversion() {
        let msg: ServerMessage = AppError::UserNotFound("ghost".to_string()).into();
        assert_eq!(msg.to_string(), "该用户不存在");

        let msg: ServerMessage = AppError::NameTaken.into();
        assert_eq!(msg.to_string(), "当前用户名已被使用");

        let msg: ServerMessage = AppError::InvalidPrivateMessage.into();
        assert!(msg.to_string().starts_with("消息格式不正确"));
    }
}
