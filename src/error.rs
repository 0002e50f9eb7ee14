use thiserror::Error;

use crate::types::UserId;

/// Everything that can go wrong in the chat core.
///
/// The client-facing variants (`NickUsage`, `EmptyNick`,
/// `UnsupportedCommand`) display as the exact notice sent back to the
/// offending client.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("server full ({max} clients)")]
    ServerFull { max: usize },

    #[error("{0} is already registered")]
    AlreadyRegistered(UserId),

    #[error("Usage: /nick <nickname>")]
    NickUsage,

    #[error("Nickname cannot be empty")]
    EmptyNick,

    /// Carries the command token for logging; the client only sees the
    /// fixed notice.
    #[error("Unsupported command")]
    UnsupportedCommand(String),

    #[error("line longer than {max} bytes")]
    LineTooLong { max: usize },

    #[error("outbound queue full")]
    QueueFull,

    #[error("connection closed")]
    Disconnected,
}
