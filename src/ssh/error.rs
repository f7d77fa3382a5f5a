// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, host key, and channel failures for one hop.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("host key rejected by verification policy")]
    HostKeyRejected,

    #[error("authentication failed: credentials rejected")]
    AuthenticationFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("direct-tcpip channel refused: {0}")]
    ChannelOpenFailed(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, handshake, or protocol failure.
    Connection,
    /// The hop's credential was rejected or could not be used.
    Authentication,
    /// The host key policy refused the server key.
    HostKey,
    /// The server would not open a forwarding channel.
    ChannelOpen,
    /// Failure while running a command on an established session.
    Command,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) | Error::Protocol(_) | Error::Io(_) => ErrorKind::Connection,
            Error::HostKeyRejected => ErrorKind::HostKey,
            Error::AuthenticationFailed
            | Error::AgentUnavailable(_)
            | Error::KeyLoadFailed { .. }
            | Error::Key(_) => ErrorKind::Authentication,
            Error::ChannelOpenFailed(_) => ErrorKind::ChannelOpen,
            Error::CommandFailed(_) | Error::ChannelClosed => ErrorKind::Command,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
