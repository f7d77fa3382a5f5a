// ABOUTME: Application-wide error types for jumpchain.
// ABOUTME: Chain errors carry the failing hop; config errors cover chain files.

use crate::ssh;
use crate::types::{Endpoint, HopId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "invalid chain element {index}{}: {reason}",
        .host.as_deref().map(|h| format!(" ({h})")).unwrap_or_default()
    )]
    InvalidArgument {
        index: usize,
        /// Present when the element names a host.
        host: Option<String>,
        reason: String,
    },

    #[error("authentication failed at {hop}: {reason}")]
    Authentication { hop: HopId, reason: String },

    #[error("connection failed at {hop}: {reason}")]
    Connection { hop: HopId, reason: String },

    #[error("{hop} could not open direct-tcpip channel to {target}: {reason}")]
    ChannelOpen {
        hop: HopId,
        target: String,
        reason: String,
    },

    #[error("host key for {hop} rejected by verification policy")]
    HostKeyRejected { hop: HopId },

    #[error("command failed: {0}")]
    Command(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Authentication,
    Connection,
    ChannelOpen,
    HostKey,
    Command,
    Config,
}

impl Error {
    /// Wrap a transport failure with the identity of the hop it happened at.
    ///
    /// Authentication failures keep only the transport's generic message, so
    /// nothing about one hop's credential leaks into another hop's report.
    /// Every result names the hop.
    pub(crate) fn at_hop(hop: HopId, source: ssh::Error) -> Self {
        match source.kind() {
            ssh::ErrorKind::Authentication => Error::Authentication {
                hop,
                reason: source.to_string(),
            },
            ssh::ErrorKind::HostKey => Error::HostKeyRejected { hop },
            ssh::ErrorKind::Connection
            | ssh::ErrorKind::ChannelOpen
            | ssh::ErrorKind::Command => Error::Connection {
                hop,
                reason: source.to_string(),
            },
        }
    }

    /// Wrap a failure to open the direct-tcpip channel from `hop` to `target`.
    pub(crate) fn opening_channel(hop: HopId, target: &Endpoint, source: ssh::Error) -> Self {
        match source.kind() {
            ssh::ErrorKind::ChannelOpen => Error::ChannelOpen {
                hop,
                target: format!("{}:{}", target.host(), target.port()),
                reason: source.to_string(),
            },
            _ => Self::at_hop(hop, source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::ChannelOpen { .. } => ErrorKind::ChannelOpen,
            Error::HostKeyRejected { .. } => ErrorKind::HostKey,
            Error::Command(_) | Error::CommandTimeout(_) => ErrorKind::Command,
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::MissingEnvVar(_)
            | Error::Io(_)
            | Error::Yaml(_) => ErrorKind::Config,
        }
    }

    /// The hop a chain failure happened at, if any.
    pub fn hop(&self) -> Option<&HopId> {
        match self {
            Error::Authentication { hop, .. }
            | Error::Connection { hop, .. }
            | Error::ChannelOpen { hop, .. }
            | Error::HostKeyRejected { hop } => Some(hop),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
