// ABOUTME: Validated, immutable description of one SSH hop.
// ABOUTME: Carries address, login name, and the single credential to present.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEndpointError {
    #[error("host cannot be empty")]
    EmptyHost,

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u32),

    #[error("principal (user name) cannot be empty")]
    EmptyPrincipal,

    #[error("private key path cannot be empty")]
    EmptyKeyPath,
}

/// How to authenticate to a hop. Exactly one method is attempted.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Offer every identity held by the running ssh-agent.
    Agent,
    /// The SSH "none" method; succeeds only on hosts that allow it.
    None,
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password(password.into())
    }

    pub fn key_file(path: impl Into<PathBuf>) -> Self {
        Credential::KeyFile {
            path: path.into(),
            passphrase: None,
        }
    }

    pub fn encrypted_key_file(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Credential::KeyFile {
            path: path.into(),
            passphrase: Some(passphrase.into()),
        }
    }

    /// Method name as used in SSH_MSG_USERAUTH_REQUEST.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::KeyFile { .. } | Credential::Agent => "publickey",
            Credential::None => "none",
        }
    }
}

// Secrets never reach logs or error messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Credential::Agent => f.write_str("Agent"),
            Credential::None => f.write_str("None"),
        }
    }
}

/// Everything needed to reach and log in to one SSH host.
///
/// Fields are private so a descriptor cannot change after validation:
///
/// ```compile_fail
/// use jumpchain::types::{Credential, Endpoint};
///
/// let mut hop = Endpoint::new("10.0.0.1", 22, "u1", Credential::password("p1")).unwrap();
/// hop.host = String::from("10.0.0.9");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    principal: String,
    credential: Credential,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        principal: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, InvalidEndpointError> {
        let host = host.into();
        let principal = principal.into();

        if host.trim().is_empty() {
            return Err(InvalidEndpointError::EmptyHost);
        }

        if port == 0 {
            return Err(InvalidEndpointError::InvalidPort(0));
        }

        if principal.trim().is_empty() {
            return Err(InvalidEndpointError::EmptyPrincipal);
        }

        if let Credential::KeyFile { path, .. } = &credential {
            if path.as_os_str().is_empty() {
                return Err(InvalidEndpointError::EmptyKeyPath);
            }
        }

        Ok(Self {
            host,
            port,
            principal,
            credential,
        })
    }

    /// Like [`Endpoint::new`] but accepts a port from an untyped source
    /// where values above 65535 can appear.
    pub fn with_wide_port(
        host: impl Into<String>,
        port: u32,
        principal: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, InvalidEndpointError> {
        let port = u16::try_from(port).map_err(|_| InvalidEndpointError::InvalidPort(port))?;
        Self::new(host, port, principal, credential)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn key_path(&self) -> Option<&Path> {
        match &self.credential {
            Credential::KeyFile { path, .. } => Some(path),
            _ => None,
        }
    }

    /// `(host, port)` as used for direct-tcpip targets.
    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

/// Renders as `user@host:port`; the credential is never shown.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.principal, self.host, self.port)
    }
}
