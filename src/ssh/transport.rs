// ABOUTME: Transport trait: the SSH primitives a tunnel chain is built from.
// ABOUTME: Implemented over russh in production and by recording mocks in tests.

use super::client::CommandOutput;
use super::error::Result;
use super::host_key::HostKeyPolicy;
use crate::types::Endpoint;
use async_trait::async_trait;
use std::sync::Arc;

/// SSH client primitives consumed by the chain connector.
///
/// `Session` is one SSH connection to one host. `Channel` is a direct-tcpip
/// byte stream opened on a session; passing it back into [`Transport::connect`]
/// layers a new SSH handshake on top of it.
#[async_trait]
pub trait Transport: Send + Sync {
    type Session: Send + Sync;
    type Channel: Send;

    /// Handshake with `endpoint`, over TCP when `via` is None or over the
    /// given channel otherwise. The server key is checked with `policy`.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        policy: Arc<dyn HostKeyPolicy>,
        via: Option<Self::Channel>,
    ) -> Result<Self::Session>;

    /// Authenticate as `endpoint.principal()` with the endpoint's credential.
    async fn authenticate(&self, session: &mut Self::Session, endpoint: &Endpoint) -> Result<()>;

    /// Ask the server behind `session` to open a TCP stream to `target`.
    /// `origin` is reported as the originator address; it is not used for routing.
    async fn open_direct_tcpip(
        &self,
        session: &Self::Session,
        target: &Endpoint,
        origin: &Endpoint,
    ) -> Result<Self::Channel>;

    /// Run a command and collect its output.
    async fn exec(&self, session: &Self::Session, command: &str) -> Result<CommandOutput>;

    /// Disconnect the session.
    async fn close(&self, session: Self::Session) -> Result<()>;
}
