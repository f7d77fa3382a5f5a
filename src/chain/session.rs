// ABOUTME: Session to a destination that owns every proxy session beneath it.
// ABOUTME: Closing or dropping it tears the chain down innermost first.

use super::tunnel::TunnelChain;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::ssh::{CommandOutput, Transport};
use crate::types::{Endpoint, HopId};
use std::sync::Arc;
use std::time::Duration;

/// Sessions opened so far, outermost first.
///
/// Used as the rollback list while a chain is built and as the proxy set of
/// a finished [`ChainedSession`]. Dropping it releases sessions innermost
/// first, since each one rides on a channel of the one before it.
pub struct ProxyStack<S> {
    entries: Vec<(HopId, S)>,
}

impl<S> ProxyStack<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, hop: HopId, session: S) {
        self.entries.push((hop, session));
    }

    /// Remove the innermost session.
    pub fn pop(&mut self) -> Option<(HopId, S)> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hops(&self) -> impl Iterator<Item = &HopId> {
        self.entries.iter().map(|(hop, _)| hop)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &S> {
        self.entries.iter().map(|(_, session)| session)
    }
}

impl<S> Drop for ProxyStack<S> {
    fn drop(&mut self) {
        while self.entries.pop().is_some() {}
    }
}

/// Disconnect every session in `stack`, innermost first.
pub(crate) async fn unwind<T: Transport>(
    transport: &T,
    mut stack: ProxyStack<T::Session>,
    diagnostics: &mut Diagnostics,
    as_warning: fn(HopId, String) -> Warning,
) {
    while let Some((hop, session)) = stack.pop() {
        match transport.close(session).await {
            Ok(()) => tracing::debug!("closed {}", hop),
            Err(e) => diagnostics.warn(as_warning(hop, e.to_string())),
        }
    }
}

/// An authenticated session to the destination of a [`TunnelChain`].
///
/// Owns the proxy sessions its bytes travel through. [`ChainedSession::close`]
/// disconnects the destination and then each proxy, innermost first. Dropping
/// it releases them in the same order without waiting for a clean disconnect.
pub struct ChainedSession<T: Transport> {
    transport: Arc<T>,
    chain: TunnelChain,
    // Declared before `proxies` so it is dropped first.
    destination: T::Session,
    proxies: ProxyStack<T::Session>,
    command_timeout: Duration,
}

impl<T: Transport> std::fmt::Debug for ChainedSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedSession")
            .field("chain", &self.chain)
            .field("proxies", &self.proxies.len())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl<T: Transport> ChainedSession<T> {
    pub(crate) fn new(
        transport: Arc<T>,
        chain: TunnelChain,
        destination: T::Session,
        proxies: ProxyStack<T::Session>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            chain,
            destination,
            proxies,
            command_timeout,
        }
    }

    /// The destination's underlying session.
    pub fn session(&self) -> &T::Session {
        &self.destination
    }

    pub fn destination(&self) -> &Endpoint {
        self.chain.destination()
    }

    pub fn chain(&self) -> &TunnelChain {
        &self.chain
    }

    /// Proxy sessions, outermost first.
    pub fn proxies(&self) -> &ProxyStack<T::Session> {
        &self.proxies
    }

    /// Execute a command on the destination.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.command_timeout).await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.transport.exec(&self.destination, command)).await
        {
            Ok(result) => result.map_err(|e| Error::Command(e.to_string())),
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Disconnect the destination, then every proxy innermost first.
    ///
    /// Disconnect failures don't stop the cascade; they are returned as
    /// warnings.
    pub async fn close(self) -> Diagnostics {
        let ChainedSession {
            transport,
            chain,
            destination,
            proxies,
            ..
        } = self;
        let mut diagnostics = Diagnostics::default();

        let destination_hop = HopId::new(chain.hop_count(), chain.destination().host());
        match transport.close(destination).await {
            Ok(()) => tracing::debug!("closed {}", destination_hop),
            Err(e) => diagnostics.warn(Warning::disconnect(destination_hop, e.to_string())),
        }

        unwind(transport.as_ref(), proxies, &mut diagnostics, |hop, msg| {
            Warning::disconnect(hop, msg)
        })
        .await;
        tracing::info!("closed chain: {}", chain.path_description());
        diagnostics
    }

    /// Give up cascade close and take the sessions for manual teardown.
    pub fn into_parts(self) -> (T::Session, ProxyStack<T::Session>) {
        (self.destination, self.proxies)
    }
}
