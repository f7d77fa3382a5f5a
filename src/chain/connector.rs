// ABOUTME: Builds a session to a destination by tunneling through each proxy.
// ABOUTME: Each hop is authenticated, then carries a direct-tcpip channel to the next.

use super::session::{ChainedSession, ProxyStack, unwind};
use super::tunnel::TunnelChain;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::ssh::{HostKeyPolicy, Transport, TrustOnFirstUse};
use crate::types::{Endpoint, HopId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time limits applied independently to each step at every hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect (first hop only) plus SSH handshake.
    pub connect: Duration,
    /// Authentication exchange.
    pub auth: Duration,
    /// Opening the direct-tcpip channel to the next hop.
    pub channel_open: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            auth: Duration::from_secs(30),
            channel_open: Duration::from_secs(10),
        }
    }
}

/// Connects to the destination of a [`TunnelChain`].
///
/// ```text
/// Client --SSH--> [Proxy1] --direct-tcpip--> [Proxy2] --direct-tcpip--> [Destination]
/// ```
///
/// The connector keeps only immutable settings, so one instance can build
/// any number of independent chains concurrently.
pub struct ChainConnector<T: Transport> {
    transport: Arc<T>,
    host_key_policy: Arc<dyn HostKeyPolicy>,
    /// Overrides keyed by 1-based hop index.
    hop_policies: HashMap<usize, Arc<dyn HostKeyPolicy>>,
    timeouts: Timeouts,
    command_timeout: Duration,
}

impl<T: Transport> std::fmt::Debug for ChainConnector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConnector")
            .field("host_key_policy", &self.host_key_policy)
            .field("hop_policies", &self.hop_policies)
            .field("timeouts", &self.timeouts)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl<T: Transport> ChainConnector<T> {
    /// Connector with trust-on-first-use host key checking and default timeouts.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            host_key_policy: Arc::new(TrustOnFirstUse::new()),
            hop_policies: HashMap::new(),
            timeouts: Timeouts::default(),
            command_timeout: Duration::from_secs(300), // 5 minutes
        }
    }

    /// Policy used for every hop without an override.
    pub fn host_key_policy(mut self, policy: Arc<dyn HostKeyPolicy>) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Policy for one hop (1-based, destination last).
    pub fn hop_host_key_policy(mut self, index: usize, policy: Arc<dyn HostKeyPolicy>) -> Self {
        self.hop_policies.insert(index, policy);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Default timeout for [`ChainedSession::exec`].
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connect to `destination` through `hops`, in order.
    ///
    /// With no hops this is a plain direct connection.
    pub async fn connect_via_chain(
        &self,
        hops: &[Endpoint],
        destination: &Endpoint,
    ) -> Result<ChainedSession<T>> {
        self.connect(&TunnelChain::new(hops.to_vec(), destination.clone()))
            .await
    }

    /// Establish every hop of `chain` and return the destination session.
    ///
    /// On failure, hops that were already established are disconnected,
    /// innermost first, before the error is returned. Disconnect failures
    /// during that rollback are only logged; use
    /// [`ChainConnector::connect_with_diagnostics`] to keep them.
    pub async fn connect(&self, chain: &TunnelChain) -> Result<ChainedSession<T>> {
        let mut diagnostics = Diagnostics::default();
        self.connect_with_diagnostics(chain, &mut diagnostics).await
    }

    /// Like [`ChainConnector::connect`], recording rollback disconnect
    /// failures in `diagnostics` as [`Warning::rollback`] entries.
    pub async fn connect_with_diagnostics(
        &self,
        chain: &TunnelChain,
        diagnostics: &mut Diagnostics,
    ) -> Result<ChainedSession<T>> {
        info!(
            "Establishing SSH through {} proxy hop(s): {}",
            chain.proxies().len(),
            chain.path_description()
        );

        let mut stack = ProxyStack::new();
        match self.build(chain, &mut stack, diagnostics).await {
            Ok(destination) => {
                info!("Connected to {}", chain.destination());
                Ok(ChainedSession::new(
                    Arc::clone(&self.transport),
                    chain.clone(),
                    destination,
                    stack,
                    self.command_timeout,
                ))
            }
            Err(e) => {
                warn!(
                    "Chain to {} failed: {}; releasing {} established hop(s)",
                    chain.destination(),
                    e,
                    stack.len()
                );
                unwind(self.transport.as_ref(), stack, diagnostics, |hop, msg| {
                    Warning::rollback(hop, msg)
                })
                .await;
                Err(e)
            }
        }
    }

    /// Walk the chain, pushing every authenticated proxy onto `stack`.
    async fn build(
        &self,
        chain: &TunnelChain,
        stack: &mut ProxyStack<T::Session>,
        diagnostics: &mut Diagnostics,
    ) -> Result<T::Session> {
        let hops: Vec<&Endpoint> = chain.iter().collect();
        let mut via: Option<T::Channel> = None;

        for (position, pair) in hops.windows(2).enumerate() {
            let (current, next) = (pair[0], pair[1]);
            let hop = HopId::new(position + 1, current.host());

            let session = self
                .establish(&hop, current, via.take(), diagnostics)
                .await?;
            info!("{} established as {}", hop, current);

            let tunnel = self.open_tunnel(&hop, &session, current, next).await;
            stack.push(hop, session);
            via = Some(tunnel?);
        }

        let destination = chain.destination();
        let hop = HopId::new(chain.hop_count(), destination.host());
        self.establish(&hop, destination, via, diagnostics).await
    }

    /// Handshake and authenticate with one hop.
    async fn establish(
        &self,
        hop: &HopId,
        endpoint: &Endpoint,
        via: Option<T::Channel>,
        diagnostics: &mut Diagnostics,
    ) -> Result<T::Session> {
        debug!(
            "{}: connecting to {}{}",
            hop,
            endpoint,
            if via.is_some() { " through tunnel" } else { "" }
        );

        let policy = self.policy_for(hop.index());
        let mut session = tokio::time::timeout(
            self.timeouts.connect,
            self.transport.connect(endpoint, policy, via),
        )
        .await
        .map_err(|_| Error::Connection {
            hop: hop.clone(),
            reason: format!("handshake timed out after {:?}", self.timeouts.connect),
        })?
        .map_err(|e| Error::at_hop(hop.clone(), e))?;

        let auth = tokio::time::timeout(
            self.timeouts.auth,
            self.transport.authenticate(&mut session, endpoint),
        )
        .await;

        let failure = match auth {
            Ok(Ok(())) => {
                debug!("{}: authenticated as {}", hop, endpoint.principal());
                return Ok(session);
            }
            Ok(Err(e)) => Error::at_hop(hop.clone(), e),
            Err(_) => Error::Connection {
                hop: hop.clone(),
                reason: format!("authentication timed out after {:?}", self.timeouts.auth),
            },
        };

        // Not on the stack yet, so release it here.
        if let Err(e) = self.transport.close(session).await {
            diagnostics.warn(Warning::rollback(hop.clone(), e.to_string()));
        }
        Err(failure)
    }

    /// Open the direct-tcpip channel from `origin`'s session to `target`.
    async fn open_tunnel(
        &self,
        hop: &HopId,
        session: &T::Session,
        origin: &Endpoint,
        target: &Endpoint,
    ) -> Result<T::Channel> {
        debug!(
            "{}: opening direct-tcpip channel to {}:{}",
            hop,
            target.host(),
            target.port()
        );

        tokio::time::timeout(
            self.timeouts.channel_open,
            self.transport.open_direct_tcpip(session, target, origin),
        )
        .await
        .map_err(|_| Error::ChannelOpen {
            hop: hop.clone(),
            target: format!("{}:{}", target.host(), target.port()),
            reason: format!("timed out after {:?}", self.timeouts.channel_open),
        })?
        .map_err(|e| Error::opening_channel(hop.clone(), target, e))
    }

    fn policy_for(&self, index: usize) -> Arc<dyn HostKeyPolicy> {
        self.hop_policies
            .get(&index)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.host_key_policy))
    }
}
