// ABOUTME: Chained connector: SSH-over-SSH through an ordered list of proxies.
// ABOUTME: Provides the default russh-backed connect_via_chain entry point.

mod connector;
mod session;
mod tunnel;

pub use connector::{ChainConnector, Timeouts};
pub use session::{ChainedSession, ProxyStack};
pub use tunnel::TunnelChain;

use crate::error::Result;
use crate::ssh::RusshTransport;
use crate::types::Endpoint;

/// Connect to `destination` through `hops` over russh, using
/// trust-on-first-use host key checking and default timeouts.
pub async fn connect_via_chain(
    hops: &[Endpoint],
    destination: &Endpoint,
) -> Result<ChainedSession<RusshTransport>> {
    ChainConnector::new(RusshTransport::new())
        .connect_via_chain(hops, destination)
        .await
}
