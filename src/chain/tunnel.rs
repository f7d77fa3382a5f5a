// ABOUTME: Ordered hop list from outermost proxy to destination.
// ABOUTME: Built and validated before any connection is attempted.

use crate::config::ChainConfig;
use crate::error::Result;
use crate::types::{Endpoint, HopId};

/// Proxies in the order they are traversed, then the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelChain {
    proxies: Vec<Endpoint>,
    destination: Endpoint,
}

impl TunnelChain {
    pub fn new(proxies: Vec<Endpoint>, destination: Endpoint) -> Self {
        Self {
            proxies,
            destination,
        }
    }

    /// A chain with no proxies.
    pub fn direct(destination: Endpoint) -> Self {
        Self::new(Vec::new(), destination)
    }

    /// Validate every hop of a parsed chain file.
    ///
    /// Fails with `InvalidArgument` naming the first bad element; nothing is
    /// contacted.
    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        let proxies = config
            .hops
            .iter()
            .enumerate()
            .map(|(i, hop)| hop.to_endpoint(i + 1))
            .collect::<Result<Vec<_>>>()?;
        let destination = config.destination.to_endpoint(proxies.len() + 1)?;
        Ok(Self::new(proxies, destination))
    }

    pub fn proxies(&self) -> &[Endpoint] {
        &self.proxies
    }

    pub fn destination(&self) -> &Endpoint {
        &self.destination
    }

    pub fn is_direct(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of SSH sessions the chain needs, destination included.
    pub fn hop_count(&self) -> usize {
        self.proxies.len() + 1
    }

    /// Hop at a 0-based position; the destination is last.
    pub fn get(&self, position: usize) -> Option<&Endpoint> {
        match position.cmp(&self.proxies.len()) {
            std::cmp::Ordering::Less => self.proxies.get(position),
            std::cmp::Ordering::Equal => Some(&self.destination),
            std::cmp::Ordering::Greater => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.proxies.iter().chain(std::iter::once(&self.destination))
    }

    /// Identity used in errors for the hop at a 0-based position.
    pub fn hop_id(&self, position: usize) -> Option<HopId> {
        self.get(position)
            .map(|endpoint| HopId::new(position + 1, endpoint.host()))
    }

    /// Human-readable description of the connection path.
    pub fn path_description(&self) -> String {
        if self.is_direct() {
            return format!("Direct connection to {}", self.destination);
        }
        let path: Vec<String> = self.iter().map(ToString::to_string).collect();
        format!("Jump path: {}", path.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credential;

    fn hop(host: &str, user: &str) -> Endpoint {
        Endpoint::new(host, 22, user, Credential::None).unwrap()
    }

    #[test]
    fn direct_chain_has_one_hop() {
        let chain = TunnelChain::direct(hop("example.com", "me"));
        assert!(chain.is_direct());
        assert_eq!(chain.hop_count(), 1);
        assert_eq!(
            chain.path_description(),
            "Direct connection to me@example.com:22"
        );
    }

    #[test]
    fn path_lists_hops_in_traversal_order() {
        let chain = TunnelChain::new(
            vec![hop("10.0.0.1", "u1"), hop("10.0.0.2", "u2")],
            hop("10.0.0.3", "u3"),
        );
        assert_eq!(
            chain.path_description(),
            "Jump path: u1@10.0.0.1:22 -> u2@10.0.0.2:22 -> u3@10.0.0.3:22"
        );
    }

    #[test]
    fn get_puts_destination_last() {
        let chain = TunnelChain::new(vec![hop("a", "u")], hop("b", "u"));
        assert_eq!(chain.get(0).map(Endpoint::host), Some("a"));
        assert_eq!(chain.get(1).map(Endpoint::host), Some("b"));
        assert!(chain.get(2).is_none());
        assert_eq!(chain.hop_id(1), Some(HopId::new(2, "b")));
    }
}
