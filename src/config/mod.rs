// ABOUTME: Chain file (jumpchain.yml) parsing and discovery.
// ABOUTME: Turns hops, timeouts, and host key settings into a connector.

mod hop;
mod init;
mod secret;

pub use hop::{HopConfig, HopFields};
pub use init::init_config;
pub use secret::SecretValue;

use crate::chain::{ChainConnector, Timeouts, TunnelChain};
use crate::error::{Error, Result};
use crate::ssh::{AcceptAll, HostKeyPolicy, Strict, Transport, TrustOnFirstUse};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "jumpchain.yml";
pub const CONFIG_FILENAME_ALT: &str = "jumpchain.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".jumpchain/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Proxies, outermost first. Empty means a direct connection.
    #[serde(default)]
    pub hops: Vec<HopConfig>,

    /// Left empty when absent so validation can report it by index.
    #[serde(default)]
    pub destination: HopConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub host_key: HostKeyConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect: Duration,

    #[serde(default = "default_auth_timeout", with = "humantime_serde")]
    pub auth: Duration,

    #[serde(default = "default_channel_open_timeout", with = "humantime_serde")]
    pub channel_open: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            auth: default_auth_timeout(),
            channel_open: default_channel_open_timeout(),
            command: default_command_timeout(),
        }
    }
}

impl From<TimeoutsConfig> for Timeouts {
    fn from(config: TimeoutsConfig) -> Self {
        Timeouts {
            connect: config.connect,
            auth: config.auth,
            channel_open: config.channel_open,
        }
    }
}

fn default_connect_timeout() -> Duration {
    Timeouts::default().connect
}

fn default_auth_timeout() -> Duration {
    Timeouts::default().auth
}

fn default_channel_open_timeout() -> Duration {
    Timeouts::default().channel_open
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicyKind {
    #[default]
    TrustOnFirstUse,
    Strict,
    AcceptAll,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostKeyConfig {
    #[serde(default)]
    pub policy: HostKeyPolicyKind,

    /// If None, uses the default ~/.ssh/known_hosts.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

impl HostKeyConfig {
    pub fn policy(&self, kind: HostKeyPolicyKind) -> Arc<dyn HostKeyPolicy> {
        match (kind, &self.known_hosts) {
            (HostKeyPolicyKind::TrustOnFirstUse, Some(path)) => {
                Arc::new(TrustOnFirstUse::new().known_hosts_path(path))
            }
            (HostKeyPolicyKind::TrustOnFirstUse, None) => Arc::new(TrustOnFirstUse::new()),
            (HostKeyPolicyKind::Strict, Some(path)) => {
                Arc::new(Strict::new().known_hosts_path(path))
            }
            (HostKeyPolicyKind::Strict, None) => Arc::new(Strict::new()),
            (HostKeyPolicyKind::AcceptAll, _) => Arc::new(AcceptAll),
        }
    }
}

impl ChainConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Validate all hops. No network I/O.
    pub fn chain(&self) -> Result<TunnelChain> {
        TunnelChain::from_config(self)
    }

    /// Connector carrying this file's timeouts and host key policies.
    pub fn connector<T: Transport>(&self, transport: T) -> ChainConnector<T> {
        let mut connector = ChainConnector::new(transport)
            .timeouts(self.timeouts.into())
            .command_timeout(self.timeouts.command)
            .host_key_policy(self.host_key.policy(self.host_key.policy));

        let overrides = self
            .hops
            .iter()
            .chain(std::iter::once(&self.destination))
            .enumerate();
        for (position, hop) in overrides {
            if let Some(kind) = hop.host_key() {
                connector = connector.hop_host_key_policy(position + 1, self.host_key.policy(kind));
            }
        }

        connector
    }

    pub fn template() -> Self {
        ChainConfig {
            hops: vec![HopConfig::Detailed(HopFields {
                host: Some("bastion.example.com".to_string()),
                user: Some("jump".to_string()),
                agent: true,
                ..Default::default()
            })],
            destination: HopConfig::Detailed(HopFields {
                host: Some("10.0.0.10".to_string()),
                user: Some("deploy".to_string()),
                key: Some(PathBuf::from("~/.ssh/id_ed25519")),
                ..Default::default()
            }),
            timeouts: TimeoutsConfig::default(),
            host_key: HostKeyConfig::default(),
        }
    }
}
