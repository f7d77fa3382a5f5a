// ABOUTME: Pluggable host key verification policies.
// ABOUTME: Trust-on-first-use (default), strict known_hosts, and accept-all.

use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use std::fmt;
use std::path::PathBuf;

/// Decides whether a server key presented during a handshake is trusted.
///
/// A policy is handed to every session creation explicitly, so each hop of a
/// chain may verify differently.
pub trait HostKeyPolicy: fmt::Debug + Send + Sync {
    fn verify(&self, host: &str, port: u16, key: &ssh_key::PublicKey) -> bool;
}

fn check(
    known_hosts_path: Option<&PathBuf>,
    host: &str,
    port: u16,
    key: &ssh_key::PublicKey,
) -> Result<bool, russh::keys::Error> {
    match known_hosts_path {
        Some(path) => check_known_hosts_path(host, port, key, path),
        None => check_known_hosts(host, port, key),
    }
}

/// Accept unknown hosts and record their key; reject keys that changed.
#[derive(Debug, Clone, Default)]
pub struct TrustOnFirstUse {
    /// If None, uses the default ~/.ssh/known_hosts.
    known_hosts_path: Option<PathBuf>,
}

impl TrustOnFirstUse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

impl HostKeyPolicy for TrustOnFirstUse {
    fn verify(&self, host: &str, port: u16, key: &ssh_key::PublicKey) -> bool {
        match check(self.known_hosts_path.as_ref(), host, port, key) {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    host,
                    port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => learn_known_hosts_path(host, port, key, path),
                    None => learn_known_hosts(host, port, key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                true
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::warn!("host key for {}:{} does not match known_hosts", host, port);
                false
            }
            // Unreadable known_hosts: treat as unknown host.
            Err(_) => true,
        }
    }
}

/// Accept only keys already present in known_hosts.
#[derive(Debug, Clone, Default)]
pub struct Strict {
    known_hosts_path: Option<PathBuf>,
}

impl Strict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

impl HostKeyPolicy for Strict {
    fn verify(&self, host: &str, port: u16, key: &ssh_key::PublicKey) -> bool {
        match check(self.known_hosts_path.as_ref(), host, port, key) {
            Ok(known) => known,
            Err(e) => {
                tracing::debug!("known_hosts check for {}:{} failed: {}", host, port, e);
                false
            }
        }
    }
}

/// Accept any key without recording it. Only for labs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl HostKeyPolicy for AcceptAll {
    fn verify(&self, host: &str, port: u16, _key: &ssh_key::PublicKey) -> bool {
        tracing::debug!("accepting host key for {}:{} without verification", host, port);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEB";
    const KEY_B: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgIC";

    fn key(openssh: &str) -> ssh_key::PublicKey {
        ssh_key::PublicKey::from_openssh(openssh).unwrap()
    }

    #[test]
    fn strict_rejects_unknown_host() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Strict::new().known_hosts_path(dir.path().join("known_hosts"));

        assert!(!policy.verify("10.0.0.1", 22, &key(KEY_A)));
    }

    #[test]
    fn tofu_records_key_for_later_strict_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");

        let tofu = TrustOnFirstUse::new().known_hosts_path(&path);
        assert!(tofu.verify("10.0.0.1", 2222, &key(KEY_A)));

        let strict = Strict::new().known_hosts_path(&path);
        assert!(strict.verify("10.0.0.1", 2222, &key(KEY_A)));
    }

    #[test]
    fn tofu_rejects_changed_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");

        let tofu = TrustOnFirstUse::new().known_hosts_path(&path);
        assert!(tofu.verify("10.0.0.1", 22, &key(KEY_A)));
        assert!(!tofu.verify("10.0.0.1", 22, &key(KEY_B)));
    }

    #[test]
    fn accept_all_accepts_anything() {
        assert!(AcceptAll.verify("anywhere", 22, &key(KEY_B)));
    }
}
