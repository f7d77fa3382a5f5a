// ABOUTME: russh-backed Transport: connects, authenticates, and tunnels hops.
// ABOUTME: Also runs commands on an established session.

use super::error::{Error, Result};
use super::host_key::HostKeyPolicy;
use super::transport::Transport;
use crate::types::{Credential, Endpoint};
use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, ChannelStream, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// russh client handler for one hop.
pub struct HopHandler {
    host: String,
    port: u16,
    policy: Arc<dyn HostKeyPolicy>,
}

impl HopHandler {
    fn new(host: String, port: u16, policy: Arc<dyn HostKeyPolicy>) -> Self {
        Self { host, port, policy }
    }
}

impl client::Handler for HopHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.policy.verify(&self.host, self.port, server_public_key))
    }
}

/// [`Transport`] over russh.
///
/// Sessions are `Handle<HopHandler>`; channels are direct-tcpip channels
/// wrapped as `ChannelStream`, which russh accepts as the socket of a nested
/// `connect_stream`.
#[derive(Clone)]
pub struct RusshTransport {
    config: Arc<Config>,
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport")
            .field("config", &"<russh::client::Config>")
            .finish()
    }
}

impl Default for RusshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RusshTransport {
    pub fn new() -> Self {
        // Proxies sit idle while inner sessions are quiet, so rely on
        // keepalives rather than an inactivity timeout.
        Self::with_config(Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    type Session = Handle<HopHandler>;
    type Channel = ChannelStream<Msg>;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        policy: Arc<dyn HostKeyPolicy>,
        via: Option<Self::Channel>,
    ) -> Result<Self::Session> {
        let handler = HopHandler::new(endpoint.host().to_string(), endpoint.port(), policy);
        let config = Arc::clone(&self.config);

        let result = match via {
            Some(stream) => client::connect_stream(config, stream, handler).await,
            None => client::connect(config, endpoint.address(), handler).await,
        };

        let session = result.map_err(|e| match e {
            russh::Error::UnknownKey => Error::HostKeyRejected,
            e if e.to_string().contains("Connection refused") => Error::Connection(format!(
                "connection refused to {}:{}",
                endpoint.host(),
                endpoint.port()
            )),
            e => Error::Connection(e.to_string()),
        })?;

        tracing::debug!("SSH handshake with {} completed", endpoint);
        Ok(session)
    }

    async fn authenticate(&self, session: &mut Self::Session, endpoint: &Endpoint) -> Result<()> {
        let user = endpoint.principal();

        let accepted = match endpoint.credential() {
            Credential::Password(password) => session
                .authenticate_password(user, password.as_str())
                .await?
                .success(),
            Credential::KeyFile { path, passphrase } => {
                authenticate_with_key(session, user, path, passphrase.as_deref()).await?
            }
            Credential::Agent => authenticate_with_agent(session, user).await?,
            Credential::None => session.authenticate_none(user).await?.success(),
        };

        if !accepted {
            return Err(Error::AuthenticationFailed);
        }
        Ok(())
    }

    async fn open_direct_tcpip(
        &self,
        session: &Self::Session,
        target: &Endpoint,
        origin: &Endpoint,
    ) -> Result<Self::Channel> {
        let channel = session
            .channel_open_direct_tcpip(
                target.host(),
                u32::from(target.port()),
                origin.host(),
                u32::from(origin.port()),
            )
            .await
            .map_err(|e| Error::ChannelOpenFailed(e.to_string()))?;

        Ok(channel.into_stream())
    }

    async fn exec(&self, session: &Self::Session, command: &str) -> Result<CommandOutput> {
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the channel died underneath the command,
        // e.g. a proxy further out in the chain went away.
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    async fn close(&self, session: Self::Session) -> Result<()> {
        session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

async fn authenticate_with_key(
    session: &mut Handle<HopHandler>,
    user: &str,
    path: &Path,
    passphrase: Option<&str>,
) -> Result<bool> {
    let path = expand_home(path);
    let key = load_secret_key(&path, passphrase).map_err(|e| Error::KeyLoadFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let hash_alg = session
        .best_supported_rsa_hash()
        .await
        .map_err(Error::Protocol)?
        .flatten();

    let result = session
        .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
        .await
        .map_err(Error::Protocol)?;

    Ok(result.success())
}

async fn authenticate_with_agent(session: &mut Handle<HopHandler>, user: &str) -> Result<bool> {
    let mut agent: AgentClient<UnixStream> = AgentClient::connect_env()
        .await
        .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

    let keys = agent
        .request_identities()
        .await
        .map_err(|e| Error::AgentUnavailable(format!("failed to list agent keys: {}", e)))?;

    if keys.is_empty() {
        return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
    }

    for key in &keys {
        match session
            .authenticate_publickey_with(user, key.clone(), None, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(true),
            _ => continue,
        }
    }
    Ok(false)
}

/// russh does not expand `~` in key paths.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_replaces_leading_tilde() {
        temp_env::with_var("HOME", Some("/home/ops"), || {
            assert_eq!(
                expand_home(Path::new("~/.ssh/id_ed25519")),
                PathBuf::from("/home/ops/.ssh/id_ed25519")
            );
        });
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        assert_eq!(
            expand_home(Path::new("/etc/ssh/key")),
            PathBuf::from("/etc/ssh/key")
        );
        assert_eq!(
            expand_home(Path::new("keys/~/id")),
            PathBuf::from("keys/~/id")
        );
    }

    #[test]
    fn command_output_success_tracks_exit_code() {
        let ok = CommandOutput {
            exit_code: 0,
            stdout: "/root\n".into(),
            stderr: String::new(),
        };
        let failed = CommandOutput {
            exit_code: 42,
            ..ok.clone()
        };
        assert!(ok.success());
        assert!(!failed.success());
    }
}
