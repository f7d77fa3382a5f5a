// ABOUTME: In-memory Transport that records every call it receives.
// ABOUTME: Lets chain tests inject auth failures, refused channels, and stalls.

use async_trait::async_trait;
use jumpchain::ssh::{self, CommandOutput, HostKeyPolicy, Transport};
use jumpchain::types::{Credential, Endpoint};
use parking_lot::Mutex;
use russh::keys::ssh_key::PublicKey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Key every mock server presents.
pub const SERVER_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { host: String, tunneled: bool },
    Auth { host: String, principal: String },
    /// `target` and `origin` are the (host, port) pairs sent in the request.
    ChannelOpen {
        from: String,
        target: (String, u16),
        origin: (String, u16),
    },
    Exec { host: String, command: String },
    Close { host: String },
    /// Released without a clean disconnect.
    Dropped { host: String },
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    /// Per host, the password the server accepts.
    passwords: HashMap<String, String>,
    refuse_channels_to: HashSet<String>,
    stall_connect: HashSet<String>,
    stall_auth: HashSet<String>,
    stall_exec: HashSet<String>,
    fail_close: HashSet<String>,
    live: usize,
}

/// Records calls in order; clones share the same log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

pub struct MockSession {
    host: String,
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live -= 1;
        if !self.closed {
            state.events.push(Event::Dropped {
                host: self.host.clone(),
            });
        }
    }
}

/// Stream to `target`, opened on the session to `from`.
pub struct MockChannel {
    target: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require this password on `host`; other hosts accept anything.
    pub fn password(self, host: &str, password: &str) -> Self {
        self.state
            .lock()
            .passwords
            .insert(host.to_string(), password.to_string());
        self
    }

    pub fn refuse_channel_to(self, host: &str) -> Self {
        self.state.lock().refuse_channels_to.insert(host.to_string());
        self
    }

    /// Never finish the handshake with `host`.
    pub fn stall_connect(self, host: &str) -> Self {
        self.state.lock().stall_connect.insert(host.to_string());
        self
    }

    /// Never answer authentication on `host`.
    pub fn stall_auth(self, host: &str) -> Self {
        self.state.lock().stall_auth.insert(host.to_string());
        self
    }

    /// Never finish commands run on `host`.
    pub fn stall_exec(self, host: &str) -> Self {
        self.state.lock().stall_exec.insert(host.to_string());
        self
    }

    pub fn fail_close(self, host: &str) -> Self {
        self.state.lock().fail_close.insert(host.to_string());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Sessions not yet closed or dropped.
    pub fn live_sessions(&self) -> usize {
        self.state.lock().live
    }

    pub fn closed_hosts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Close { host } => Some(host),
                _ => None,
            })
            .collect()
    }

    pub fn dropped_hosts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Dropped { host } => Some(host),
                _ => None,
            })
            .collect()
    }

    pub fn connected_hosts(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connect { host, tunneled } => Some((host, tunneled)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.state.lock().events.push(event);
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Session = MockSession;
    type Channel = MockChannel;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        policy: Arc<dyn HostKeyPolicy>,
        via: Option<MockChannel>,
    ) -> ssh::Result<MockSession> {
        let host = endpoint.host().to_string();
        if let Some(channel) = &via {
            assert_eq!(channel.target, host, "tunnel leads to a different host");
        }
        self.record(Event::Connect {
            host: host.clone(),
            tunneled: via.is_some(),
        });

        let stall = self.state.lock().stall_connect.contains(&host);
        if stall {
            std::future::pending::<()>().await;
        }

        let key = PublicKey::from_openssh(SERVER_KEY)
            .map_err(|e| ssh::Error::Connection(e.to_string()))?;
        if !policy.verify(&host, endpoint.port(), &key) {
            return Err(ssh::Error::HostKeyRejected);
        }

        self.state.lock().live += 1;
        Ok(MockSession {
            host,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }

    async fn authenticate(&self, session: &mut MockSession, endpoint: &Endpoint) -> ssh::Result<()> {
        self.record(Event::Auth {
            host: session.host.clone(),
            principal: endpoint.principal().to_string(),
        });

        let (stall, expected) = {
            let state = self.state.lock();
            (
                state.stall_auth.contains(&session.host),
                state.passwords.get(&session.host).cloned(),
            )
        };
        if stall {
            std::future::pending::<()>().await;
        }

        match (expected, endpoint.credential()) {
            (None, _) => Ok(()),
            (Some(expected), Credential::Password(given)) if *given == expected => Ok(()),
            _ => Err(ssh::Error::AuthenticationFailed),
        }
    }

    async fn open_direct_tcpip(
        &self,
        session: &MockSession,
        target: &Endpoint,
        origin: &Endpoint,
    ) -> ssh::Result<MockChannel> {
        self.record(Event::ChannelOpen {
            from: session.host.clone(),
            target: (target.host().to_string(), target.port()),
            origin: (origin.host().to_string(), origin.port()),
        });

        if self.state.lock().refuse_channels_to.contains(target.host()) {
            return Err(ssh::Error::ChannelOpenFailed(
                "administratively prohibited".to_string(),
            ));
        }

        Ok(MockChannel {
            target: target.host().to_string(),
        })
    }

    async fn exec(&self, session: &MockSession, command: &str) -> ssh::Result<CommandOutput> {
        self.record(Event::Exec {
            host: session.host.clone(),
            command: command.to_string(),
        });

        let stall = self.state.lock().stall_exec.contains(&session.host);
        if stall {
            std::future::pending::<()>().await;
        }

        Ok(CommandOutput {
            exit_code: 0,
            stdout: format!("{}\n", session.host),
            stderr: String::new(),
        })
    }

    async fn close(&self, mut session: MockSession) -> ssh::Result<()> {
        session.closed = true;
        self.record(Event::Close {
            host: session.host.clone(),
        });

        if self.state.lock().fail_close.contains(&session.host) {
            return Err(ssh::Error::ChannelClosed);
        }
        Ok(())
    }
}
