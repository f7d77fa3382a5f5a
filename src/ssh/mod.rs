// ABOUTME: SSH layer for building tunnel chains.
// ABOUTME: Transport trait, its russh implementation, and host key policies.

mod client;
mod error;
mod host_key;
mod transport;

pub use client::{CommandOutput, HopHandler, RusshTransport};
pub use error::{Error, ErrorKind, Result};
pub use host_key::{AcceptAll, HostKeyPolicy, Strict, TrustOnFirstUse};
pub use transport::Transport;
