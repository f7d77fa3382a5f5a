// ABOUTME: Library root for jumpchain - SSH sessions through chains of proxies.
// ABOUTME: The demo binary is in main.rs.

pub mod chain;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ssh;
pub mod types;
