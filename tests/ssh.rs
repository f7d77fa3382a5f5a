// ABOUTME: Integration tests for the russh transport against local sockets.
// ABOUTME: Covers refused and aborted handshakes without a real SSH server.

mod support;

use jumpchain::chain::{ChainConnector, Timeouts, connect_via_chain};
use jumpchain::error::ErrorKind;
use jumpchain::ssh::{AcceptAll, RusshTransport};
use jumpchain::types::{Credential, Endpoint, HopId};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// A localhost port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Test: Direct connection to a port nobody listens on.
/// Expected: Connection error attributed to hop 1.
#[tokio::test]
async fn refused_connection_names_first_hop() {
    support::init_tracing();
    let port = closed_port().await;
    let destination = Endpoint::new("127.0.0.1", port, "nobody", Credential::None).unwrap();

    let err = connect_via_chain(&[], &destination).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.hop(), Some(&HopId::new(1, "127.0.0.1")));
}

/// Test: First proxy is unreachable.
/// Expected: Failure at hop 1, destination never attempted.
#[tokio::test]
async fn unreachable_proxy_stops_chain() {
    let port = closed_port().await;
    let proxy = Endpoint::new("127.0.0.1", port, "jump", Credential::None).unwrap();
    let destination = Endpoint::new("10.255.255.1", 22, "app", Credential::None).unwrap();

    let err = ChainConnector::new(RusshTransport::new())
        .host_key_policy(Arc::new(AcceptAll))
        .connect_via_chain(&[proxy], &destination)
        .await
        .unwrap_err();

    assert_eq!(err.hop(), Some(&HopId::new(1, "127.0.0.1")));
}

/// Test: Server accepts TCP but sends a non-SSH banner and hangs up.
/// Expected: Connection error, not a panic or a hang.
#[tokio::test]
async fn garbage_banner_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        }
    });

    let destination = Endpoint::new("127.0.0.1", port, "nobody", Credential::None).unwrap();
    let err = ChainConnector::new(RusshTransport::new())
        .timeouts(Timeouts {
            connect: Duration::from_secs(5),
            ..Timeouts::default()
        })
        .connect_via_chain(&[], &destination)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
}

/// Test: Server accepts TCP and never speaks.
/// Expected: Handshake times out within the connect budget.
#[tokio::test]
async fn silent_server_hits_connect_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(held);
    });

    let destination = Endpoint::new("127.0.0.1", port, "nobody", Credential::None).unwrap();
    let err = ChainConnector::new(RusshTransport::new())
        .timeouts(Timeouts {
            connect: Duration::from_millis(300),
            ..Timeouts::default()
        })
        .connect_via_chain(&[], &destination)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("timed out"));
}
