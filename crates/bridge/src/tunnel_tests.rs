// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Upstream that echoes every byte back on the same connection.
async fn spawn_echo_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut conn, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = conn.split();
                let _ = copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

async fn spawn_tunnel(cancel: CancellationToken, upstream: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve(cancel, listener, upstream));
    addr
}

#[tokio::test]
async fn relays_bytes_in_both_directions() {
    let upstream = spawn_echo_upstream().await;
    let tunnel = spawn_tunnel(CancellationToken::new(), upstream).await;

    let mut conn = TcpStream::connect(&tunnel).await.unwrap();
    for payload in [&b"hello tunnel"[..], &[0u8, 1, 2, 255], &[]] {
        conn.write_all(payload).await.unwrap();
        let mut got = vec![0u8; payload.len()];
        conn.read_exact(&mut got).await.unwrap();
        assert_eq!(got, payload);
    }
}

#[tokio::test]
async fn concurrent_sessions_are_independent() {
    let upstream = spawn_echo_upstream().await;
    let tunnel = spawn_tunnel(CancellationToken::new(), upstream).await;

    let mut a = TcpStream::connect(&tunnel).await.unwrap();
    let mut b = TcpStream::connect(&tunnel).await.unwrap();

    // Kill session A mid-flight; session B must keep working.
    a.write_all(b"first").await.unwrap();
    drop(a);

    b.write_all(b"second").await.unwrap();
    let mut got = [0u8; 6];
    b.read_exact(&mut got).await.unwrap();
    assert_eq!(&got, b"second");
}

#[tokio::test]
async fn upstream_close_ends_session() {
    // Upstream accepts and immediately closes.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((conn, _)) = listener.accept().await {
            drop(conn);
        }
    });

    let tunnel = spawn_tunnel(CancellationToken::new(), upstream).await;
    let mut conn = TcpStream::connect(&tunnel).await.unwrap();
    let mut buf = [0u8; 1];
    // EOF from the upstream side must propagate as EOF here.
    let n = tokio::time::timeout(Duration::from_secs(1), conn.read(&mut buf))
        .await
        .expect("session did not close after upstream EOF")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn cancellation_stops_accept_loop_and_sessions() {
    let upstream = spawn_echo_upstream().await;
    let cancel = CancellationToken::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(serve(cancel.clone(), listener, upstream));

    let mut conn = TcpStream::connect(&addr).await.unwrap();
    conn.write_all(b"ping").await.unwrap();
    let mut got = [0u8; 4];
    conn.read_exact(&mut got).await.unwrap();

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .expect("accept loop did not stop after cancellation")
        .unwrap();
    assert!(result.is_ok());

    // The open session is torn down too.
    let n = tokio::time::timeout(Duration::from_secs(1), conn.read(&mut got))
        .await
        .expect("session did not close after cancellation")
        .unwrap_or(0);
    assert_eq!(n, 0);
}
