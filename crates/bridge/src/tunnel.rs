// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplex TCP tunnel.
//!
//! The remote transcoder talks to "its" media server on localhost; the
//! launcher listens there and relays every connection to the real PMS
//! address. The relay is byte-transparent — callback URL rewriting happens
//! in the argument rewriter before launch, never here.

use std::io;
use thiserror::Error;
use tokio::io::copy;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to accept tunnel connection: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to dial upstream {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Accept connections until the listener fails or `cancel` fires.
///
/// Each accepted connection becomes an independent session; a session
/// erroring out is logged and never disturbs its siblings or the accept
/// loop. Only accept-level failure propagates.
pub async fn serve(
    cancel: CancellationToken,
    listener: TcpListener,
    upstream: String,
) -> Result<(), TunnelError> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = listener.accept() => {
                let (conn, peer) = result.map_err(TunnelError::Accept)?;
                debug!(%peer, "accepted tunnel connection");
                let session_cancel = cancel.clone();
                let upstream = upstream.clone();
                tokio::spawn(async move {
                    if let Err(e) = relay(session_cancel, conn, &upstream).await {
                        info!(error = %e, "tunnel session ended with error");
                    }
                });
            }
        }
    }
}

/// One session: dial the upstream, then copy both directions concurrently.
/// The first direction to finish (EOF or error), or cancellation, ends the
/// session; both sockets close exactly once when they drop here.
async fn relay(
    cancel: CancellationToken,
    mut client: TcpStream,
    upstream: &str,
) -> Result<(), TunnelError> {
    let mut server = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        conn = TcpStream::connect(upstream) => conn.map_err(|source| TunnelError::Dial {
            addr: upstream.to_string(),
            source,
        })?,
    };

    let (mut client_rd, mut client_wr) = client.split();
    let (mut server_rd, mut server_wr) = server.split();

    tokio::select! {
        _ = cancel.cancelled() => debug!("tunnel session cancelled"),
        result = copy(&mut client_rd, &mut server_wr) => log_direction("client to upstream", result),
        result = copy(&mut server_rd, &mut client_wr) => log_direction("upstream to client", result),
    }
    Ok(())
}

fn log_direction(direction: &str, result: io::Result<u64>) {
    match result {
        Ok(bytes) => debug!(direction, bytes, "tunnel direction closed"),
        Err(e) => debug!(direction, error = %e, "tunnel direction errored"),
    }
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tunnel_tests;
