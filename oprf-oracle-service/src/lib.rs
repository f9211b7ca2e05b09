#![deny(missing_docs)]
//! This crate provides the core functionality of an oblivious
//! password-derivation oracle node.
//!
//! A node stores, per opaque 32-byte record id, an OPRF secret scalar, a
//! signing public key, and an opaque policy blob. Clients blind their
//! password into a group element and exchange it for the OPRF response
//! without the server ever learning the password; every privileged
//! operation (changing the key, committing or undoing a change, deleting the
//! record, reading the host-scoped blob) is gated behind a detached
//! signature from the record's own key, plus a per-connection
//! memory-hard proof-of-work challenge that adapts its difficulty to recent
//! request volume.
//!
//! The [`OracleServer`] is the main entry point: build one from an
//! [`config::OracleConfig`], hand it an already-bound [`tokio::net::TcpListener`]
//! and [`tokio_rustls::TlsAcceptor`], and call [`OracleServer::serve`]. Each
//! accepted connection runs in its own spawned task with no shared mutable
//! memory beyond the filesystem under `datadir` and the purely additive
//! `metrics` counters; a [`tokio::sync::Semaphore`] bounds how many run
//! concurrently, and a [`tokio_util::sync::CancellationToken`] drives
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use oprf_oracle_core::pow::EquihashVerifier;

use crate::blob_store::BlobStore;
use crate::connection::ConnectionContext;
use crate::id_locks::IdLocks;
use crate::metrics::METRICS_ID_CONNECTIONS_ACTIVE;

pub mod blob_store;
pub mod challenge;
pub mod codec;
pub mod config;
pub mod connection;
pub mod errors;
pub mod host_blob;
pub mod id_locks;
pub mod metrics;
pub mod oprf;
pub mod record;

/// Builds and runs an oblivious password-derivation oracle node.
///
/// Construct with [`OracleServer::new`], then drive accepted connections
/// with [`OracleServer::serve`].
pub struct OracleServer {
    ctx: ConnectionContext,
    max_kids: usize,
    read_timeout: Duration,
}

impl OracleServer {
    /// Builds a server from `config` and an Equihash backend. Does not bind
    /// any socket — call [`OracleServer::serve`] with an already-bound
    /// listener and TLS acceptor.
    pub fn new(config: &config::OracleConfig, equihash: Arc<dyn EquihashVerifier>, read_timeout: Duration) -> Self {
        let ctx = ConnectionContext {
            store: BlobStore::new(&config.datadir),
            locks: IdLocks::default(),
            rate_limit: config.rate_limit(),
            equihash,
            mask_unknown_id_on_get: config.mask_unknown_id_on_get,
        };
        Self {
            ctx,
            max_kids: config.max_kids,
            read_timeout,
        }
    }

    /// Runs the accept loop until `cancellation_token` is cancelled.
    ///
    /// Each accepted connection is TLS-terminated and handed to its own
    /// spawned task; the whole connection lifetime (TLS handshake through
    /// the final write) is bounded by `read_timeout`, which stands in for
    /// the original's per-socket `setdefaulttimeout` — a dropped or
    /// deliberately slow client simply has its task time out rather than
    /// tying up a `max_kids` permit forever. The accept loop itself blocks
    /// once `max_kids` connections are in flight, exactly like the
    /// original's `while len(kids) > max_kids: waitpid()`.
    pub async fn serve(
        self,
        listener: TcpListener,
        acceptor: TlsAcceptor,
        cancellation_token: CancellationToken,
    ) -> eyre::Result<()> {
        metrics::describe_metrics();
        let semaphore = Arc::new(Semaphore::new(self.max_kids));

        loop {
            let permit = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => permit.expect("semaphore is never closed"),
            };

            let (tcp_stream, peer_addr) = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(%err, "failed to accept connection");
                        drop(permit);
                        continue;
                    }
                },
            };

            let acceptor = acceptor.clone();
            let ctx = self.ctx.clone();
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                ::metrics::gauge!(METRICS_ID_CONNECTIONS_ACTIVE).increment(1.0);
                handle_connection(tcp_stream, peer_addr, acceptor, ctx, read_timeout).await;
                ::metrics::gauge!(METRICS_ID_CONNECTIONS_ACTIVE).decrement(1.0);
            });
        }

        tracing::info!("oracle accept loop shutting down");
        Ok(())
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(%peer_addr))]
async fn handle_connection(
    tcp_stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    ctx: ConnectionContext,
    read_timeout: Duration,
) {
    let outcome = tokio::time::timeout(read_timeout, async move {
        let mut tls_stream = acceptor.accept(tcp_stream).await?;
        connection::drive(&mut tls_stream, &ctx).await;
        Ok::<(), std::io::Error>(())
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(%err, "TLS handshake failed"),
        Err(_) => tracing::debug!("connection exceeded its read timeout"),
    }
}
