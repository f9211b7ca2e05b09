//! Binary entry point for the oblivious password-derivation oracle node.
//!
//! Loads configuration, terminates TLS via `rustls`, and runs the accept
//! loop from [`oprf_oracle_service::OracleServer`] until a shutdown signal
//! arrives, mirroring the teacher example binary's
//! `#[tokio::main]`/`clap::Parser`/cancellation-token shutdown dance.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser as _;
use eyre::Context as _;
use rustls_pemfile::{certs, private_key};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use config::BinConfig;
use oprf_oracle_core::pow::ReferenceEquihash;
use oprf_oracle_service::OracleServer;

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("can install default rustls crypto provider");

    let config = BinConfig::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_filter()))
        .init();

    tracing::info!("starting oprf-oracle with config: {config:#?}");

    let tls_acceptor = build_tls_acceptor(&config).context("while loading TLS material")?;
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("while binding to {bind_addr}"))?;
    tracing::info!("listening on {}", bind_addr);

    let server = OracleServer::new(&config.oracle, Arc::new(ReferenceEquihash), config.timeout);

    let cancellation_token = CancellationToken::new();
    let accept_loop_token = cancellation_token.clone();
    let accept_loop = tokio::spawn(async move { server.serve(listener, tls_acceptor, accept_loop_token).await });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections..");
    cancellation_token.cancel();

    match tokio::time::timeout(config.max_wait_time_shutdown, accept_loop).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("good night!");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Ok(Err(err))) => {
            tracing::error!("{err:?}");
            Ok(ExitCode::FAILURE)
        }
        Ok(Err(err)) => {
            tracing::error!(%err, "accept loop task panicked");
            Ok(ExitCode::FAILURE)
        }
        Err(_) => {
            tracing::warn!("could not finish shutdown within the configured grace period");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Waits for a platform shutdown signal (Ctrl+C, or SIGTERM on unix), the
/// way the teacher's `nodes_common::default_shutdown_signal` does.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("can install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("can install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Loads the certificate chain and private key named by `config.ssl_cert`
/// / `config.ssl_key` and builds a no-client-auth `TlsAcceptor` (spec §6:
/// "no client certificate required").
fn build_tls_acceptor(config: &BinConfig) -> eyre::Result<TlsAcceptor> {
    let cert_bytes =
        std::fs::read(&config.ssl_cert).with_context(|| format!("reading {}", config.ssl_cert.display()))?;
    let key_bytes =
        std::fs::read(&config.ssl_key).with_context(|| format!("reading {}", config.ssl_key.display()))?;

    let cert_chain = certs(&mut &cert_bytes[..])
        .collect::<Result<Vec<_>, _>>()
        .context("parsing PEM certificate chain")?;
    let key = private_key(&mut &key_bytes[..])
        .context("parsing PEM private key")?
        .ok_or_else(|| eyre::eyre!("no private key found in {}", config.ssl_key.display()))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("building rustls server config")?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
