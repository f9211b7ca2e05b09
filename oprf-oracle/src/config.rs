//! Binary-level configuration: listener address, TLS material, and the
//! per-connection read timeout, mirroring how the teacher's example binary
//! splits `bind_addr`/TLS fields from the library's own `OprfNodeConfig`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Top-level CLI/environment configuration for the `oprf-oracle` binary.
#[derive(Parser, Debug)]
pub struct BinConfig {
    /// Address to bind the listener to (spec §6 "address" key).
    #[clap(long, env = "OPRF_ORACLE_ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Port to bind the listener to (spec §6 "port" key).
    #[clap(long, env = "OPRF_ORACLE_PORT", default_value = "2222")]
    pub port: u16,

    /// Per-connection idle/read timeout (spec §6 "timeout" key); bounds the
    /// entire connection lifetime from TLS handshake through final write.
    #[clap(
        long,
        env = "OPRF_ORACLE_TIMEOUT",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,

    /// PEM-encoded TLS certificate chain (spec §6 "ssl_cert" key).
    #[clap(long, env = "OPRF_ORACLE_SSL_CERT")]
    pub ssl_cert: PathBuf,

    /// PEM-encoded TLS private key (spec §6 "ssl_key" key).
    #[clap(long, env = "OPRF_ORACLE_SSL_KEY")]
    pub ssl_key: PathBuf,

    /// Max time to wait for in-flight connections during shutdown.
    #[clap(
        long,
        env = "OPRF_ORACLE_MAX_WAIT_TIME_SHUTDOWN",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub max_wait_time_shutdown: Duration,

    /// Enables verbose (debug-level) logging (spec §6 "verbose" key). Maps
    /// to a `tracing-subscriber` filter rather than a boolean `print()` gate.
    #[clap(long, env = "OPRF_ORACLE_VERBOSE")]
    pub verbose: bool,

    /// The library-level oracle configuration (datadir, rate-limit tuning,
    /// `max_kids`).
    #[clap(flatten)]
    pub oracle: oprf_oracle_service::config::OracleConfig,
}

impl BinConfig {
    /// The socket address the listener binds to.
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.address, self.port)
    }

    /// The `RUST_LOG`-style filter directive implied by `verbose`.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "oprf_oracle=debug,oprf_oracle_service=debug,info"
        } else {
            "info"
        }
    }
}
