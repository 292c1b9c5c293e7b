//! Protocol-multiplexing TLS listener.
//!
//! # Responsibilities
//! - Bind the single serving port
//! - Terminate TLS with the store-backed configuration
//! - Reclaim idle connections
//! - Drain gracefully when the shared shutdown signal fires

use axum::Router;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use axum_server::Handle;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::ListenerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::idle::IdleTimeoutAcceptor;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured bind address does not parse.
    #[error("Invalid listen address {address}: {reason}")]
    Address { address: String, reason: String },

    /// Binding or the accept loop failed.
    #[error("Listener on {address} failed: {source}")]
    Serve {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// One TLS port serving both the RPC and the application surface.
pub struct MultiplexListener {
    address: SocketAddr,
    tls: RustlsConfig,
    router: Router,
    idle_timeout: Duration,
    shutdown_grace: Duration,
}

impl MultiplexListener {
    pub fn new(
        config: &ListenerConfig,
        tls: RustlsConfig,
        router: Router,
    ) -> Result<Self, ListenerError> {
        let raw = config.bind_address();
        let address = raw.parse().map_err(|e: std::net::AddrParseError| {
            ListenerError::Address {
                address: raw.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            address,
            tls,
            router,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    /// Configured bind address (port 0 until bound).
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Accept until shutdown. `handle` reports the bound address once listening.
    ///
    /// Returns `Ok` only after a graceful drain; any other exit is an error.
    pub async fn serve(
        self,
        handle: Handle,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        let acceptor =
            RustlsAcceptor::new(self.tls).acceptor(IdleTimeoutAcceptor::new(self.idle_timeout));

        let drain = {
            let handle = handle.clone();
            let grace = self.shutdown_grace;
            tokio::spawn(async move {
                shutdown.recv().await;
                tracing::info!(grace_secs = grace.as_secs(), "Listener draining connections");
                handle.graceful_shutdown(Some(grace));
            })
        };

        tracing::info!(
            address = %self.address,
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Multiplexing listener starting"
        );

        let result = axum_server::bind(self.address)
            .acceptor(acceptor)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await;

        drain.abort();

        result.map_err(|source| ListenerError::Serve {
            address: self.address,
            source,
        })?;

        tracing::info!(address = %self.address, "Multiplexing listener stopped");
        Ok(())
    }
}
