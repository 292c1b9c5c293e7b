//! TLS server configuration backed by the material store.

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::aws_lc_rs;
use rustls::ServerConfig;
use std::sync::Arc;

use crate::tls::{CertError, CertResult, MaterialStore, StoreResolver};

/// Protocols offered during ALPN, in preference order.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Build the rustls server configuration.
///
/// The store must already hold material: the listener never starts without it.
pub fn server_config(store: Arc<MaterialStore>) -> CertResult<ServerConfig> {
    if !store.is_populated() {
        return Err(CertError::NoMaterial);
    }

    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(StoreResolver::new(store)));

    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(config)
}

/// Wrap [`server_config`] for `axum-server`.
pub fn rustls_config(store: Arc<MaterialStore>) -> CertResult<RustlsConfig> {
    Ok(RustlsConfig::from_config(Arc::new(server_config(store)?)))
}
