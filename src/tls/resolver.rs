//! Per-handshake certificate selection.

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use std::sync::Arc;

use crate::tls::material::MaterialStore;

/// Resolves every handshake against the latest snapshot in the store.
///
/// A refresh that lands between two handshakes takes effect on the second one; the
/// listener never has to be rebuilt.
#[derive(Debug, Clone)]
pub struct StoreResolver {
    store: Arc<MaterialStore>,
}

impl StoreResolver {
    pub fn new(store: Arc<MaterialStore>) -> Self {
        Self { store }
    }
}

impl ResolvesServerCert for StoreResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let key = self.store.certified_key();
        if key.is_none() {
            tracing::debug!(
                server_name = client_hello.server_name().unwrap_or("-"),
                "Handshake with no serving material installed"
            );
        }
        key
    }
}
