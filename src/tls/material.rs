//! Serving material and the store the listener reads it from.
//!
//! # Responsibilities
//! - Hold one immutable snapshot of the current certificate and its signing key
//! - Replace the snapshot atomically; readers see the old or the new one in full
//!
//! # Design Decisions
//! - The signing key is built before the swap, so a snapshot always has both halves
//! - No history is kept

use arc_swap::ArcSwapOption;
use rustls::crypto::aws_lc_rs::sign::any_supported_type;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use std::io::BufReader;
use std::sync::Arc;
use time::OffsetDateTime;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::tls::error::{CertError, CertResult};

/// Certificate chain, private key, and the domain they serve.
///
/// The validity window is read from the leaf certificate on construction.
pub struct ServingCertificate {
    chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    domain: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl ServingCertificate {
    /// Build from DER, leaf first.
    pub fn from_der(
        chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
        domain: impl Into<String>,
    ) -> CertResult<Self> {
        let leaf = chain.first().ok_or(CertError::EmptyChain)?;
        let (_, parsed) =
            X509Certificate::from_der(leaf.as_ref()).map_err(|e| CertError::Parse(e.to_string()))?;
        let validity = parsed.validity();

        Ok(Self {
            not_before: validity.not_before.to_datetime(),
            not_after: validity.not_after.to_datetime(),
            chain,
            private_key,
            domain: domain.into(),
        })
    }

    /// Build from a PEM chain (leaf first) and a PEM private key.
    pub fn from_pem(chain_pem: &str, key_pem: &str, domain: impl Into<String>) -> CertResult<Self> {
        let chain = rustls_pemfile::certs(&mut BufReader::new(chain_pem.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CertError::Pem(e.to_string()))?;

        let private_key = rustls_pemfile::private_key(&mut BufReader::new(key_pem.as_bytes()))
            .map_err(|e| CertError::Pem(e.to_string()))?
            .ok_or_else(|| CertError::InvalidKey("no private key in PEM input".to_string()))?;

        Self::from_der(chain, private_key, domain)
    }

    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// Whether `at` falls inside the validity window (inclusive).
    pub fn is_current_at(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Handshake-ready form of this material.
    pub fn certified_key(&self) -> CertResult<CertifiedKey> {
        let signing_key = any_supported_type(&self.private_key)
            .map_err(|e| CertError::InvalidKey(e.to_string()))?;
        Ok(CertifiedKey::new(self.chain.clone(), signing_key))
    }
}

impl Clone for ServingCertificate {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            private_key: self.private_key.clone_key(),
            domain: self.domain.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }
}

impl PartialEq for ServingCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain
            && self.private_key.secret_der() == other.private_key.secret_der()
            && self.domain == other.domain
            && self.not_before == other.not_before
            && self.not_after == other.not_after
    }
}

impl Eq for ServingCertificate {}

impl std::fmt::Debug for ServingCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingCertificate")
            .field("domain", &self.domain)
            .field("chain_len", &self.chain.len())
            .field("private_key", &"<redacted>")
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

/// One installed generation of serving material.
#[derive(Debug)]
pub struct Snapshot {
    certificate: ServingCertificate,
    certified_key: Arc<CertifiedKey>,
}

impl Snapshot {
    pub fn certificate(&self) -> &ServingCertificate {
        &self.certificate
    }

    pub fn certified_key(&self) -> &Arc<CertifiedKey> {
        &self.certified_key
    }

    pub fn domain(&self) -> &str {
        self.certificate.domain()
    }
}

/// Read-mostly cell holding the current serving material.
#[derive(Default)]
pub struct MaterialStore {
    current: ArcSwapOption<Snapshot>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current material.
    ///
    /// Fails without touching the store if the key cannot be loaded.
    pub fn set(&self, certificate: ServingCertificate) -> CertResult<Arc<Snapshot>> {
        let certified_key = Arc::new(certificate.certified_key()?);
        let snapshot = Arc::new(Snapshot {
            certificate,
            certified_key,
        });
        self.current.store(Some(snapshot.clone()));
        Ok(snapshot)
    }

    /// Latest snapshot, if any has been installed.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Signing key for the next handshake.
    pub fn certified_key(&self) -> Option<Arc<CertifiedKey>> {
        self.current
            .load()
            .as_ref()
            .map(|snapshot| snapshot.certified_key.clone())
    }

    pub fn domain(&self) -> Option<String> {
        self.current
            .load()
            .as_ref()
            .map(|snapshot| snapshot.domain().to_string())
    }

    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }
}

impl std::fmt::Debug for MaterialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialStore")
            .field("domain", &self.domain())
            .finish()
    }
}
