//! Self-signed fallback certificate.
//!
//! Used only when no managed certificate system is configured. There is no rotation
//! for this path, so the validity window outlives any realistic uptime.

use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, KeyPair, KeyUsagePurpose, SerialNumber,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::time::Duration;
use time::OffsetDateTime;

use crate::tls::error::CertResult;
use crate::tls::material::ServingCertificate;

/// Five years.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(5 * 365 * 24 * 3600);

const SERIAL_BYTES: usize = 20;

/// A freshly generated self-signed certificate in both DER and PEM form.
pub struct SelfSigned {
    pub certificate: ServingCertificate,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Generate a certificate for `common_name` valid from now for [`DEFAULT_VALIDITY`].
pub fn generate(common_name: &str) -> CertResult<SelfSigned> {
    generate_with_validity(common_name, DEFAULT_VALIDITY)
}

pub fn generate_with_validity(common_name: &str, validity: Duration) -> CertResult<SelfSigned> {
    let now = OffsetDateTime::now_utc();
    let not_before = now.replace_nanosecond(0).unwrap_or(now);
    let not_after = not_before + time::Duration::seconds(validity.as_secs() as i64);
    generate_with_window(common_name, not_before, not_after)
}

/// Generate a certificate with an explicit validity window.
pub fn generate_with_window(
    common_name: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
) -> CertResult<SelfSigned> {
    let key_pair = KeyPair::generate()?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, "CH");
    dn.push(DnType::OrganizationName, "SnakeOil");
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serial_number = Some(random_serial());
    params.not_before = not_before;
    params.not_after = not_after;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

    let cert = params.self_signed(&key_pair)?;

    let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let certificate =
        ServingCertificate::from_der(vec![cert.der().clone()], private_key, common_name)?;

    tracing::debug!(
        common_name,
        not_after = %certificate.not_after(),
        "Generated self-signed certificate"
    );

    Ok(SelfSigned {
        certificate,
        certificate_pem: cert.pem(),
        private_key_pem: key_pair.serialize_pem(),
    })
}

fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; SERIAL_BYTES];
    OsRng.fill_bytes(&mut bytes);
    // Keep the encoded INTEGER positive and exactly SERIAL_BYTES long.
    bytes[0] &= 0x7f;
    bytes[0] |= 0x01;
    SerialNumber::from_slice(&bytes)
}
