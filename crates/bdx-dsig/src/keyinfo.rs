//! # Key info and certificate resolution
//!
//! The signature's `KeyInfo` block names the key that produced it. How the
//! signer certificate is obtained from it is a configuration decision: the
//! default strategy takes the first X.509 certificate embedded in
//! `KeyInfo/X509Data`, but networks distributing publisher certificates
//! out-of-band can plug in their own [`CertificateFinder`].

use bdx_core::Certificate;
use chrono::{DateTime, Utc};
use x509_cert::der::Decode;

use crate::DsigError;

/// The parsed content of a signature's `KeyInfo` element.
///
/// Only the material a finder can act on is kept; an absent `KeyInfo` is
/// represented by an empty value.
#[derive(Debug, Clone, Default)]
pub struct KeyInfo {
    /// DER bytes of each `X509Data/X509Certificate` entry, in document
    /// order.
    pub x509_certificates: Vec<Vec<u8>>,
}

/// Strategy resolving the signer certificate from a signature's key info.
///
/// Implementations must be safe for concurrent use; one finder instance is
/// shared by every resolution call.
pub trait CertificateFinder: Send + Sync {
    /// Resolve the certificate the signature was produced with.
    ///
    /// # Errors
    ///
    /// [`DsigError::InvalidSignature`] when no usable certificate can be
    /// resolved.
    fn find(&self, key_info: &KeyInfo) -> Result<Certificate, DsigError>;
}

/// The default finder: the first entry of the embedded X.509 data that
/// parses as a certificate wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedCertificateFinder;

impl CertificateFinder for EmbeddedCertificateFinder {
    fn find(&self, key_info: &KeyInfo) -> Result<Certificate, DsigError> {
        key_info
            .x509_certificates
            .iter()
            .find_map(|der| certificate_from_der(der.clone()).ok())
            .ok_or_else(|| {
                DsigError::InvalidSignature(
                    "no usable X.509 certificate embedded in the signature key info".into(),
                )
            })
    }
}

/// Build a data-model [`Certificate`] from DER bytes, lifting the X.509
/// validity window and subject into the advisory fields.
pub fn certificate_from_der(der: Vec<u8>) -> Result<Certificate, DsigError> {
    let parsed = x509_cert::Certificate::from_der(&der)
        .map_err(|e| DsigError::InvalidSignature(format!("malformed X.509 certificate: {e}")))?;
    let validity = &parsed.tbs_certificate.validity;
    let not_before: DateTime<Utc> = validity.not_before.to_system_time().into();
    let not_after: DateTime<Utc> = validity.not_after.to_system_time().into();
    Ok(Certificate {
        x509_der: der,
        usage: None,
        activation: Some(not_before),
        expiration: Some(not_after),
        description: Some(parsed.tbs_certificate.subject.to_string()),
    })
}
