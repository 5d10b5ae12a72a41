//! # bdx-dsig -- Publisher response signature verification
//!
//! Publishers may sign their responses with an enveloped XML signature.
//! This crate locates the signature, validates it cryptographically and
//! resolves the signing certificate so the engine can attach it to the
//! normalized metadata. Trust in that certificate is a separate, optional
//! concern: install a [`TrustValidator`] to reject signers your network
//! does not accept; without one only cryptographic validity is checked and
//! trust is the caller's responsibility.

pub mod c14n;
pub mod keyinfo;
pub mod verify;

pub use c14n::{canonicalize, C14nMode};
pub use keyinfo::{certificate_from_der, CertificateFinder, EmbeddedCertificateFinder, KeyInfo};
pub use verify::{SignatureVerifier, SIGNATURE_LOCAL_NAME, XMLDSIG_NS};

use bdx_core::Certificate;
use thiserror::Error;

/// Signature verification errors.
#[derive(Error, Debug)]
pub enum DsigError {
    /// A signature is present but does not validate: malformed structure,
    /// unsupported algorithm, reference digest mismatch, unusable key
    /// material or a failing signature value.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The signature validates but the signer certificate was rejected by
    /// the configured trust validator.
    #[error("signer certificate is not trusted: {0}")]
    UntrustedCertificate(String),
}

/// Decides whether a cryptographically valid signer certificate is accepted.
///
/// Implementations must be safe for concurrent use; one validator instance
/// is shared by every resolution call.
pub trait TrustValidator: Send + Sync {
    /// Whether the certificate is trusted.
    fn is_trusted(&self, certificate: &Certificate) -> bool;
}
