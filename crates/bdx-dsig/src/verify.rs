//! # Signature verification
//!
//! Locates the `ds:Signature` element in a publisher response, checks every
//! reference digest, validates the signature value against the signer
//! certificate and, when configured, asks the trust validator whether that
//! certificate is acceptable.
//!
//! An unsigned response is not an error: verification returns `None` and the
//! caller decides whether unsigned metadata is acceptable. When a document
//! carries more than one signature only the first is validated; this is a
//! documented ambiguity of the publisher protocol, surfaced as a warning.

use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bdx_core::Certificate;
use roxmltree::{Document, Node};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use x509_cert::der::{Decode, Encode};

use crate::c14n::{canonicalize, C14nMode};
use crate::keyinfo::{CertificateFinder, EmbeddedCertificateFinder, KeyInfo};
use crate::{DsigError, TrustValidator};

/// Namespace URI of XML-dsig.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// Local name of the element containing a signature.
pub const SIGNATURE_LOCAL_NAME: &str = "Signature";

const SIG_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
const SIG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const DIGEST_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const C14N_EXC: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const C14N_EXC_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
const C14N_10: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const C14N_10_COMMENTS: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
const C14N_11: &str = "http://www.w3.org/2006/12/xml-c14n11";
const TRANSFORM_ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Verifies the XML signature of publisher responses.
///
/// Shared, immutable after construction; safe to use from any number of
/// concurrent resolution calls.
#[derive(Clone)]
pub struct SignatureVerifier {
    finder: Arc<dyn CertificateFinder>,
    trust_validator: Option<Arc<dyn TrustValidator>>,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier {
    /// A verifier using the embedded-certificate finder and no trust
    /// validation.
    pub fn new() -> Self {
        Self {
            finder: Arc::new(EmbeddedCertificateFinder),
            trust_validator: None,
        }
    }

    /// Replace the certificate-resolution strategy.
    pub fn with_certificate_finder(mut self, finder: Arc<dyn CertificateFinder>) -> Self {
        self.finder = finder;
        self
    }

    /// Install a trust validator consulted after cryptographic validation.
    pub fn with_trust_validator(mut self, validator: Arc<dyn TrustValidator>) -> Self {
        self.trust_validator = Some(validator);
        self
    }

    /// Verify the signature on `doc`, if there is one.
    ///
    /// Returns the signer certificate for a valid signature, `None` for an
    /// unsigned document.
    ///
    /// # Errors
    ///
    /// [`DsigError::InvalidSignature`] when a signature is present but does
    /// not validate, [`DsigError::UntrustedCertificate`] when the signer
    /// certificate is rejected by the configured trust validator.
    pub fn verify(&self, doc: &Document<'_>) -> Result<Option<Certificate>, DsigError> {
        let mut signatures = doc.descendants().filter(|n| {
            n.is_element()
                && n.tag_name().namespace() == Some(XMLDSIG_NS)
                && n.tag_name().name() == SIGNATURE_LOCAL_NAME
        });
        let signature = match signatures.next() {
            Some(node) => node,
            None => {
                debug!("response is not signed");
                return Ok(None);
            }
        };
        if signatures.next().is_some() {
            warn!("response is signed more than once, validating only the first signature");
        }

        let signed_info = parse_signed_info(signature)?;
        debug!(
            c14n = %signed_info.c14n_algorithm,
            algorithm = %signed_info.signature_algorithm,
            references = signed_info.references.len(),
            "validating signature"
        );

        // Reference digests first; a tampered document fails here before
        // any key material is touched.
        for reference in &signed_info.references {
            self.verify_reference(doc, signature, reference)?;
        }

        let key_info = parse_key_info(signature);
        let certificate = self.finder.find(&key_info)?;

        let canonical = canonicalize(
            signed_info.node,
            c14n_mode(&signed_info.c14n_algorithm)?,
            None,
        );
        verify_signature_value(
            &certificate.x509_der,
            &signed_info.signature_algorithm,
            canonical.as_bytes(),
            &signed_info.signature_value,
        )?;

        if let Some(validator) = &self.trust_validator {
            if !validator.is_trusted(&certificate) {
                let subject = certificate.description.as_deref().unwrap_or("<unknown>");
                warn!(subject, "signer certificate rejected by trust validator");
                return Err(DsigError::UntrustedCertificate(subject.to_string()));
            }
        }

        debug!("signature successfully verified");
        Ok(Some(certificate))
    }

    fn verify_reference(
        &self,
        doc: &Document<'_>,
        signature: Node<'_, '_>,
        reference: &SignatureReference,
    ) -> Result<(), DsigError> {
        let target = reference_target(doc, &reference.uri)?;
        let omit = reference
            .transforms
            .iter()
            .any(|t| t == TRANSFORM_ENVELOPED)
            .then(|| signature.id());
        let mode = reference
            .transforms
            .iter()
            .find_map(|t| c14n_mode(t).ok())
            .unwrap_or(C14nMode::Inclusive);
        let canonical = canonicalize(target, mode, omit);
        let actual = digest(&reference.digest_algorithm, canonical.as_bytes())?;
        if actual != reference.digest_value {
            return Err(DsigError::InvalidSignature(format!(
                "digest mismatch for reference \"{}\"",
                reference.uri
            )));
        }
        Ok(())
    }
}

struct ParsedSignedInfo<'a, 'input> {
    node: Node<'a, 'input>,
    c14n_algorithm: String,
    signature_algorithm: String,
    references: Vec<SignatureReference>,
    signature_value: Vec<u8>,
}

struct SignatureReference {
    uri: String,
    transforms: Vec<String>,
    digest_algorithm: String,
    digest_value: Vec<u8>,
}

fn dsig_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| {
        n.is_element()
            && n.tag_name().namespace() == Some(XMLDSIG_NS)
            && n.tag_name().name() == name
    })
}

fn algorithm_of(node: Node<'_, '_>) -> Result<String, DsigError> {
    node.attribute("Algorithm")
        .map(str::to_string)
        .ok_or_else(|| {
            DsigError::InvalidSignature(format!(
                "{} is missing its Algorithm attribute",
                node.tag_name().name()
            ))
        })
}

fn parse_signed_info<'a, 'input>(
    signature: Node<'a, 'input>,
) -> Result<ParsedSignedInfo<'a, 'input>, DsigError> {
    let signed_info = dsig_child(signature, "SignedInfo")
        .ok_or_else(|| DsigError::InvalidSignature("signature has no SignedInfo".into()))?;
    let c14n_algorithm = algorithm_of(
        dsig_child(signed_info, "CanonicalizationMethod").ok_or_else(|| {
            DsigError::InvalidSignature("SignedInfo has no CanonicalizationMethod".into())
        })?,
    )?;
    let signature_algorithm = algorithm_of(
        dsig_child(signed_info, "SignatureMethod").ok_or_else(|| {
            DsigError::InvalidSignature("SignedInfo has no SignatureMethod".into())
        })?,
    )?;

    let mut references = Vec::new();
    for node in signed_info.children().filter(|n| {
        n.is_element()
            && n.tag_name().namespace() == Some(XMLDSIG_NS)
            && n.tag_name().name() == "Reference"
    }) {
        let transforms = dsig_child(node, "Transforms")
            .map(|transforms| {
                transforms
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "Transform")
                    .map(algorithm_of)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        let digest_algorithm = algorithm_of(dsig_child(node, "DigestMethod").ok_or_else(
            || DsigError::InvalidSignature("Reference has no DigestMethod".into()),
        )?)?;
        let digest_value = decode_base64_text(dsig_child(node, "DigestValue").ok_or_else(
            || DsigError::InvalidSignature("Reference has no DigestValue".into()),
        )?)?;
        references.push(SignatureReference {
            uri: node.attribute("URI").unwrap_or_default().to_string(),
            transforms,
            digest_algorithm,
            digest_value,
        });
    }
    if references.is_empty() {
        return Err(DsigError::InvalidSignature(
            "SignedInfo contains no Reference".into(),
        ));
    }

    let signature_value = decode_base64_text(dsig_child(signature, "SignatureValue").ok_or_else(
        || DsigError::InvalidSignature("signature has no SignatureValue".into()),
    )?)?;

    Ok(ParsedSignedInfo {
        node: signed_info,
        c14n_algorithm,
        signature_algorithm,
        references,
        signature_value,
    })
}

fn parse_key_info(signature: Node<'_, '_>) -> KeyInfo {
    let mut key_info = KeyInfo::default();
    let Some(node) = dsig_child(signature, "KeyInfo") else {
        return key_info;
    };
    for x509_data in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "X509Data")
    {
        for cert in x509_data
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "X509Certificate")
        {
            if let Ok(der) = decode_base64_text(cert) {
                key_info.x509_certificates.push(der);
            }
        }
    }
    key_info
}

fn decode_base64_text(node: Node<'_, '_>) -> Result<Vec<u8>, DsigError> {
    let text: String = node
        .text()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    BASE64_STANDARD.decode(text).map_err(|e| {
        DsigError::InvalidSignature(format!(
            "{} does not contain valid base64: {e}",
            node.tag_name().name()
        ))
    })
}

fn reference_target<'a, 'input>(
    doc: &'a Document<'input>,
    uri: &str,
) -> Result<Node<'a, 'input>, DsigError> {
    if uri.is_empty() {
        return Ok(doc.root_element());
    }
    if let Some(id) = uri.strip_prefix('#') {
        return doc
            .descendants()
            .find(|n| {
                n.is_element()
                    && ["Id", "ID", "id"]
                        .iter()
                        .any(|attr| n.attribute(*attr) == Some(id))
            })
            .ok_or_else(|| {
                DsigError::InvalidSignature(format!("reference target \"{uri}\" not found"))
            });
    }
    Err(DsigError::InvalidSignature(format!(
        "unsupported reference URI \"{uri}\""
    )))
}

fn c14n_mode(algorithm: &str) -> Result<C14nMode, DsigError> {
    match algorithm {
        C14N_EXC | C14N_EXC_COMMENTS => Ok(C14nMode::Exclusive),
        C14N_10 | C14N_10_COMMENTS | C14N_11 => Ok(C14nMode::Inclusive),
        other => Err(DsigError::InvalidSignature(format!(
            "unsupported canonicalization algorithm \"{other}\""
        ))),
    }
}

fn digest(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, DsigError> {
    match algorithm {
        DIGEST_SHA1 => Ok(Sha1::digest(data).to_vec()),
        DIGEST_SHA256 => Ok(Sha256::digest(data).to_vec()),
        other => Err(DsigError::InvalidSignature(format!(
            "unsupported digest algorithm \"{other}\""
        ))),
    }
}

fn verify_signature_value(
    cert_der: &[u8],
    algorithm: &str,
    canonical_signed_info: &[u8],
    signature: &[u8],
) -> Result<(), DsigError> {
    let key = rsa_public_key(cert_der)?;
    let (padding, hashed) = match algorithm {
        SIG_RSA_SHA1 => (
            Pkcs1v15Sign::new::<Sha1>(),
            Sha1::digest(canonical_signed_info).to_vec(),
        ),
        SIG_RSA_SHA256 => (
            Pkcs1v15Sign::new::<Sha256>(),
            Sha256::digest(canonical_signed_info).to_vec(),
        ),
        other => {
            return Err(DsigError::InvalidSignature(format!(
                "unsupported signature algorithm \"{other}\""
            )))
        }
    };
    key.verify(padding, &hashed, signature)
        .map_err(|_| DsigError::InvalidSignature("signature value does not verify".into()))
}

fn rsa_public_key(cert_der: &[u8]) -> Result<RsaPublicKey, DsigError> {
    let cert = x509_cert::Certificate::from_der(cert_der)
        .map_err(|e| DsigError::InvalidSignature(format!("malformed signer certificate: {e}")))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| DsigError::InvalidSignature(format!("unreadable public key: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| {
        DsigError::InvalidSignature(format!("signer certificate does not carry an RSA key: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_document_verifies_to_none() {
        let doc = roxmltree::Document::parse("<Metadata xmlns=\"urn:test\"/>").unwrap();
        let result = SignatureVerifier::new().verify(&doc).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn signature_without_signed_info_is_invalid() {
        let doc = roxmltree::Document::parse(
            r#"<m xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:Signature/></m>"#,
        )
        .unwrap();
        let result = SignatureVerifier::new().verify(&doc);
        assert!(matches!(result, Err(DsigError::InvalidSignature(_))));
    }

    #[test]
    fn digest_mismatch_fails_before_key_resolution() {
        // DigestValue is valid base64 of the wrong bytes and the key info is
        // absent entirely; the digest check must reject first.
        let doc = roxmltree::Document::parse(concat!(
            r#"<m xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><v>data</v>"#,
            r#"<ds:Signature><ds:SignedInfo>"#,
            r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
            r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
            r#"<ds:Reference URI="">"#,
            r#"<ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/></ds:Transforms>"#,
            r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
            r#"<ds:DigestValue>AAAA</ds:DigestValue>"#,
            r#"</ds:Reference></ds:SignedInfo>"#,
            r#"<ds:SignatureValue>AAAA</ds:SignatureValue>"#,
            r#"</ds:Signature></m>"#,
        ))
        .unwrap();
        let err = SignatureVerifier::new().verify(&doc).unwrap_err();
        match err {
            DsigError::InvalidSignature(msg) => assert!(msg.contains("digest mismatch")),
            other => panic!("expected digest mismatch, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_digest_algorithm_is_rejected() {
        assert!(digest("urn:not-a-digest", b"x").is_err());
    }

    #[test]
    fn unknown_c14n_algorithm_is_rejected() {
        assert!(c14n_mode("urn:not-c14n").is_err());
    }

    #[test]
    fn reference_to_missing_id_is_invalid() {
        let doc = roxmltree::Document::parse("<m/>").unwrap();
        assert!(reference_target(&doc, "#nope").is_err());
    }

    #[test]
    fn reference_by_id_attribute_resolves() {
        let doc = roxmltree::Document::parse(r#"<m><part Id="p1"/></m>"#).unwrap();
        let node = reference_target(&doc, "#p1").unwrap();
        assert_eq!(node.tag_name().name(), "part");
    }
}
