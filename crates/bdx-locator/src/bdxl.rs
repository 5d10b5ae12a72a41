//! # DNS-based publisher discovery
//!
//! Federated networks register participants in DNS: a hostname derived
//! deterministically from the participant identifier carries NAPTR records,
//! and the record tagged with the well-known service value rewrites that
//! hostname into the publisher's URL.
//!
//! The hostname derivation is network policy, so it is pluggable through
//! [`HostnameGenerator`]; the default hashes the identifier value so
//! arbitrary-length identifiers always fit a DNS label.

use std::sync::Arc;

use async_trait::async_trait;
use bdx_core::Identifier;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::{LocatorError, ParticipantLocator};

/// The NAPTR service tag identifying publisher records.
pub const PUBLISHER_SERVICE_TAG: &str = "Meta:SMP";

/// Derives the DNS hostname registered for a participant.
///
/// Implementations must be safe for concurrent use.
pub trait HostnameGenerator: Send + Sync {
    /// The hostname registered for `participant`.
    ///
    /// # Errors
    ///
    /// [`LocatorError::UnsupportedIdentifier`] when no hostname can be
    /// derived from the identifier.
    fn hostname(&self, participant: &Identifier) -> Result<String, LocatorError>;
}

/// The default hostname generator:
/// `{hex(sha256(canonical value))}.{scheme-id}.{zone}`.
///
/// Hashing the canonical (case-folded) value keeps the label within DNS
/// length limits and makes the derivation insensitive to the casing of
/// case-insensitive identifiers. Identifiers without a scheme are rejected,
/// since the scheme id is part of the registered name.
#[derive(Debug, Clone)]
pub struct HashedHostnameGenerator {
    zone: String,
}

impl HashedHostnameGenerator {
    /// A generator for the given SML zone, e.g. `"edelivery.tech.ec.europa.eu"`.
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }
}

impl HostnameGenerator for HashedHostnameGenerator {
    fn hostname(&self, participant: &Identifier) -> Result<String, LocatorError> {
        let scheme = participant.scheme().ok_or_else(|| {
            LocatorError::UnsupportedIdentifier(
                participant.to_string(),
                "identifier has no scheme".into(),
            )
        })?;
        let digest = Sha256::digest(participant.value().as_bytes());
        Ok(format!(
            "{}.{}.{}",
            hex::encode(digest),
            scheme.scheme_id(),
            self.zone
        ))
    }
}

/// Locator resolving the publisher through NAPTR service records.
pub struct BdxlLocator {
    resolver: TokioAsyncResolver,
    generator: Arc<dyn HostnameGenerator>,
}

impl BdxlLocator {
    /// A locator using the operating system's resolver configuration.
    ///
    /// # Errors
    ///
    /// [`LocatorError::LookupFailed`] when the system resolver configuration
    /// cannot be read.
    pub fn from_system_conf(generator: Arc<dyn HostnameGenerator>) -> Result<Self, LocatorError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| LocatorError::LookupFailed(format!("resolver configuration: {e}")))?;
        Ok(Self { resolver, generator })
    }

    /// A locator using the default public resolver configuration.
    pub fn with_default_resolver(generator: Arc<dyn HostnameGenerator>) -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self { resolver, generator }
    }

    /// A locator using a caller-configured resolver.
    pub fn with_resolver(
        resolver: TokioAsyncResolver,
        generator: Arc<dyn HostnameGenerator>,
    ) -> Self {
        Self { resolver, generator }
    }
}

#[async_trait]
impl ParticipantLocator for BdxlLocator {
    async fn locate(&self, participant: &Identifier) -> Result<Url, LocatorError> {
        let hostname = self.generator.hostname(participant)?;
        debug!(%participant, %hostname, "querying NAPTR records for participant");
        let lookup = self
            .resolver
            .lookup(hostname.as_str(), RecordType::NAPTR)
            .await
            .map_err(|e| match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    warn!(%participant, "no NAPTR records registered");
                    LocatorError::NotRegistered(participant.to_string())
                }
                _ => LocatorError::LookupFailed(e.to_string()),
            })?;

        let mut records: Vec<NaptrRecord> = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::NAPTR(naptr) => Some(NaptrRecord {
                    order: naptr.order(),
                    preference: naptr.preference(),
                    flags: String::from_utf8_lossy(naptr.flags()).into_owned(),
                    service: String::from_utf8_lossy(naptr.services()).into_owned(),
                    regexp: String::from_utf8_lossy(naptr.regexp()).into_owned(),
                }),
                _ => None,
            })
            .collect();
        // Wire order of DNS answers carries no meaning.
        records.sort_by_key(|r| (r.order, r.preference));

        let url = publisher_from_records(&records, &hostname, participant)?;
        debug!(%participant, publisher = %url, "located publisher through DNS");
        Ok(url)
    }
}

/// A NAPTR answer reduced to the fields the selection needs.
#[derive(Debug, Clone)]
struct NaptrRecord {
    order: u16,
    preference: u16,
    flags: String,
    service: String,
    regexp: String,
}

/// Select the first record carrying the publisher service tag and a
/// URL-rewrite flag, and apply its rewrite rule to the hostname.
fn publisher_from_records(
    records: &[NaptrRecord],
    hostname: &str,
    participant: &Identifier,
) -> Result<Url, LocatorError> {
    for record in records {
        if record.service != PUBLISHER_SERVICE_TAG || !record.flags.eq_ignore_ascii_case("U") {
            continue;
        }
        let Some(rewritten) = naptr_rewrite(&record.regexp, hostname) else {
            warn!(rule = %record.regexp, %hostname, "publisher record rewrite rule does not match");
            return Err(LocatorError::NotRegistered(format!(
                "{participant} (unusable rewrite rule in publisher record)"
            )));
        };
        return Url::parse(&rewritten).map_err(|e| {
            LocatorError::NotRegistered(format!(
                "{participant} (publisher record rewrites to an invalid URL: {e})"
            ))
        });
    }
    Err(LocatorError::NotRegistered(participant.to_string()))
}

/// Apply a NAPTR rewrite rule (`!pattern!replacement!flags`, with the first
/// character of the rule acting as the delimiter) to the hostname. Returns
/// `None` when the rule is malformed or does not match.
fn naptr_rewrite(rule: &str, hostname: &str) -> Option<String> {
    let delimiter = rule.chars().next()?;
    let mut parts = rule[delimiter.len_utf8()..].split(delimiter);
    let pattern = parts.next()?;
    let replacement = parts.next()?;

    // The common registration replaces the whole hostname.
    if pattern == "^.*$" {
        return Some(replacement.to_string());
    }

    let regex = Regex::new(pattern).ok()?;
    if !regex.is_match(hostname) {
        return None;
    }
    // NAPTR backreferences are written \1..\9; the regex crate uses ${n}.
    let mut converted = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    converted.push_str("${");
                    converted.push(*d);
                    converted.push('}');
                    chars.next();
                }
                Some('\\') => {
                    converted.push('\\');
                    chars.next();
                }
                _ => converted.push(ch),
            }
        } else {
            converted.push(ch);
        }
    }
    Some(regex.replace(hostname, converted.as_str()).into_owned())
}
