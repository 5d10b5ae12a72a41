//! # bdx-locator -- Finding the metadata publisher for a participant
//!
//! Before a participant's metadata can be queried the authoritative
//! publisher serving it must be found. Two strategies exist: a fixed base
//! URL for closed networks where every participant is registered on one
//! known publisher ([`StaticLocator`]), and DNS-based discovery for
//! federated networks, where a hostname derived from the participant
//! identifier carries NAPTR service records pointing at the publisher
//! ([`bdxl::BdxlLocator`]).

pub mod bdxl;

pub use bdxl::{BdxlLocator, HashedHostnameGenerator, HostnameGenerator};

use async_trait::async_trait;
use bdx_core::Identifier;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors locating the publisher for a participant.
#[derive(Error, Debug)]
pub enum LocatorError {
    /// The participant is not registered in the network.
    #[error("participant {0} is not registered")]
    NotRegistered(String),

    /// The lookup itself failed (DNS transport, configuration).
    #[error("publisher lookup failed: {0}")]
    LookupFailed(String),

    /// The participant identifier cannot be used with this locator.
    #[error("unsupported participant identifier {0}: {1}")]
    UnsupportedIdentifier(String, String),
}

/// Maps a participant identifier to the base URL of the publisher serving
/// its metadata.
///
/// Implementations must be safe for concurrent use; one locator instance is
/// shared by every resolution call.
#[async_trait]
pub trait ParticipantLocator: Send + Sync {
    /// The base URL of the publisher serving `participant`.
    async fn locate(&self, participant: &Identifier) -> Result<Url, LocatorError>;
}

/// Locator for networks with a single, known publisher: every participant
/// maps to the same fixed base URL.
#[derive(Debug, Clone)]
pub struct StaticLocator {
    base_url: Url,
}

impl StaticLocator {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// The configured publisher base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl TryFrom<&str> for StaticLocator {
    type Error = url::ParseError;

    /// Parse the base URL eagerly so a misconfigured locator fails at
    /// construction, not at the first resolution call.
    fn try_from(base_url: &str) -> Result<Self, Self::Error> {
        Ok(Self::new(Url::parse(base_url)?))
    }
}

#[async_trait]
impl ParticipantLocator for StaticLocator {
    async fn locate(&self, participant: &Identifier) -> Result<Url, LocatorError> {
        debug!(%participant, publisher = %self.base_url, "using statically configured publisher");
        Ok(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_locator_returns_the_fixed_url_for_any_participant() {
        let locator = StaticLocator::try_from("https://smp.example.org").unwrap();
        let a: Identifier = "iso6523::9915:a".parse().unwrap();
        let b: Identifier = "other::participant".parse().unwrap();
        assert_eq!(locator.locate(&a).await.unwrap().as_str(), "https://smp.example.org/");
        assert_eq!(locator.locate(&b).await.unwrap().as_str(), "https://smp.example.org/");
    }

    #[test]
    fn static_locator_rejects_a_malformed_url_at_construction() {
        assert!(StaticLocator::try_from("not a url").is_err());
    }
}
