//! # Client configuration
//!
//! A client is configured once, before first use, and shares its immutable
//! collaborators (locator, executor, processors, verifier) across every
//! concurrent resolution call. All configuration problems surface at
//! [`SmpClientBuilder::build`]; nothing is deferred to first use.

use std::sync::Arc;
use std::time::Duration;

use bdx_dsig::{CertificateFinder, SignatureVerifier, TrustValidator};
use bdx_locator::ParticipantLocator;

use crate::client::SmpClient;
use crate::error::ConfigurationError;
use crate::executor::{DefaultRequestExecutor, RequestExecutor};
use crate::processor::{ProcessorRegistry, ResultProcessor};

/// The default bound on redirect following.
pub const DEFAULT_MAX_REDIRECTS: u32 = 1;

/// The default per-request HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable configuration shared by all resolution calls of one client.
pub(crate) struct ClientConfig {
    pub(crate) locator: Arc<dyn ParticipantLocator>,
    pub(crate) executor: Arc<dyn RequestExecutor>,
    pub(crate) processors: ProcessorRegistry,
    pub(crate) verifier: SignatureVerifier,
    pub(crate) max_redirects: u32,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("processors", &self.processors)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

/// Configures and creates [`SmpClient`] instances.
///
/// At a minimum the participant locator must be set. Both shipped result
/// processors are pre-registered; replacing the set entirely is possible
/// through [`Self::processors`].
pub struct SmpClientBuilder {
    locator: Option<Arc<dyn ParticipantLocator>>,
    executor: Option<Arc<dyn RequestExecutor>>,
    processors: ProcessorRegistry,
    certificate_finder: Option<Arc<dyn CertificateFinder>>,
    trust_validator: Option<Arc<dyn TrustValidator>>,
    max_redirects: u32,
    timeout: Duration,
}

impl Default for SmpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmpClientBuilder {
    pub fn new() -> Self {
        Self {
            locator: None,
            executor: None,
            processors: ProcessorRegistry::with_default_processors(),
            certificate_finder: None,
            trust_validator: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The locator used to find the publisher serving a participant.
    /// Required.
    pub fn locator(mut self, locator: Arc<dyn ParticipantLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Replace the default HTTP executor.
    pub fn request_executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Register (or replace) the processor for one response namespace.
    pub fn processor(
        mut self,
        namespace: impl Into<String>,
        processor: Arc<dyn ResultProcessor>,
    ) -> Self {
        self.processors.register(namespace, processor);
        self
    }

    /// Replace the whole processor registry.
    pub fn processors(mut self, registry: ProcessorRegistry) -> Self {
        self.processors = registry;
        self
    }

    /// Replace the strategy resolving the signer certificate from a
    /// response signature. Only needed when the certificate is not embedded
    /// in the signature itself.
    pub fn certificate_finder(mut self, finder: Arc<dyn CertificateFinder>) -> Self {
        self.certificate_finder = Some(finder);
        self
    }

    /// Install a trust validator for signer certificates. Without one, only
    /// cryptographic validity is checked and trust is the caller's
    /// responsibility.
    pub fn trust_validator(mut self, validator: Arc<dyn TrustValidator>) -> Self {
        self.trust_validator = Some(validator);
        self
    }

    /// Bound on redirect following. With a bound of `n`, at most `n + 1`
    /// requests are made before the resolution fails.
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Per-request timeout of the default HTTP executor. Ignored when a
    /// custom executor is set.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create the client.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingLocator`] without a locator,
    /// [`ConfigurationError::NoProcessors`] with an empty registry, and
    /// [`ConfigurationError::HttpClient`] when the default executor cannot
    /// be initialized.
    pub fn build(self) -> Result<SmpClient, ConfigurationError> {
        let locator = self.locator.ok_or(ConfigurationError::MissingLocator)?;
        if self.processors.is_empty() {
            return Err(ConfigurationError::NoProcessors);
        }
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(DefaultRequestExecutor::new(self.timeout)?),
        };
        let mut verifier = SignatureVerifier::new();
        if let Some(finder) = self.certificate_finder {
            verifier = verifier.with_certificate_finder(finder);
        }
        if let Some(validator) = self.trust_validator {
            verifier = verifier.with_trust_validator(validator);
        }
        Ok(SmpClient::from_config(ClientConfig {
            locator,
            executor,
            processors: self.processors,
            verifier,
            max_redirects: self.max_redirects,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdx_locator::StaticLocator;

    #[test]
    fn build_without_locator_fails() {
        let result = SmpClientBuilder::new().build();
        assert!(matches!(result, Err(ConfigurationError::MissingLocator)));
    }

    #[test]
    fn build_with_empty_processor_registry_fails() {
        let locator = StaticLocator::try_from("https://smp.example.org").unwrap();
        let result = SmpClientBuilder::new()
            .locator(Arc::new(locator))
            .processors(ProcessorRegistry::new())
            .build();
        assert!(matches!(result, Err(ConfigurationError::NoProcessors)));
    }

    #[test]
    fn build_with_locator_and_defaults_succeeds() {
        let locator = StaticLocator::try_from("https://smp.example.org").unwrap();
        assert!(SmpClientBuilder::new()
            .locator(Arc::new(locator))
            .max_redirects(3)
            .build()
            .is_ok());
    }
}
