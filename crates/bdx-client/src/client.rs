//! # The query engine
//!
//! Orchestrates one resolution call: locate the publisher, build the query
//! URL, fetch, verify the signature, dispatch to the schema processor, and
//! either select endpoints or follow a redirection -- re-querying at most
//! `max_redirects` times, since open-ended redirect following is the classic
//! amplification vector for a resolver.
//!
//! Within one call the steps are strictly sequential; across calls the
//! client is freely shareable, all collaborators being read-only after
//! construction.

use std::sync::Arc;

use bdx_core::{
    EndpointInfo, Identifier, ProcessIdentifier, QueryResult, Redirection, ServiceMetadata,
};
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, SmpClientBuilder};
use crate::error::ResolutionError;
use crate::selector::{select, Selection};

/// One metadata query: the participant and service to look up, plus the
/// optional constraints narrowing the answer.
#[derive(Debug, Clone)]
pub struct MetadataQuery {
    participant: Identifier,
    service: Identifier,
    process: Option<ProcessIdentifier>,
    role: Option<Identifier>,
    transport_profile: Option<String>,
}

impl MetadataQuery {
    /// A query for all endpoints of `participant` and `service`.
    pub fn new(participant: Identifier, service: Identifier) -> Self {
        Self {
            participant,
            service,
            process: None,
            role: None,
            transport_profile: None,
        }
    }

    /// Constrain the query to one process (or the no-process marker).
    pub fn process(mut self, process: ProcessIdentifier) -> Self {
        self.process = Some(process);
        self
    }

    /// Constrain the query to one role of the participant.
    pub fn role(mut self, role: Identifier) -> Self {
        self.role = Some(role);
        self
    }

    /// Only return endpoints supporting this transport profile.
    pub fn transport_profile(mut self, transport_profile: impl Into<String>) -> Self {
        self.transport_profile = Some(transport_profile.into());
        self
    }

    pub fn participant(&self) -> &Identifier {
        &self.participant
    }

    pub fn service(&self) -> &Identifier {
        &self.service
    }
}

/// The metadata resolution client.
///
/// Cheap to clone; all clones share the same immutable configuration and
/// may be used concurrently.
#[derive(Debug, Clone)]
pub struct SmpClient {
    config: Arc<ClientConfig>,
}

impl SmpClient {
    /// Start configuring a new client.
    pub fn builder() -> SmpClientBuilder {
        SmpClientBuilder::new()
    }

    pub(crate) fn from_config(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Resolve all endpoints matching the query.
    ///
    /// Returns an empty list when the metadata holds no match for the
    /// requested process, role or transport profile; that is a valid,
    /// non-exceptional outcome.
    pub async fn resolve(&self, query: &MetadataQuery) -> Result<Vec<EndpointInfo>, ResolutionError> {
        debug!(
            participant = %query.participant,
            service = %query.service,
            "resolving endpoints"
        );
        let mut target = self.initial_query_url(query).await?;
        let mut redirects = 0u32;
        loop {
            let redirection = match self.fetch_and_normalize(&target).await? {
                QueryResult::Redirect(redirection) => redirection,
                QueryResult::Metadata(metadata) => {
                    match select(
                        &metadata,
                        query.process.as_ref(),
                        query.role.as_ref(),
                        query.transport_profile.as_deref(),
                    )
                    .map_err(|e| ResolutionError::AmbiguousMetadata(e.to_string()))?
                    {
                        Selection::Endpoints(endpoints) => {
                            debug!(count = endpoints.len(), "resolution finished");
                            return Ok(endpoints);
                        }
                        Selection::Redirect(redirection) => redirection,
                    }
                }
            };
            target = self.follow(redirection, &mut redirects)?;
        }
    }

    /// Resolve the first endpoint matching the query, in publisher-declared
    /// order.
    pub async fn first_endpoint(
        &self,
        query: &MetadataQuery,
    ) -> Result<Option<EndpointInfo>, ResolutionError> {
        Ok(self.resolve(query).await?.into_iter().next())
    }

    /// Fetch the full normalized metadata document for the query's
    /// participant and service, without endpoint selection.
    ///
    /// Response-level redirections are followed (bounded); redirections of
    /// individual process groups are returned as part of the document.
    pub async fn service_metadata(
        &self,
        query: &MetadataQuery,
    ) -> Result<ServiceMetadata, ResolutionError> {
        let mut target = self.initial_query_url(query).await?;
        let mut redirects = 0u32;
        loop {
            match self.fetch_and_normalize(&target).await? {
                QueryResult::Metadata(metadata) => return Ok(metadata),
                QueryResult::Redirect(redirection) => {
                    target = self.follow(redirection, &mut redirects)?;
                }
            }
        }
    }

    async fn initial_query_url(&self, query: &MetadataQuery) -> Result<Url, ResolutionError> {
        let publisher = self.config.locator.locate(&query.participant).await?;
        query_url(&publisher, &query.participant, &query.service)
    }

    /// Check the redirect bound and return the next query target.
    fn follow(
        &self,
        redirection: Redirection,
        redirects: &mut u32,
    ) -> Result<Url, ResolutionError> {
        if *redirects >= self.config.max_redirects {
            warn!(max = self.config.max_redirects, "redirect bound exceeded");
            return Err(ResolutionError::TooManyRedirections {
                max: self.config.max_redirects,
            });
        }
        *redirects += 1;
        debug!(target = %redirection.new_url, follow = *redirects, "following redirection");
        Ok(redirection.new_url)
    }

    /// One query iteration: execute, verify the signature, dispatch on the
    /// response namespace, and attach the signer certificate to metadata.
    async fn fetch_and_normalize(&self, target: &Url) -> Result<QueryResult, ResolutionError> {
        let body = self.config.executor.execute(target).await?;
        let xml = std::str::from_utf8(&body).map_err(|_| {
            ResolutionError::UnparsableResponse("response is not valid UTF-8".into())
        })?;
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            ResolutionError::UnparsableResponse(format!("response is not well-formed XML: {e}"))
        })?;

        let signer = self.config.verifier.verify(&doc)?;

        let namespace = doc.root_element().tag_name().namespace().unwrap_or("");
        let processor = self.config.processors.get(namespace).ok_or_else(|| {
            warn!(%namespace, "no result processor for response namespace");
            ResolutionError::UnknownResponse {
                namespace: namespace.to_string(),
            }
        })?;
        let result = processor.process(&doc)?;

        Ok(match (result, signer) {
            (QueryResult::Metadata(metadata), Some(certificate)) => {
                debug!("attaching signer certificate to the metadata");
                QueryResult::Metadata(metadata.with_signing_certificate(certificate))
            }
            (result, _) => result,
        })
    }
}

/// The well-known query URL:
/// `{publisher}/{participant}/services/{service}`, both identifiers in
/// percent-encoded canonical form.
fn query_url(
    publisher: &Url,
    participant: &Identifier,
    service: &Identifier,
) -> Result<Url, ResolutionError> {
    let joined = format!(
        "{}/{}/services/{}",
        publisher.as_str().trim_end_matches('/'),
        participant.url_encoded(),
        service.url_encoded()
    );
    Url::parse(&joined).map_err(|e| ResolutionError::Connection {
        url: publisher.clone(),
        reason: format!("constructed query URL is invalid: {e}"),
    })
}
