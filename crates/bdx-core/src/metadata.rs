//! # Service metadata
//!
//! The normalized representation of a publisher response. Result processors
//! for the different schema generations all produce these types, so the rest
//! of the engine -- signature handling, redirect following, endpoint
//! selection -- is schema-agnostic.
//!
//! A [`ProcessGroup`] routes either to endpoints or to another publisher via
//! a [`Redirection`], never both. The enum payload makes the conflicting
//! state unrepresentable; processors accumulating parsed XML go through
//! [`ProcessGroupBuilder`], which reports a conflict instead of silently
//! picking a side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::MetadataError;
use crate::identifier::{Identifier, ProcessIdentifier};

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// A certificate published as part of the metadata, with advisory usage and
/// validity information.
///
/// `usage` is an opaque code (for example `"signing"` or `"encryption"`);
/// absence means the certificate applies to any usage. The activation and
/// expiration carried here are publisher statements about when the
/// certificate should be used and may be narrower than the X.509 validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// DER-encoded X.509 certificate.
    pub x509_der: Vec<u8>,
    /// Advisory usage code; `None` means any usage.
    pub usage: Option<String>,
    /// Moment from which the certificate should be used.
    pub activation: Option<DateTime<Utc>>,
    /// Moment after which the certificate should no longer be used.
    pub expiration: Option<DateTime<Utc>>,
    /// Free-text description.
    pub description: Option<String>,
}

impl Certificate {
    /// A certificate with only the X.509 data, no advisory metadata.
    pub fn new(x509_der: Vec<u8>) -> Self {
        Self {
            x509_der,
            usage: None,
            activation: None,
            expiration: None,
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints and processes
// ---------------------------------------------------------------------------

/// A messaging endpoint: where and how messages can be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// The transport profile the endpoint supports.
    pub transport_profile: String,
    /// The URL where the endpoint receives messages.
    pub url: Url,
    /// Moment from which the endpoint can be used.
    pub activation: Option<DateTime<Utc>>,
    /// Moment after which the endpoint should not be used anymore.
    pub expiration: Option<DateTime<Utc>>,
    /// Free-text description.
    pub description: Option<String>,
    /// Technical contact information.
    pub contact_info: Option<String>,
    /// Certificates in use at this endpoint.
    pub certificates: Vec<Certificate>,
}

impl EndpointInfo {
    /// An endpoint with only the required fields.
    pub fn new(transport_profile: impl Into<String>, url: Url) -> Self {
        Self {
            transport_profile: transport_profile.into(),
            url,
            activation: None,
            expiration: None,
            description: None,
            contact_info: None,
            certificates: Vec::new(),
        }
    }
}

/// Process metadata: the process in which endpoints apply, and the roles the
/// participant plays in it. An empty role list means the metadata applies
/// regardless of role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// The process this metadata applies to.
    pub process_id: ProcessIdentifier,
    /// Roles the participant plays in the process; empty means any role.
    pub roles: Vec<Identifier>,
}

impl ProcessInfo {
    pub fn new(process_id: ProcessIdentifier) -> Self {
        Self {
            process_id,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(process_id: ProcessIdentifier, roles: Vec<Identifier>) -> Self {
        Self { process_id, roles }
    }
}

// ---------------------------------------------------------------------------
// Redirection and process groups
// ---------------------------------------------------------------------------

/// A publisher's statement that the requested metadata is served by another
/// publisher. The query must be re-run against `new_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    /// The base URL of the publisher now serving the metadata.
    pub new_url: Url,
    /// The certificate the new publisher is announced to sign with, when the
    /// response stated one. Informational; compare it with the signing
    /// certificate of the follow-up response if the network requires that.
    pub new_certificate: Option<Certificate>,
}

impl Redirection {
    pub fn new(new_url: Url) -> Self {
        Self {
            new_url,
            new_certificate: None,
        }
    }
}

/// Where a process group routes: to a list of endpoints (possibly empty) or
/// to another publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRouting {
    /// Messages are delivered to one of these endpoints.
    Endpoints(Vec<EndpointInfo>),
    /// The metadata for these processes lives at another publisher.
    Redirect(Redirection),
}

/// A group of processes sharing the same endpoints or the same redirection.
///
/// Schema generations without group-level sharing (one process per entry)
/// are represented as groups with a single [`ProcessInfo`]. An empty process
/// list means the group is a catch-all applying to every process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGroup {
    processes: Vec<ProcessInfo>,
    routing: GroupRouting,
}

impl ProcessGroup {
    /// A group routing to the given endpoints.
    pub fn with_endpoints(processes: Vec<ProcessInfo>, endpoints: Vec<EndpointInfo>) -> Self {
        Self {
            processes,
            routing: GroupRouting::Endpoints(endpoints),
        }
    }

    /// A group redirected to another publisher.
    pub fn redirected(processes: Vec<ProcessInfo>, redirection: Redirection) -> Self {
        Self {
            processes,
            routing: GroupRouting::Redirect(redirection),
        }
    }

    /// The processes this group applies to; empty means every process.
    pub fn processes(&self) -> &[ProcessInfo] {
        &self.processes
    }

    /// The endpoints of this group; empty when the group is redirected.
    pub fn endpoints(&self) -> &[EndpointInfo] {
        match &self.routing {
            GroupRouting::Endpoints(endpoints) => endpoints,
            GroupRouting::Redirect(_) => &[],
        }
    }

    /// The redirection, when this group routes to another publisher.
    pub fn redirect(&self) -> Option<&Redirection> {
        match &self.routing {
            GroupRouting::Endpoints(_) => None,
            GroupRouting::Redirect(redirection) => Some(redirection),
        }
    }

    pub fn routing(&self) -> &GroupRouting {
        &self.routing
    }
}

/// Accumulates the parsed pieces of a process group and enforces the
/// endpoints-xor-redirect invariant when finishing.
#[derive(Debug, Default)]
pub struct ProcessGroupBuilder {
    processes: Vec<ProcessInfo>,
    endpoints: Option<Vec<EndpointInfo>>,
    redirect: Option<Redirection>,
}

impl ProcessGroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process this group applies to.
    pub fn process(mut self, process: ProcessInfo) -> Self {
        self.processes.push(process);
        self
    }

    /// Add an endpoint. An endpoint list counts as present even when no
    /// endpoint is ever added through [`Self::endpoints`] with an empty
    /// iterator; a schema's empty endpoint-list element is valid routing.
    pub fn endpoint(mut self, endpoint: EndpointInfo) -> Self {
        self.endpoints.get_or_insert_with(Vec::new).push(endpoint);
        self
    }

    /// Declare the endpoint list, possibly empty.
    pub fn endpoints(mut self, endpoints: impl IntoIterator<Item = EndpointInfo>) -> Self {
        self.endpoints
            .get_or_insert_with(Vec::new)
            .extend(endpoints);
        self
    }

    /// Declare the group redirected.
    pub fn redirect(mut self, redirection: Redirection) -> Self {
        self.redirect = Some(redirection);
        self
    }

    /// Finalize the group.
    ///
    /// # Errors
    ///
    /// [`MetadataError::ConflictingRouting`] when both endpoints and a
    /// redirection were provided, [`MetadataError::MissingRouting`] when
    /// neither was.
    pub fn finish(self) -> Result<ProcessGroup, MetadataError> {
        match (self.endpoints, self.redirect) {
            (Some(_), Some(_)) => Err(MetadataError::ConflictingRouting),
            (Some(endpoints), None) => Ok(ProcessGroup::with_endpoints(self.processes, endpoints)),
            (None, Some(redirection)) => Ok(ProcessGroup::redirected(self.processes, redirection)),
            (None, None) => Err(MetadataError::MissingRouting),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceMetadata and query results
// ---------------------------------------------------------------------------

/// The complete normalized metadata a publisher returned for one participant
/// and service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// The participant the metadata applies to.
    pub participant_id: Identifier,
    /// The service (document type) the metadata applies to.
    pub service_id: Identifier,
    /// The process groups carrying endpoints or redirections.
    pub process_groups: Vec<ProcessGroup>,
    /// The certificate that signed the response, when it was signed and the
    /// signature verified.
    pub signing_certificate: Option<Certificate>,
}

impl ServiceMetadata {
    pub fn new(
        participant_id: Identifier,
        service_id: Identifier,
        process_groups: Vec<ProcessGroup>,
    ) -> Self {
        Self {
            participant_id,
            service_id,
            process_groups,
            signing_certificate: None,
        }
    }

    /// The same metadata with the signing certificate attached.
    pub fn with_signing_certificate(mut self, certificate: Certificate) -> Self {
        self.signing_certificate = Some(certificate);
        self
    }
}

/// What a publisher response normalizes to: the metadata itself, or a
/// response-level redirection to another publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
    /// The publisher returned service metadata.
    Metadata(ServiceMetadata),
    /// The publisher redirected the whole query to another publisher.
    Redirect(Redirection),
}
