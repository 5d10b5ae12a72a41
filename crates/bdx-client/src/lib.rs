//! # bdx-client -- Querying metadata publishers
//!
//! The query engine of the resolution stack: given a participant and a
//! service, it locates the authoritative publisher (via `bdx-locator`),
//! fetches and verifies the response (via `bdx-dsig`), normalizes whichever
//! schema generation the publisher speaks, and selects the endpoints
//! matching the caller's process, role and transport-profile constraints.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bdx_client::{MetadataQuery, SmpClient};
//! use bdx_locator::StaticLocator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SmpClient::builder()
//!     .locator(Arc::new(StaticLocator::try_from("https://smp.example.org")?))
//!     .build()?;
//!
//! let query = MetadataQuery::new(
//!     "iso6523::9915:test".parse()?,
//!     "busdox-docid-qns::urn:invoice".parse()?,
//! )
//! .transport_profile("busdox-transport-as4");
//!
//! for endpoint in client.resolve(&query).await? {
//!     println!("{} -> {}", endpoint.transport_profile, endpoint.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod oasis2;
pub mod peppol;
pub mod processor;
pub mod selector;

pub use client::{MetadataQuery, SmpClient};
pub use config::{SmpClientBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
pub use error::{ConfigurationError, ProcessingError, ResolutionError};
pub use executor::{DefaultRequestExecutor, ExecutorError, RequestExecutor};
pub use oasis2::OasisV2Processor;
pub use peppol::PeppolProcessor;
pub use processor::{ProcessorRegistry, ResultProcessor};
pub use selector::{select, AmbiguousSelection, Selection};

// The data model and the collaborator traits callers typically need.
pub use bdx_core::{
    Certificate, EndpointInfo, IdScheme, Identifier, ProcessGroup, ProcessIdentifier, ProcessInfo,
    QueryResult, Redirection, ServiceMetadata,
};
pub use bdx_dsig::{CertificateFinder, TrustValidator};
pub use bdx_locator::{BdxlLocator, HostnameGenerator, LocatorError, ParticipantLocator, StaticLocator};
