//! # bdx-core -- Data model for service-metadata resolution
//!
//! The common, schema-version-independent representation of everything a
//! metadata publisher can say about a participant: which services it
//! accepts, in which business processes and roles, at which messaging
//! endpoints, under which certificates, and where to look instead when the
//! metadata has moved.
//!
//! All types here are immutable value objects. They are constructed once --
//! by a result processor normalizing a publisher response, or by test and
//! configuration code -- and never mutated afterwards. Invariants are
//! enforced at construction time, not checked at use time.

pub mod error;
pub mod identifier;
pub mod metadata;

pub use error::{MetadataError, ValidationError};
pub use identifier::{IdScheme, Identifier, ProcessIdentifier};
pub use metadata::{
    Certificate, EndpointInfo, GroupRouting, ProcessGroup, ProcessGroupBuilder, ProcessInfo,
    QueryResult, Redirection, ServiceMetadata,
};
