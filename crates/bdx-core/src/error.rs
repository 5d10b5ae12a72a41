//! # Error types for the data model
//!
//! Construction-time errors only: identifier format violations and
//! process-group routing conflicts. Everything downstream (locator, query,
//! parsing, signature) defines its own error enum in its own crate.

use thiserror::Error;

/// Validation errors raised when constructing identifiers and schemes.
///
/// The offending input is carried in the message so that a misconfigured
/// participant or service identifier can be diagnosed without guesswork.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// An identifier value must be non-empty.
    #[error("identifier value must not be empty")]
    EmptyIdentifierValue,

    /// An identifier scheme id must be non-empty.
    #[error("identifier scheme id must not be empty")]
    EmptySchemeId,
}

/// Errors raised when finalizing a process group.
///
/// A process group routes messages either to a list of endpoints or to
/// another publisher via a redirection; a group claiming both (or neither)
/// cannot be interpreted.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The group was given both endpoints and a redirection.
    #[error("process group cannot have both endpoints and a redirection")]
    ConflictingRouting,

    /// The group was given neither endpoints nor a redirection.
    #[error("process group must have either endpoints or a redirection")]
    MissingRouting,
}
