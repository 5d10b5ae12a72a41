//! # Resolution error taxonomy
//!
//! Every failure mode of a resolution call, surfaced to the caller as one
//! enum. Nothing here is fatal to the engine itself: a failed call leaves
//! the shared configuration untouched and the caller may simply retry after
//! fixing the underlying cause.

use bdx_dsig::DsigError;
use bdx_locator::LocatorError;
use thiserror::Error;
use url::Url;

use crate::executor::ExecutorError;

/// Errors surfaced by a resolution call.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The publisher for the participant could not be located.
    #[error("could not locate the publisher: {0}")]
    Locator(#[from] LocatorError),

    /// Transport or I/O failure reaching the publisher.
    #[error("error connecting to the publisher at {url}: {reason}")]
    Connection { url: Url, reason: String },

    /// The publisher URL uses a protocol the executor does not speak.
    #[error("unsupported protocol \"{scheme}\" in publisher URL {url}")]
    UnsupportedProtocol { scheme: String, url: Url },

    /// A registered processor could not normalize the response.
    #[error("the publisher response could not be parsed: {0}")]
    UnparsableResponse(String),

    /// No processor is registered for the response's namespace.
    #[error("no result processor registered for response namespace \"{namespace}\"")]
    UnknownResponse { namespace: String },

    /// The response carries a signature that does not validate.
    #[error("invalid signature on the publisher response: {0}")]
    InvalidSignature(String),

    /// The response signature validates but the signer is not trusted.
    #[error("publisher certificate is not trusted: {0}")]
    UntrustedCertificate(String),

    /// The redirect bound was exceeded.
    #[error("publisher redirected more than {max} times")]
    TooManyRedirections { max: u32 },

    /// A redirect response's target URL is missing or malformed.
    #[error("invalid redirection in publisher response: {0}")]
    InvalidRedirection(String),

    /// The process/role constraints did not narrow to exactly one group.
    #[error("service metadata is ambiguous: {0}")]
    AmbiguousMetadata(String),
}

impl From<DsigError> for ResolutionError {
    fn from(err: DsigError) -> Self {
        match err {
            DsigError::InvalidSignature(reason) => ResolutionError::InvalidSignature(reason),
            DsigError::UntrustedCertificate(subject) => {
                ResolutionError::UntrustedCertificate(subject)
            }
        }
    }
}

impl From<ExecutorError> for ResolutionError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Connection { url, reason } => ResolutionError::Connection { url, reason },
            ExecutorError::UnsupportedProtocol { scheme, url } => {
                ResolutionError::UnsupportedProtocol { scheme, url }
            }
        }
    }
}

impl From<ProcessingError> for ResolutionError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Unparsable(reason) => ResolutionError::UnparsableResponse(reason),
            ProcessingError::InvalidRedirection(reason) => {
                ResolutionError::InvalidRedirection(reason)
            }
        }
    }
}

/// Errors raised by a result processor normalizing a response.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The XML does not follow the processor's schema.
    #[error("unparsable response: {0}")]
    Unparsable(String),

    /// A redirection element is present but unusable.
    #[error("invalid redirection: {0}")]
    InvalidRedirection(String),
}

/// Errors detected while building a client, before any query is made.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Every client needs a participant locator.
    #[error("no participant locator configured")]
    MissingLocator,

    /// The processor registry must not be empty.
    #[error("no result processors registered")]
    NoProcessors,

    /// The default HTTP executor could not be initialized.
    #[error("failed to initialize the HTTP executor: {0}")]
    HttpClient(String),
}
