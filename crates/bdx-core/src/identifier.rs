//! # Identifiers and identifier schemes
//!
//! Participants, services, processes and roles are all addressed by an
//! [`Identifier`]: an optional [`IdScheme`] plus a value. The scheme governs
//! the comparison semantics of values belonging to it; when no scheme is
//! given (or the scheme does not say otherwise) values compare
//! case-insensitively, which is the default policy across the network.
//!
//! The canonical string form is `{schemeId}::{value}`, with the value folded
//! to lower case for case-insensitive schemes. The same form, percent-encoded
//! as a single path segment, is what goes into publisher query URLs.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Percent-encode everything that is not unreserved, so the canonical form
/// survives as a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// ---------------------------------------------------------------------------
// IdScheme
// ---------------------------------------------------------------------------

/// An identifier scheme: a namespace of identifier values together with the
/// comparison policy that applies to them.
///
/// Schemes themselves are compared by scheme id only, always case-sensitively;
/// the `case_sensitive` flag applies to the *values* of identifiers in the
/// scheme, not to the scheme id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdScheme {
    scheme_id: String,
    case_sensitive: bool,
}

impl IdScheme {
    /// Create a scheme with the default, case-insensitive value policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySchemeId`] for an empty scheme id.
    pub fn new(scheme_id: impl Into<String>) -> Result<Self, ValidationError> {
        let scheme_id = scheme_id.into();
        if scheme_id.is_empty() {
            return Err(ValidationError::EmptySchemeId);
        }
        Ok(Self {
            scheme_id,
            case_sensitive: false,
        })
    }

    /// Create a scheme whose values compare case-sensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySchemeId`] for an empty scheme id.
    pub fn case_sensitive(scheme_id: impl Into<String>) -> Result<Self, ValidationError> {
        let mut scheme = Self::new(scheme_id)?;
        scheme.case_sensitive = true;
        Ok(scheme)
    }

    /// The scheme id.
    pub fn scheme_id(&self) -> &str {
        &self.scheme_id
    }

    /// Whether values in this scheme compare case-sensitively.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

impl PartialEq for IdScheme {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl Eq for IdScheme {}

impl Hash for IdScheme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme_id.hash(state);
    }
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme_id)
    }
}

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// An identifier of a participant, service, process or role.
///
/// Equality is scheme-policy dependent: schemes are compared by scheme id,
/// and values case-sensitively only when both sides' schemes require it.
/// An identifier without a scheme follows the default case-insensitive
/// policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    scheme: Option<IdScheme>,
    value: String,
}

impl Identifier {
    /// Create a scheme-less identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifierValue`] for an empty value.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyIdentifierValue);
        }
        Ok(Self {
            scheme: None,
            value,
        })
    }

    /// Create an identifier belonging to the given scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifierValue`] for an empty value.
    pub fn with_scheme(scheme: IdScheme, value: impl Into<String>) -> Result<Self, ValidationError> {
        let mut id = Self::new(value)?;
        id.scheme = Some(scheme);
        Ok(id)
    }

    /// The scheme this identifier belongs to, if any.
    pub fn scheme(&self) -> Option<&IdScheme> {
        self.scheme.as_ref()
    }

    /// The value exactly as it was constructed.
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    /// The value in canonical form: folded to lower case unless the scheme
    /// requires case-sensitive comparison.
    pub fn value(&self) -> Cow<'_, str> {
        if self.is_case_sensitive() {
            Cow::Borrowed(&self.value)
        } else {
            Cow::Owned(self.value.to_lowercase())
        }
    }

    /// The canonical string form, percent-encoded for use as a single URL
    /// path segment in a publisher query.
    pub fn url_encoded(&self) -> String {
        utf8_percent_encode(&self.to_string(), PATH_SEGMENT).to_string()
    }

    fn is_case_sensitive(&self) -> bool {
        self.scheme.as_ref().is_some_and(IdScheme::is_case_sensitive)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        // Values compare case-sensitively only when both sides require it;
        // identifiers of the same scheme normally agree on the policy.
        if self.is_case_sensitive() && other.is_case_sensitive() {
            self.value == other.value
        } else {
            self.value.to_lowercase() == other.value.to_lowercase()
        }
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        // Case-insensitive equality must hash equal values to the same
        // bucket, so the folded value is hashed for every policy.
        self.value.to_lowercase().hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheme {
            Some(scheme) => write!(f, "{}::{}", scheme.scheme_id(), self.value()),
            None => write!(f, "{}", self.value()),
        }
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    /// Parse the canonical `{schemeId}::{value}` form; input without a
    /// `::` separator is taken as a scheme-less value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("::") {
            Some((scheme_id, value)) if !scheme_id.is_empty() => {
                Self::with_scheme(IdScheme::new(scheme_id)?, value)
            }
            Some((_, value)) => Self::new(value),
            None => Self::new(s),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessIdentifier
// ---------------------------------------------------------------------------

/// A process identifier, or the reserved marker for metadata that is not
/// bound to any specific process.
///
/// The marker is a distinct variant rather than a flagged identifier, so
/// equality is symmetric by construction: two `NoProcess` values are always
/// equal, and a `NoProcess` never equals an explicit identifier regardless
/// of the latter's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessIdentifier {
    /// An explicit process identifier.
    Identifier(Identifier),
    /// The reserved "applies to no specific process" marker.
    NoProcess,
}

impl ProcessIdentifier {
    /// Whether this is the no-process marker.
    pub fn is_no_process(&self) -> bool {
        matches!(self, ProcessIdentifier::NoProcess)
    }
}

impl From<Identifier> for ProcessIdentifier {
    fn from(id: Identifier) -> Self {
        ProcessIdentifier::Identifier(id)
    }
}

impl fmt::Display for ProcessIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessIdentifier::Identifier(id) => write!(f, "{id}"),
            ProcessIdentifier::NoProcess => write!(f, "{{{{no-process}}}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(scheme: &str, value: &str) -> Identifier {
        Identifier::with_scheme(IdScheme::new(scheme).unwrap(), value).unwrap()
    }

    // -- IdScheme --

    #[test]
    fn scheme_equality_ignores_policy_flag() {
        let a = IdScheme::new("iso6523").unwrap();
        let b = IdScheme::case_sensitive("iso6523").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scheme_id_comparison_is_case_sensitive() {
        assert_ne!(IdScheme::new("abc").unwrap(), IdScheme::new("ABC").unwrap());
    }

    #[test]
    fn scheme_rejects_empty_id() {
        assert!(IdScheme::new("").is_err());
    }

    // -- Identifier --

    #[test]
    fn case_insensitive_scheme_folds_value() {
        assert_eq!(id("s", "ABC"), id("s", "abc"));
    }

    #[test]
    fn case_sensitive_scheme_keeps_distinct_values() {
        let scheme = IdScheme::case_sensitive("s").unwrap();
        let a = Identifier::with_scheme(scheme.clone(), "ABC").unwrap();
        let b = Identifier::with_scheme(scheme, "abc").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_schemes_never_equal() {
        assert_ne!(id("s1", "abc"), id("s2", "abc"));
    }

    #[test]
    fn scheme_less_identifier_defaults_to_case_insensitive() {
        let a = Identifier::new("Value").unwrap();
        let b = Identifier::new("value").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_value() {
        assert!(Identifier::new("").is_err());
        assert!(Identifier::with_scheme(IdScheme::new("s").unwrap(), "").is_err());
    }

    #[test]
    fn canonical_form_folds_case_insensitive_value() {
        assert_eq!(id("iso6523", "9915:TEST").to_string(), "iso6523::9915:test");
    }

    #[test]
    fn canonical_form_preserves_case_sensitive_value() {
        let scheme = IdScheme::case_sensitive("s").unwrap();
        let i = Identifier::with_scheme(scheme, "MiXeD").unwrap();
        assert_eq!(i.to_string(), "s::MiXeD");
    }

    #[test]
    fn url_encoding_escapes_separators() {
        assert_eq!(
            id("iso6523-actorid-upis", "9915:Test").url_encoded(),
            "iso6523-actorid-upis%3A%3A9915%3Atest"
        );
    }

    #[test]
    fn parse_canonical_form() {
        let parsed: Identifier = "iso6523::9915:test".parse().unwrap();
        assert_eq!(parsed, id("iso6523", "9915:test"));
        assert_eq!(parsed.scheme().unwrap().scheme_id(), "iso6523");
    }

    #[test]
    fn parse_without_separator_is_scheme_less() {
        let parsed: Identifier = "just-a-value".parse().unwrap();
        assert!(parsed.scheme().is_none());
        assert_eq!(parsed.raw_value(), "just-a-value");
    }

    #[test]
    fn hash_agrees_with_case_insensitive_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(id("s", "ABC"));
        assert!(set.contains(&id("s", "abc")));
    }

    // -- ProcessIdentifier --

    #[test]
    fn no_process_markers_are_equal() {
        assert_eq!(ProcessIdentifier::NoProcess, ProcessIdentifier::NoProcess);
    }

    #[test]
    fn no_process_never_equals_explicit_identifier() {
        let explicit = ProcessIdentifier::from(id("proc", "ordering"));
        assert_ne!(explicit, ProcessIdentifier::NoProcess);
        assert_ne!(ProcessIdentifier::NoProcess, explicit);
    }

    #[test]
    fn explicit_identifiers_follow_identifier_equality() {
        let a = ProcessIdentifier::from(id("proc", "Ordering"));
        let b = ProcessIdentifier::from(id("proc", "ordering"));
        assert_eq!(a, b);
    }
}
