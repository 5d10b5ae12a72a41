//! # Result processing and schema dispatch
//!
//! Publishers across the network speak different generations of the
//! metadata schema, distinguishable by the root element's namespace URI.
//! A [`ResultProcessor`] normalizes one schema's XML into the common data
//! model; the [`ProcessorRegistry`] holds one processor per namespace so a
//! publisher speaking any supported generation is handled transparently.

use std::collections::HashMap;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bdx_core::{IdScheme, Identifier, ProcessIdentifier, QueryResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use roxmltree::{Document, Node};

use crate::error::ProcessingError;
use crate::oasis2::OasisV2Processor;
use crate::peppol::PeppolProcessor;

/// Normalizes one schema generation into the common data model.
///
/// Implementations must be safe for concurrent use; one processor instance
/// is shared by every resolution call.
pub trait ResultProcessor: Send + Sync {
    /// Normalize a parsed response document.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::Unparsable`] when the document does not follow
    /// the processor's schema, [`ProcessingError::InvalidRedirection`] when
    /// a redirection element is present but unusable.
    fn process(&self, doc: &Document<'_>) -> Result<QueryResult, ProcessingError>;
}

/// Maps response namespaces to their processors.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn ResultProcessor>>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every processor this crate ships: the PEPPOL format
    /// and the OASIS v2 format.
    pub fn with_default_processors() -> Self {
        let mut registry = Self::new();
        registry.register(crate::peppol::NAMESPACE_URI, Arc::new(PeppolProcessor));
        registry.register(crate::oasis2::NAMESPACE_URI, Arc::new(OasisV2Processor));
        registry
    }

    /// Register `processor` for `namespace`, replacing any previous
    /// registration for that namespace.
    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        processor: Arc<dyn ResultProcessor>,
    ) {
        self.processors.insert(namespace.into(), processor);
    }

    /// The processor registered for `namespace`.
    pub fn get(&self, namespace: &str) -> Option<&Arc<dyn ResultProcessor>> {
        self.processors.get(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("namespaces", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared parsing helpers
// ---------------------------------------------------------------------------
//
// Processors are selected by the root namespace; inside their subtree,
// elements are matched by local name so the vocabulary-splitting namespaces
// of the newer schema generation need no special casing.

pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == local)
}

pub(crate) fn children<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == local)
        .collect()
}

pub(crate) fn required_child<'a, 'input>(
    node: Node<'a, 'input>,
    local: &str,
) -> Result<Node<'a, 'input>, ProcessingError> {
    child(node, local).ok_or_else(|| {
        ProcessingError::Unparsable(format!(
            "missing <{local}> in <{}>",
            node.tag_name().name()
        ))
    })
}

pub(crate) fn text(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

pub(crate) fn required_text(node: Node<'_, '_>, local: &str) -> Result<String, ProcessingError> {
    let value = text(required_child(node, local)?);
    if value.is_empty() {
        return Err(ProcessingError::Unparsable(format!(
            "<{local}> in <{}> is empty",
            node.tag_name().name()
        )));
    }
    Ok(value)
}

/// Build an [`Identifier`] from an element's text and its scheme attribute.
pub(crate) fn identifier_from(
    node: Node<'_, '_>,
    scheme_attr: &str,
) -> Result<Identifier, ProcessingError> {
    let value = text(node);
    let build = match node.attribute(scheme_attr) {
        Some(scheme_id) => IdScheme::new(scheme_id)
            .and_then(|scheme| Identifier::with_scheme(scheme, value)),
        None => Identifier::new(value),
    };
    build.map_err(|e| {
        ProcessingError::Unparsable(format!(
            "invalid identifier in <{}>: {e}",
            node.tag_name().name()
        ))
    })
}

/// Build a [`ProcessIdentifier`], mapping the schema's reserved no-process
/// value to the sentinel.
pub(crate) fn process_identifier_from(
    node: Node<'_, '_>,
    scheme_attr: &str,
    no_process_value: &str,
) -> Result<ProcessIdentifier, ProcessingError> {
    if text(node).eq_ignore_ascii_case(no_process_value) {
        return Ok(ProcessIdentifier::NoProcess);
    }
    identifier_from(node, scheme_attr).map(ProcessIdentifier::from)
}

/// Parse the timestamp formats seen in publisher responses: RFC 3339, a
/// zone-less datetime (taken as UTC), or a bare date.
pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ProcessingError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(ProcessingError::Unparsable(format!(
        "invalid timestamp \"{value}\""
    )))
}

pub(crate) fn decode_base64(value: &str) -> Result<Vec<u8>, ProcessingError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD
        .decode(compact)
        .map_err(|e| ProcessingError::Unparsable(format!("invalid base64 content: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_both_schema_generations() {
        let registry = ProcessorRegistry::with_default_processors();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(crate::peppol::NAMESPACE_URI).is_some());
        assert!(registry.get(crate::oasis2::NAMESPACE_URI).is_some());
        assert!(registry.get("urn:unknown").is_none());
    }

    #[test]
    fn registration_replaces_by_namespace() {
        let mut registry = ProcessorRegistry::new();
        registry.register("urn:a", Arc::new(PeppolProcessor));
        registry.register("urn:a", Arc::new(OasisV2Processor));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn parse_datetime_accepts_the_wire_formats() {
        assert!(parse_datetime("2026-03-01T12:00:00Z").is_ok());
        assert!(parse_datetime("2026-03-01T12:00:00+01:00").is_ok());
        assert!(parse_datetime("2026-03-01T12:00:00.500").is_ok());
        assert!(parse_datetime("2026-03-01").is_ok());
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn process_identifier_maps_reserved_value_to_sentinel() {
        let doc =
            roxmltree::Document::parse("<ProcessIdentifier>busdox:noprocess</ProcessIdentifier>")
                .unwrap();
        let pid =
            process_identifier_from(doc.root_element(), "scheme", "busdox:noprocess").unwrap();
        assert!(pid.is_no_process());
    }

    #[test]
    fn identifier_from_reads_scheme_attribute() {
        let doc = roxmltree::Document::parse(r#"<Id scheme="iso6523">9915:Test</Id>"#).unwrap();
        let id = identifier_from(doc.root_element(), "scheme").unwrap();
        assert_eq!(id.to_string(), "iso6523::9915:test");
    }
}
