//! # OASIS SMP 2.0 result processor
//!
//! Handles the newer publisher schema: process groups with several processes
//! and role identifiers, certificate sets with usage and validity metadata,
//! and redirection expressed per process group.
//!
//! The schema splits its vocabulary over a handful of namespace URIs
//! (service-metadata root, aggregate and basic components); the processor is
//! selected by the root namespace and matches the subtree by local name.

use bdx_core::{
    Certificate, EndpointInfo, ProcessGroupBuilder, ProcessInfo, QueryResult, Redirection,
    ServiceMetadata,
};
use roxmltree::{Document, Node};
use tracing::debug;
use url::Url;

use crate::error::ProcessingError;
use crate::processor::{
    child, children, decode_base64, identifier_from, parse_datetime, process_identifier_from,
    required_child, required_text, text, ResultProcessor,
};

/// Namespace URI of the OASIS SMP 2.0 `ServiceMetadata` document.
pub const NAMESPACE_URI: &str = "http://docs.oasis-open.org/bdxr/ns/SMP/2/ServiceMetadata";

/// The reserved identifier value marking metadata not bound to a process.
pub const NO_PROCESS_VALUE: &str = "bdx:noprocess";

/// Processor for the OASIS SMP 2.0 response format.
#[derive(Debug, Default, Clone, Copy)]
pub struct OasisV2Processor;

impl ResultProcessor for OasisV2Processor {
    fn process(&self, doc: &Document<'_>) -> Result<QueryResult, ProcessingError> {
        let root = doc.root_element();
        if root.tag_name().name() != "ServiceMetadata" {
            return Err(ProcessingError::Unparsable(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let service_id = identifier_from(required_child(root, "ID")?, "schemeID")?;
        let participant_id = identifier_from(required_child(root, "ParticipantID")?, "schemeID")?;

        let mut groups = Vec::new();
        for group in children(root, "ProcessMetadata") {
            let mut builder = ProcessGroupBuilder::new();
            for process in children(group, "Process") {
                let process_id = process_identifier_from(
                    required_child(process, "ID")?,
                    "schemeID",
                    NO_PROCESS_VALUE,
                )?;
                let roles = children(process, "RoleID")
                    .into_iter()
                    .map(|role| identifier_from(role, "schemeID"))
                    .collect::<Result<Vec<_>, _>>()?;
                builder = builder.process(ProcessInfo::with_roles(process_id, roles));
            }
            // Endpoints and redirection are mutually exclusive; a response
            // carrying both is rejected when the group is finalized.
            let endpoints = children(group, "Endpoint");
            if !endpoints.is_empty() {
                builder = builder.endpoints(std::iter::empty());
                for endpoint in endpoints {
                    builder = builder.endpoint(parse_endpoint(endpoint)?);
                }
            }
            if let Some(redirect) = child(group, "Redirect") {
                builder = builder.redirect(parse_redirect(redirect)?);
            }
            groups.push(
                builder
                    .finish()
                    .map_err(|e| ProcessingError::Unparsable(e.to_string()))?,
            );
        }
        debug!(groups = groups.len(), "normalized OASIS v2 service metadata");

        Ok(QueryResult::Metadata(ServiceMetadata::new(
            participant_id,
            service_id,
            groups,
        )))
    }
}

fn parse_redirect(redirect: Node<'_, '_>) -> Result<Redirection, ProcessingError> {
    let target = required_text(redirect, "PublisherURI")
        .map_err(|_| ProcessingError::InvalidRedirection("Redirect has no PublisherURI".into()))?;
    let url = Url::parse(&target).map_err(|e| {
        ProcessingError::InvalidRedirection(format!("invalid redirect target \"{target}\": {e}"))
    })?;
    let mut redirection = Redirection::new(url);
    if let Some(certificate) = child(redirect, "Certificate") {
        redirection.new_certificate = Some(parse_certificate(certificate)?);
    }
    Ok(redirection)
}

fn parse_endpoint(endpoint: Node<'_, '_>) -> Result<EndpointInfo, ProcessingError> {
    let transport_profile = required_text(endpoint, "TransportProfileID")?;
    let address = required_text(endpoint, "AddressURI")?;
    let url = Url::parse(&address).map_err(|e| {
        ProcessingError::Unparsable(format!("invalid endpoint address \"{address}\": {e}"))
    })?;

    let mut info = EndpointInfo::new(transport_profile, url);
    if let Some(node) = child(endpoint, "ActivationDate") {
        info.activation = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(endpoint, "ExpirationDate") {
        info.expiration = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(endpoint, "Description") {
        info.description = Some(text(node));
    }
    if let Some(node) = child(endpoint, "Contact") {
        info.contact_info = Some(text(node));
    }
    for certificate in children(endpoint, "Certificate") {
        info.certificates.push(parse_certificate(certificate)?);
    }
    Ok(info)
}

fn parse_certificate(certificate: Node<'_, '_>) -> Result<Certificate, ProcessingError> {
    let content = required_text(certificate, "ContentBinaryObject")?;
    let mut parsed = Certificate::new(decode_base64(&content)?);
    if let Some(node) = child(certificate, "TypeCode") {
        parsed.usage = Some(text(node));
    }
    if let Some(node) = child(certificate, "ActivationDate") {
        parsed.activation = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(certificate, "ExpirationDate") {
        parsed.expiration = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(certificate, "Description") {
        parsed.description = Some(text(node));
    }
    Ok(parsed)
}
