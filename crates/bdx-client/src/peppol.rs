//! # PEPPOL-format result processor
//!
//! Handles the original publisher schema: one process per entry, exactly one
//! certificate per endpoint, no role concept, and redirection expressed at
//! the service level rather than per process group.
//!
//! Normalization decisions for this schema:
//! - each `Process` becomes its own [`ProcessGroup`] with a single
//!   [`ProcessInfo`] and an empty role set (the schema has no roles);
//! - a `Redirect` is returned as a response-level [`QueryResult::Redirect`];
//! - the endpoint certificate becomes a one-element certificate list without
//!   usage metadata (the schema cannot express any).

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

/// Namespace URI of the PEPPOL publisher response documents.
pub const NAMESPACE_URI: &str = "http://busdox.org/serviceMetadata/publishing/1.0/";

/// The reserved identifier value marking metadata not bound to a process.
pub const NO_PROCESS_VALUE: &str = "busdox:noprocess";

/// Processor for the PEPPOL response format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeppolProcessor;

impl ResultProcessor for PeppolProcessor {
    fn process(&self, doc: &Document<'_>) -> Result<QueryResult, ProcessingError> {
        let root = doc.root_element();
        let metadata = match root.tag_name().name() {
            // A signed response wraps the metadata; the signature itself has
            // already been handled before dispatch.
            "SignedServiceMetadata" => required_child(root, "ServiceMetadata")?,
            "ServiceMetadata" => root,
            other => {
                return Err(ProcessingError::Unparsable(format!(
                    "unexpected root element <{other}>"
                )))
            }
        };

        if let Some(redirect) = child(metadata, "Redirect") {
            debug!("response is a service-level redirect");
            return Ok(QueryResult::Redirect(parse_redirect(redirect)?));
        }

        let service_info = required_child(metadata, "ServiceInformation")?;
        let participant_id =
            identifier_from(required_child(service_info, "ParticipantIdentifier")?, "scheme")?;
        let service_id =
            identifier_from(required_child(service_info, "DocumentIdentifier")?, "scheme")?;

        let process_list = required_child(service_info, "ProcessList")?;
        let mut groups = Vec::new();
        for process in children(process_list, "Process") {
            let process_id = process_identifier_from(
                required_child(process, "ProcessIdentifier")?,
                "scheme",
                NO_PROCESS_VALUE,
            )?;
            let endpoint_list = required_child(process, "ServiceEndpointList")?;
            let mut builder = ProcessGroupBuilder::new()
                .process(ProcessInfo::new(process_id))
                .endpoints(std::iter::empty());
            for endpoint in children(endpoint_list, "Endpoint") {
                builder = builder.endpoint(parse_endpoint(endpoint)?);
            }
            groups.push(
                builder
                    .finish()
                    .map_err(|e| ProcessingError::Unparsable(e.to_string()))?,
            );
        }
        debug!(groups = groups.len(), "normalized PEPPOL service metadata");

        Ok(QueryResult::Metadata(ServiceMetadata::new(
            participant_id,
            service_id,
            groups,
        )))
    }
}

fn parse_redirect(redirect: Node<'_, '_>) -> Result<Redirection, ProcessingError> {
    let href = redirect.attribute("href").ok_or_else(|| {
        ProcessingError::InvalidRedirection("Redirect element has no href attribute".into())
    })?;
    let url = Url::parse(href).map_err(|e| {
        ProcessingError::InvalidRedirection(format!("invalid redirect target \"{href}\": {e}"))
    })?;
    // The schema names the expected signer only by certificate UID, which is
    // not enough to construct certificate data.
    Ok(Redirection::new(url))
}

fn parse_endpoint(endpoint: Node<'_, '_>) -> Result<EndpointInfo, ProcessingError> {
    let transport_profile = endpoint.attribute("transportProfile").ok_or_else(|| {
        ProcessingError::Unparsable("Endpoint has no transportProfile attribute".into())
    })?;
    let reference = required_child(endpoint, "EndpointReference")?;
    let address = required_text(reference, "Address")?;
    let url = Url::parse(&address).map_err(|e| {
        ProcessingError::Unparsable(format!("invalid endpoint address \"{address}\": {e}"))
    })?;

    let mut info = EndpointInfo::new(transport_profile, url);
    if let Some(node) = child(endpoint, "ServiceActivationDate") {
        info.activation = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(endpoint, "ServiceExpirationDate") {
        info.expiration = Some(parse_datetime(&text(node))?);
    }
    if let Some(node) = child(endpoint, "Certificate") {
        info.certificates.push(Certificate::new(decode_base64(&text(node))?));
    }
    if let Some(node) = child(endpoint, "ServiceDescription") {
        info.description = Some(text(node));
    }
    if let Some(node) = child(endpoint, "TechnicalContactUrl") {
        info.contact_info = Some(text(node));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdx_core::ProcessIdentifier;

    const NS: &str = super::NAMESPACE_URI;

    fn process(xml: &str) -> Result<QueryResult, ProcessingError> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        PeppolProcessor.process(&doc)
    }

    fn sample_metadata() -> String {
        format!(
            r#"<ServiceMetadata xmlns="{NS}">
  <ServiceInformation>
    <ParticipantIdentifier scheme="iso6523-actorid-upis">9915:test</ParticipantIdentifier>
    <DocumentIdentifier scheme="busdox-docid-qns">urn:invoice</DocumentIdentifier>
    <ProcessList>
      <Process>
        <ProcessIdentifier scheme="cenbii-procid-ubl">urn:ordering</ProcessIdentifier>
        <ServiceEndpointList>
          <Endpoint transportProfile="busdox-transport-as4">
            <EndpointReference><Address>https://ap.example.org/as4</Address></EndpointReference>
            <ServiceActivationDate>2026-01-01T00:00:00Z</ServiceActivationDate>
            <ServiceExpirationDate>2027-01-01T00:00:00Z</ServiceExpirationDate>
            <Certificate>AQID</Certificate>
            <ServiceDescription>Test access point</ServiceDescription>
            <TechnicalContactUrl>mailto:ops@example.org</TechnicalContactUrl>
          </Endpoint>
        </ServiceEndpointList>
      </Process>
      <Process>
        <ProcessIdentifier scheme="cenbii-procid-ubl">busdox:noprocess</ProcessIdentifier>
        <ServiceEndpointList/>
      </Process>
    </ProcessList>
  </ServiceInformation>
</ServiceMetadata>"#
        )
    }

    #[test]
    fn normalizes_service_information() {
        let result = process(&sample_metadata()).unwrap();
        let QueryResult::Metadata(metadata) = result else {
            panic!("expected metadata");
        };
        assert_eq!(metadata.participant_id.to_string(), "iso6523-actorid-upis::9915:test");
        assert_eq!(metadata.service_id.to_string(), "busdox-docid-qns::urn:invoice");
        assert_eq!(metadata.process_groups.len(), 2);

        let first = &metadata.process_groups[0];
        assert_eq!(first.processes().len(), 1);
        // No role concept in this schema: the neutral default is empty.
        assert!(first.processes()[0].roles.is_empty());
        let endpoint = &first.endpoints()[0];
        assert_eq!(endpoint.transport_profile, "busdox-transport-as4");
        assert_eq!(endpoint.url.as_str(), "https://ap.example.org/as4");
        assert_eq!(endpoint.certificates.len(), 1);
        assert_eq!(endpoint.certificates[0].x509_der, vec![1, 2, 3]);
        assert!(endpoint.certificates[0].usage.is_none());
        assert!(endpoint.activation.is_some());
        assert_eq!(endpoint.description.as_deref(), Some("Test access point"));
    }

    #[test]
    fn reserved_process_value_becomes_the_sentinel() {
        let QueryResult::Metadata(metadata) = process(&sample_metadata()).unwrap() else {
            panic!("expected metadata");
        };
        let second = &metadata.process_groups[1];
        assert_eq!(second.processes()[0].process_id, ProcessIdentifier::NoProcess);
        assert!(second.endpoints().is_empty());
        assert!(second.redirect().is_none());
    }

    #[test]
    fn signed_wrapper_is_unwrapped() {
        let xml = format!(
            r#"<SignedServiceMetadata xmlns="{NS}">{}</SignedServiceMetadata>"#,
            sample_metadata().replace(&format!(r#" xmlns="{NS}""#), "")
        );
        assert!(matches!(process(&xml), Ok(QueryResult::Metadata(_))));
    }

    #[test]
    fn service_level_redirect_is_a_response_level_redirect() {
        let xml = format!(
            r#"<ServiceMetadata xmlns="{NS}">
                 <Redirect href="https://other-smp.example.org/9915%3A%3Atest/services/urn%3Ainvoice">
                   <CertificateUID>CN=Other SMP</CertificateUID>
                 </Redirect>
               </ServiceMetadata>"#
        );
        let QueryResult::Redirect(redirection) = process(&xml).unwrap() else {
            panic!("expected redirect");
        };
        assert!(redirection.new_url.as_str().starts_with("https://other-smp.example.org/"));
        assert!(redirection.new_certificate.is_none());
    }

    #[test]
    fn redirect_without_href_is_invalid() {
        let xml = format!(r#"<ServiceMetadata xmlns="{NS}"><Redirect/></ServiceMetadata>"#);
        assert!(matches!(
            process(&xml),
            Err(ProcessingError::InvalidRedirection(_))
        ));
    }

    #[test]
    fn redirect_with_malformed_target_is_invalid() {
        let xml = format!(
            r#"<ServiceMetadata xmlns="{NS}"><Redirect href="not a url"/></ServiceMetadata>"#
        );
        assert!(matches!(
            process(&xml),
            Err(ProcessingError::InvalidRedirection(_))
        ));
    }

    #[test]
    fn missing_service_information_is_unparsable() {
        let xml = format!(r#"<ServiceMetadata xmlns="{NS}"/>"#);
        assert!(matches!(process(&xml), Err(ProcessingError::Unparsable(_))));
    }

    #[test]
    fn unexpected_root_is_unparsable() {
        let xml = format!(r#"<SomethingElse xmlns="{NS}"/>"#);
        assert!(matches!(process(&xml), Err(ProcessingError::Unparsable(_))));
    }
}
