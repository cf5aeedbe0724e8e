// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connector implementation descriptors.
//!
//! A `.impl` file is an XML document describing which class implements which
//! connector definition, and which jar files it needs:
//!
//! ```xml
//! <implementation:connectorImplementation
//!     xmlns:implementation="http://www.bonitasoft.org/ns/connector/implementation/6.0">
//!   <implementationId>rest-get-impl</implementationId>
//!   <implementationVersion>1.0.0</implementationVersion>
//!   <definitionId>rest-get</definitionId>
//!   <definitionVersion>1.0</definitionVersion>
//!   <implementationClassname>org.acme.rest.RestGetConnector</implementationClassname>
//!   <jarDependencies>
//!     <jarDependency>rest-client.jar</jarDependency>
//!   </jarDependencies>
//! </implementation:connectorImplementation>
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File extension of connector implementation descriptors.
pub const IMPL_EXTENSION: &str = ".impl";

/// Local name of the descriptor root element.
const ROOT_ELEMENT: &str = "connectorImplementation";

/// Errors from parsing a `.impl` document.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Content is not UTF-8.
    #[error("descriptor is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Content is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Root element is not `connectorImplementation`.
    #[error("unexpected root element '{0}', expected 'connectorImplementation'")]
    UnexpectedRoot(String),

    /// A required element is absent or empty.
    #[error("missing required element '{0}'")]
    MissingElement(&'static str),
}

/// Parsed representation of a `.impl` file.
///
/// Immutable once parsed; the cache shares it behind an `Arc` and a redeploy
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorImplementationDescriptor {
    /// Id of the connector definition this implements.
    pub definition_id: String,
    /// Version of the connector definition this implements.
    pub definition_version: String,
    /// Id of the implementation itself.
    pub implementation_id: String,
    /// Version of the implementation itself.
    pub implementation_version: String,
    /// Class name the loader resolves to a connector.
    pub implementation_class_name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Jar files the implementation needs, as declared.
    pub jar_dependencies: Vec<String>,
}

impl ConnectorImplementationDescriptor {
    /// Parse a descriptor from the raw bytes of a `.impl` file.
    pub fn parse(content: &[u8]) -> Result<Self, DescriptorError> {
        let xml = std::str::from_utf8(content)?;
        let doc = roxmltree::Document::parse(xml)?;

        let root = doc.root_element();
        if root.tag_name().name() != ROOT_ELEMENT {
            return Err(DescriptorError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let jar_dependencies = child_element(&root, "jarDependencies")
            .map(|deps| {
                deps.children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "jarDependency")
                    .filter_map(|n| trimmed_text(&n))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            definition_id: required_text(&root, "definitionId")?,
            definition_version: required_text(&root, "definitionVersion")?,
            implementation_id: required_text(&root, "implementationId")?,
            implementation_version: required_text(&root, "implementationVersion")?,
            implementation_class_name: required_text(&root, "implementationClassname")?,
            description: child_element(&root, "description").and_then(|n| trimmed_text(&n)),
            jar_dependencies,
        })
    }

    /// Whether this descriptor implements the given connector definition.
    pub fn implements(&self, connector_id: &str, connector_version: &str) -> bool {
        self.definition_id == connector_id && self.definition_version == connector_version
    }
}

/// Whether an archive entry or resource name is a descriptor file.
pub fn is_descriptor_file(name: &str) -> bool {
    name.ends_with(IMPL_EXTENSION)
}

fn child_element<'a, 'input>(
    node: &roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn trimmed_text(node: &roxmltree::Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn required_text(node: &roxmltree::Node, name: &'static str) -> Result<String, DescriptorError> {
    child_element(node, name)
        .and_then(|n| trimmed_text(&n))
        .ok_or(DescriptorError::MissingElement(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<implementation:connectorImplementation xmlns:implementation="http://www.bonitasoft.org/ns/connector/implementation/6.0">
  <implementationId>email-impl</implementationId>
  <implementationVersion>1.2.0</implementationVersion>
  <definitionId>email</definitionId>
  <definitionVersion>1.0.0</definitionVersion>
  <implementationClassname>org.acme.EmailConnector</implementationClassname>
  <description>Sends mail</description>
  <jarDependencies>
    <jarDependency>mail.jar</jarDependency>
    <jarDependency> activation.jar </jarDependency>
  </jarDependencies>
</implementation:connectorImplementation>"#;

    #[test]
    fn test_parse_full_descriptor() {
        let descriptor = ConnectorImplementationDescriptor::parse(FULL.as_bytes()).unwrap();

        assert_eq!(descriptor.definition_id, "email");
        assert_eq!(descriptor.definition_version, "1.0.0");
        assert_eq!(descriptor.implementation_id, "email-impl");
        assert_eq!(descriptor.implementation_version, "1.2.0");
        assert_eq!(
            descriptor.implementation_class_name,
            "org.acme.EmailConnector"
        );
        assert_eq!(descriptor.description.as_deref(), Some("Sends mail"));
        assert_eq!(descriptor.jar_dependencies, vec!["mail.jar", "activation.jar"]);
        assert!(descriptor.implements("email", "1.0.0"));
        assert!(!descriptor.implements("email", "2.0.0"));
    }

    #[test]
    fn test_parse_unprefixed_root_without_dependencies() {
        let xml = r#"<connectorImplementation>
            <implementationId>i</implementationId>
            <implementationVersion>1</implementationVersion>
            <definitionId>d</definitionId>
            <definitionVersion>1</definitionVersion>
            <implementationClassname>C</implementationClassname>
        </connectorImplementation>"#;

        let descriptor = ConnectorImplementationDescriptor::parse(xml.as_bytes()).unwrap();
        assert!(descriptor.jar_dependencies.is_empty());
        assert!(descriptor.description.is_none());
    }

    #[test]
    fn test_missing_class_name_is_rejected() {
        let xml = r#"<connectorImplementation>
            <implementationId>i</implementationId>
            <implementationVersion>1</implementationVersion>
            <definitionId>d</definitionId>
            <definitionVersion>1</definitionVersion>
            <implementationClassname>  </implementationClassname>
        </connectorImplementation>"#;

        let err = ConnectorImplementationDescriptor::parse(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingElement("implementationClassname")
        ));
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let err = ConnectorImplementationDescriptor::parse(b"<connectorDefinition/>").unwrap_err();
        assert!(matches!(err, DescriptorError::UnexpectedRoot(name) if name == "connectorDefinition"));
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let err =
            ConnectorImplementationDescriptor::parse(b"<connectorImplementation>").unwrap_err();
        assert!(matches!(err, DescriptorError::Xml(_)));
    }

    #[test]
    fn test_non_utf8_is_rejected() {
        let err = ConnectorImplementationDescriptor::parse(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, DescriptorError::Encoding(_)));
    }

    #[test]
    fn test_is_descriptor_file() {
        assert!(is_descriptor_file("rest.impl"));
        assert!(!is_descriptor_file("rest.impl.bak"));
        assert!(!is_descriptor_file("driver.jar"));
    }
}
