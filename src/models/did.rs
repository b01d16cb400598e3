// src/models/did.rs
//! Issuing identity (managed DID) data model.
//!
//! Mirrors the agent's DID registrar records and maps the registrar's
//! status strings onto the issuing identity lifecycle:
//!
//! ```text
//! Unpublished --publish--> PublicationRequested --ledger--> Published
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the issuing identity as reported by the DID registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DidStatus {
    /// `CREATED`: exists in the agent wallet, not yet submitted.
    Unpublished,
    /// `PUBLICATION_PENDING`: submitted, waiting for the ledger.
    PublicationRequested,
    /// `PUBLISHED`: terminal.
    Published,
    /// Any status the registrar may add later; treated as "keep waiting".
    Other(String),
}

impl From<String> for DidStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "CREATED" => DidStatus::Unpublished,
            "PUBLICATION_PENDING" => DidStatus::PublicationRequested,
            "PUBLISHED" => DidStatus::Published,
            _ => DidStatus::Other(status),
        }
    }
}

impl From<DidStatus> for String {
    fn from(status: DidStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for DidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DidStatus::Unpublished => f.write_str("CREATED"),
            DidStatus::PublicationRequested => f.write_str("PUBLICATION_PENDING"),
            DidStatus::Published => f.write_str("PUBLISHED"),
            DidStatus::Other(other) => f.write_str(other),
        }
    }
}

/// A DID managed by the issuer agent.
///
/// # Fields
/// - `did`: canonical (short-form) identifier, used for lookups
/// - `long_form_did`: self-resolvable form, present while unpublished
/// - `status`: registrar lifecycle state
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuingIdentity {
    pub did: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_form_did: Option<String>,

    pub status: DidStatus,
}

/// Page of managed DIDs returned by `GET /did-registrar/dids`.
#[derive(Deserialize, Debug, Default)]
pub struct IdentityPage {
    #[serde(default)]
    pub contents: Vec<IssuingIdentity>,
}

/// Key template in a DID creation request.
#[derive(Serialize, Debug, Clone)]
pub struct KeyTemplate {
    pub id: String,
    pub purpose: String,
}

/// Body of `POST /did-registrar/dids`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityRequest {
    pub document_template: DocumentTemplate,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTemplate {
    pub public_keys: Vec<KeyTemplate>,
    pub services: Vec<serde_json::Value>,
}

impl CreateIdentityRequest {
    /// One assertion-method key named `iss` and no services.
    pub fn assertion_only() -> Self {
        Self {
            document_template: DocumentTemplate {
                public_keys: vec![KeyTemplate {
                    id: "iss".to_string(),
                    purpose: "assertionMethod".to_string(),
                }],
                services: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_registrar_statuses() {
        let page: IdentityPage = serde_json::from_value(json!({
            "contents": [
                {"did": "did:prism:a", "longFormDid": "did:prism:a:xyz", "status": "CREATED"},
                {"did": "did:prism:b", "status": "PUBLICATION_PENDING"},
                {"did": "did:prism:c", "status": "PUBLISHED"},
                {"did": "did:prism:d", "status": "DEACTIVATED"}
            ]
        }))
        .unwrap();

        let statuses: Vec<_> = page.contents.iter().map(|d| d.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![
                DidStatus::Unpublished,
                DidStatus::PublicationRequested,
                DidStatus::Published,
                DidStatus::Other("DEACTIVATED".to_string()),
            ]
        );
        assert_eq!(page.contents[0].long_form_did.as_deref(), Some("did:prism:a:xyz"));
    }

    #[test]
    fn creation_template_has_single_assertion_key() {
        let body = serde_json::to_value(CreateIdentityRequest::assertion_only()).unwrap();
        assert_eq!(
            body,
            json!({"documentTemplate": {
                "publicKeys": [{"id": "iss", "purpose": "assertionMethod"}],
                "services": []
            }})
        );
    }
}
