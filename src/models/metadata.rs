// src/models/metadata.rs
//! Discovery documents fetched by the holder.
//!
//! Typed views of `/.well-known/openid-credential-issuer` and
//! `/.well-known/openid-configuration`. Required fields fail decoding when
//! absent; everything else is optional and unknown members are kept.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Credential issuer metadata (OID4VCI).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssuerMetadata {
    pub credential_issuer: String,

    pub credential_endpoint: String,

    /// When absent the credential issuer acts as its own authorization server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_servers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_configurations_supported: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IssuerMetadata {
    /// The first listed authorization server, or the issuer itself.
    pub fn authorization_server(&self) -> Option<&str> {
        match &self.authorization_servers {
            Some(servers) => servers.first().map(String::as_str),
            None => Some(&self.credential_issuer),
        }
    }
}

/// OAuth 2.0 / OpenID Connect authorization server metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthServerMetadata {
    pub issuer: String,

    pub authorization_endpoint: String,

    pub token_endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}
