// src/models/credential.rs
//! Credential issuance data model.
//!
//! Covers both sides of the ceremony:
//! - Issuer resources registered with the agent (schema, issuer, configuration)
//! - The credential offer handed to the holder and its decoding
//! - The holder's credential request and the issuer's answer

use crate::error::OfferError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Credential format used for every configuration this crate registers.
pub const JWT_VC_JSON: &str = "jwt_vc_json";

/// Claim values keyed by claim name.
pub type Claims = Map<String, Value>;

/// A credential schema registered once per run.
///
/// The schema body is a JSON-schema document; `author` is filled in with
/// the published issuing DID at registration time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialSchema {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub schema: Value,
    pub tags: Vec<String>,
    pub author: String,
}

impl CredentialSchema {
    /// The university degree schema used by the demo ceremony.
    pub fn university_degree(author: &str) -> Self {
        Self {
            name: "UniversityDegree".to_string(),
            version: "1.0.0".to_string(),
            schema_type: "https://w3c-ccg.github.io/vc-json-schemas/schema/2.0/schema.json"
                .to_string(),
            schema: json!({
                "$id": "https://example.com/driving-license-1.0",
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "firstName": {"type": "string"},
                    "degree": {"type": "string"},
                    "grade": {"type": "number"}
                },
                "required": ["firstName", "grade"],
                "additionalProperties": false
            }),
            tags: Vec::new(),
            author: author.to_string(),
        }
    }

    /// Same schema, authored by `author`.
    pub fn authored_by(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }
}

/// Registry answer to a schema registration; only the GUID is used.
#[derive(Deserialize, Debug, Clone)]
pub struct SchemaRecord {
    pub guid: String,
}

/// Authorization server reference attached to an OID4VCI issuer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationServerRef {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Body of `POST /oid4vci/issuers`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssuerRequest {
    pub authorization_server: AuthorizationServerRef,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IssuerRecord {
    pub id: String,
}

/// A credential configuration owned by an issuer resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialConfiguration {
    pub configuration_id: String,
    pub format: String,
    pub schema_id: String,
}

/// The issuer-side OID4VCI endpoint root, ready to create offers.
#[derive(Debug, Clone)]
pub struct CredentialIssuerResource {
    /// Agent-assigned issuer id
    pub id: String,
    /// `{agent}/oid4vci/issuers/{id}`; also the proof audience
    pub url: String,
    /// Published DID the issuer signs with
    pub issuing_did: String,
    pub authorization_server: AuthorizationServerRef,
    pub configurations: Vec<CredentialConfiguration>,
}

/// Body of `POST {issuer}/credential-offers`.
#[derive(Serialize, Debug, Clone)]
pub struct CreateOfferRequest {
    #[serde(rename = "credentialConfigurationId")]
    pub credential_configuration_id: String,
    #[serde(rename = "issuingDID")]
    pub issuing_did: String,
    pub claims: Claims,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferResponse {
    pub credential_offer: String,
}

/// Decoded `credential_offer` query parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialOffer {
    pub credential_issuer: String,
    #[serde(default)]
    pub credential_configuration_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Grants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,
}

/// Issuer state links the authorization request to this offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorizationCodeGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

impl CredentialOffer {
    /// Decodes an offer URI of the form `...?credential_offer=<JSON>`.
    ///
    /// # Errors
    /// [`OfferError::MalformedOffer`] if the URI does not parse, has no
    /// `credential_offer` parameter, or the parameter is not an offer object.
    pub fn from_uri(uri: &str) -> Result<Self, OfferError> {
        let malformed = |reason: String| OfferError::MalformedOffer {
            uri: uri.to_string(),
            reason,
        };

        let parsed = Url::parse(uri).map_err(|e| malformed(e.to_string()))?;
        let (_, payload) = parsed
            .query_pairs()
            .find(|(key, _)| key == "credential_offer")
            .ok_or_else(|| malformed("missing credential_offer parameter".to_string()))?;

        serde_json::from_str(&payload).map_err(|e| malformed(e.to_string()))
    }

    /// The `grants.authorization_code.issuer_state` nonce.
    ///
    /// # Errors
    /// [`OfferError::MissingGrant`] if absent or empty.
    pub fn issuer_state(&self) -> Result<&str, OfferError> {
        self.grants
            .as_ref()
            .and_then(|g| g.authorization_code.as_ref())
            .and_then(|a| a.issuer_state.as_deref())
            .filter(|state| !state.is_empty())
            .ok_or(OfferError::MissingGrant)
    }
}

/// `credential_definition` of a `jwt_vc_json` credential request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialDefinition {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: Claims,
}

/// Proof of possession attached to a credential request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub proof_type: String,
    pub jwt: String,
}

/// Body of `POST {credential_endpoint}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialRequest {
    pub format: String,
    pub credential_definition: CredentialDefinition,
    pub proof: Proof,
}

impl CredentialRequest {
    /// A `jwt_vc_json` request for `configuration_id`, proven by `jwt`.
    pub fn jwt_vc_json(configuration_id: &str, jwt: String) -> Self {
        Self {
            format: JWT_VC_JSON.to_string(),
            credential_definition: CredentialDefinition {
                types: vec![
                    "VerifiableCredential".to_string(),
                    configuration_id.to_string(),
                ],
                credential_subject: Map::new(),
            },
            proof: Proof {
                proof_type: "jwt".to_string(),
                jwt,
            },
        }
    }
}

/// Result of a completed ceremony.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// The issuer's credential response, format-specific and kept opaque
    pub credential: Value,
    /// The request that obtained it
    pub request: CredentialRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_uri(payload: &Value) -> String {
        let mut url = Url::parse("openid-credential-offer://").unwrap();
        url.query_pairs_mut()
            .append_pair("credential_offer", &payload.to_string());
        url.to_string()
    }

    #[test]
    fn decodes_offer_and_issuer_state() {
        let claims = json!({"firstName": "Alice", "degree": "ChemicalEngineering", "grade": 3.2});
        let uri = offer_uri(&json!({
            "credential_issuer": "http://agent/oid4vci/issuers/42",
            "credential_configuration_ids": ["UniversityDegreeCredential"],
            "grants": {"authorization_code": {"issuer_state": "state-1"}},
            "claims": claims
        }));

        let offer = CredentialOffer::from_uri(&uri).unwrap();
        assert_eq!(offer.issuer_state().unwrap(), "state-1");
        assert_eq!(offer.credential_configuration_ids, vec!["UniversityDegreeCredential"]);
        assert_eq!(Value::Object(offer.claims.unwrap()), claims);
    }

    #[test]
    fn missing_parameter_is_malformed() {
        let err = CredentialOffer::from_uri("openid-credential-offer://?other=1").unwrap_err();
        assert!(matches!(err, OfferError::MalformedOffer { .. }));
    }

    #[test]
    fn non_json_parameter_is_malformed() {
        let err =
            CredentialOffer::from_uri("openid-credential-offer://?credential_offer=%7Bnope").unwrap_err();
        assert!(matches!(err, OfferError::MalformedOffer { .. }));
    }

    #[test]
    fn absent_or_empty_issuer_state_is_a_missing_grant() {
        let no_grants = CredentialOffer::from_uri(&offer_uri(&json!({
            "credential_issuer": "http://agent/oid4vci/issuers/42"
        })))
        .unwrap();
        assert!(matches!(no_grants.issuer_state(), Err(OfferError::MissingGrant)));

        let empty = CredentialOffer::from_uri(&offer_uri(&json!({
            "credential_issuer": "http://agent/oid4vci/issuers/42",
            "grants": {"authorization_code": {"issuer_state": ""}}
        })))
        .unwrap();
        assert!(matches!(empty.issuer_state(), Err(OfferError::MissingGrant)));
    }

    #[test]
    fn credential_request_shape() {
        let request = CredentialRequest::jwt_vc_json("UniversityDegreeCredential", "a.b.c".to_string());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "format": "jwt_vc_json",
                "credential_definition": {
                    "type": ["VerifiableCredential", "UniversityDegreeCredential"],
                    "credentialSubject": {}
                },
                "proof": {"proof_type": "jwt", "jwt": "a.b.c"}
            })
        );
    }

    #[test]
    fn offer_request_uses_agent_field_names() {
        let mut claims = Claims::new();
        claims.insert("grade".to_string(), json!(3.2));
        let body = serde_json::to_value(CreateOfferRequest {
            credential_configuration_id: "UniversityDegreeCredential".to_string(),
            issuing_did: "did:prism:issuer".to_string(),
            claims,
        })
        .unwrap();
        assert_eq!(body["issuingDID"], "did:prism:issuer");
        assert_eq!(body["credentialConfigurationId"], "UniversityDegreeCredential");
        assert_eq!(body["claims"]["grade"], 3.2);
    }
}
