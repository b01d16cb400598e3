// src/services/agent_client.rs
//! HTTP client for the issuer agent.
//!
//! Thin typed wrapper over the agent's REST API:
//! - DID registrar: list, create, fetch and publish managed DIDs
//! - Schema registry: register credential schemas
//! - OID4VCI issuer: issuers, credential configurations and offers
//!
//! Every call returns an [`UpstreamError`] carrying URL, status and body on
//! failure; callers decide which setup step the failure belongs to.

use crate::error::UpstreamError;
use crate::models::credential::{
    CreateIssuerRequest, CreateOfferRequest, CreateOfferResponse, CredentialConfiguration,
    CredentialSchema, IssuerRecord, SchemaRecord,
};
use crate::models::did::{CreateIdentityRequest, IdentityPage, IssuingIdentity};
use crate::settings::AgentSettings;
use crate::utils::http::{expect_success, fetch_json};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

#[derive(Clone)]
pub struct AgentClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AgentClient {
    pub fn new(http: Client, settings: &AgentSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    /// URL of an OID4VCI issuer resource, also used as its credential issuer id.
    pub fn issuer_url(&self, issuer_id: &str) -> String {
        format!("{}/oid4vci/issuers/{}", self.base_url, issuer_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B) -> RequestBuilder {
        self.request(Method::POST, url).json(body)
    }

    /// `GET /did-registrar/dids`
    pub async fn list_dids(&self) -> Result<Vec<IssuingIdentity>, UpstreamError> {
        let url = format!("{}/did-registrar/dids", self.base_url);
        let page: IdentityPage = fetch_json(&url, self.request(Method::GET, &url)).await?;
        Ok(page.contents)
    }

    /// `POST /did-registrar/dids`
    pub async fn create_did(&self, request: &CreateIdentityRequest) -> Result<(), UpstreamError> {
        let url = format!("{}/did-registrar/dids", self.base_url);
        expect_success(&url, self.post_json(&url, request)).await
    }

    /// `GET /did-registrar/dids/{did}`
    pub async fn get_did(&self, did: &str) -> Result<IssuingIdentity, UpstreamError> {
        let url = format!("{}/did-registrar/dids/{}", self.base_url, did);
        fetch_json(&url, self.request(Method::GET, &url)).await
    }

    /// `POST /did-registrar/dids/{did}/publications`
    pub async fn publish_did(&self, did: &str) -> Result<(), UpstreamError> {
        let url = format!("{}/did-registrar/dids/{}/publications", self.base_url, did);
        expect_success(&url, self.request(Method::POST, &url)).await
    }

    /// `POST /schema-registry/schemas`
    pub async fn create_schema(&self, schema: &CredentialSchema) -> Result<SchemaRecord, UpstreamError> {
        let url = format!("{}/schema-registry/schemas", self.base_url);
        fetch_json(&url, self.post_json(&url, schema)).await
    }

    /// `POST /oid4vci/issuers`
    pub async fn create_issuer(&self, request: &CreateIssuerRequest) -> Result<IssuerRecord, UpstreamError> {
        let url = format!("{}/oid4vci/issuers", self.base_url);
        fetch_json(&url, self.post_json(&url, request)).await
    }

    /// `POST /oid4vci/issuers/{id}/credential-configurations`
    pub async fn create_credential_configuration(
        &self,
        issuer_id: &str,
        configuration: &CredentialConfiguration,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}/credential-configurations", self.issuer_url(issuer_id));
        expect_success(&url, self.post_json(&url, configuration)).await
    }

    /// `POST /oid4vci/issuers/{id}/credential-offers`, returning the offer URI.
    pub async fn create_credential_offer(
        &self,
        issuer_id: &str,
        request: &CreateOfferRequest,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/credential-offers", self.issuer_url(issuer_id));
        let response: CreateOfferResponse = fetch_json(&url, self.post_json(&url, request)).await?;
        Ok(response.credential_offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::did::DidStatus;
    use mockito::Matcher;
    use serde_json::json;

    fn client(base_url: &str, api_key: Option<&str>) -> AgentClient {
        let settings = AgentSettings {
            base_url: format!("{base_url}/"),
            api_key: api_key.map(str::to_string),
            schema_base_url: None,
        };
        AgentClient::new(Client::new(), &settings)
    }

    #[tokio::test]
    async fn sends_api_key_and_decodes_did_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/did-registrar/dids")
            .match_header("apikey", "secret-key")
            .with_header("content-type", "application/json")
            .with_body(json!({"contents": [{"did": "did:prism:abc", "status": "PUBLISHED"}]}).to_string())
            .create_async()
            .await;

        let dids = client(&server.url(), Some("secret-key")).list_dids().await.unwrap();
        assert_eq!(dids.len(), 1);
        assert_eq!(dids[0].status, DidStatus::Published);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/schema-registry/schemas")
            .with_status(422)
            .with_body("{\"detail\":\"author is not published\"}")
            .create_async()
            .await;

        let schema = CredentialSchema::university_degree("did:prism:abc");
        let err = client(&server.url(), None).create_schema(&schema).await.unwrap_err();
        match err {
            UpstreamError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 422);
                assert!(body.contains("author is not published"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn offer_request_targets_the_issuer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oid4vci/issuers/issuer-1/credential-offers")
            .match_body(Matcher::PartialJson(json!({
                "credentialConfigurationId": "UniversityDegreeCredential",
                "issuingDID": "did:prism:abc"
            })))
            .with_status(201)
            .with_body(json!({"credentialOffer": "openid-credential-offer://?credential_offer=%7B%7D"}).to_string())
            .create_async()
            .await;

        let request = CreateOfferRequest {
            credential_configuration_id: "UniversityDegreeCredential".to_string(),
            issuing_did: "did:prism:abc".to_string(),
            claims: Default::default(),
        };
        let uri = client(&server.url(), None)
            .create_credential_offer("issuer-1", &request)
            .await
            .unwrap();
        assert!(uri.starts_with("openid-credential-offer://"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_agent_is_a_transport_error() {
        let err = client("http://127.0.0.1:9", None).list_dids().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport { .. }));
    }
}
