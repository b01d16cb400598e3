// src/services/ceremony.rs
//! Issuance ceremony orchestration.
//!
//! Runs every step in order, aborting on the first failure:
//!
//! 1. issuer preparation (DID, schema, issuer, configuration)
//! 2. credential offer creation and decoding
//! 3. issuer and authorization server discovery
//! 4. authorization code flow and token exchange
//! 5. proof of possession and credential request
//!
//! A [`Ceremony`] holds no state between runs; every run gets its own
//! [`AuthorizationSession`], so concurrent runs only need distinct sessions.

use crate::error::{CeremonyError, CredentialRequestError, DiscoveryError, KeyError, UpstreamError};
use crate::models::credential::{
    Claims, CredentialIssuerResource, CredentialOffer, CredentialRequest, IssuedCredential,
};
use crate::models::metadata::IssuerMetadata;
use crate::models::session::AuthorizationSession;
use crate::services::agent_client::AgentClient;
use crate::services::authorization::AuthorizationClient;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::metadata_resolver::{MetadataResolver, UrlRewrite};
use crate::services::redirect_capture::RedirectCapture;
use crate::settings::Settings;
use crate::utils::http::fetch_json;
use crate::utils::polling::Poller;
use crate::wallet::key_management::{key_from_settings, KeyProvider};
use crate::wallet::proof_generation::build_proof;
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Ceremony {
    http: Client,
    issuer: CredentialIssuer,
    resolver: MetadataResolver,
    authorization: AuthorizationClient,
    key: Arc<dyn KeyProvider>,
    client_id: String,
    configuration_id: String,
    prepare_capture: bool,
}

impl Ceremony {
    /// Wires every component from `settings`, sharing one HTTP client.
    ///
    /// # Errors
    /// Returns `KeyError` if the holder key cannot be imported or generated.
    pub fn from_settings(settings: &Settings) -> Result<Self, KeyError> {
        let key = key_from_settings(&settings.holder.key)?;
        Ok(Self::with_key(Client::new(), settings, key))
    }

    /// Like [`Ceremony::from_settings`] with an explicit HTTP client and key.
    pub fn with_key(http: Client, settings: &Settings, key: Arc<dyn KeyProvider>) -> Self {
        let polling = &settings.polling;
        let redirect_poller = Poller::new(polling.redirect_interval())
            .with_backoff(polling.backoff, polling.max_interval())
            .with_deadline(polling.redirect_timeout());
        let capture = RedirectCapture::new(http.clone(), &settings.capture, redirect_poller);

        Self {
            issuer: CredentialIssuer::new(AgentClient::new(http.clone(), &settings.agent), settings),
            resolver: MetadataResolver::new(
                http.clone(),
                UrlRewrite::from_settings(&settings.metadata_rewrite),
            ),
            authorization: AuthorizationClient::new(http.clone(), &settings.holder, capture),
            key,
            client_id: settings.holder.client_id.clone(),
            configuration_id: settings.holder.credential_configuration_id.clone(),
            prepare_capture: settings.capture.prepare,
            http,
        }
    }

    /// Runs the whole ceremony for `claims`.
    ///
    /// # Arguments
    /// * `claims` - Claim values placed in the credential offer
    /// * `cancel` - Cancels the DID publication and redirect waits
    ///
    /// # Errors
    /// The [`CeremonyError`] of the first step that failed.
    pub async fn run_issuance_ceremony(
        &self,
        claims: Claims,
        cancel: &CancellationToken,
    ) -> Result<IssuedCredential, CeremonyError> {
        if self.prepare_capture {
            self.authorization.capture().prepare().await?;
        }

        let resource = self.issuer.prepare_issuer(cancel).await?;
        let offer_uri = self.issuer.create_offer(&resource, claims).await?;
        let offer = CredentialOffer::from_uri(&offer_uri)?;
        let issuer_state = offer.issuer_state()?;
        debug!("decoded offer {offer:?}");

        let issuer_metadata = self.resolver.fetch_issuer_metadata(&offer.credential_issuer).await?;
        let auth_server = issuer_metadata.authorization_server().ok_or_else(|| {
            DiscoveryError::NoAuthorizationServer {
                url: issuer_metadata.credential_issuer.clone(),
            }
        })?;
        let auth_metadata = self.resolver.fetch_auth_server_metadata(auth_server).await?;

        let mut session = self.authorization.start_session(issuer_state);
        self.authorization
            .authorize(&auth_metadata, &mut session, cancel)
            .await?;

        self.request_credential(&resource, &issuer_metadata, &session).await
    }

    /// Builds a fresh proof over the session's `c_nonce` and requests the credential.
    ///
    /// # Errors
    /// - [`CeremonyError::Proof`] if signing fails
    /// - [`CeremonyError::CredentialRequest`] with the issuer's status and body
    pub async fn request_credential(
        &self,
        resource: &CredentialIssuerResource,
        metadata: &IssuerMetadata,
        session: &AuthorizationSession,
    ) -> Result<IssuedCredential, CeremonyError> {
        let (access_token, nonce) = match (session.access_token(), session.c_nonce()) {
            (Some(token), Some(nonce)) => (token, nonce),
            _ => {
                return Err(CredentialRequestError(UpstreamError::Decode {
                    url: metadata.credential_endpoint.clone(),
                    reason: "no access token in authorization session".to_string(),
                })
                .into())
            }
        };

        let jwt = build_proof(self.key.as_ref(), &self.client_id, &resource.url, nonce)?;
        let request = CredentialRequest::jwt_vc_json(&self.configuration_id, jwt);

        let url = &metadata.credential_endpoint;
        info!("requesting credential from {url}");
        let credential: Value = fetch_json(url, self.http.post(url).bearer_auth(access_token).json(&request))
            .await
            .map_err(CredentialRequestError)?;
        info!("credential issued");

        Ok(IssuedCredential { credential, request })
    }
}
