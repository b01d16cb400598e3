// src/services/credential_issuer.rs
//! Credential Issuer Preparation
//!
//! Brings the issuer agent into a state where it can hand out credential
//! offers:
//! - Acquire an issuing DID, creating one if the registrar has none
//! - Publish it and wait for the registrar to report it as published
//! - Register the credential schema authored by that DID
//! - Create the OID4VCI issuer and its single credential configuration
//!
//! Only DID creation is skipped when its precondition already holds. Schema,
//! issuer and configuration registration always create new resources, so
//! [`CredentialIssuer::prepare_issuer`] should run once per process.

use crate::error::{OfferError, PollError, SetupError, UpstreamError};
use crate::models::credential::{
    AuthorizationServerRef, Claims, CreateIssuerRequest, CreateOfferRequest,
    CredentialConfiguration, CredentialIssuerResource, CredentialSchema, JWT_VC_JSON,
};
use crate::models::did::{CreateIdentityRequest, DidStatus, IssuingIdentity};
use crate::services::agent_client::AgentClient;
use crate::settings::Settings;
use crate::utils::polling::Poller;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Drives the issuer-side setup against the agent API.
pub struct CredentialIssuer {
    agent: AgentClient,
    authorization_server: AuthorizationServerRef,
    schema_base_url: String,
    configuration_id: String,
    publication: Poller,
}

fn setup_step(step: &'static str) -> impl FnOnce(UpstreamError) -> SetupError {
    move |source| SetupError::Upstream { step, source }
}

/// One publication poll: `Some(())` once published, requesting publication
/// the first time the DID is seen unpublished.
async fn check_publication(
    agent: &AgentClient,
    did: &str,
    requested: &AtomicBool,
) -> Result<Option<()>, UpstreamError> {
    let current = agent.get_did(did).await?;
    match current.status {
        DidStatus::Published => Ok(Some(())),
        DidStatus::Unpublished => {
            if !requested.swap(true, Ordering::SeqCst) {
                info!("publishing DID {did}");
                agent.publish_did(did).await?;
            } else {
                debug!("DID {did} not yet picked up for publication");
            }
            Ok(None)
        }
        DidStatus::PublicationRequested => {
            debug!("DID {did} publication pending");
            Ok(None)
        }
        DidStatus::Other(status) => {
            warn!("DID {did} has unexpected status {status}, still waiting");
            Ok(None)
        }
    }
}

impl CredentialIssuer {
    /// Creates a sequencer for the agent and authorization server in `settings`.
    ///
    /// # Arguments
    /// * `agent` - Client for the issuer agent API
    /// * `settings` - Authorization server, configuration id and DID polling schedule
    pub fn new(agent: AgentClient, settings: &Settings) -> Self {
        let auth = &settings.authorization_server;
        let polling = &settings.polling;
        Self {
            authorization_server: AuthorizationServerRef {
                url: auth.url.clone(),
                client_id: auth.client_id.clone(),
                client_secret: auth.client_secret.clone(),
            },
            schema_base_url: settings
                .agent
                .schema_base_url()
                .trim_end_matches('/')
                .to_string(),
            configuration_id: settings.holder.credential_configuration_id.clone(),
            publication: Poller::new(polling.did_interval())
                .with_backoff(polling.backoff, polling.max_interval())
                .with_deadline(polling.did_timeout()),
            agent,
        }
    }

    /// Runs the full preparation sequence with the university degree schema.
    ///
    /// # Errors
    /// - [`SetupError::Upstream`] naming the step whose request failed
    /// - [`SetupError::NoIdentity`] if the registrar still lists no DID after creation
    /// - [`SetupError::Publication`] if the publication wait times out or is cancelled
    pub async fn prepare_issuer(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CredentialIssuerResource, SetupError> {
        let identity = self.acquire_identity().await?;
        let did = self.await_publication(&identity, cancel).await?;
        let schema = CredentialSchema::university_degree(&did);
        self.prepare_issuer_with_schema(did, schema).await
    }

    /// Registers `schema` (re-authored by `did`), the issuer and its configuration.
    pub async fn prepare_issuer_with_schema(
        &self,
        did: String,
        schema: CredentialSchema,
    ) -> Result<CredentialIssuerResource, SetupError> {
        let schema = schema.authored_by(&did);
        let record = self
            .agent
            .create_schema(&schema)
            .await
            .map_err(setup_step("register schema"))?;
        info!("registered schema {} {} as {}", schema.name, schema.version, record.guid);

        let issuer = self
            .agent
            .create_issuer(&CreateIssuerRequest {
                authorization_server: self.authorization_server.clone(),
            })
            .await
            .map_err(setup_step("create issuer"))?;
        let url = self.agent.issuer_url(&issuer.id);
        info!("created credential issuer {url}");

        let configuration = CredentialConfiguration {
            configuration_id: self.configuration_id.clone(),
            format: JWT_VC_JSON.to_string(),
            schema_id: format!(
                "{}/schema-registry/schemas/{}/schema",
                self.schema_base_url, record.guid
            ),
        };
        self.agent
            .create_credential_configuration(&issuer.id, &configuration)
            .await
            .map_err(setup_step("create credential configuration"))?;
        info!("added credential configuration {}", configuration.configuration_id);

        Ok(CredentialIssuerResource {
            id: issuer.id,
            url,
            issuing_did: did,
            authorization_server: self.authorization_server.clone(),
            configurations: vec![configuration],
        })
    }

    /// Returns the first DID known to the registrar, creating one when there is none.
    async fn acquire_identity(&self) -> Result<IssuingIdentity, SetupError> {
        let existing = self
            .agent
            .list_dids()
            .await
            .map_err(setup_step("list DIDs"))?;
        if let Some(identity) = existing.into_iter().next() {
            info!("using existing DID {} ({})", identity.did, identity.status);
            return Ok(identity);
        }

        info!("no issuing DID found, creating one");
        self.agent
            .create_did(&CreateIdentityRequest::assertion_only())
            .await
            .map_err(setup_step("create DID"))?;

        let created = self
            .agent
            .list_dids()
            .await
            .map_err(setup_step("list DIDs"))?;
        created.into_iter().next().ok_or(SetupError::NoIdentity)
    }

    /// Polls the DID until published, requesting publication at most once.
    ///
    /// Returns the canonical DID string.
    async fn await_publication(
        &self,
        identity: &IssuingIdentity,
        cancel: &CancellationToken,
    ) -> Result<String, SetupError> {
        let did = identity.did.as_str();
        let requested = AtomicBool::new(false);

        self.publication
            .poll(cancel, || check_publication(&self.agent, did, &requested))
            .await
            .map_err(|source| match source {
                PollError::Upstream(source) => SetupError::Upstream {
                    step: "publish DID",
                    source,
                },
                source => SetupError::Publication {
                    did: did.to_string(),
                    source,
                },
            })?;

        info!("DID {did} is published");
        Ok(did.to_string())
    }

    /// Requests a credential offer for `claims` and returns the offer URI.
    ///
    /// # Errors
    /// [`OfferError::Upstream`] if the agent rejects the offer request.
    pub async fn create_offer(
        &self,
        resource: &CredentialIssuerResource,
        claims: Claims,
    ) -> Result<String, OfferError> {
        let request = CreateOfferRequest {
            credential_configuration_id: self.configuration_id.clone(),
            issuing_did: resource.issuing_did.clone(),
            claims,
        };
        let uri = self
            .agent
            .create_credential_offer(&resource.id, &request)
            .await?;
        info!("credential offer created: {uri}");
        Ok(uri)
    }
}
