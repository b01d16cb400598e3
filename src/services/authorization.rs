// src/services/authorization.rs
//! OAuth2 authorization-code sub-flow of the holder.
//!
//! Walks one [`AuthorizationSession`] through
//! `Idle -> AuthorizationRequested -> CodeCaptured -> TokenRequested -> TokenObtained`:
//! the authorization URL is handed to whoever drives the browser, the
//! redirect is picked up by [`RedirectCapture`], and the code is exchanged
//! for an access token and `c_nonce`.

use crate::error::AuthorizationError;
use crate::models::metadata::AuthServerMetadata;
use crate::models::session::{AuthorizationSession, AuthorizationState, TokenResponse};
use crate::services::redirect_capture::RedirectCapture;
use crate::settings::HolderSettings;
use crate::utils::http::fetch_json;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;

const STATE_LENGTH: usize = 24;

/// Builds the authorization request URL.
///
/// # Arguments
/// * `endpoint` - The server's `authorization_endpoint`
/// * `issuer_state` - Echoed unmodified from the credential offer
/// * `state` - Optional OAuth `state` for redirect correlation
///
/// # Errors
/// [`AuthorizationError::InvalidEndpoint`] if `endpoint` is not a URL.
pub fn authorization_url(
    endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    configuration_id: &str,
    issuer_state: &str,
    state: Option<&str>,
) -> Result<Url, AuthorizationError> {
    let scope = format!("openid {configuration_id}");
    let mut params = vec![
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("client_id", client_id),
        ("scope", scope.as_str()),
        ("issuer_state", issuer_state),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }

    Url::parse_with_params(endpoint, &params).map_err(|e| AuthorizationError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Holder-side OAuth2 client.
pub struct AuthorizationClient {
    http: Client,
    client_id: String,
    redirect_uri: String,
    configuration_id: String,
    correlate_redirects: bool,
    capture: RedirectCapture,
}

impl AuthorizationClient {
    pub fn new(http: Client, holder: &HolderSettings, capture: RedirectCapture) -> Self {
        Self {
            http,
            client_id: holder.client_id.clone(),
            redirect_uri: holder.redirect_uri.clone(),
            configuration_id: holder.credential_configuration_id.clone(),
            correlate_redirects: holder.correlate_redirects,
            capture,
        }
    }

    pub fn capture(&self) -> &RedirectCapture {
        &self.capture
    }

    /// A fresh session bound to `issuer_state`, with a random `state` when
    /// redirect correlation is on.
    pub fn start_session(&self, issuer_state: &str) -> AuthorizationSession {
        let state = self.correlate_redirects.then(random_state);
        AuthorizationSession::new(issuer_state, state)
    }

    /// Drives `session` from `Idle` to `TokenObtained`.
    ///
    /// The authorization URL is logged and printed for the person
    /// completing the login.
    ///
    /// # Errors
    /// Any [`AuthorizationError`]; the session keeps the last state reached.
    pub async fn authorize(
        &self,
        metadata: &AuthServerMetadata,
        session: &mut AuthorizationSession,
        cancel: &CancellationToken,
    ) -> Result<(), AuthorizationError> {
        let url = authorization_url(
            &metadata.authorization_endpoint,
            &self.client_id,
            &self.redirect_uri,
            &self.configuration_id,
            &session.issuer_state,
            session.state.as_deref(),
        )?;
        session.advance(AuthorizationState::AuthorizationRequested);
        info!("authorization request: {url}");
        println!("Open this URL in a browser to log in:\n{url}");

        let code = self
            .capture
            .await_authorization_code(session.state.as_deref(), cancel)
            .await?;
        session.code = Some(code.clone());
        session.advance(AuthorizationState::CodeCaptured);

        session.advance(AuthorizationState::TokenRequested);
        let token = self.exchange_code(&metadata.token_endpoint, &code).await?;
        session.token = Some(token);
        session.advance(AuthorizationState::TokenObtained);
        info!("access token obtained");
        Ok(())
    }

    /// `POST {token_endpoint}` with the authorization code grant.
    ///
    /// # Errors
    /// [`AuthorizationError::TokenExchange`] on a rejected request or a
    /// response without `access_token` or `c_nonce`.
    pub async fn exchange_code(&self, token_endpoint: &str, code: &str) -> Result<TokenResponse, AuthorizationError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        fetch_json(token_endpoint, self.http.post(token_endpoint).form(&form))
            .await
            .map_err(AuthorizationError::TokenExchange)
    }
}
