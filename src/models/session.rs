// src/models/session.rs
//! Holder-side authorization session.
//!
//! One session per ceremony. It owns the offer's `issuer_state`, the
//! optional OAuth `state` used to correlate the redirect, and, once the
//! token exchange succeeds, the access token and `c_nonce`.

use serde::{Deserialize, Serialize};

/// Progress of the authorization-code sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    Idle,
    AuthorizationRequested,
    CodeCaptured,
    TokenRequested,
    TokenObtained,
}

/// Token endpoint response. `access_token` and `c_nonce` are required here
/// even though plain OAuth makes `c_nonce` optional: the credential request
/// cannot be proven without it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub c_nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub issuer_state: String,
    pub state: Option<String>,
    pub phase: AuthorizationState,
    pub code: Option<String>,
    pub token: Option<TokenResponse>,
}

impl AuthorizationSession {
    pub fn new(issuer_state: impl Into<String>, state: Option<String>) -> Self {
        Self {
            issuer_state: issuer_state.into(),
            state,
            phase: AuthorizationState::Idle,
            code: None,
            token: None,
        }
    }

    /// Moves to `next`. Only forward transitions are accepted.
    pub fn advance(&mut self, next: AuthorizationState) {
        debug_assert!(next as u8 >= self.phase as u8, "{:?} -> {:?}", self.phase, next);
        log::debug!("authorization session {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn c_nonce(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.c_nonce.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_response_needs_c_nonce() {
        let missing: Result<TokenResponse, _> =
            serde_json::from_value(json!({"access_token": "tok123", "token_type": "Bearer"}));
        assert!(missing.is_err());

        let ok: TokenResponse = serde_json::from_value(json!({
            "access_token": "tok123",
            "c_nonce": "n0nce",
            "c_nonce_expires_in": 300
        }))
        .unwrap();
        assert_eq!(ok.c_nonce_expires_in, Some(300));
    }

    #[test]
    fn session_walks_forward() {
        let mut session = AuthorizationSession::new("issuer-state", None);
        assert_eq!(session.phase, AuthorizationState::Idle);
        assert!(session.c_nonce().is_none());

        session.advance(AuthorizationState::AuthorizationRequested);
        session.advance(AuthorizationState::CodeCaptured);
        session.advance(AuthorizationState::TokenRequested);
        session.token = Some(TokenResponse {
            access_token: "tok123".to_string(),
            c_nonce: "n0nce".to_string(),
            c_nonce_expires_in: None,
            token_type: None,
            expires_in: None,
        });
        session.advance(AuthorizationState::TokenObtained);

        assert_eq!(session.access_token(), Some("tok123"));
        assert_eq!(session.c_nonce(), Some("n0nce"));
    }
}
