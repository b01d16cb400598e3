// src/services/redirect_capture.rs
//! Authorization redirect capture.
//!
//! The holder's redirect URI points at a mockserver instance that records
//! every request it receives. After the user logs in, the browser is sent
//! to `{redirect_uri}?code=...`; this client polls the recorded requests
//! until that redirect shows up and hands back the code.

use crate::error::{AuthorizationError, UpstreamError};
use crate::settings::CaptureSettings;
use crate::utils::http::{expect_success, read_text, send};
use crate::utils::polling::Poller;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// A request recorded by the capture service; only the query is of interest.
#[derive(Deserialize, Debug, Clone, Default)]
struct RecordedRequest {
    #[serde(default, rename = "queryStringParameters")]
    query: BTreeMap<String, Vec<String>>,
}

impl RecordedRequest {
    fn first(&self, name: &str) -> Option<String> {
        self.query.get(name).and_then(|values| values.first()).cloned()
    }
}

pub struct RedirectCapture {
    http: Client,
    base_url: String,
    callback_path: String,
    poller: Poller,
}

impl RedirectCapture {
    /// # Arguments
    /// * `settings` - Capture service root and callback path
    /// * `poller` - Schedule for polling recorded requests
    pub fn new(http: Client, settings: &CaptureSettings, poller: Poller) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            callback_path: settings.callback_path.clone(),
            poller,
        }
    }

    /// Clears recorded requests and registers the callback expectation, so
    /// the browser gets a page back and stale redirects are not picked up.
    pub async fn prepare(&self) -> Result<(), AuthorizationError> {
        let reset = format!("{}/mockserver/reset", self.base_url);
        expect_success(&reset, self.http.put(&reset))
            .await
            .map_err(AuthorizationError::Capture)?;

        let expectation = format!("{}/mockserver/expectation", self.base_url);
        let body = json!({
            "httpRequest": {"path": self.callback_path},
            "httpResponse": {
                "statusCode": 200,
                "body": {"type": "string", "string": "Login Successful"}
            }
        });
        expect_success(&expectation, self.http.put(&expectation).json(&body))
            .await
            .map_err(AuthorizationError::Capture)?;
        info!("capture service ready at {}{}", self.base_url, self.callback_path);
        Ok(())
    }

    fn retrieve_filter(&self, state: Option<&str>) -> Value {
        let mut filter = json!({"path": self.callback_path, "method": "GET"});
        if let Some(state) = state {
            filter["queryStringParameters"] = json!({ "state": [state] });
        }
        filter
    }

    /// Returns the first recorded callback request matching `filter`, if any.
    async fn retrieve(&self, filter: &Value) -> Result<Option<RecordedRequest>, UpstreamError> {
        let url = format!("{}/mockserver/retrieve?type=REQUESTS", self.base_url);
        let response = send(&url, self.http.put(&url).json(filter)).await?;
        let body = read_text(&url, response).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let recorded: Vec<RecordedRequest> =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(recorded.into_iter().next())
    }

    /// Blocks until the authorization redirect is recorded and returns its code.
    ///
    /// # Arguments
    /// * `state` - Only accept redirects carrying this OAuth `state`
    /// * `cancel` - Stops the wait with [`AuthorizationError::Cancelled`]
    ///
    /// # Errors
    /// - [`AuthorizationError::Timeout`] / [`AuthorizationError::Cancelled`]
    /// - [`AuthorizationError::Capture`] if the capture service fails
    /// - [`AuthorizationError::MissingCode`] if the redirect carries an OAuth
    ///   error instead of a code
    pub async fn await_authorization_code(
        &self,
        state: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, AuthorizationError> {
        let filter = self.retrieve_filter(state);
        debug!("waiting for redirect matching {filter}");

        let redirect = self.poller.poll(cancel, || self.retrieve(&filter)).await?;
        match redirect.first("code") {
            Some(code) => {
                info!("authorization code captured");
                Ok(code)
            }
            None => Err(AuthorizationError::MissingCode {
                error: redirect.first("error"),
                description: redirect.first("error_description"),
            }),
        }
    }
}
