// src/utils/http.rs
//! Response handling shared by every HTTP collaborator client.

use crate::error::UpstreamError;
use log::debug;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Sends `request`, mapping transport failures onto [`UpstreamError::Transport`].
pub async fn send(url: &str, request: RequestBuilder) -> Result<Response, UpstreamError> {
    request.send().await.map_err(|source| UpstreamError::Transport {
        url: url.to_string(),
        source,
    })
}

/// Reads the body of a response, failing with the upstream status and body
/// text on anything other than 2xx.
pub async fn read_text(url: &str, response: Response) -> Result<String, UpstreamError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| UpstreamError::Transport {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(UpstreamError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }
    debug!("{url} -> {status}: {body}");
    Ok(body)
}

/// Reads and decodes a JSON body into `T`.
pub async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, UpstreamError> {
    let body = read_text(url, response).await?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Sends `request` and decodes a JSON response.
pub async fn fetch_json<T: DeserializeOwned>(url: &str, request: RequestBuilder) -> Result<T, UpstreamError> {
    let response = send(url, request).await?;
    read_json(url, response).await
}

/// Sends `request`, only checking for a 2xx status.
pub async fn expect_success(url: &str, request: RequestBuilder) -> Result<(), UpstreamError> {
    let response = send(url, request).await?;
    read_text(url, response).await.map(|_| ())
}
