// src/services/metadata_resolver.rs
//! Discovery of issuer and authorization server metadata.
//!
//! Both documents are fetched once, decoded into typed records and never
//! retried. When the agent advertises container-internal URLs, an optional
//! [`UrlRewrite`] maps them onto the externally reachable base URL.

use crate::error::DiscoveryError;
use crate::models::metadata::{AuthServerMetadata, IssuerMetadata};
use crate::settings::RewriteSettings;
use crate::utils::http::fetch_json;
use log::{debug, info};
use reqwest::Client;

const ISSUER_METADATA_PATH: &str = ".well-known/openid-credential-issuer";
const AUTH_SERVER_METADATA_PATH: &str = ".well-known/openid-configuration";

/// Base URL substitution, `from` prefix replaced by `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewrite {
    from: String,
    to: String,
}

impl UrlRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Builds the rewrite configured in `settings`, if enabled.
    pub fn from_settings(settings: &RewriteSettings) -> Option<Self> {
        match (settings.enabled, &settings.from, &settings.to) {
            (true, Some(from), Some(to)) if !from.is_empty() => Some(Self::new(from, to)),
            _ => None,
        }
    }

    /// Rewrites `url` if it lies under the internal base.
    ///
    /// URLs already under the external base are left alone, so applying the
    /// rewrite again is a no-op even when `to` itself starts with `from`.
    pub fn apply(&self, url: &str) -> String {
        if under_base(url, &self.to).is_some() {
            return url.to_string();
        }
        match under_base(url, &self.from) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => url.to_string(),
        }
    }

    fn apply_in_place(&self, url: &mut String) {
        let rewritten = self.apply(url);
        if rewritten != *url {
            debug!("rewrote {url} -> {rewritten}");
            *url = rewritten;
        }
    }

    /// Rewrites the endpoints of `metadata` the holder will call.
    pub fn apply_to_issuer(&self, metadata: &mut IssuerMetadata) {
        self.apply_in_place(&mut metadata.credential_issuer);
        self.apply_in_place(&mut metadata.credential_endpoint);
    }
}

/// The part of `url` after `base`, if `base` ends on a URL component
/// boundary (`http://agent:80` is not a base of `http://agent:8080/x`).
fn under_base<'a>(url: &'a str, base: &str) -> Option<&'a str> {
    let rest = url.strip_prefix(base)?;
    let at_boundary = base.ends_with('/')
        || rest.is_empty()
        || rest.starts_with(|c| matches!(c, '/' | '?' | '#'));
    at_boundary.then_some(rest)
}

/// Fetches discovery documents for the holder.
pub struct MetadataResolver {
    http: Client,
    rewrite: Option<UrlRewrite>,
}

fn well_known(root: &str, path: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), path)
}

impl MetadataResolver {
    pub fn new(http: Client, rewrite: Option<UrlRewrite>) -> Self {
        Self { http, rewrite }
    }

    /// `GET {issuer_root}/.well-known/openid-credential-issuer`
    ///
    /// # Errors
    /// [`DiscoveryError::MetadataUnavailable`] on transport failure, non-2xx
    /// status or a body missing required members.
    pub async fn fetch_issuer_metadata(&self, issuer_root: &str) -> Result<IssuerMetadata, DiscoveryError> {
        let root = match &self.rewrite {
            Some(rewrite) => rewrite.apply(issuer_root),
            None => issuer_root.to_string(),
        };
        let url = well_known(&root, ISSUER_METADATA_PATH);
        let mut metadata: IssuerMetadata = fetch_json(&url, self.http.get(&url))
            .await
            .map_err(|source| DiscoveryError::MetadataUnavailable {
                url: url.clone(),
                source,
            })?;

        if let Some(rewrite) = &self.rewrite {
            rewrite.apply_to_issuer(&mut metadata);
        }
        info!(
            "credential issuer {} (credential endpoint {})",
            metadata.credential_issuer, metadata.credential_endpoint
        );
        Ok(metadata)
    }

    /// `GET {auth_server_root}/.well-known/openid-configuration`
    ///
    /// # Errors
    /// [`DiscoveryError::MetadataUnavailable`] as for issuer metadata.
    pub async fn fetch_auth_server_metadata(
        &self,
        auth_server_root: &str,
    ) -> Result<AuthServerMetadata, DiscoveryError> {
        let url = well_known(auth_server_root, AUTH_SERVER_METADATA_PATH);
        let metadata: AuthServerMetadata = fetch_json(&url, self.http.get(&url))
            .await
            .map_err(|source| DiscoveryError::MetadataUnavailable {
                url: url.clone(),
                source,
            })?;
        info!("authorization server {}", metadata.issuer);
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use serde_json::json;

    #[test]
    fn rewrite_is_idempotent() {
        let rewrite = UrlRewrite::new("http://cloud-agent:8085", "http://localhost:8080/cloud-agent");
        let internal = "http://cloud-agent:8085/oid4vci/issuers/1/credentials";

        let once = rewrite.apply(internal);
        assert_eq!(once, "http://localhost:8080/cloud-agent/oid4vci/issuers/1/credentials");
        assert_eq!(rewrite.apply(&once), once);
    }

    #[test]
    fn rewrite_is_idempotent_when_target_extends_source() {
        let rewrite = UrlRewrite::new("http://localhost:8080", "http://localhost:8080/cloud-agent");
        let once = rewrite.apply("http://localhost:8080/oid4vci/issuers/1");
        assert_eq!(once, "http://localhost:8080/cloud-agent/oid4vci/issuers/1");
        assert_eq!(rewrite.apply(&once), once);
    }

    #[test]
    fn rewrite_leaves_foreign_urls() {
        let rewrite = UrlRewrite::new("http://cloud-agent:8085", "http://localhost:8080");
        assert_eq!(rewrite.apply("http://keycloak:8080/realms/x"), "http://keycloak:8080/realms/x");
    }

    #[test]
    fn rewrite_respects_component_boundaries() {
        let rewrite = UrlRewrite::new("http://cloud-agent:8085", "http://localhost:8080");
        assert_eq!(rewrite.apply("http://cloud-agent:80850/x"), "http://cloud-agent:80850/x");
        assert_eq!(rewrite.apply("http://cloud-agent:8085"), "http://localhost:8080");
        assert_eq!(rewrite.apply("http://cloud-agent:8085?a=1"), "http://localhost:8080?a=1");
        assert_eq!(rewrite.apply("http://cloud-agent:8085/x"), "http://localhost:8080/x");
    }

    #[test]
    fn disabled_rewrite_is_absent() {
        let mut settings = RewriteSettings {
            enabled: false,
            from: Some("http://a".to_string()),
            to: Some("http://b".to_string()),
        };
        assert!(UrlRewrite::from_settings(&settings).is_none());
        settings.enabled = true;
        assert_eq!(
            UrlRewrite::from_settings(&settings),
            Some(UrlRewrite::new("http://a", "http://b"))
        );
    }

    #[tokio::test]
    async fn rewrites_fetched_issuer_metadata() {
        let mut server = mockito::Server::new_async().await;
        let external = server.url();
        let mock = server
            .mock("GET", "/oid4vci/issuers/1/.well-known/openid-credential-issuer")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "credential_issuer": "http://cloud-agent:8085/oid4vci/issuers/1",
                    "credential_endpoint": "http://cloud-agent:8085/oid4vci/issuers/1/credentials",
                    "authorization_servers": ["http://keycloak:8080/realms/students"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resolver = MetadataResolver::new(
            Client::new(),
            Some(UrlRewrite::new("http://cloud-agent:8085", external.clone())),
        );
        let mut metadata = resolver
            .fetch_issuer_metadata("http://cloud-agent:8085/oid4vci/issuers/1")
            .await
            .unwrap();

        assert_eq!(metadata.credential_issuer, format!("{external}/oid4vci/issuers/1"));
        assert_eq!(
            metadata.credential_endpoint,
            format!("{external}/oid4vci/issuers/1/credentials")
        );
        let before = metadata.clone();
        UrlRewrite::new("http://cloud-agent:8085", external).apply_to_issuer(&mut metadata);
        assert_eq!(metadata, before);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn shape_mismatch_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/openid-configuration")
            .with_body(json!({"issuer": "http://kc"}).to_string())
            .create_async()
            .await;

        let resolver = MetadataResolver::new(Client::new(), None);
        let err = resolver.fetch_auth_server_metadata(&server.url()).await.unwrap_err();
        match err {
            DiscoveryError::MetadataUnavailable { url, source } => {
                assert!(url.ends_with("/.well-known/openid-configuration"));
                assert!(matches!(source, UpstreamError::Decode { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/.well-known/openid-credential-issuer")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let resolver = MetadataResolver::new(Client::new(), None);
        let err = resolver.fetch_issuer_metadata(&format!("{}/", server.url())).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::MetadataUnavailable { source: UpstreamError::Status { .. }, .. }
        ));
        mock.assert_async().await;
    }
}
