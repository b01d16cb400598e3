// src/error.rs
//! Error taxonomy for the issuance ceremony.
//!
//! Every external call that does not succeed is wrapped into one of the
//! step-specific kinds below, carrying the upstream URL, HTTP status and
//! body so a failed run can be diagnosed from the top-level report alone.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to one of the collaborating HTTP services.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never produced a response (connection refused, DNS, ...).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-2xx status.
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The service answered 2xx but the body did not have the expected shape.
    #[error("{url} returned an unexpected body: {reason}")]
    Decode { url: String, reason: String },
}

/// Outcome of a poll loop that ended without producing a value.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("gave up after waiting {waited:?}")]
    Timeout { waited: Duration },

    #[error("polling was cancelled")]
    Cancelled,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Issuer preparation failures (DID, schema, issuer, configuration).
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{step} failed: {source}")]
    Upstream {
        step: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error("no issuing DID available after creation was requested")]
    NoIdentity,

    #[error("waiting for DID {did} to be published: {source}")]
    Publication {
        did: String,
        #[source]
        source: PollError,
    },
}

/// Malformed or incomplete credential offers.
#[derive(Debug, Error)]
pub enum OfferError {
    #[error("offer request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("malformed credential offer URI {uri}: {reason}")]
    MalformedOffer { uri: String, reason: String },

    #[error("credential offer has no grants.authorization_code.issuer_state")]
    MissingGrant,
}

/// Discovery document failures. Never retried.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("metadata unavailable at {url}: {source}")]
    MetadataUnavailable {
        url: String,
        #[source]
        source: UpstreamError,
    },

    #[error("issuer metadata at {url} lists no authorization server")]
    NoAuthorizationServer { url: String },
}

/// Failures between the authorization request and the token response.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("no authorization redirect captured within {waited:?}")]
    Timeout { waited: Duration },

    #[error("waiting for the authorization redirect was cancelled")]
    Cancelled,

    #[error("callback capture service failed: {0}")]
    Capture(UpstreamError),

    #[error("authorization redirect carried no code (error: {error:?}, description: {description:?})")]
    MissingCode {
        error: Option<String>,
        description: Option<String>,
    },

    #[error("invalid authorization endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("token exchange rejected: {0}")]
    TokenExchange(UpstreamError),
}

impl From<PollError> for AuthorizationError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Timeout { waited } => AuthorizationError::Timeout { waited },
            PollError::Cancelled => AuthorizationError::Cancelled,
            PollError::Upstream(source) => AuthorizationError::Capture(source),
        }
    }
}

/// The issuer rejected the credential request (proof, claims, token).
#[derive(Debug, Error)]
#[error("credential request failed: {0}")]
pub struct CredentialRequestError(#[from] pub UpstreamError);

/// Holder key import and proof signing failures.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid private key hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid {algorithm} private key: {reason}")]
    InvalidKey {
        algorithm: &'static str,
        reason: String,
    },

    #[error("{algorithm} signing failed: {reason}")]
    Signing {
        algorithm: &'static str,
        reason: String,
    },

    #[error("key generation failed")]
    Generation,

    #[error("could not encode proof: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Any failure that aborts the ceremony.
#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error("issuer setup: {0}")]
    Setup(#[from] SetupError),

    #[error("credential offer: {0}")]
    Offer(#[from] OfferError),

    #[error("discovery: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("authorization: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("proof: {0}")]
    Proof(#[from] KeyError),

    #[error(transparent)]
    CredentialRequest(#[from] CredentialRequestError),
}
