// src/wallet/proof_generation.rs
//! Proof-of-possession tokens for credential requests.
//!
//! A proof is a compact JWS:
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(signature)
//! ```
//!
//! with header `{typ: "openid4vci-proof+jwt", alg, kid}` and claims
//! `{iss: client id, aud: credential issuer, iat, nonce: c_nonce}`. A proof
//! is built fresh for every credential request. Nonce reuse is rejected by
//! the issuer, not here.

use crate::error::KeyError;
use crate::utils::serialization::{decode_json_segment, encode_json_segment, encode_segment};
use crate::wallet::key_management::KeyProvider;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// JWS `typ` of an OID4VCI key proof.
pub const PROOF_TYPE: &str = "openid4vci-proof+jwt";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProofHeader {
    pub typ: String,
    pub alg: String,
    pub kid: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProofClaims {
    /// Client id of the wallet
    pub iss: String,
    /// Credential issuer URL
    pub aud: String,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// `c_nonce` from the token response
    pub nonce: String,
}

/// Builds a signed proof token issued now.
///
/// # Arguments
/// * `key` - Holder key; its `kid` and algorithm go into the header
/// * `client_id` - OAuth client id, becomes `iss`
/// * `audience` - Credential issuer URL, becomes `aud`
/// * `nonce` - The `c_nonce` to bind
///
/// # Errors
/// Returns `KeyError` if encoding or signing fails.
pub fn build_proof(
    key: &dyn KeyProvider,
    client_id: &str,
    audience: &str,
    nonce: &str,
) -> Result<String, KeyError> {
    let claims = ProofClaims {
        iss: client_id.to_string(),
        aud: audience.to_string(),
        iat: Utc::now().timestamp(),
        nonce: nonce.to_string(),
    };
    sign_proof(key, &claims)
}

/// Signs `claims` with `key` as a compact JWS.
pub fn sign_proof(key: &dyn KeyProvider, claims: &ProofClaims) -> Result<String, KeyError> {
    let header = ProofHeader {
        typ: PROOF_TYPE.to_string(),
        alg: key.algorithm().as_jws().to_string(),
        kid: key.key_id().to_string(),
    };

    let signing_input = format!(
        "{}.{}",
        encode_json_segment(&header)?,
        encode_json_segment(claims)?
    );
    let signature = key.sign(signing_input.as_bytes())?;

    Ok(format!("{signing_input}.{}", encode_segment(&signature)))
}

/// Splits a proof token into header and claims without checking the signature.
pub fn decode_unverified(token: &str) -> Result<(ProofHeader, ProofClaims), String> {
    let mut parts = token.split('.');
    let (Some(header), Some(claims), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected three dot-separated segments".to_string());
    };
    Ok((decode_json_segment(header)?, decode_json_segment(claims)?))
}
