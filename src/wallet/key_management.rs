// src/wallet/key_management.rs
//! Holder key management for proofs of possession.
//!
//! Keys are reached through the [`KeyProvider`] trait so that the proof
//! generator does not care where key material comes from. Two curves are
//! supported:
//! - secp256k1 ECDSA with SHA-256 (`ES256K`, via the `k256` crate)
//! - Ed25519 (`EdDSA`, via `ring`)
//!
//! and each can be generated fresh for a run or imported from hex.

use crate::error::KeyError;
use crate::settings::{KeyMode, KeySettings, SigningAlgorithm};
use k256::ecdsa::signature::RandomizedSigner;
use k256::ecdsa::{Signature, SigningKey};
use rand::rngs::OsRng;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::sync::Arc;

/// Source of signatures for proof tokens.
pub trait KeyProvider: Send + Sync {
    /// JWS algorithm the signatures are valid for.
    fn algorithm(&self) -> SigningAlgorithm;

    /// DID URL of the verification method (`kid` header).
    fn key_id(&self) -> &str;

    /// Public key bytes (SEC1 compressed for secp256k1, raw for Ed25519).
    fn public_key(&self) -> Vec<u8>;

    /// Signs `message`, returning the JWS signature bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// secp256k1 signing key.
///
/// # Security Notes
/// - Signing is hedged (RFC 6979 plus fresh randomness) and produces low-S
///   signatures, so equal messages still get distinct signatures
/// - The 64-byte output is the fixed-width `R || S` form JWS expects
pub struct Secp256k1Key {
    signing_key: SigningKey,
    key_id: String,
}

impl Secp256k1Key {
    /// Generates a fresh key using the OS random number generator.
    pub fn generate(key_id: impl Into<String>) -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
            key_id: key_id.into(),
        }
    }

    /// Imports a hex-encoded 32-byte scalar (optionally `0x`-prefixed).
    ///
    /// # Errors
    /// Returns `KeyError` if the hex is malformed or the scalar is not a
    /// valid secp256k1 private key.
    pub fn from_hex(private_key_hex: &str, key_id: impl Into<String>) -> Result<Self, KeyError> {
        let bytes = hex::decode(private_key_hex.trim_start_matches("0x"))?;
        let signing_key = SigningKey::from_slice(&bytes).map_err(|e| KeyError::InvalidKey {
            algorithm: "ES256K",
            reason: e.to_string(),
        })?;
        Ok(Self {
            signing_key,
            key_id: key_id.into(),
        })
    }
}

impl KeyProvider for Secp256k1Key {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Es256k
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signature: Signature = self
            .signing_key
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|e| KeyError::Signing {
                algorithm: "ES256K",
                reason: e.to_string(),
            })?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Ed25519 key pair.
pub struct Ed25519Key {
    key_pair: Ed25519KeyPair,
    key_id: String,
}

impl Ed25519Key {
    /// Generates a fresh key pair.
    ///
    /// # Errors
    /// Returns [`KeyError::Generation`] if the system RNG fails.
    pub fn generate(key_id: impl Into<String>) -> Result<Self, KeyError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeyError::Generation)?;
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|e| KeyError::InvalidKey {
            algorithm: "EdDSA",
            reason: e.to_string(),
        })?;
        Ok(Self {
            key_pair,
            key_id: key_id.into(),
        })
    }

    /// Imports a hex-encoded 32-byte seed.
    pub fn from_hex(seed_hex: &str, key_id: impl Into<String>) -> Result<Self, KeyError> {
        let seed = hex::decode(seed_hex.trim_start_matches("0x"))?;
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed).map_err(|e| KeyError::InvalidKey {
            algorithm: "EdDSA",
            reason: e.to_string(),
        })?;
        Ok(Self {
            key_pair,
            key_id: key_id.into(),
        })
    }
}

impl KeyProvider for Ed25519Key {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::EdDsa
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn public_key(&self) -> Vec<u8> {
        self.key_pair.public_key().as_ref().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        Ok(self.key_pair.sign(message).as_ref().to_vec())
    }
}

/// Builds the holder key selected by configuration.
///
/// # Errors
/// Returns `KeyError` if a fixed key is missing or invalid, or if key
/// generation fails.
pub fn key_from_settings(settings: &KeySettings) -> Result<Arc<dyn KeyProvider>, KeyError> {
    let key_id = settings.key_id();
    let provider: Arc<dyn KeyProvider> = match (settings.mode, settings.algorithm) {
        (KeyMode::Ephemeral, SigningAlgorithm::Es256k) => Arc::new(Secp256k1Key::generate(key_id)),
        (KeyMode::Ephemeral, SigningAlgorithm::EdDsa) => Arc::new(Ed25519Key::generate(key_id)?),
        (KeyMode::Fixed, algorithm) => {
            let hex_key = settings
                .private_key_hex
                .as_deref()
                .ok_or(KeyError::InvalidKey {
                    algorithm: algorithm.as_jws(),
                    reason: "no private key configured".to_string(),
                })?;
            match algorithm {
                SigningAlgorithm::Es256k => Arc::new(Secp256k1Key::from_hex(hex_key, key_id)?),
                SigningAlgorithm::EdDsa => Arc::new(Ed25519Key::from_hex(hex_key, key_id)?),
            }
        }
    };
    log::info!(
        "holder key ready ({}, {:?}), kid {}",
        provider.algorithm().as_jws(),
        settings.mode,
        provider.key_id()
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::Verifier;
    use k256::ecdsa::VerifyingKey;
    use ring::signature::{UnparsedPublicKey, ED25519};

    const DEMO_KEY: &str = "2902637d412190fb08f5d0e0b2efc1eefae8060ae151e7951b69afbecbdd452e";

    #[test]
    fn fixed_secp256k1_key_is_stable() {
        let a = Secp256k1Key::from_hex(DEMO_KEY, "did:example:holder#key-0").unwrap();
        let b = Secp256k1Key::from_hex(&format!("0x{DEMO_KEY}"), "did:example:holder#key-0").unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.public_key().len(), 33);
        // hedged signing
        assert_ne!(a.sign(b"msg").unwrap(), b.sign(b"msg").unwrap());
    }

    #[test]
    fn secp256k1_signatures_verify() {
        let key = Secp256k1Key::generate("kid");
        let signature = key.sign(b"header.claims").unwrap();
        assert_eq!(signature.len(), 64);

        let verifying_key = VerifyingKey::from_sec1_bytes(&key.public_key()).unwrap();
        let signature = Signature::from_slice(&signature).unwrap();
        assert!(verifying_key.verify(b"header.claims", &signature).is_ok());
    }

    #[test]
    fn ephemeral_keys_differ() {
        let a = Secp256k1Key::generate("kid");
        let b = Secp256k1Key::generate("kid");
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn ed25519_signatures_verify() {
        let key = Ed25519Key::generate("kid").unwrap();
        let signature = key.sign(b"header.claims").unwrap();
        assert_eq!(signature.len(), 64);

        let public_key = UnparsedPublicKey::new(&ED25519, key.public_key());
        assert!(public_key.verify(b"header.claims", &signature).is_ok());
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(matches!(
            Secp256k1Key::from_hex("zz", "kid"),
            Err(KeyError::InvalidHex(_))
        ));
        assert!(matches!(
            Secp256k1Key::from_hex(&"00".repeat(32), "kid"),
            Err(KeyError::InvalidKey { .. })
        ));
        assert!(matches!(
            Ed25519Key::from_hex("abcd", "kid"),
            Err(KeyError::InvalidKey { .. })
        ));
    }

    #[test]
    fn settings_select_the_provider() {
        let mut settings = KeySettings::default();
        let fixed = key_from_settings(&settings).unwrap();
        assert_eq!(fixed.algorithm(), SigningAlgorithm::Es256k);
        assert!(fixed.key_id().ends_with("#key-0"));

        settings.mode = KeyMode::Ephemeral;
        settings.algorithm = SigningAlgorithm::EdDsa;
        let ephemeral = key_from_settings(&settings).unwrap();
        assert_eq!(ephemeral.algorithm(), SigningAlgorithm::EdDsa);
        assert_eq!(ephemeral.public_key().len(), 32);
    }
}
