// src/settings.rs
//! Runtime configuration for the issuance ceremony.
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (the local docker-compose demo topology)
//! 2. An optional TOML file, `vci-ceremony.toml` or the path in `VCI_CONFIG`
//! 3. Environment variables prefixed with `VCI`, nested with `__`
//!    (e.g. `VCI_AGENT__BASE_URL`, `VCI_HOLDER__KEY__MODE`)
//!
//! The resulting [`Settings`] value is handed to each component when it is
//! constructed; nothing reads configuration from globals afterwards.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "vci-ceremony.toml";

/// Largest accepted poll interval growth factor.
const MAX_BACKOFF: f64 = 10.0;

/// Private key of the demo holder's assertion key (secp256k1).
const DEMO_HOLDER_PRIVATE_KEY_HEX: &str =
    "2902637d412190fb08f5d0e0b2efc1eefae8060ae151e7951b69afbecbdd452e";

/// Long-form PRISM DID of the demo holder, resolvable without a ledger.
const DEMO_HOLDER_DID: &str = "did:prism:73196107e806b084d44339c847a3ae8dd279562f23895583f62cc91a2ee5b8fe:CnsKeRI8CghtYXN0ZXItMBABSi4KCXNlY3AyNTZrMRIhArrplJNfQYxthryRU87XdODy-YWUh5mqrvIfAdoZFeJBEjkKBWtleS0wEAJKLgoJc2VjcDI1NmsxEiEC8rsFplfYvRLazdWWi3LNR1gaAQXb-adVhZacJT4ntwE";

/// Placeholder key reference used with freshly generated keys.
pub const EPHEMERAL_KEY_ID: &str =
    "did:prism:0000000000000000000000000000000000000000000000000000000000000000#key-1";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub agent: AgentSettings,
    pub authorization_server: AuthorizationServerSettings,
    pub holder: HolderSettings,
    pub capture: CaptureSettings,
    pub polling: PollingSettings,
    pub metadata_rewrite: RewriteSettings,
}

/// Issuer agent (DID registrar, schema registry, OID4VCI issuer API).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent root, e.g. `http://localhost:8080/cloud-agent`
    pub base_url: String,
    /// Sent as the `apikey` header when present
    pub api_key: Option<String>,
    /// Root used to build `schemaId` URLs; the agent URL when absent
    pub schema_base_url: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/cloud-agent".to_string(),
            api_key: None,
            schema_base_url: None,
        }
    }
}

impl AgentSettings {
    /// Root under which registered schemas are dereferenced by the issuer.
    pub fn schema_base_url(&self) -> &str {
        self.schema_base_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Authorization server the credential issuer delegates to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorizationServerSettings {
    pub url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for AuthorizationServerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9980/realms/students".to_string(),
            client_id: None,
            client_secret: None,
        }
    }
}

/// How the holder's proof key is obtained.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Generate a fresh key for this run.
    Ephemeral,
    /// Import `private_key_hex`.
    #[default]
    Fixed,
}

/// JWS algorithm used for proofs of possession.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
pub enum SigningAlgorithm {
    /// ECDSA over secp256k1 with SHA-256.
    #[default]
    #[serde(rename = "ES256K")]
    Es256k,
    /// Ed25519.
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl SigningAlgorithm {
    /// The JWS `alg` header value.
    pub fn as_jws(&self) -> &'static str {
        match self {
            SigningAlgorithm::Es256k => "ES256K",
            SigningAlgorithm::EdDsa => "EdDSA",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    pub mode: KeyMode,
    pub algorithm: SigningAlgorithm,
    /// Hex-encoded scalar (secp256k1) or seed (Ed25519); fixed mode only
    pub private_key_hex: Option<String>,
    /// DID URL placed in the proof's `kid` header
    pub key_id: Option<String>,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            mode: KeyMode::Fixed,
            algorithm: SigningAlgorithm::Es256k,
            private_key_hex: Some(DEMO_HOLDER_PRIVATE_KEY_HEX.to_string()),
            key_id: None,
        }
    }
}

impl KeySettings {
    /// The `kid` to advertise when none is configured: the demo holder's
    /// assertion key for the demo key, a placeholder for generated keys.
    pub fn key_id(&self) -> String {
        match (&self.key_id, self.mode) {
            (Some(kid), _) => kid.clone(),
            (None, KeyMode::Fixed) => format!("{DEMO_HOLDER_DID}#key-0"),
            (None, KeyMode::Ephemeral) => EPHEMERAL_KEY_ID.to_string(),
        }
    }

    fn uses_demo_key(&self) -> bool {
        self.private_key_hex.as_deref() == Some(DEMO_HOLDER_PRIVATE_KEY_HEX)
    }
}

/// The wallet side of the ceremony.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HolderSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub credential_configuration_id: String,
    pub key: KeySettings,
    /// Send a random OAuth `state` and only accept redirects carrying it
    pub correlate_redirects: bool,
}

impl Default for HolderSettings {
    fn default() -> Self {
        Self {
            client_id: "alice-wallet".to_string(),
            redirect_uri: "http://localhost:7777/cb".to_string(),
            credential_configuration_id: "UniversityDegreeCredential".to_string(),
            key: KeySettings::default(),
            correlate_redirects: false,
        }
    }
}

/// Callback capture service recording the authorization redirect.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub base_url: String,
    pub callback_path: String,
    /// Reset the service and register the callback expectation first
    pub prepare: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7777".to_string(),
            callback_path: "/cb".to_string(),
            prepare: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub did_interval_ms: u64,
    pub redirect_interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff: f64,
    pub did_timeout_secs: Option<u64>,
    pub redirect_timeout_secs: Option<u64>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            did_interval_ms: 2_000,
            redirect_interval_ms: 1_000,
            max_interval_ms: 10_000,
            backoff: 1.0,
            did_timeout_secs: Some(300),
            redirect_timeout_secs: Some(600),
        }
    }
}

impl PollingSettings {
    pub fn did_interval(&self) -> Duration {
        Duration::from_millis(self.did_interval_ms)
    }

    pub fn redirect_interval(&self) -> Duration {
        Duration::from_millis(self.redirect_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn did_timeout(&self) -> Option<Duration> {
        self.did_timeout_secs.map(Duration::from_secs)
    }

    pub fn redirect_timeout(&self) -> Option<Duration> {
        self.redirect_timeout_secs.map(Duration::from_secs)
    }
}

/// Internal-to-external base URL substitution for issuer metadata.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RewriteSettings {
    pub enabled: bool,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Settings {
    /// Loads settings from the optional config file and `VCI_*` environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if a source cannot be parsed or the merged
    /// values fail [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("VCI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let settings: Settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("VCI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects combinations the components cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = &self.holder.key;
        if key.mode == KeyMode::Fixed {
            match &key.private_key_hex {
                None => {
                    return Err(ConfigError::Message(
                        "holder.key.private_key_hex is required in fixed key mode".to_string(),
                    ))
                }
                Some(hex_key) if hex::decode(hex_key.trim_start_matches("0x")).is_err() => {
                    return Err(ConfigError::Message(
                        "holder.key.private_key_hex is not valid hex".to_string(),
                    ))
                }
                Some(_) => {}
            }
            if key.key_id.is_none() && !key.uses_demo_key() {
                return Err(ConfigError::Message(
                    "holder.key.key_id is required for an imported key".to_string(),
                ));
            }
        }

        if self.metadata_rewrite.enabled
            && (self.metadata_rewrite.from.is_none() || self.metadata_rewrite.to.is_none())
        {
            return Err(ConfigError::Message(
                "metadata_rewrite requires both `from` and `to` when enabled".to_string(),
            ));
        }

        let backoff = self.polling.backoff;
        if !backoff.is_finite() || !(1.0..=MAX_BACKOFF).contains(&backoff) {
            return Err(ConfigError::Message(format!(
                "polling.backoff must be between 1.0 and {MAX_BACKOFF}"
            )));
        }

        if self.authorization_server.client_secret.is_some()
            && self.authorization_server.client_id.is_none()
        {
            return Err(ConfigError::Message(
                "authorization_server.client_secret needs a client_id".to_string(),
            ));
        }

        Ok(())
    }
}
