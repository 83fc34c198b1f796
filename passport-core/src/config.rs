//! Immutable SDK configuration.
//!
//! Everything the SDK needs to reach its collaborators is passed in once, at construction.
//! Nothing is read from the process environment or bundle at call time.

use std::time::Duration;

use alloy_primitives::Address;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{error::PassportError, primitives::ParseFromForeignBinding};

/// Public artifact host serving the compiled contract JSON files.
pub const DEFAULT_ARTIFACT_BASE_URL: &str =
    "https://unpkg.com/@credenza-web3/contracts/artifacts";

/// Scopes requested during the OAuth2 authorization step.
pub const DEFAULT_SCOPE: &str =
    "openid profile email phone blockchain.evm.write blockchain.evm";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a [`crate::Passport`] instance.
///
/// Usually built from JSON with [`PassportConfig::from_json`]:
///
/// ```json
/// {
///   "chain_id": 80001,
///   "rpc_url": "https://rpc.example.org",
///   "account_base_url": "https://accounts.example.org",
///   "evm_base_url": "https://evm.example.org",
///   "pass_code_base_url": "https://passport.example.org",
///   "client_id": "passport-ios",
///   "client_secret": "...",
///   "redirect_uri": "passport://oauth/callback",
///   "nft_contract_address": "0x4d20968f609bf10e06495529590623d5d858c5c7",
///   "stored_value_contract_address": "0x893fbeddadfdfb836cc069902f7270ea56fd6ebf",
///   "connected_contract_address": "0x61ff3d77ab2befece7b1c8e0764ac973ad85a9ef"
/// }
/// ```
#[derive(Debug, Deserialize, uniffi::Object)]
pub struct PassportConfig {
    /// EVM chain id every transaction is signed for.
    pub chain_id: u64,
    /// JSON-RPC base URL. Requests go to `{rpc_url}/{chain_id}`.
    pub rpc_url: String,
    /// Base URL of the contract artifact store.
    #[serde(default = "default_artifact_base_url")]
    pub artifact_base_url: String,
    /// OAuth2 identity server base URL (`/authorize`, `/token`).
    pub account_base_url: String,
    /// Account/EVM REST backend (`/address`, `/sign`).
    pub evm_base_url: String,
    /// Passport backend (`/auth`, passes, discounts, scans).
    pub pass_code_base_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: SecretString,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// Space separated OAuth2 scopes.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Hex-encoded private key used for write transactions. Writes fail with
    /// `SignerUnavailable` when absent.
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub signer_private_key: Option<SecretString>,
    /// Membership NFT contract.
    pub nft_contract_address: String,
    /// Stored-value (ERC-20) contract.
    pub stored_value_contract_address: String,
    /// Connected-packaging contract.
    pub connected_contract_address: String,
    /// Timeout applied to every network call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_artifact_base_url() -> String {
    DEFAULT_ARTIFACT_BASE_URL.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from))
}

#[uniffi::export]
impl PassportConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the JSON is malformed or a value fails validation.
    #[uniffi::constructor]
    pub fn from_json(config: &str) -> Result<Self, PassportError> {
        let config: Self =
            serde_json::from_str(config).map_err(|e| PassportError::InvalidConfig {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Configured chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Whether a signer key has been provided.
    #[must_use]
    pub const fn has_signer(&self) -> bool {
        self.signer_private_key.is_some()
    }
}

impl PassportConfig {
    /// Checks URLs, addresses and numeric bounds.
    ///
    /// # Errors
    /// Returns `InvalidConfig` naming the first offending attribute.
    pub fn validate(&self) -> Result<(), PassportError> {
        if self.chain_id == 0 {
            return Err(invalid("chain_id", "must be non-zero"));
        }
        for (attribute, url) in [
            ("rpc_url", &self.rpc_url),
            ("artifact_base_url", &self.artifact_base_url),
            ("account_base_url", &self.account_base_url),
            ("evm_base_url", &self.evm_base_url),
            ("pass_code_base_url", &self.pass_code_base_url),
            ("redirect_uri", &self.redirect_uri),
        ] {
            Url::parse(url).map_err(|e| invalid(attribute, &e.to_string()))?;
        }
        if self.client_id.trim().is_empty() {
            return Err(invalid("client_id", "must not be empty"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(invalid("client_secret", "must not be empty"));
        }
        for (attribute, address) in [
            ("nft_contract_address", &self.nft_contract_address),
            (
                "stored_value_contract_address",
                &self.stored_value_contract_address,
            ),
            ("connected_contract_address", &self.connected_contract_address),
        ] {
            Address::parse_from_ffi(address, attribute)
                .map_err(|e| invalid(attribute, &e.to_string()))?;
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be non-zero"));
        }
        Ok(())
    }

    /// JSON-RPC endpoint for the configured chain.
    #[must_use]
    pub fn rpc_endpoint(&self) -> String {
        format!("{}/{}", self.rpc_url.trim_end_matches('/'), self.chain_id)
    }

    /// Timeout applied to every network call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn nft_contract(&self) -> Result<Address, PassportError> {
        Address::parse_from_ffi(&self.nft_contract_address, "nft_contract_address")
    }

    pub(crate) fn stored_value_contract(&self) -> Result<Address, PassportError> {
        Address::parse_from_ffi(
            &self.stored_value_contract_address,
            "stored_value_contract_address",
        )
    }

    pub(crate) fn connected_contract(&self) -> Result<Address, PassportError> {
        Address::parse_from_ffi(
            &self.connected_contract_address,
            "connected_contract_address",
        )
    }
}

fn invalid(attribute: &str, reason: &str) -> PassportError {
    PassportError::InvalidConfig {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
}
