use thiserror::Error;

/// Error outputs from the Passport SDK.
#[derive(Debug, Clone, Error, PartialEq, Eq, uniffi::Error)]
pub enum PassportError {
    /// The contract ABI could not be fetched or the artifact did not contain an `abi` array.
    #[error("abi_fetch_error for {contract_type}: {error}")]
    AbiFetchError {
        /// Logical contract name that was requested.
        contract_type: String,
        /// Underlying cause.
        error: String,
    },

    /// The provided string is not a well-formed hex EVM address.
    #[error("invalid_address for {attribute}: {reason}")]
    InvalidAddress {
        /// Name of the argument that failed to parse.
        attribute: String,
        /// Parser explanation.
        reason: String,
    },

    /// The ABI document is not a JSON array of descriptor objects.
    #[error("abi_parse_error: {error}")]
    AbiParseError {
        /// Underlying cause.
        error: String,
    },

    /// A read-only contract call failed (encoding, RPC or decoding).
    #[error("contract_call_error on {function}: {error}")]
    ContractCallError {
        /// Contract function that was called.
        function: String,
        /// Underlying cause.
        error: String,
    },

    /// The signer's nonce could not be fetched from the chain.
    #[error("nonce_fetch_error: {error}")]
    NonceFetchError {
        /// Underlying cause.
        error: String,
    },

    /// No signer is configured or the configured private key is malformed.
    #[error("signer_unavailable: {reason}")]
    SignerUnavailable {
        /// Why the signer could not be used.
        reason: String,
    },

    /// Building or signing the transaction failed.
    #[error("signing_error: {error}")]
    SigningError {
        /// Underlying cause.
        error: String,
    },

    /// The node rejected the signed transaction.
    #[error("broadcast_error: {error}")]
    BroadcastError {
        /// Underlying cause.
        error: String,
    },

    /// The operation requires a logged in session.
    #[error("not_logged_in")]
    NotLoggedIn,

    /// The authorization redirect did not carry a usable code.
    #[error("authorization_denied: {reason}")]
    AuthorizationDenied {
        /// Why the authorization was rejected.
        reason: String,
    },

    /// The token endpoint rejected the code exchange.
    #[error("token_exchange_error: {error}")]
    TokenExchangeError {
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Underlying cause.
        error: String,
    },

    /// The scanned payload is not a recognized format or `scanType`.
    #[error("invalid_scan_payload: {reason}")]
    InvalidScanPayload {
        /// Why the payload was rejected.
        reason: String,
    },

    /// A required parameter was missing or empty.
    #[error("missing_parameters: {parameter}")]
    MissingParameters {
        /// Name of the missing parameter.
        parameter: String,
    },

    /// A network call did not complete within the configured timeout.
    #[error("timeout: {url}")]
    Timeout {
        /// Target of the request that timed out.
        url: String,
    },

    /// Network connection error with details.
    #[error("network_error at {url}: {error}")]
    NetworkError {
        /// Target of the request.
        url: String,
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Underlying cause.
        error: String,
    },

    /// Unexpected error serializing or deserializing information.
    #[error("serialization_error: {error}")]
    SerializationError {
        /// Underlying cause.
        error: String,
    },

    /// The SDK configuration is invalid.
    #[error("invalid_config for {attribute}: {reason}")]
    InvalidConfig {
        /// Configuration key that failed validation.
        attribute: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The host session store failed to load, persist or clear the token.
    #[error("session_store_error: {error}")]
    SessionStoreError {
        /// Underlying cause reported by the host.
        error: String,
    },

    /// A login step was attempted out of order.
    #[error("invalid_session_state: expected {expected}, found {actual}")]
    InvalidSessionState {
        /// State the step requires.
        expected: String,
        /// State the session was in.
        actual: String,
    },

    /// The presented data is not a valid U256 integer.
    #[error("invalid_number")]
    InvalidNumber,
}

/// Convenience alias used across the crate.
pub type PassportResult<T, E = PassportError> = std::result::Result<T, E>;

impl PassportError {
    /// Maps a transport failure, keeping timeouts distinct from every other failure.
    pub(crate) fn from_reqwest(
        url: &str,
        err: &reqwest::Error,
        otherwise: impl FnOnce(String) -> Self,
    ) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            otherwise(err.to_string())
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PassportError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::SessionStoreError {
            error: error.reason,
        }
    }
}
