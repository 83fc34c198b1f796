//! Ethereum JSON-RPC access.
//!
//! Only the three methods the SDK needs are wrapped: `eth_getTransactionCount`, `eth_call` and
//! `eth_sendRawTransaction`. [`ChainRpc`] is the seam the chain can be replaced at in tests;
//! [`AlloyRpc`] is the production implementation over an `alloy` provider.

use std::time::Duration;

use alloy_eips::BlockId;
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use alloy_transport::{TransportError, TransportErrorKind};
use alloy_transport_http::Http;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Url;

use crate::{error::PassportError, http_request::user_agent};

/// Failure of a single JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The node did not answer within the request timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Endpoint that timed out.
        url: String,
    },
    /// The endpoint answered with a non-success HTTP status.
    #[error("endpoint answered HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },
    /// The request could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC `error` object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Node supplied message, e.g. `nonce too low`.
        message: String,
    },
    /// The response could not be interpreted.
    #[error("malformed rpc response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Converts into a [`PassportError`], keeping timeouts distinct.
    pub(crate) fn into_passport_error(
        self,
        otherwise: impl FnOnce(String) -> PassportError,
    ) -> PassportError {
        match self {
            Self::Timeout { url } => PassportError::Timeout { url },
            other => otherwise(other.to_string()),
        }
    }

    /// Whether another attempt of a read could succeed: 429, 5xx, timeouts and failures to
    /// reach the node.
    pub(crate) const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::Rpc { .. } | Self::Malformed(_) => false,
        }
    }

    fn from_transport(url: &Url, err: TransportError) -> Self {
        match err {
            TransportError::ErrorResp(payload) => Self::Rpc {
                code: payload.code,
                message: payload.message.into_owned(),
            },
            TransportError::Transport(TransportErrorKind::HttpError(http)) => {
                Self::Http {
                    status: http.status,
                }
            }
            TransportError::Transport(TransportErrorKind::Custom(source)) => {
                match source.downcast_ref::<reqwest::Error>() {
                    Some(err) if err.is_timeout() => Self::Timeout {
                        url: url.to_string(),
                    },
                    _ => Self::Transport(source.to_string()),
                }
            }
            TransportError::Transport(kind) => Self::Transport(kind.to_string()),
            TransportError::NullResp => Self::Malformed("null response".to_string()),
            TransportError::DeserError { err, .. } => Self::Malformed(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Typed access to the three JSON-RPC methods the SDK uses.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_getTransactionCount(address, "latest")`.
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError>;

    /// `eth_call({to, data}, "latest")`, returning the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;

    /// `eth_sendRawTransaction(raw)`, returning the transaction hash reported by the node.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError>;
}

/// JSON-RPC over HTTP through an `alloy` provider.
///
/// Every request carries the configured timeout. Only `eth_call` is retried; a rejected write
/// is never resent.
#[derive(Debug, Clone)]
pub struct AlloyRpc {
    provider: RootProvider,
    url: Url,
    max_retries: usize,
}

impl AlloyRpc {
    /// Creates a provider posting to `endpoint`.
    ///
    /// # Errors
    /// `InvalidConfig` if `endpoint` is not a URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PassportError> {
        let url = Url::parse(endpoint).map_err(|err| PassportError::InvalidConfig {
            attribute: "rpc_url".to_string(),
            reason: format!("{endpoint}: {err}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|err| PassportError::InvalidConfig {
                attribute: "rpc_url".to_string(),
                reason: format!("http client: {err}"),
            })?;
        let transport = Http::with_client(client, url.clone());
        let provider = RootProvider::new(RpcClient::new(transport, false));
        Ok(Self {
            provider,
            url,
            max_retries: 3, // total attempts = 4
        })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries)
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        log::trace!("eth_getTransactionCount {address}");
        self.provider
            .get_transaction_count(address)
            .block_id(BlockId::latest())
            .await
            .map_err(|err| RpcError::from_transport(&self.url, err))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        log::trace!("eth_call {to}");
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));
        (|| async {
            self.provider
                .call(request.clone())
                .block(BlockId::latest())
                .await
                .map_err(|err| RpcError::from_transport(&self.url, err))
        })
        .retry(self.backoff())
        .when(RpcError::is_transient)
        .notify(|err, delay| log::debug!("retrying eth_call to {to} in {delay:?}: {err}"))
        .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        log::trace!("eth_sendRawTransaction ({} bytes)", raw.len());
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|err| RpcError::from_transport(&self.url, err))?;
        Ok(*pending.tx_hash())
    }
}
