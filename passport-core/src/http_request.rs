use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::PassportError;

/// Shared HTTP client for the artifact store, the identity server and the passport backend.
///
/// Every request carries the configured timeout and the [`user_agent`]. Nothing is retried.
#[derive(Debug, Clone)]
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

/// `passport-core/<version>`, sent with every request including JSON-RPC.
pub(crate) fn user_agent() -> String {
    format!("passport-core/{}", env!("CARGO_PKG_VERSION"))
}

impl Request {
    /// Initializes a new `Request` with the given per-request timeout.
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header("User-Agent", user_agent())
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request exactly once.
    ///
    /// Timeouts map to [`PassportError::Timeout`], any other transport failure goes through
    /// `otherwise` so callers can attach their own error variant.
    pub(crate) async fn send(
        &self,
        request_builder: RequestBuilder,
        otherwise: impl FnOnce(String) -> PassportError,
    ) -> Result<Response, PassportError> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| PassportError::SerializationError {
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().to_string();
        client
            .execute(request)
            .await
            .map_err(|err| PassportError::from_reqwest(&url, &err, otherwise))
    }
}
