//! Account/EVM REST backend: custodial address lookup and message signing.

use alloy_primitives::Address;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    config::PassportConfig, error::PassportError, http_request::Request,
    primitives::ParseFromForeignBinding,
};

#[derive(Deserialize)]
struct AddressResponse {
    address: String,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    method: &'static str,
    params: [&'a str; 2],
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

/// Client for `{evm_base_url}/address` and `{evm_base_url}/sign`.
#[derive(Debug)]
pub struct AccountClient {
    evm_base_url: String,
    request: Request,
}

impl AccountClient {
    /// Builds the client from the SDK configuration.
    #[must_use]
    pub fn from_config(config: &PassportConfig) -> Self {
        Self {
            evm_base_url: config.evm_base_url.trim_end_matches('/').to_string(),
            request: Request::new(config.request_timeout()),
        }
    }

    /// Address of the user's custodial account.
    ///
    /// # Errors
    /// `NetworkError` on transport failure or non-200, `InvalidAddress` if the backend returns a
    /// malformed address, `Timeout`.
    pub async fn get_address(&self, access_token: &SecretString) -> Result<Address, PassportError> {
        let url = format!("{}/address", self.evm_base_url);
        let builder = self
            .request
            .get(&url)
            .bearer_auth(access_token.expose_secret());
        let response: AddressResponse = self.send_json(&url, builder).await?;
        Address::parse_from_ffi(&response.address, "address")
    }

    /// `personal_sign` of `message` by the custodial account `address`.
    ///
    /// # Errors
    /// `NetworkError` on transport failure or non-200, `SerializationError` on a malformed
    /// response, `Timeout`.
    pub async fn personal_sign(
        &self,
        access_token: &SecretString,
        message: &str,
        address: Address,
    ) -> Result<String, PassportError> {
        let url = format!("{}/sign", self.evm_base_url);
        let address = address.to_string();
        let body = SignRequest {
            method: "personal_sign",
            params: [message, &address],
        };
        let builder = self
            .request
            .post(&url)
            .bearer_auth(access_token.expose_secret())
            .json(&body);
        let response: SignResponse = self.send_json(&url, builder).await?;
        if response.signature.is_empty() {
            return Err(PassportError::SerializationError {
                error: "sign response has an empty signature".to_string(),
            });
        }
        Ok(response.signature)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, PassportError> {
        let response = self
            .request
            .send(builder, |error| PassportError::NetworkError {
                url: url.to_string(),
                status: None,
                error,
            })
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PassportError::NetworkError {
                url: url.to_string(),
                status: Some(status.as_u16()),
                error: format!("account backend returned {status}"),
            });
        }
        response
            .json()
            .await
            .map_err(|e| PassportError::SerializationError {
                error: format!("malformed response from {url}: {e}"),
            })
    }
}
