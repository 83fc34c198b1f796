//! Passport backend: login codes, wallet passes, discount rulesets and scan actions.

use alloy_primitives::Address;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    config::PassportConfig, error::PassportError, http_request::Request, scan::RoutedScan,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginCodeResponse {
    login_code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RulesetValidation<'a> {
    passport_id: &'a str,
    rule_set_id: &'a str,
}

/// Client for `{pass_code_base_url}`.
#[derive(Debug)]
pub struct PassportBackend {
    base_url: String,
    chain_id: u64,
    request: Request,
}

impl PassportBackend {
    /// Builds the client from the SDK configuration.
    #[must_use]
    pub fn from_config(config: &PassportConfig) -> Self {
        Self {
            base_url: config.pass_code_base_url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id,
            request: Request::new(config.request_timeout()),
        }
    }

    /// Requests the one-time login code the account must sign.
    ///
    /// # Errors
    /// `NetworkError` on transport failure or non-200, `SerializationError` if the response has
    /// no `loginCode`, `Timeout`.
    pub async fn request_login_code(&self, address: Address) -> Result<String, PassportError> {
        let url = format!("{}/auth", self.base_url);
        let builder = self
            .request
            .post(&url)
            .query(&[("address", address.to_string())]);
        let response = self.send_ok(&url, builder).await?;
        let body: LoginCodeResponse =
            response
                .json()
                .await
                .map_err(|e| PassportError::SerializationError {
                    error: format!("malformed login code response: {e}"),
                })?;
        if body.login_code.is_empty() {
            return Err(PassportError::SerializationError {
                error: "login code is empty".to_string(),
            });
        }
        Ok(body.login_code)
    }

    /// Downloads the wallet pass for `passport_id`. The bytes are opaque to the SDK.
    ///
    /// The id always ends up as one percent-encoded path segment.
    ///
    /// # Errors
    /// `MissingParameters` for an empty, `.` or `..` id, `NetworkError` on failure, `Timeout`.
    pub async fn get_pass(
        &self,
        passport_id: &str,
        address: Address,
        access_token: &SecretString,
    ) -> Result<Vec<u8>, PassportError> {
        let url = self.pass_url(passport_id.trim())?.to_string();
        let builder = self.request.get(&url).query(&[
            ("chainId", self.chain_id.to_string()),
            ("address", address.to_string()),
            ("sessionToken", access_token.expose_secret().to_string()),
        ]);
        let response = self.send_ok(&url, builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PassportError::from_reqwest(&url, &e, |error| network(&url, None, error)))?;
        Ok(bytes.to_vec())
    }

    fn pass_url(&self, passport_id: &str) -> Result<Url, PassportError> {
        require("passport_id", passport_id)?;
        if matches!(passport_id, "." | "..") {
            return Err(PassportError::MissingParameters {
                parameter: "passport_id".to_string(),
            });
        }
        let invalid = |reason: String| PassportError::InvalidConfig {
            attribute: "pass_code_base_url".to_string(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(["apple", "pkpass", passport_id]);
        Ok(url)
    }

    /// Checks a discount ruleset against a passport, returning the backend's JSON verdict.
    ///
    /// # Errors
    /// `MissingParameters` for empty ids, `NetworkError` on failure, `Timeout`.
    pub async fn validate_ruleset(
        &self,
        passport_id: &str,
        rule_set_id: &str,
        access_token: &SecretString,
    ) -> Result<String, PassportError> {
        require("passport_id", passport_id)?;
        require("rule_set_id", rule_set_id)?;
        let url = format!("{}/discounts/rulesets/validate", self.base_url);
        let builder = self
            .request
            .post(&url)
            .bearer_auth(access_token.expose_secret())
            .json(&RulesetValidation {
                passport_id,
                rule_set_id,
            });
        let response = self.send_ok(&url, builder).await?;
        self.text(&url, response).await
    }

    /// Posts a routed scan envelope on behalf of `address`, returning the backend response.
    ///
    /// # Errors
    /// `NetworkError` on failure, `Timeout`.
    pub async fn submit_scan(
        &self,
        scan: &RoutedScan,
        address: Address,
        access_token: &SecretString,
    ) -> Result<String, PassportError> {
        let url = format!("{}{}", self.base_url, scan.path);
        let mut body = scan.body.clone();
        body.insert("address".to_string(), address.to_string().into());
        let builder = self
            .request
            .post(&url)
            .bearer_auth(access_token.expose_secret())
            .json(&body);
        let response = self.send_ok(&url, builder).await?;
        self.text(&url, response).await
    }

    async fn send_ok(&self, url: &str, builder: RequestBuilder) -> Result<Response, PassportError> {
        let response = self
            .request
            .send(builder, |error| network(url, None, error))
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(network(
                url,
                Some(status.as_u16()),
                format!("passport backend returned {status}"),
            ));
        }
        Ok(response)
    }

    async fn text(&self, url: &str, response: Response) -> Result<String, PassportError> {
        response
            .text()
            .await
            .map_err(|e| PassportError::from_reqwest(url, &e, |error| network(url, None, error)))
    }
}

fn network(url: &str, status: Option<u16>, error: String) -> PassportError {
    PassportError::NetworkError {
        url: url.to_string(),
        status,
        error,
    }
}

fn require(parameter: &str, value: &str) -> Result<(), PassportError> {
    if value.trim().is_empty() {
        return Err(PassportError::MissingParameters {
            parameter: parameter.to_string(),
        });
    }
    Ok(())
}
