//! OAuth2 authorization code flow with PKCE against the account server.

use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{
    auth::pkce::PkceChallenge, config::PassportConfig, error::PassportError,
    http_request::Request,
};

/// Tokens returned by a successful code exchange.
pub struct TokenSet {
    /// Bearer token for the account and passport backends.
    pub access_token: SecretString,
    /// OpenID identity token, if issued.
    pub id_token: Option<String>,
    /// Refresh token, if issued.
    pub refresh_token: Option<SecretString>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("has_id_token", &self.id_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

/// Client for the `/authorize` and `/token` endpoints.
pub struct OAuthClient {
    account_base_url: String,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    scope: String,
    request: Request,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("account_base_url", &self.account_base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    /// Builds the client from the SDK configuration.
    #[must_use]
    pub fn from_config(config: &PassportConfig) -> Self {
        Self {
            account_base_url: config.account_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.expose_secret().to_string()),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            request: Request::new(config.request_timeout()),
        }
    }

    /// Authorization URL the host opens in a browser session.
    ///
    /// # Errors
    /// `InvalidConfig` if the account base URL does not parse.
    pub fn authorization_url(&self, pkce: &PkceChallenge) -> Result<String, PassportError> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.account_base_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("state", pkce.state()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scope.as_str()),
                ("response_type", "code"),
                ("code_challenge", pkce.challenge()),
                ("code_challenge_method", "S256"),
                ("nonce", pkce.nonce()),
            ],
        )
        .map_err(|e| PassportError::InvalidConfig {
            attribute: "account_base_url".to_string(),
            reason: e.to_string(),
        })?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    /// `TokenExchangeError` on a non-200 answer or a response without a non-empty
    /// `access_token`; `Timeout` if the server does not answer in time.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &SecretString,
    ) -> Result<TokenSet, PassportError> {
        let url = format!("{}/token", self.account_base_url);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier.expose_secret()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let builder = self
            .request
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&form);

        let response = self
            .request
            .send(builder, |error| PassportError::TokenExchangeError {
                status: None,
                error,
            })
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PassportError::TokenExchangeError {
                status: Some(status.as_u16()),
                error: format!("token endpoint returned {status}: {body}"),
            });
        }

        let tokens: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| PassportError::TokenExchangeError {
                    status: Some(status.as_u16()),
                    error: format!("malformed token response: {e}"),
                })?;

        let access_token = tokens
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PassportError::TokenExchangeError {
                status: Some(status.as_u16()),
                error: "token response has no access_token".to_string(),
            })?;

        Ok(TokenSet {
            access_token: SecretString::from(access_token),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token.map(SecretString::from),
        })
    }
}

/// Pulls the authorization code out of the redirect URL.
///
/// # Errors
/// `AuthorizationDenied` if the redirect carries an `error`, lacks a `code`, or its `state`
/// does not match the one sent with the authorization request.
pub fn extract_code(redirect_url: &str, expected_state: &str) -> Result<String, PassportError> {
    let url = Url::parse(redirect_url).map_err(|e| PassportError::AuthorizationDenied {
        reason: format!("malformed redirect URL: {e}"),
    })?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(PassportError::AuthorizationDenied { reason: error });
    }
    if state.as_deref() != Some(expected_state) {
        return Err(PassportError::AuthorizationDenied {
            reason: "state mismatch".to_string(),
        });
    }
    code.filter(|code| !code.is_empty())
        .ok_or_else(|| PassportError::AuthorizationDenied {
            reason: "redirect has no authorization code".to_string(),
        })
}
