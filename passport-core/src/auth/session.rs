//! Login state machine and token persistence.

use std::sync::{Mutex, PoisonError};

use alloy_primitives::Address;
use secrecy::{ExposeSecret, SecretString};
use strum::Display;

use crate::{
    auth::{oauth::TokenSet, pkce::PkceChallenge},
    error::{PassportError, PassportResult},
};

/// Progress of the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, uniffi::Enum)]
pub enum SessionState {
    /// No session. Business calls fail with `NotLoggedIn`.
    #[default]
    LoggedOut,
    /// The authorization URL was handed to the host.
    AuthorizationRequested,
    /// The redirect carried a valid authorization code.
    AuthorizationCodeReceived,
    /// An access token was obtained.
    TokenExchanged,
    /// The custodial account address is known.
    AddressResolved,
    /// The login code was signed by the account.
    SignatureObtained,
    /// Handshake complete.
    LoggedIn,
}

/// What the handshake established about the account, for backends that verify it themselves.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct LoginProof {
    /// Account address, checksummed.
    pub address: String,
    /// Login code issued by the passport backend.
    pub login_code: String,
    /// Account signature over `login_code`.
    pub signature: String,
    /// OpenID identity token, if the identity server issued one.
    pub id_token: Option<String>,
}

/// Credentials and progress of the current login.
///
/// Transitions only move forward one step at a time; any step attempted out of order fails
/// with `InvalidSessionState` and leaves the session untouched.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    pkce: Option<PkceChallenge>,
    authorization_code: Option<SecretString>,
    access_token: Option<SecretString>,
    id_token: Option<String>,
    refresh_token: Option<SecretString>,
    login_code: Option<String>,
    signature: Option<String>,
    resolved_address: Option<Address>,
}

impl Session {
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Starts a new attempt from any state, discarding the previous session.
    pub fn begin_authorization(&mut self, pkce: PkceChallenge) {
        self.reset();
        self.pkce = Some(pkce);
        self.state = SessionState::AuthorizationRequested;
    }

    /// PKCE values of the pending attempt.
    #[must_use]
    pub const fn pkce(&self) -> Option<&PkceChallenge> {
        self.pkce.as_ref()
    }

    /// `AuthorizationRequested -> AuthorizationCodeReceived`.
    ///
    /// # Errors
    /// `InvalidSessionState` if no authorization is pending.
    pub fn receive_code(&mut self, code: String) -> PassportResult<()> {
        self.expect(SessionState::AuthorizationRequested)?;
        self.authorization_code = Some(SecretString::from(code));
        self.state = SessionState::AuthorizationCodeReceived;
        Ok(())
    }

    /// Authorization code and PKCE verifier to exchange.
    ///
    /// # Errors
    /// `InvalidSessionState` unless a code has been received.
    pub fn code_and_verifier(&self) -> PassportResult<(&SecretString, &SecretString)> {
        self.expect(SessionState::AuthorizationCodeReceived)?;
        match (&self.authorization_code, &self.pkce) {
            (Some(code), Some(pkce)) => Ok((code, pkce.verifier())),
            _ => Err(self.unexpected(SessionState::AuthorizationCodeReceived)),
        }
    }

    /// `AuthorizationCodeReceived -> TokenExchanged`.
    ///
    /// # Errors
    /// `InvalidSessionState` out of order, `TokenExchangeError` for an empty access token.
    pub fn tokens_received(&mut self, tokens: TokenSet) -> PassportResult<()> {
        self.expect(SessionState::AuthorizationCodeReceived)?;
        ensure_token(&tokens.access_token)?;
        self.access_token = Some(tokens.access_token);
        self.id_token = tokens.id_token;
        self.refresh_token = tokens.refresh_token;
        self.authorization_code = None;
        self.pkce = None;
        self.state = SessionState::TokenExchanged;
        Ok(())
    }

    /// `LoggedOut -> TokenExchanged` from a persisted access token.
    ///
    /// # Errors
    /// `InvalidSessionState` unless logged out, `TokenExchangeError` for an empty token.
    pub fn resume(&mut self, access_token: SecretString) -> PassportResult<()> {
        self.expect(SessionState::LoggedOut)?;
        ensure_token(&access_token)?;
        self.access_token = Some(access_token);
        self.state = SessionState::TokenExchanged;
        Ok(())
    }

    /// `TokenExchanged -> AddressResolved`.
    ///
    /// # Errors
    /// `InvalidSessionState` out of order.
    pub fn address_resolved(&mut self, address: Address) -> PassportResult<()> {
        self.expect(SessionState::TokenExchanged)?;
        self.resolved_address = Some(address);
        self.state = SessionState::AddressResolved;
        Ok(())
    }

    /// `AddressResolved -> SignatureObtained`.
    ///
    /// # Errors
    /// `InvalidSessionState` out of order.
    pub fn signature_obtained(&mut self, login_code: String, signature: String) -> PassportResult<()> {
        self.expect(SessionState::AddressResolved)?;
        self.login_code = Some(login_code);
        self.signature = Some(signature);
        self.state = SessionState::SignatureObtained;
        Ok(())
    }

    /// `SignatureObtained -> LoggedIn`.
    ///
    /// # Errors
    /// `InvalidSessionState` out of order or if the access token went missing.
    pub fn complete(&mut self) -> PassportResult<Address> {
        self.expect(SessionState::SignatureObtained)?;
        let address = self
            .resolved_address
            .ok_or_else(|| self.unexpected(SessionState::SignatureObtained))?;
        if !self.has_access_token() {
            return Err(self.unexpected(SessionState::SignatureObtained));
        }
        self.state = SessionState::LoggedIn;
        Ok(address)
    }

    /// Back to `LoggedOut` with every field cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bearer token, once exchanged.
    #[must_use]
    pub const fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    /// The resolved account address, once known.
    #[must_use]
    pub const fn address(&self) -> Option<Address> {
        self.resolved_address
    }

    /// Login code, signature and tokens of the completed handshake; `None` before `LoggedIn`.
    #[must_use]
    pub fn proof(&self) -> Option<LoginProof> {
        if self.state != SessionState::LoggedIn {
            return None;
        }
        Some(LoginProof {
            address: self.resolved_address?.to_string(),
            login_code: self.login_code.clone()?,
            signature: self.signature.clone()?,
            id_token: self.id_token.clone(),
        })
    }

    /// Access token and address of a completed login.
    ///
    /// # Errors
    /// `NotLoggedIn` unless the handshake completed with a non-empty access token.
    pub fn require_logged_in(&self) -> PassportResult<(&SecretString, Address)> {
        match (self.state, &self.access_token, self.resolved_address) {
            (SessionState::LoggedIn, Some(token), Some(address))
                if !token.expose_secret().is_empty() =>
            {
                Ok((token, address))
            }
            _ => Err(PassportError::NotLoggedIn),
        }
    }

    fn has_access_token(&self) -> bool {
        self.access_token
            .as_ref()
            .is_some_and(|token| !token.expose_secret().is_empty())
    }

    fn expect(&self, expected: SessionState) -> PassportResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: SessionState) -> PassportError {
        PassportError::InvalidSessionState {
            expected: expected.to_string(),
            actual: self.state.to_string(),
        }
    }
}

fn ensure_token(token: &SecretString) -> PassportResult<()> {
    if token.expose_secret().is_empty() {
        return Err(PassportError::TokenExchangeError {
            status: None,
            error: "access token is empty".to_string(),
        });
    }
    Ok(())
}

/// Host persistence for the access token, e.g. the iOS keychain.
#[uniffi::export(with_foreign)]
pub trait SessionStore: Send + Sync {
    /// Returns the persisted access token, if any.
    ///
    /// # Errors
    /// `SessionStoreError` if the store cannot be read.
    fn load_token(&self) -> PassportResult<Option<String>>;

    /// Persists the access token, replacing any previous one.
    ///
    /// # Errors
    /// `SessionStoreError` if the store cannot be written.
    fn store_token(&self, token: String) -> PassportResult<()>;

    /// Removes the persisted token.
    ///
    /// # Errors
    /// `SessionStoreError` if the store cannot be written.
    fn clear_token(&self) -> PassportResult<()>;
}

/// Process-local [`SessionStore`], used when the host supplies none.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    token: Mutex<Option<String>>,
}

impl SessionStore for InMemorySessionStore {
    fn load_token(&self) -> PassportResult<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store_token(&self, token: String) -> PassportResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    fn clear_token(&self) -> PassportResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
