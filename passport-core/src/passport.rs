//! The SDK entry point handed to the host application.

use std::sync::Arc;

use alloy_primitives::Address;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, Mutex};

use crate::{
    abi::AbiRegistry,
    auth::{
        extract_code, AccountClient, InMemorySessionStore, LoginProof, OAuthClient, PkceChallenge,
        Session, SessionState, SessionStore,
    },
    backend::PassportBackend,
    chain::{ChainClient, ChainRpc, LocalSigner, TransactionSigner},
    config::PassportConfig,
    error::{PassportError, PassportResult},
    events::{EventBus, PassportEvent, PassportListener},
    scan::{self, ScanPayload},
};

/// A passport session bound to one configuration.
///
/// Drives the login handshake, gates every business call on a completed login and routes
/// contract reads and writes through a shared [`ChainClient`].
///
/// ```swift
/// let config = try PassportConfig.fromJson(config: json)
/// let passport = try Passport(config: config, store: KeychainSessionStore(), listener: self)
///
/// let url = try await passport.login()
/// // present `url` in an ASWebAuthenticationSession, then:
/// let address = try await passport.handleRedirect(redirectUrl: callbackURL.absoluteString)
/// let points = try await passport.loyaltyCheck(contractAddress: loyalty, userAddress: address)
/// ```
#[derive(uniffi::Object)]
pub struct Passport {
    config: Arc<PassportConfig>,
    pub(crate) abis: AbiRegistry,
    pub(crate) chain: ChainClient,
    oauth: OAuthClient,
    account: AccountClient,
    backend: PassportBackend,
    signer: Result<Arc<dyn TransactionSigner>, PassportError>,
    session: Mutex<Session>,
    store: Arc<dyn SessionStore>,
    events: EventBus,
}

impl std::fmt::Debug for Passport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passport")
            .field("chain_id", &self.config.chain_id)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl Passport {
    /// Creates a passport talking to the configured JSON-RPC endpoint.
    ///
    /// Without a `store` the access token only lives as long as this instance.
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration does not validate or the RPC endpoint is not a URL.
    #[uniffi::constructor]
    pub fn new(
        config: Arc<PassportConfig>,
        store: Option<Arc<dyn SessionStore>>,
        listener: Option<Arc<dyn PassportListener>>,
    ) -> Result<Self, PassportError> {
        config.validate()?;
        let chain = ChainClient::from_config(&config)?;
        Ok(Self::assemble(config, chain, store, listener))
    }

    /// Configured chain id.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Starts a login attempt and returns the authorization URL to open.
    ///
    /// Any previous session is discarded.
    ///
    /// # Errors
    /// `InvalidConfig` if the authorization URL cannot be built.
    pub async fn login(&self) -> Result<String, PassportError> {
        let pkce = PkceChallenge::generate();
        let url = self.oauth.authorization_url(&pkce)?;
        self.session.lock().await.begin_authorization(pkce);
        log::info!("authorization requested");
        Ok(url)
    }

    /// Completes the login from the OAuth2 redirect and returns the account address.
    ///
    /// On any failure the session returns to `LoggedOut` and `LoginFailed` is published.
    ///
    /// # Errors
    /// `AuthorizationDenied`, `TokenExchangeError`, `InvalidSessionState` or the error of the
    /// failing address/login-code/signature step.
    pub async fn handle_redirect(&self, redirect_url: &str) -> Result<String, PassportError> {
        let mut session = self.session.lock().await;
        let result = self.finish_login(&mut session, redirect_url).await;
        self.conclude_login(&mut session, result, false)
    }

    /// Continues the handshake from a persisted access token.
    ///
    /// Returns `None` when the store holds no token. A token that no longer works is cleared.
    ///
    /// # Errors
    /// `SessionStoreError` if the store cannot be read, otherwise the error of the failing
    /// handshake step.
    pub async fn resume_session(&self) -> Result<Option<String>, PassportError> {
        let Some(token) = self.store.load_token()?.filter(|token| !token.is_empty()) else {
            return Ok(None);
        };
        let mut session = self.session.lock().await;
        session.reset();
        let result = match session.resume(SecretString::from(token)) {
            Ok(()) => self.resolve_and_sign(&mut session).await,
            Err(err) => Err(err),
        };
        self.conclude_login(&mut session, result, true).map(Some)
    }

    /// Ends the session and clears the persisted token.
    ///
    /// # Errors
    /// `SessionStoreError` if the store cannot be cleared. The in-memory session is reset
    /// regardless.
    pub async fn logout(&self) -> Result<(), PassportError> {
        self.session.lock().await.reset();
        log::info!("logged out");
        self.store.clear_token()
    }

    /// Current login state.
    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Account address of the logged in user.
    pub async fn address(&self) -> Option<String> {
        match self.session.lock().await.require_logged_in() {
            Ok((_, address)) => Some(address.to_string()),
            Err(_) => None,
        }
    }

    /// Login code and signature of the current session, for hosts that forward them to their
    /// own backend. `None` unless logged in.
    pub async fn login_proof(&self) -> Option<LoginProof> {
        self.session.lock().await.proof()
    }

    /// Classifies a scanned NFC/QR string and publishes `ScanResolved`.
    ///
    /// # Errors
    /// `InvalidScanPayload` if the string is empty or an unrecognized envelope.
    pub fn resolve_scan(&self, raw: &str) -> Result<ScanPayload, PassportError> {
        let payload = ScanPayload::parse(raw)?;
        self.events.publish(PassportEvent::ScanResolved {
            payload: payload.clone(),
        });
        Ok(payload)
    }

    /// Posts a scanned JSON envelope to the backend action selected by its `scanType`.
    ///
    /// The envelope is validated before anything else, so a bad payload never reaches the
    /// network. Publishes `PassScanComplete` on success.
    ///
    /// # Errors
    /// `InvalidScanPayload`, `MissingParameters`, `NotLoggedIn`, or the backend failure.
    pub async fn pass_scan_protocol_router(&self, raw: &str) -> Result<String, PassportError> {
        let routed = scan::route(raw, self.config.chain_id)?;
        let (token, address) = self.require_login().await?;
        let response = self.backend.submit_scan(&routed, address, &token).await?;
        log::info!("{} scan accepted", routed.scan_type);
        self.events.publish(PassportEvent::PassScanComplete {
            response: response.clone(),
        });
        Ok(response)
    }

    /// Downloads the wallet pass for `passport_id`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `MissingParameters` or the backend failure.
    pub async fn get_pass(&self, passport_id: &str) -> Result<Vec<u8>, PassportError> {
        let (token, address) = self.require_login().await?;
        self.backend.get_pass(passport_id, address, &token).await
    }

    /// Validates a discount ruleset for `passport_id`, returning the backend verdict as JSON.
    ///
    /// # Errors
    /// `NotLoggedIn`, `MissingParameters` or the backend failure.
    pub async fn validate_ruleset(
        &self,
        passport_id: &str,
        rule_set_id: &str,
    ) -> Result<String, PassportError> {
        let (token, _) = self.require_login().await?;
        self.backend
            .validate_ruleset(passport_id, rule_set_id, &token)
            .await
    }
}

impl Passport {
    /// Creates a passport over a custom [`ChainRpc`], e.g. a test chain.
    #[must_use]
    pub fn with_rpc(
        config: Arc<PassportConfig>,
        rpc: Arc<dyn ChainRpc>,
        store: Option<Arc<dyn SessionStore>>,
        listener: Option<Arc<dyn PassportListener>>,
    ) -> Self {
        let chain = ChainClient::new(rpc, config.chain_id);
        Self::assemble(config, chain, store, listener)
    }

    /// Replaces the configured signer, e.g. with a hardware-backed one.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Ok(signer);
        self
    }

    /// Receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PassportEvent> {
        self.events.subscribe()
    }

    fn assemble(
        config: Arc<PassportConfig>,
        chain: ChainClient,
        store: Option<Arc<dyn SessionStore>>,
        listener: Option<Arc<dyn PassportListener>>,
    ) -> Self {
        let signer = match &config.signer_private_key {
            Some(key) => LocalSigner::from_secret(key)
                .map(|signer| Arc::new(signer) as Arc<dyn TransactionSigner>),
            None => Err(PassportError::SignerUnavailable {
                reason: "no signer key configured".to_string(),
            }),
        };
        if let Err(err) = &signer {
            log::warn!("writes disabled: {err}");
        }

        Self {
            abis: AbiRegistry::new(&config.artifact_base_url, config.request_timeout()),
            oauth: OAuthClient::from_config(&config),
            account: AccountClient::from_config(&config),
            backend: PassportBackend::from_config(&config),
            chain,
            signer,
            session: Mutex::new(Session::default()),
            store: store.unwrap_or_else(|| Arc::new(InMemorySessionStore::default())),
            events: EventBus::new(listener),
            config,
        }
    }

    pub(crate) fn config(&self) -> &PassportConfig {
        &self.config
    }

    pub(crate) fn signer(&self) -> PassportResult<Arc<dyn TransactionSigner>> {
        self.signer.clone()
    }

    /// Access token and address of the completed login.
    pub(crate) async fn require_login(&self) -> PassportResult<(SecretString, Address)> {
        let session = self.session.lock().await;
        let (token, address) = session.require_logged_in()?;
        Ok((SecretString::from(token.expose_secret().to_string()), address))
    }

    async fn finish_login(
        &self,
        session: &mut Session,
        redirect_url: &str,
    ) -> PassportResult<Address> {
        let expected_state = session
            .pkce()
            .map(|pkce| pkce.state().to_string())
            .ok_or_else(|| PassportError::InvalidSessionState {
                expected: SessionState::AuthorizationRequested.to_string(),
                actual: session.state().to_string(),
            })?;
        let code = extract_code(redirect_url, &expected_state)?;
        session.receive_code(code)?;

        let tokens = {
            let (code, verifier) = session.code_and_verifier()?;
            self.oauth.exchange_code(code.expose_secret(), verifier).await?
        };
        session.tokens_received(tokens)?;

        if let Some(token) = session.access_token() {
            if let Err(err) = self.store.store_token(token.expose_secret().to_string()) {
                log::warn!("access token not persisted: {err}");
            }
        }

        self.resolve_and_sign(session).await
    }

    /// `TokenExchanged` through `LoggedIn`.
    async fn resolve_and_sign(&self, session: &mut Session) -> PassportResult<Address> {
        let token = session
            .access_token()
            .map(|token| SecretString::from(token.expose_secret().to_string()))
            .ok_or(PassportError::NotLoggedIn)?;

        let address = self.account.get_address(&token).await?;
        session.address_resolved(address)?;

        let login_code = self.backend.request_login_code(address).await?;
        let signature = self
            .account
            .personal_sign(&token, &login_code, address)
            .await?;
        session.signature_obtained(login_code, signature)?;

        session.complete()
    }

    fn conclude_login(
        &self,
        session: &mut Session,
        result: PassportResult<Address>,
        clear_stored: bool,
    ) -> PassportResult<String> {
        match result {
            Ok(address) => {
                let address = address.to_string();
                log::info!("logged in as {address}");
                self.events.publish(PassportEvent::LoginComplete {
                    address: address.clone(),
                });
                Ok(address)
            }
            Err(err) => {
                log::error!("login failed in state {}: {err}", session.state());
                session.reset();
                if clear_stored {
                    if let Err(store_err) = self.store.clear_token() {
                        log::warn!("stale token not cleared: {store_err}");
                    }
                }
                self.events.publish(PassportEvent::LoginFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain::RpcError, config::tests::config_json};
    use alloy_primitives::{Address, Bytes, B256};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Offline;

    #[async_trait]
    impl ChainRpc for Offline {
        async fn transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
            Err(RpcError::Transport("offline".to_string()))
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, RpcError> {
            Err(RpcError::Transport("offline".to_string()))
        }

        async fn send_raw_transaction(&self, _raw: &[u8]) -> Result<B256, RpcError> {
            Err(RpcError::Transport("offline".to_string()))
        }
    }

    fn passport(base_url: &str) -> Passport {
        let config = Arc::new(PassportConfig::from_json(&config_json(base_url)).unwrap());
        Passport::with_rpc(config, Arc::new(Offline), None, None)
    }

    #[tokio::test]
    async fn test_business_calls_require_login() {
        let passport = passport("https://example.org");
        assert_eq!(passport.state().await, SessionState::LoggedOut);
        assert_eq!(passport.address().await, None);
        assert_eq!(
            passport.get_pass("pass-1").await.unwrap_err(),
            PassportError::NotLoggedIn
        );
        assert_eq!(
            passport
                .validate_ruleset("pass-1", "rs")
                .await
                .unwrap_err(),
            PassportError::NotLoggedIn
        );
    }

    #[tokio::test]
    async fn test_login_moves_to_authorization_requested() {
        let passport = passport("https://example.org");
        let url = passport.login().await.unwrap();
        assert!(url.starts_with("https://example.org/accounts/authorize?"));
        assert_eq!(passport.state().await, SessionState::AuthorizationRequested);
    }

    #[tokio::test]
    async fn test_redirect_without_login_fails_and_publishes() {
        let passport = passport("https://example.org");
        let mut events = passport.subscribe();

        let err = passport
            .handle_redirect("passport://oauth/callback?code=abc&state=xyz")
            .await
            .unwrap_err();

        assert!(matches!(err, PassportError::InvalidSessionState { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            PassportEvent::LoginFailed { .. }
        ));
        assert_eq!(passport.state().await, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_denied_redirect_logs_out() {
        let passport = passport("https://example.org");
        passport.login().await.unwrap();

        let err = passport
            .handle_redirect("passport://oauth/callback?error=access_denied")
            .await
            .unwrap_err();

        assert!(matches!(err, PassportError::AuthorizationDenied { .. }));
        assert_eq!(passport.state().await, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_resume_without_token() {
        let passport = passport("https://example.org");
        assert_eq!(passport.resume_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_scan_publishes() {
        let passport = passport("https://example.org");
        let mut events = passport.subscribe();

        let payload = passport.resolve_scan("SN-0042").unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            PassportEvent::ScanResolved { payload }
        );
    }

    #[tokio::test]
    async fn test_unknown_scan_type_is_rejected_before_login_check() {
        let passport = passport("https://example.org");
        let err = passport
            .pass_scan_protocol_router(r#"{"scanType":"UNKNOWN"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PassportError::InvalidScanPayload { .. }));
    }

    #[test]
    fn test_missing_signer_is_reported_on_use() {
        let mut value: Value = serde_json::from_str(&config_json("https://example.org")).unwrap();
        value.as_object_mut().unwrap().remove("signer_private_key");
        let config = Arc::new(PassportConfig::from_json(&value.to_string()).unwrap());
        let passport = Passport::with_rpc(config, Arc::new(Offline), None, None);

        assert!(matches!(
            passport.signer(),
            Err(PassportError::SignerUnavailable { .. })
        ));
    }
}
