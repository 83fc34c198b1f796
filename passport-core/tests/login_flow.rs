mod common;

use common::{
    log_in, mock_artifact, mock_login, passport, MockChain, ACCOUNT, LOYALTY_ABI,
    LOYALTY_CONTRACT,
};
use passport_core::{LoginProof, PassportError, PassportEvent, SessionState};

#[tokio::test]
async fn test_login_then_loyalty_check() {
    let mut server = mockito::Server::new_async().await;
    let login_mocks = mock_login(&mut server).await;
    let artifact = mock_artifact(&mut server, "LoyaltyContract", LOYALTY_ABI).await;

    let chain = MockChain::new(0);
    chain.answer("checkPoints(address)", &format!("0x{:064x}", 150));
    let passport = passport(&server, chain.clone());
    let mut events = passport.subscribe();

    let address = log_in(&passport).await;
    assert_eq!(address.to_lowercase(), ACCOUNT);
    assert_eq!(passport.state().await, SessionState::LoggedIn);
    assert_eq!(
        events.recv().await.unwrap(),
        PassportEvent::LoginComplete {
            address: address.clone()
        }
    );
    for mock in login_mocks {
        mock.assert_async().await;
    }
    assert_eq!(
        passport.login_proof().await,
        Some(LoginProof {
            address: address.clone(),
            login_code: "login-code-42".to_string(),
            signature: "0xfeed".to_string(),
            id_token: Some("id".to_string()),
        })
    );

    let points = passport
        .loyalty_check(LOYALTY_CONTRACT, ACCOUNT)
        .await
        .unwrap();
    assert_eq!(points.to_decimal_string(), "150");

    let again = passport
        .loyalty_check(LOYALTY_CONTRACT, ACCOUNT)
        .await
        .unwrap();
    assert_eq!(again, points);
    assert_eq!(
        chain.requests(),
        vec!["eth_call".to_string(), "eth_call".to_string()]
    );
    artifact.assert_async().await;
}

#[tokio::test]
async fn test_reads_require_login() {
    let mut server = mockito::Server::new_async().await;
    let artifact = server
        .mock("GET", "/artifacts/LoyaltyContract.json")
        .expect(0)
        .create_async()
        .await;
    let chain = MockChain::new(0);
    let passport = passport(&server, chain.clone());

    let err = passport
        .loyalty_check(LOYALTY_CONTRACT, ACCOUNT)
        .await
        .unwrap_err();
    assert_eq!(err, PassportError::NotLoggedIn);
    assert!(chain.requests().is_empty());
    artifact.assert_async().await;
}

#[tokio::test]
async fn test_failed_address_lookup_logs_out() {
    let mut server = mockito::Server::new_async().await;
    let _token = server
        .mock("POST", "/accounts/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok123"}"#)
        .create_async()
        .await;
    let _address = server
        .mock("GET", "/evm/address")
        .with_status(500)
        .create_async()
        .await;

    let passport = passport(&server, MockChain::new(0));
    let mut events = passport.subscribe();

    let url = passport.login().await.unwrap();
    let state = reqwest::Url::parse(&url)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    let err = passport
        .handle_redirect(&format!("passport://oauth/callback?code=abc&state={state}"))
        .await
        .unwrap_err();

    assert!(matches!(err, PassportError::NetworkError { .. }));
    assert_eq!(passport.state().await, SessionState::LoggedOut);
    assert!(matches!(
        events.recv().await.unwrap(),
        PassportEvent::LoginFailed { .. }
    ));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let mut server = mockito::Server::new_async().await;
    let _login_mocks = mock_login(&mut server).await;
    let passport = passport(&server, MockChain::new(0));

    log_in(&passport).await;
    passport.logout().await.unwrap();

    assert_eq!(passport.state().await, SessionState::LoggedOut);
    assert_eq!(passport.address().await, None);
    assert_eq!(passport.login_proof().await, None);
    assert_eq!(
        passport.get_pass("pass-1").await.unwrap_err(),
        PassportError::NotLoggedIn
    );
}

#[tokio::test]
async fn test_missing_abi_never_reaches_the_chain() {
    let mut server = mockito::Server::new_async().await;
    let _login_mocks = mock_login(&mut server).await;
    let artifact = server
        .mock("GET", "/artifacts/LoyaltyContract.json")
        .with_status(404)
        .create_async()
        .await;
    let chain = MockChain::new(0);
    chain.answer("checkPoints(address)", &format!("0x{:064x}", 150));
    let passport = passport(&server, chain.clone());
    log_in(&passport).await;

    let err = passport
        .loyalty_check(LOYALTY_CONTRACT, ACCOUNT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PassportError::AbiFetchError { contract_type, .. } if contract_type == "LoyaltyContract"
    ));
    assert!(chain.requests().is_empty());
    artifact.assert_async().await;
}
