//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use mockito::{Matcher, Mock, ServerGuard};
use passport_core::{
    chain::{ChainRpc, RpcError},
    Passport, PassportConfig,
};
use serde_json::json;

pub const ACCOUNT: &str = "0x375fa2f7fec390872a04f9c147c943eb8e48c43d";
pub const LOYALTY_CONTRACT: &str = "0x893fbeddadfdfb836cc069902f7270ea56fd6ebf";
pub const MEMBERSHIP_CONTRACT: &str = "0x4d20968f609bf10e06495529590623d5d858c5c7";
pub const ACCESS_TOKEN: &str = "tok123";

pub const LOYALTY_ABI: &str = r#"[
    {
        "inputs": [{"internalType": "address", "name": "user", "type": "address"}],
        "name": "checkPoints",
        "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
        "stateMutability": "view",
        "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "user", "type": "address"},
            {"internalType": "uint256", "name": "points", "type": "uint256"}
        ],
        "name": "addPoints",
        "outputs": [],
        "stateMutability": "nonpayable",
        "type": "function"
    }
]"#;

pub const MEMBERSHIP_ABI: &str = r#"[
    {
        "inputs": [
            {"internalType": "address", "name": "user", "type": "address"},
            {"internalType": "string", "name": "metadata", "type": "string"}
        ],
        "name": "addMembership",
        "outputs": [],
        "stateMutability": "nonpayable",
        "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "owner", "type": "address"},
            {"internalType": "address", "name": "user", "type": "address"}
        ],
        "name": "confirmMembership",
        "outputs": [{"internalType": "bool", "name": "", "type": "bool"}],
        "stateMutability": "view",
        "type": "function"
    }
]"#;

/// First four bytes of the keccak hash of a function signature, `0x` hex.
pub fn selector(signature: &str) -> String {
    format!("0x{}", hex::encode(&keccak256(signature.as_bytes())[..4]))
}

/// In-memory chain: fixed `latest` nonce, canned `eth_call` answers keyed by selector, and a
/// log of every raw transaction broadcast.
pub struct MockChain {
    latest_nonce: u64,
    calls: Mutex<HashMap<String, String>>,
    broadcasts: Mutex<Vec<Bytes>>,
    requests: Mutex<Vec<String>>,
}

impl MockChain {
    pub fn new(latest_nonce: u64) -> Arc<Self> {
        Arc::new(Self {
            latest_nonce,
            calls: Mutex::default(),
            broadcasts: Mutex::default(),
            requests: Mutex::default(),
        })
    }

    /// Answers `eth_call` for `signature` with the ABI-encoded `output` (hex).
    pub fn answer(&self, signature: &str, output: &str) {
        self.calls
            .lock()
            .unwrap()
            .insert(selector(signature), output.to_string());
    }

    pub fn broadcasts(&self) -> Vec<TxEnvelope> {
        self.broadcasts
            .lock()
            .unwrap()
            .iter()
            .map(|raw| TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap())
            .collect()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, method: &str) {
        self.requests.lock().unwrap().push(method.to_string());
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        self.record("eth_getTransactionCount");
        let nonce = self.latest_nonce;
        // Lets a concurrent write run between nonce fetch and broadcast.
        tokio::task::yield_now().await;
        Ok(nonce)
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.record("eth_call");
        let selector = format!("0x{}", hex::encode(data.get(..4).unwrap_or_default()));
        let output = self.calls.lock().unwrap().get(&selector).cloned();
        let output = output.ok_or_else(|| RpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        })?;
        hex::decode(output.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| RpcError::Malformed(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        self.record("eth_sendRawTransaction");
        tokio::task::yield_now().await;
        self.broadcasts.lock().unwrap().push(Bytes::copy_from_slice(raw));
        Ok(keccak256(raw))
    }
}

pub fn config_json(base_url: &str) -> String {
    json!({
        "chain_id": 80001,
        "rpc_url": format!("{base_url}/rpc"),
        "artifact_base_url": format!("{base_url}/artifacts"),
        "account_base_url": format!("{base_url}/accounts"),
        "evm_base_url": format!("{base_url}/evm"),
        "pass_code_base_url": format!("{base_url}/passport"),
        "client_id": "passport-ios",
        "client_secret": "shh",
        "redirect_uri": "passport://oauth/callback",
        "signer_private_key": "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        "nft_contract_address": MEMBERSHIP_CONTRACT,
        "stored_value_contract_address": LOYALTY_CONTRACT,
        "connected_contract_address": "0x61ff3d77ab2befece7b1c8e0764ac973ad85a9ef",
        "request_timeout_ms": 2000
    })
    .to_string()
}

pub fn passport(server: &ServerGuard, chain: Arc<MockChain>) -> Passport {
    let config = PassportConfig::from_json(&config_json(&server.url())).unwrap();
    Passport::with_rpc(Arc::new(config), chain, None, None)
}

/// Serves `abi` as the artifact of `contract_type`.
pub async fn mock_artifact(server: &mut ServerGuard, contract_type: &str, abi: &str) -> Mock {
    let artifact = format!(r#"{{"contractName": "{contract_type}", "abi": {abi}}}"#);
    server
        .mock("GET", format!("/artifacts/{contract_type}.json").as_str())
        .with_status(200)
        .with_body(artifact)
        .create_async()
        .await
}

/// Mocks the token exchange, address lookup, login code and signature endpoints.
pub async fn mock_login(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        server
            .mock("POST", "/accounts/token")
            .with_status(200)
            .with_body(json!({"access_token": ACCESS_TOKEN, "id_token": "id"}).to_string())
            .create_async()
            .await,
        server
            .mock("GET", "/evm/address")
            .match_header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str())
            .with_status(200)
            .with_body(json!({"address": ACCOUNT}).to_string())
            .create_async()
            .await,
        server
            .mock("POST", "/passport/auth")
            .match_query(Matcher::Regex("address=0x".into()))
            .with_status(200)
            .with_body(r#"{"loginCode":"login-code-42"}"#)
            .create_async()
            .await,
        server
            .mock("POST", "/evm/sign")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"method": "personal_sign"})),
                Matcher::Regex("login-code-42".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"signature":"0xfeed"}"#)
            .create_async()
            .await,
    ]
}

/// Runs the full handshake against the mocks of [`mock_login`].
pub async fn log_in(passport: &Passport) -> String {
    let url = passport.login().await.unwrap();
    let url = reqwest::Url::parse(&url).unwrap();
    let state = url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    passport
        .handle_redirect(&format!("passport://oauth/callback?code=abc&state={state}"))
        .await
        .unwrap()
}
