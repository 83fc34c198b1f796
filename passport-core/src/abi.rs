//! Contract ABI acquisition.
//!
//! Contract artifacts are published as `{artifact_base_url}/{ContractType}.json` and carry the
//! ABI under an `abi` key. Fetched ABIs are kept for the lifetime of the registry; concurrent
//! requests for the same contract type share a single download.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{error::PassportError, http_request::Request};

const MAX_CACHED_ABIS: u64 = 64;

/// Logical names of the contracts the SDK talks to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    uniffi::Enum,
)]
pub enum ContractType {
    /// Loyalty points ledger.
    #[strum(serialize = "LoyaltyContract")]
    Loyalty,
    /// Membership registry with per-member metadata.
    #[strum(serialize = "MetadataMembershipContract")]
    MetadataMembership,
    /// Stored-value (ERC-20) token.
    #[strum(serialize = "ERC20TestContract")]
    StoredValue,
    /// Membership NFT (ERC-1155).
    #[strum(serialize = "OzzieContract")]
    Nft,
    /// Serial number to owner registry for connected packaging and NFC tags.
    #[strum(serialize = "ConnectedPackagingContract")]
    ConnectedPackaging,
    /// Versioned ledger.
    #[strum(serialize = "LedgerContract")]
    Ledger,
}

/// The ABI document of one contract type, as served by the artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAbi {
    contract_type: String,
    json: String,
}

impl ContractAbi {
    /// Wraps an ABI document that was obtained out of band.
    #[must_use]
    pub fn new(contract_type: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            contract_type: contract_type.into(),
            json: json.into(),
        }
    }

    /// Logical contract name this ABI belongs to.
    #[must_use]
    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    /// The ABI as a JSON array string.
    #[must_use]
    pub fn json(&self) -> &str {
        &self.json
    }
}

/// Fetches contract ABIs from the artifact store and caches them per contract type.
pub struct AbiRegistry {
    base_url: String,
    request: Request,
    cache: Cache<String, Arc<ContractAbi>>,
}

impl std::fmt::Debug for AbiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbiRegistry")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AbiRegistry {
    /// Creates a registry reading from `base_url`.
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request: Request::new(timeout),
            cache: Cache::new(MAX_CACHED_ABIS),
        }
    }

    /// Returns the ABI for `contract_type`, downloading it on first use.
    ///
    /// # Errors
    /// - `AbiFetchError` on a non-200 response, a malformed artifact or a missing `abi` array.
    /// - `Timeout` if the artifact host does not answer in time.
    ///
    /// Failures are not cached, the next call tries again.
    pub async fn fetch_abi(
        &self,
        contract_type: &str,
    ) -> Result<Arc<ContractAbi>, PassportError> {
        validate_contract_type(contract_type)?;
        self.cache
            .try_get_with(
                contract_type.to_string(),
                self.download(contract_type),
            )
            .await
            .map_err(|err| (*err).clone())
    }

    /// Convenience for the well-known contract types.
    ///
    /// # Errors
    /// See [`AbiRegistry::fetch_abi`].
    pub async fn fetch(
        &self,
        contract_type: ContractType,
    ) -> Result<Arc<ContractAbi>, PassportError> {
        self.fetch_abi(contract_type.as_ref()).await
    }

    async fn download(&self, contract_type: &str) -> Result<Arc<ContractAbi>, PassportError> {
        let url = format!("{}/{contract_type}.json", self.base_url);
        log::debug!("fetching ABI for {contract_type} from {url}");

        let fetch_error = |error: String| PassportError::AbiFetchError {
            contract_type: contract_type.to_string(),
            error,
        };

        let response = self.request.send(self.request.get(&url), fetch_error).await?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(fetch_error(format!("artifact request returned {status}")));
        }

        let body = response.text().await.map_err(|e| {
            PassportError::from_reqwest(&url, &e, |error| fetch_error(error))
        })?;

        let json = extract_abi(&body).map_err(fetch_error)?;
        Ok(Arc::new(ContractAbi::new(contract_type, json)))
    }
}

fn validate_contract_type(contract_type: &str) -> Result<(), PassportError> {
    if contract_type.is_empty() {
        return Err(PassportError::MissingParameters {
            parameter: "contract_type".to_string(),
        });
    }
    if !contract_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PassportError::AbiFetchError {
            contract_type: contract_type.to_string(),
            error: "contract type must be alphanumeric".to_string(),
        });
    }
    Ok(())
}

/// Pulls the `abi` array out of an artifact document and re-serializes it.
fn extract_abi(body: &str) -> Result<String, String> {
    let artifact: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("malformed artifact JSON: {e}"))?;
    match artifact.get("abi") {
        Some(abi @ serde_json::Value::Array(_)) => Ok(abi.to_string()),
        Some(_) => Err("artifact `abi` field is not an array".to_string()),
        None => Err("artifact has no `abi` field".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    const ARTIFACT: &str = r#"{
        "contractName": "LoyaltyContract",
        "abi": [{
            "inputs": [{"internalType": "address", "name": "user", "type": "address"}],
            "name": "checkPoints",
            "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }],
        "bytecode": "0x"
    }"#;

    #[test]
    fn test_contract_type_names() {
        assert_eq!(ContractType::Loyalty.to_string(), "LoyaltyContract");
        assert_eq!(ContractType::StoredValue.as_ref(), "ERC20TestContract");
        for contract_type in ContractType::iter() {
            assert_eq!(
                ContractType::from_str(contract_type.as_ref()).unwrap(),
                contract_type
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_abi_returns_json_array() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/LoyaltyContract.json")
            .with_status(200)
            .with_body(ARTIFACT)
            .create_async()
            .await;

        let registry = AbiRegistry::new(&server.url(), Duration::from_secs(5));
        let abi = registry.fetch(ContractType::Loyalty).await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(abi.json()).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["name"], "checkPoints");
        assert_eq!(abi.contract_type(), "LoyaltyContract");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_abi_is_cached_and_single_flight() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/LoyaltyContract.json")
            .with_status(200)
            .with_body(ARTIFACT)
            .expect(1)
            .create_async()
            .await;

        let registry = AbiRegistry::new(&server.url(), Duration::from_secs(5));
        let (a, b, c) = tokio::join!(
            registry.fetch_abi("LoyaltyContract"),
            registry.fetch_abi("LoyaltyContract"),
            registry.fetch_abi("LoyaltyContract"),
        );
        let again = registry.fetch_abi("LoyaltyContract").await.unwrap();

        assert_eq!(a.unwrap(), again);
        assert_eq!(b.unwrap(), again);
        assert_eq!(c.unwrap(), again);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_abi_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/MissingContract.json")
            .with_status(404)
            .with_body("Not found")
            .expect(2)
            .create_async()
            .await;

        let registry = AbiRegistry::new(&server.url(), Duration::from_secs(5));
        let err = registry.fetch_abi("MissingContract").await.unwrap_err();
        assert!(matches!(
            err,
            PassportError::AbiFetchError { ref contract_type, .. } if contract_type == "MissingContract"
        ));

        // errors are not cached
        assert!(registry.fetch_abi("MissingContract").await.is_err());
        mock.assert_async().await;
    }

    #[test_case(r#"{"contractName": "LoyaltyContract"}"# ; "missing abi key")]
    #[test_case(r#"{"abi": {"name": "checkPoints"}}"# ; "abi is not an array")]
    #[test_case("<html>oops</html>" ; "not json")]
    fn test_extract_abi_rejects_malformed_artifacts(body: &str) {
        assert!(extract_abi(body).is_err());
    }

    #[tokio::test]
    async fn test_fetch_abi_malformed_artifact() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/LoyaltyContract.json")
            .with_status(200)
            .with_body(r#"{"bytecode": "0x"}"#)
            .create_async()
            .await;

        let registry = AbiRegistry::new(&server.url(), Duration::from_secs(5));
        let err = registry.fetch(ContractType::Loyalty).await.unwrap_err();
        assert!(matches!(err, PassportError::AbiFetchError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_abi_rejects_path_characters() {
        let registry = AbiRegistry::new("https://example.org", Duration::from_secs(5));
        assert!(matches!(
            registry.fetch_abi("../secrets").await.unwrap_err(),
            PassportError::AbiFetchError { .. }
        ));
        assert!(matches!(
            registry.fetch_abi("").await.unwrap_err(),
            PassportError::MissingParameters { .. }
        ));
    }
}
