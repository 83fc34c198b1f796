//! Transaction signing keys.

use std::str::FromStr;

use alloy_primitives::{Address, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::PassportError;

/// Produces signatures over transaction hashes.
///
/// The chain client only ever sees this trait, so the key can live in a hardware keystore or
/// a remote signer without touching the transaction pipeline.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Address transactions are sent from.
    fn address(&self) -> Address;

    /// Signs a 32-byte pre-hash.
    ///
    /// # Errors
    /// `SigningError` if the signature cannot be produced.
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, PassportError>;
}

/// Signs with an in-memory secp256k1 private key.
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// Parses a hex private key, with or without `0x` prefix.
    ///
    /// # Errors
    /// `SignerUnavailable` if the key is not 32 bytes of valid hex or not a valid scalar.
    pub fn from_secret(key: &SecretString) -> Result<Self, PassportError> {
        let inner = PrivateKeySigner::from_str(key.expose_secret().trim()).map_err(|_| {
            PassportError::SignerUnavailable {
                reason: "private key is not a valid 32-byte hex secp256k1 key".to_string(),
            }
        })?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, PassportError> {
        self.inner
            .sign_hash_sync(hash)
            .map_err(|e| PassportError::SigningError {
                error: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};
    use test_case::test_case;

    const TEST_KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_derives_address() {
        let signer = LocalSigner::from_secret(&SecretString::from(TEST_KEY)).unwrap();
        assert_eq!(
            signer.address(),
            address!("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")
        );

        let unprefixed = TEST_KEY.trim_start_matches("0x");
        let signer = LocalSigner::from_secret(&SecretString::from(unprefixed)).unwrap();
        assert_eq!(
            signer.address(),
            address!("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")
        );
    }

    #[test_case("" ; "empty")]
    #[test_case("0x1234" ; "too short")]
    #[test_case("0xzz0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318" ; "not hex")]
    #[test_case("0x0000000000000000000000000000000000000000000000000000000000000000" ; "zero scalar")]
    fn test_rejects_bad_keys(key: &str) {
        let err = LocalSigner::from_secret(&SecretString::from(key)).unwrap_err();
        assert!(matches!(err, PassportError::SignerUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_signature_recovers_to_signer() {
        let signer = LocalSigner::from_secret(&SecretString::from(TEST_KEY)).unwrap();
        let hash = keccak256(b"passport");
        let signature = signer.sign_hash(&hash).await.unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let signer = LocalSigner::from_secret(&SecretString::from(TEST_KEY)).unwrap();
        let debug = format!("{signer:?}");
        assert!(!debug.contains("4c0883a6"));
    }
}
