//! PKCE verifier/challenge pairs and the OAuth `state` nonce.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Fresh per-attempt values for an authorization request.
///
/// The verifier stays inside the SDK until the token exchange; only the S256 challenge leaves
/// the device in the authorization URL.
pub struct PkceChallenge {
    verifier: SecretString,
    challenge: String,
    state: String,
    nonce: String,
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("challenge", &self.challenge)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PkceChallenge {
    /// Generates a random verifier, its S256 challenge and random `state`/`nonce` values.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_token();
        let challenge = s256(&verifier);
        Self {
            verifier: SecretString::from(verifier),
            challenge,
            state: random_token(),
            nonce: random_token(),
        }
    }

    /// `code_verifier` sent with the token exchange.
    #[must_use]
    pub const fn verifier(&self) -> &SecretString {
        &self.verifier
    }

    /// `code_challenge` sent with the authorization request.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// `state` echoed back on the redirect.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// OpenID `nonce`.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    #[cfg(test)]
    pub(crate) fn matches(&self, challenge: &str) -> bool {
        s256(self.verifier.expose_secret()) == challenge
    }
}

/// 32 random bytes, base64url without padding (43 characters).
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
