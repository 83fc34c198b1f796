//! Login: OAuth2 with PKCE, account address resolution and the login-code signature.

pub mod account;
pub mod oauth;
pub mod pkce;
pub mod session;

pub use account::AccountClient;
pub use oauth::{extract_code, OAuthClient, TokenSet};
pub use pkce::PkceChallenge;
pub use session::{InMemorySessionStore, LoginProof, Session, SessionState, SessionStore};
