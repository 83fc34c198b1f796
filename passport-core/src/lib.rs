//! `passport-core` is the engine behind the Passport mobile SDK.
//!
//! It resolves contract ABIs by logical name, binds them to addresses on an EVM chain and
//! performs read-only calls or signed, nonce-sequenced transactions. Around that sit the
//! OAuth2 + PKCE login, the passport backend (wallet passes, rulesets, scan actions) and an
//! event feed for the host UI.
//!
//! The host only sees [`Passport`], [`PassportConfig`] and the foreign traits
//! ([`logger::Logger`], [`SessionStore`], [`PassportListener`]) through `UniFFI`.
#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]

pub mod abi;
pub use abi::{AbiRegistry, ContractAbi, ContractType};

pub mod auth;
pub use auth::{InMemorySessionStore, LoginProof, SessionState, SessionStore};

pub mod backend;

pub mod chain;

pub mod config;
pub use config::PassportConfig;

pub mod contracts;

mod error;
pub use error::*;

pub mod events;
pub use events::{PassportEvent, PassportListener};

pub mod logger;

mod passport;
pub use passport::Passport;

pub mod primitives;

pub mod scan;
pub use scan::{ScanPayload, ScanType};

mod u256;
pub use u256::*;

// private modules
mod http_request;

uniffi::setup_scaffolding!("passport_core");
