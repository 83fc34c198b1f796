//! On-chain access: contract binding, the read path and the write path.

pub mod binding;
pub mod client;
pub mod nonce;
pub mod rpc;
pub mod signer;

pub use binding::ContractBinding;
pub use client::{ChainClient, GAS_LIMIT, GAS_PRICE_WEI};
pub use rpc::{AlloyRpc, ChainRpc, RpcError};
pub use signer::{LocalSigner, TransactionSigner};
