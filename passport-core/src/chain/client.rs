//! Read path (`eth_call`) and write path (nonce, EIP-155 signing, broadcast) over one chain.

use std::sync::Arc;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::dyn_abi::DynSolValue;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, TxKind, B256, U256};

use crate::{
    abi::ContractAbi,
    chain::{
        binding::ContractBinding,
        nonce::NonceManager,
        rpc::{AlloyRpc, ChainRpc},
        signer::TransactionSigner,
    },
    config::PassportConfig,
    error::PassportError,
    primitives::ParseFromForeignBinding,
};

/// Gas limit attached to every write.
pub const GAS_LIMIT: u64 = 150_000;

/// Gas price attached to every write (21 gwei).
pub const GAS_PRICE_WEI: u128 = 21_000_000_000;

/// Talks to one chain through one JSON-RPC endpoint.
///
/// Holds no per-call state apart from the per-signer nonce slots, and is meant to be shared
/// behind an `Arc`.
pub struct ChainClient {
    rpc: Arc<dyn ChainRpc>,
    chain_id: u64,
    nonces: NonceManager,
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl ChainClient {
    /// Creates a client over an arbitrary [`ChainRpc`].
    #[must_use]
    pub fn new(rpc: Arc<dyn ChainRpc>, chain_id: u64) -> Self {
        Self {
            rpc,
            chain_id,
            nonces: NonceManager::default(),
        }
    }

    /// Creates a client posting to the configured `{rpc_url}/{chain_id}` endpoint.
    ///
    /// # Errors
    /// `InvalidConfig` if the endpoint is not a URL.
    pub fn from_config(config: &PassportConfig) -> Result<Self, PassportError> {
        let rpc = AlloyRpc::new(&config.rpc_endpoint(), config.request_timeout())?;
        Ok(Self::new(Arc::new(rpc), config.chain_id))
    }

    /// Chain id every transaction is signed for.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Binds `abi` to the contract deployed at `address`.
    ///
    /// # Errors
    /// - `InvalidAddress` if `address` is not a 20-byte hex address.
    /// - `AbiParseError` if the ABI is not a JSON array of descriptors.
    pub fn bind(&self, address: &str, abi: &ContractAbi) -> Result<ContractBinding, PassportError> {
        let address = Address::parse_from_ffi(address, "contract_address")?;
        ContractBinding::new(abi.contract_type(), address, abi.json())
    }

    /// Performs a read-only `eth_call` and decodes the declared outputs.
    ///
    /// # Errors
    /// `ContractCallError` on encoding, RPC or decoding failure, `Timeout` if the node does not
    /// answer. A failure is never reported as a zero value.
    pub async fn call_view(
        &self,
        binding: &ContractBinding,
        function_name: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, PassportError> {
        let data = binding.encode_call(function_name, args)?;
        log::debug!(
            "eth_call {}.{function_name} at {}",
            binding.contract_type(),
            binding.address()
        );

        let output = self
            .rpc
            .call(binding.address(), data.into())
            .await
            .map_err(|err| {
                err.into_passport_error(|error| PassportError::ContractCallError {
                    function: function_name.to_string(),
                    error,
                })
            })?;

        binding.decode_output(function_name, args.len(), &output)
    }

    /// Signs and broadcasts a state-changing call, returning the transaction hash without
    /// waiting for it to be mined.
    ///
    /// Writes for one signer are serialized from nonce fetch through broadcast. The nonce is
    /// recorded as used only once the node accepts the transaction.
    ///
    /// # Errors
    /// `ContractCallError` for arguments that do not match the ABI, then `NonceFetchError`,
    /// `SigningError` or `BroadcastError` depending on the failing step, or `Timeout`.
    pub async fn submit_transaction(
        &self,
        binding: &ContractBinding,
        function_name: &str,
        args: &[DynSolValue],
        signer: &dyn TransactionSigner,
    ) -> Result<B256, PassportError> {
        let input = binding.encode_call(function_name, args)?;
        let from = signer.address();

        let mut slot = self.nonces.acquire(from).await;

        let chain_nonce = self.rpc.transaction_count(from).await.map_err(|err| {
            err.into_passport_error(|error| PassportError::NonceFetchError { error })
        })?;
        let nonce = slot.next_nonce(chain_nonce);

        let tx = build_transaction(self.chain_id, nonce, binding.address(), input);
        let signature = signer.sign_hash(&tx.signature_hash()).await?;
        let signed = tx.into_signed(signature);
        let local_hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();

        let tx_hash = self.rpc.send_raw_transaction(&raw).await.map_err(|err| {
            err.into_passport_error(|error| PassportError::BroadcastError { error })
        })?;
        slot.record_submitted(nonce);
        drop(slot);

        if tx_hash != local_hash {
            log::warn!("node reported hash {tx_hash} for locally computed {local_hash}");
        }
        log::info!(
            "submitted {}.{function_name} from {from} with nonce {nonce}: {tx_hash}",
            binding.contract_type()
        );
        Ok(tx_hash)
    }
}

/// Builds the unsigned legacy transaction for a contract call.
pub(crate) fn build_transaction(chain_id: u64, nonce: u64, to: Address, input: Vec<u8>) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price: GAS_PRICE_WEI,
        gas_limit: GAS_LIMIT,
        to: TxKind::Call(to),
        value: U256::ZERO,
        input: input.into(),
    }
}
