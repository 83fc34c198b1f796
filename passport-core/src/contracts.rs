//! Typed business operations on the passport contracts.
//!
//! Every operation requires a completed login, fetches the contract ABI through the registry,
//! binds it and then takes the read or write path. A failed read is an error, never a zero.

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use serde_json::Value;

use crate::{
    abi::ContractType,
    error::{PassportError, PassportResult},
    passport::Passport,
    primitives::ParseFromForeignBinding,
    u256::U256Wrapper,
};

/// ERC-1155 token id of the membership NFT checked by [`Passport::nft_check`].
pub const MEMBERSHIP_TOKEN_ID: u64 = 2;

#[uniffi::export(async_runtime = "tokio")]
impl Passport {
    /// Returns the ABI of `contract_type` as a JSON array.
    ///
    /// # Errors
    /// `AbiFetchError` or `Timeout`.
    pub async fn get_contract_abi(&self, contract_type: &str) -> Result<String, PassportError> {
        Ok(self.abis.fetch_abi(contract_type).await?.json().to_string())
    }

    /// Version string reported by `getVersion()`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn check_version(
        &self,
        contract_address: &str,
        contract_type: &str,
    ) -> Result<String, PassportError> {
        let values = self
            .read(contract_type, contract_address, "getVersion", vec![])
            .await?;
        expect_string(&values, "getVersion")
    }

    /// Balance of the membership NFT held by `user_address` on the configured NFT contract.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn nft_check(&self, user_address: &str) -> Result<U256Wrapper, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        let contract = self.config().nft_contract()?;
        let values = self
            .read(
                ContractType::Nft.as_ref(),
                &contract.to_string(),
                "balanceOfBatch",
                vec![
                    DynSolValue::Array(vec![DynSolValue::Address(user)]),
                    DynSolValue::Array(vec![uint(MEMBERSHIP_TOKEN_ID)]),
                ],
            )
            .await?;
        let balances = first(&values, "balanceOfBatch")?
            .as_array()
            .ok_or_else(|| shape_error("balanceOfBatch", "uint256[]"))?;
        balances
            .first()
            .and_then(DynSolValue::as_uint)
            .map(|(balance, _)| balance.into())
            .ok_or_else(|| shape_error("balanceOfBatch", "one balance per account"))
    }

    /// Whether `user_address` holds a membership issued by `owner_address`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn check_membership(
        &self,
        contract_address: &str,
        owner_address: &str,
        user_address: &str,
    ) -> Result<bool, PassportError> {
        let owner = Address::parse_from_ffi(owner_address, "owner_address")?;
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        let values = self
            .read(
                ContractType::MetadataMembership.as_ref(),
                contract_address,
                "confirmMembership",
                vec![DynSolValue::Address(owner), DynSolValue::Address(user)],
            )
            .await?;
        first(&values, "confirmMembership")?
            .as_bool()
            .ok_or_else(|| shape_error("confirmMembership", "bool"))
    }

    /// Metadata attached to the membership of `user_address` issued by `owner_address`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn get_membership_metadata(
        &self,
        contract_address: &str,
        owner_address: &str,
        user_address: &str,
    ) -> Result<String, PassportError> {
        let owner = Address::parse_from_ffi(owner_address, "owner_address")?;
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        let values = self
            .read(
                ContractType::MetadataMembership.as_ref(),
                contract_address,
                "getMembershipMetadata",
                vec![DynSolValue::Address(owner), DynSolValue::Address(user)],
            )
            .await?;
        expect_string(&values, "getMembershipMetadata")
    }

    /// Loyalty points held by `user_address`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn loyalty_check(
        &self,
        contract_address: &str,
        user_address: &str,
    ) -> Result<U256Wrapper, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        let values = self
            .read(
                ContractType::Loyalty.as_ref(),
                contract_address,
                "checkPoints",
                vec![DynSolValue::Address(user)],
            )
            .await?;
        expect_uint(&values, "checkPoints").map(Into::into)
    }

    /// Stored-value token balance of `user_address` on the configured stored-value contract.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn sv_check(&self, user_address: &str) -> Result<U256Wrapper, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        let contract = self.config().stored_value_contract()?;
        let values = self
            .read(
                ContractType::StoredValue.as_ref(),
                &contract.to_string(),
                "balanceOf",
                vec![DynSolValue::Address(user)],
            )
            .await?;
        expect_uint(&values, "balanceOf").map(Into::into)
    }

    /// Owner connected to a package `serial_number`, as a lowercase address.
    ///
    /// # Errors
    /// `NotLoggedIn`, `MissingParameters`, `AbiFetchError` or `ContractCallError`.
    pub async fn connected_package_query(
        &self,
        serial_number: &str,
    ) -> Result<String, PassportError> {
        self.connected_address("retrieveConnection", serial_number)
            .await
    }

    /// Account bound to an NFC tag `serial_number`, as a lowercase address.
    ///
    /// # Errors
    /// `NotLoggedIn`, `MissingParameters`, `AbiFetchError` or `ContractCallError`.
    pub async fn retrieve_nfc_id(&self, serial_number: &str) -> Result<String, PassportError> {
        self.connected_address("retrieveNFCID", serial_number).await
    }

    /// Pass identifier stored for an NFC tag `serial_number`.
    ///
    /// # Errors
    /// `NotLoggedIn`, `MissingParameters`, `AbiFetchError` or `ContractCallError`.
    pub async fn retrieve_nfc_pass(&self, serial_number: &str) -> Result<String, PassportError> {
        require_serial(serial_number)?;
        let contract = self.config().connected_contract()?;
        let values = self
            .read(
                ContractType::ConnectedPackaging.as_ref(),
                &contract.to_string(),
                "retrieveNFCPass",
                vec![DynSolValue::String(serial_number.trim().to_string())],
            )
            .await?;
        expect_string(&values, "retrieveNFCPass")
    }

    /// Grants a membership to `user_address` with `metadata`. Returns the transaction hash.
    ///
    /// # Errors
    /// `NotLoggedIn`, `SignerUnavailable`, `InvalidAddress`, `AbiFetchError`,
    /// `NonceFetchError`, `SigningError`, `BroadcastError` or `Timeout`.
    pub async fn add_membership(
        &self,
        contract_address: &str,
        user_address: &str,
        metadata: &str,
    ) -> Result<String, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        self.write(
            ContractType::MetadataMembership.as_ref(),
            contract_address,
            "addMembership",
            vec![
                DynSolValue::Address(user),
                DynSolValue::String(metadata.to_string()),
            ],
        )
        .await
    }

    /// Revokes the membership of `user_address`. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn remove_membership(
        &self,
        contract_address: &str,
        user_address: &str,
    ) -> Result<String, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        self.write(
            ContractType::MetadataMembership.as_ref(),
            contract_address,
            "removeMembership",
            vec![DynSolValue::Address(user)],
        )
        .await
    }

    /// Credits `points` to `user_address`. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn loyalty_add(
        &self,
        contract_address: &str,
        user_address: &str,
        points: u64,
    ) -> Result<String, PassportError> {
        self.points_write(contract_address, user_address, "addPoints", points)
            .await
    }

    /// Converts `points` of `user_address` into stored-value coins. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn convert_points_to_coins(
        &self,
        contract_address: &str,
        user_address: &str,
        points: u64,
    ) -> Result<String, PassportError> {
        self.points_write(contract_address, user_address, "convertPointsToCoins", points)
            .await
    }

    /// Removes `points` from `user_address` without reward. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn loyalty_forfeit(
        &self,
        contract_address: &str,
        user_address: &str,
        points: u64,
    ) -> Result<String, PassportError> {
        self.points_write(contract_address, user_address, "forfeitPoints", points)
            .await
    }

    /// Spends `points` of `user_address` on a reward. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn loyalty_redeem(
        &self,
        contract_address: &str,
        user_address: &str,
        points: u64,
    ) -> Result<String, PassportError> {
        self.points_write(contract_address, user_address, "redeemPoints", points)
            .await
    }

    /// Connects package `serial_number` to `user_address`. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`], plus `MissingParameters` for an empty serial.
    pub async fn connected_package_publish(
        &self,
        user_address: &str,
        serial_number: &str,
    ) -> Result<String, PassportError> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        require_serial(serial_number)?;
        let contract = self.config().connected_contract()?;
        self.write(
            ContractType::ConnectedPackaging.as_ref(),
            &contract.to_string(),
            "claimConnection",
            vec![
                DynSolValue::String(serial_number.trim().to_string()),
                DynSolValue::Address(user),
            ],
        )
        .await
    }

    /// Removes the connection of package `serial_number`. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::connected_package_publish`].
    pub async fn connected_package_purge(
        &self,
        serial_number: &str,
    ) -> Result<String, PassportError> {
        require_serial(serial_number)?;
        let contract = self.config().connected_contract()?;
        self.write(
            ContractType::ConnectedPackaging.as_ref(),
            &contract.to_string(),
            "revokeConnection",
            vec![DynSolValue::String(serial_number.trim().to_string())],
        )
        .await
    }

    /// Calls any view function with textual arguments and returns the outputs as a JSON array.
    ///
    /// # Errors
    /// `NotLoggedIn`, `AbiFetchError`, `InvalidAddress` or `ContractCallError`.
    pub async fn call_contract(
        &self,
        contract_type: &str,
        contract_address: &str,
        function_name: &str,
        args: Vec<String>,
    ) -> Result<String, PassportError> {
        self.require_login().await?;
        let abi = self.abis.fetch_abi(contract_type).await?;
        let binding = self.chain.bind(contract_address, &abi)?;
        let args = binding.coerce_args(function_name, &args)?;
        let values = self.chain.call_view(&binding, function_name, &args).await?;
        Ok(values_to_json(&values).to_string())
    }

    /// Sends any state-changing function with textual arguments. Returns the transaction hash.
    ///
    /// # Errors
    /// See [`Passport::add_membership`].
    pub async fn send_contract_transaction(
        &self,
        contract_type: &str,
        contract_address: &str,
        function_name: &str,
        args: Vec<String>,
    ) -> Result<String, PassportError> {
        self.require_login().await?;
        let signer = self.signer()?;
        let abi = self.abis.fetch_abi(contract_type).await?;
        let binding = self.chain.bind(contract_address, &abi)?;
        let args = binding.coerce_args(function_name, &args)?;
        let hash = self
            .chain
            .submit_transaction(&binding, function_name, &args, signer.as_ref())
            .await?;
        Ok(hash.to_string())
    }
}

impl Passport {
    async fn read(
        &self,
        contract_type: &str,
        contract_address: &str,
        function_name: &str,
        args: Vec<DynSolValue>,
    ) -> PassportResult<Vec<DynSolValue>> {
        self.require_login().await?;
        let abi = self.abis.fetch_abi(contract_type).await?;
        let binding = self.chain.bind(contract_address, &abi)?;
        self.chain.call_view(&binding, function_name, &args).await
    }

    async fn write(
        &self,
        contract_type: &str,
        contract_address: &str,
        function_name: &str,
        args: Vec<DynSolValue>,
    ) -> PassportResult<String> {
        self.require_login().await?;
        let signer = self.signer()?;
        let abi = self.abis.fetch_abi(contract_type).await?;
        let binding = self.chain.bind(contract_address, &abi)?;
        let hash = self
            .chain
            .submit_transaction(&binding, function_name, &args, signer.as_ref())
            .await?;
        Ok(hash.to_string())
    }

    async fn points_write(
        &self,
        contract_address: &str,
        user_address: &str,
        function_name: &str,
        points: u64,
    ) -> PassportResult<String> {
        let user = Address::parse_from_ffi(user_address, "user_address")?;
        self.write(
            ContractType::Loyalty.as_ref(),
            contract_address,
            function_name,
            vec![DynSolValue::Address(user), uint(points)],
        )
        .await
    }

    async fn connected_address(
        &self,
        function_name: &str,
        serial_number: &str,
    ) -> PassportResult<String> {
        require_serial(serial_number)?;
        let contract = self.config().connected_contract()?;
        let values = self
            .read(
                ContractType::ConnectedPackaging.as_ref(),
                &contract.to_string(),
                function_name,
                vec![DynSolValue::String(serial_number.trim().to_string())],
            )
            .await?;
        first(&values, function_name)?
            .as_address()
            .map(|address| format!("0x{}", hex::encode(address)))
            .ok_or_else(|| shape_error(function_name, "address"))
    }
}

fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

fn require_serial(serial_number: &str) -> PassportResult<()> {
    if serial_number.trim().is_empty() {
        return Err(PassportError::MissingParameters {
            parameter: "serial_number".to_string(),
        });
    }
    Ok(())
}

fn first<'a>(values: &'a [DynSolValue], function: &str) -> PassportResult<&'a DynSolValue> {
    values
        .first()
        .ok_or_else(|| shape_error(function, "one return value"))
}

fn expect_uint(values: &[DynSolValue], function: &str) -> PassportResult<U256> {
    first(values, function)?
        .as_uint()
        .map(|(value, _)| value)
        .ok_or_else(|| shape_error(function, "uint"))
}

fn expect_string(values: &[DynSolValue], function: &str) -> PassportResult<String> {
    first(values, function)?
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| shape_error(function, "string"))
}

fn shape_error(function: &str, expected: &str) -> PassportError {
    PassportError::ContractCallError {
        function: function.to_string(),
        error: format!("unexpected return shape, expected {expected}"),
    }
}

/// JSON rendering of decoded values. Integers become decimal strings, byte values `0x` hex.
#[must_use]
pub fn values_to_json(values: &[DynSolValue]) -> Value {
    Value::Array(values.iter().map(value_to_json).collect())
}

fn value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Address(address) => Value::String(address.to_string()),
        DynSolValue::Function(function) => Value::String(format!("0x{}", hex::encode(function))),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            values_to_json(items)
        }
        #[allow(unreachable_patterns)]
        _ => Value::Null,
    }
}
