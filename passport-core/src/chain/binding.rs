//! A contract ABI bound to a deployed address: call encoding, output decoding and
//! argument coercion from strings.

use alloy_core::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi},
};
use alloy_primitives::Address;

use crate::error::PassportError;

/// A contract address paired with its parsed ABI.
///
/// Built per call from a fetched [`crate::abi::ContractAbi`] and never persisted.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    contract_type: String,
    address: Address,
    abi: JsonAbi,
}

impl ContractBinding {
    /// Parses `abi_json` and binds it to `address`.
    ///
    /// # Errors
    /// Returns `AbiParseError` if `abi_json` is not a JSON array of ABI descriptors.
    pub fn new(
        contract_type: impl Into<String>,
        address: Address,
        abi_json: &str,
    ) -> Result<Self, PassportError> {
        let value: serde_json::Value =
            serde_json::from_str(abi_json).map_err(|e| PassportError::AbiParseError {
                error: e.to_string(),
            })?;
        if !value.is_array() {
            return Err(PassportError::AbiParseError {
                error: "ABI must be a JSON array".to_string(),
            });
        }
        let abi: JsonAbi =
            serde_json::from_value(value).map_err(|e| PassportError::AbiParseError {
                error: e.to_string(),
            })?;

        Ok(Self {
            contract_type: contract_type.into(),
            address,
            abi,
        })
    }

    /// Logical contract name.
    #[must_use]
    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    /// Deployed contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Parsed ABI.
    #[must_use]
    pub const fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Looks up `name`, choosing among overloads by argument count.
    ///
    /// # Errors
    /// `ContractCallError` if no function with that name and arity exists.
    pub fn function(&self, name: &str, arg_count: usize) -> Result<&Function, PassportError> {
        let overloads = self.abi.function(name).ok_or_else(|| call_error(
            name,
            format!("{} has no function {name}", self.contract_type),
        ))?;
        overloads
            .iter()
            .find(|function| function.inputs.len() == arg_count)
            .ok_or_else(|| {
                call_error(
                    name,
                    format!("no overload of {name} takes {arg_count} arguments"),
                )
            })
    }

    /// ABI-encodes a call to `name` with `args`, selector included.
    ///
    /// # Errors
    /// `ContractCallError` if the function is unknown or the arguments do not match its inputs.
    pub fn encode_call(&self, name: &str, args: &[DynSolValue]) -> Result<Vec<u8>, PassportError> {
        let function = self.function(name, args.len())?;
        function
            .abi_encode_input(args)
            .map_err(|e| call_error(name, format!("encoding arguments: {e}")))
    }

    /// Decodes the return data of `name` per its declared outputs.
    ///
    /// # Errors
    /// `ContractCallError` if the data does not match the output types. Empty return data is
    /// treated as an error, not as a zero value.
    pub fn decode_output(
        &self,
        name: &str,
        arg_count: usize,
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, PassportError> {
        let function = self.function(name, arg_count)?;
        if data.is_empty() && !function.outputs.is_empty() {
            return Err(call_error(
                name,
                "empty return data (no contract at address?)".to_string(),
            ));
        }
        function
            .abi_decode_output(data)
            .map_err(|e| call_error(name, format!("decoding output: {e}")))
    }

    /// Converts string arguments to typed values according to the inputs of `name`.
    ///
    /// Used by hosts and the CLI, which only have textual arguments at hand.
    ///
    /// # Errors
    /// `ContractCallError` if the function is unknown or an argument does not parse.
    pub fn coerce_args(&self, name: &str, args: &[String]) -> Result<Vec<DynSolValue>, PassportError> {
        let function = self.function(name, args.len())?;
        function
            .inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty = param
                    .resolve()
                    .map_err(|e| call_error(name, format!("input {}: {e}", param.name)))?;
                ty.coerce_str(arg)
                    .map_err(|e| call_error(name, format!("argument {arg:?} for {}: {e}", param.ty)))
            })
            .collect()
    }
}

fn call_error(function: &str, error: String) -> PassportError {
    PassportError::ContractCallError {
        function: function.to_string(),
        error,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    pub(crate) const LOYALTY_ABI: &str = r#"[
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
        },
        {
            "inputs": [
                {"internalType": "address", "name": "user", "type": "address"},
                {"internalType": "uint256", "name": "points", "type": "uint256"},
                {"internalType": "uint256", "name": "eventId", "type": "uint256"}
            ],
            "name": "addPoints",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]"#;

    const CONTRACT: Address = address!("0x61ff3d77ab2befece7b1c8e0764ac973ad85a9ef");
    const USER: Address = address!("0x375fa2f7fec390872a04f9c147c943eb8e48c43d");

    #[test]
    fn test_rejects_non_array_abi() {
        let err = ContractBinding::new("LoyaltyContract", CONTRACT, r#"{"abi": []}"#).unwrap_err();
        assert!(matches!(err, PassportError::AbiParseError { .. }));

        let err = ContractBinding::new("LoyaltyContract", CONTRACT, "not json").unwrap_err();
        assert!(matches!(err, PassportError::AbiParseError { .. }));
    }

    #[test]
    fn test_encode_call_uses_selector() {
        let binding = ContractBinding::new("LoyaltyContract", CONTRACT, LOYALTY_ABI).unwrap();
        let data = binding
            .encode_call("checkPoints", &[DynSolValue::Address(USER)])
            .unwrap();

        let selector = binding.function("checkPoints", 1).unwrap().selector();
        assert_eq!(&data[..4], selector.as_slice());
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[16..36], USER.as_slice());
    }

    #[test]
    fn test_overload_is_chosen_by_arity() {
        let binding = ContractBinding::new("LoyaltyContract", CONTRACT, LOYALTY_ABI).unwrap();
        let two = binding.function("addPoints", 2).unwrap();
        let three = binding.function("addPoints", 3).unwrap();
        assert_ne!(two.selector(), three.selector());
        assert!(binding.function("addPoints", 1).is_err());
    }

    #[test]
    fn test_unknown_function() {
        let binding = ContractBinding::new("LoyaltyContract", CONTRACT, LOYALTY_ABI).unwrap();
        let err = binding.encode_call("burn", &[]).unwrap_err();
        assert!(matches!(
            err,
            PassportError::ContractCallError { function, .. } if function == "burn"
        ));
    }

    #[test]
    fn test_decode_output() {
        let binding = ContractBinding::new("LoyaltyContract", CONTRACT, LOYALTY_ABI).unwrap();
        let data = U256::from(150).to_be_bytes::<32>();

        let values = binding.decode_output("checkPoints", 1, &data).unwrap();
        assert_eq!(values, vec![DynSolValue::Uint(U256::from(150), 256)]);

        // a failed call must not read as a zero balance
        assert!(binding.decode_output("checkPoints", 1, &[]).is_err());
    }

    #[test]
    fn test_coerce_args() {
        let binding = ContractBinding::new("LoyaltyContract", CONTRACT, LOYALTY_ABI).unwrap();
        let args = binding
            .coerce_args(
                "addPoints",
                &[
                    "0x375fa2f7fec390872a04f9c147c943eb8e48c43d".to_string(),
                    "25".to_string(),
                ],
            )
            .unwrap();
        assert_eq!(
            args,
            vec![
                DynSolValue::Address(USER),
                DynSolValue::Uint(U256::from(25), 256)
            ]
        );

        assert!(binding
            .coerce_args("addPoints", &["nope".to_string(), "25".to_string()])
            .is_err());
    }
}
