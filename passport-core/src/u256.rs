use alloy_primitives::U256;

use crate::error::PassportError;

/// A wrapper around `U256` so on-chain quantities (loyalty points, token balances) can cross the
/// FFI boundary.
///
/// Foreign languages have no native 256-bit integer, so the value is exposed as decimal (for
/// display) or padded big-endian hex (for transport).
#[allow(clippy::module_name_repetitions)]
#[derive(uniffi::Object, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct U256Wrapper(pub U256);

#[uniffi::export]
impl U256Wrapper {
    /// Outputs a hex string representation of the `U256` value padded to 32 bytes (plus two bytes for the `0x` prefix).
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        format!("{:#066x}", self.0)
    }

    /// Outputs the base-10 representation, e.g. a points balance of `"150"`.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }

    /// Returns the value as `u64` if it fits.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    /// Returns `true` when the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Attempts to parse a hex string as a `U256` value (wrapped).
    ///
    /// # Errors
    /// Will return an `Error::InvalidNumber` if the input is not a valid hex-string-presented number up to 256 bits.
    #[uniffi::constructor]
    pub fn try_from_hex_string(hex_string: &str) -> Result<Self, PassportError> {
        let hex_string = hex_string.trim().trim_start_matches("0x");

        let number = U256::from_str_radix(hex_string, 16)
            .map_err(|_| PassportError::InvalidNumber)?;

        Ok(Self(number))
    }

    /// Attempts to parse a base-10 string as a `U256` value (wrapped).
    ///
    /// # Errors
    /// Will return an `Error::InvalidNumber` if the input is not a decimal number up to 256 bits.
    #[uniffi::constructor]
    pub fn try_from_decimal_string(decimal_string: &str) -> Result<Self, PassportError> {
        let number = U256::from_str_radix(decimal_string.trim(), 10)
            .map_err(|_| PassportError::InvalidNumber)?;

        Ok(Self(number))
    }

    /// Wraps a `u64`.
    #[uniffi::constructor]
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256Wrapper> for U256 {
    fn from(val: U256Wrapper) -> Self {
        val.0
    }
}

impl From<U256> for U256Wrapper {
    fn from(val: U256) -> Self {
        Self(val)
    }
}

impl std::fmt::Display for U256Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
