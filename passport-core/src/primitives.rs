//! Parsing of primitive values received over the foreign-language boundary.

use alloy_primitives::Address;
use std::str::FromStr;

use crate::error::PassportError;

/// A trait for parsing primitive types from foreign bindings.
///
/// Hosts hand the SDK addresses as strings (typed by a user, scanned from a tag, returned by
/// the account service). This parses them into strong types with an error naming the
/// offending argument.
///
/// # Examples
/// ```rust,ignore
/// let address = Address::parse_from_ffi("0x375fa2f7fec390872a04f9c147c943eb8e48c43d", "user_address")?;
/// ```
///
/// # Errors
/// - `PassportError::InvalidAddress` if the provided string is not a valid address.
pub trait ParseFromForeignBinding {
    /// Parses a required value.
    fn parse_from_ffi(s: &str, attr: &'static str) -> Result<Self, PassportError>
    where
        Self: Sized;
}

impl ParseFromForeignBinding for Address {
    fn parse_from_ffi(s: &str, attr: &'static str) -> Result<Self, PassportError> {
        let s = s.trim();
        // Checksums are not enforced: the backend and tags hand out lowercase addresses.
        let body = s.strip_prefix("0x").unwrap_or(s);
        if body.len() != 40 {
            return Err(PassportError::InvalidAddress {
                attribute: attr.to_string(),
                reason: format!("expected 40 hex characters, got {}", body.len()),
            });
        }
        Self::from_str(body).map_err(|e| PassportError::InvalidAddress {
            attribute: attr.to_string(),
            reason: e.to_string(),
        })
    }
}
