//! Classification and routing of scanned NFC/QR payloads.
//!
//! The host's scanner hands over an opaque string. It is either a bare account address, a
//! tag serial number, or a JSON envelope whose `scanType` picks a backend action.

use alloy_primitives::Address;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    error::{PassportError, PassportResult},
    primitives::ParseFromForeignBinding,
};

/// Actions a JSON scan envelope can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, uniffi::Enum)]
pub enum ScanType {
    /// Claim an airdropped token.
    #[strum(serialize = "AIR_DROP")]
    AirDrop,
    /// Ask the merchant for loyalty points.
    #[strum(serialize = "REQUEST_LOYALTY_POINTS")]
    RequestLoyaltyPoints,
}

impl ScanType {
    /// Envelope fields that must be present and non-empty.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::AirDrop => &["contractAddress", "tokenId"],
            Self::RequestLoyaltyPoints => &["contractAddress", "points"],
        }
    }

    /// Backend path, relative to the passport base URL.
    #[must_use]
    pub fn path(self, chain_id: u64) -> String {
        match self {
            Self::AirDrop => format!("/chains/{chain_id}/airdrop"),
            Self::RequestLoyaltyPoints => format!("/chains/{chain_id}/loyalty/points/request"),
        }
    }
}

/// A classified scan.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum ScanPayload {
    /// A `0x`-prefixed 20-byte account address.
    Address {
        /// Lowercase `0x` address.
        address: String,
    },
    /// A tag or package serial number.
    Serial {
        /// The serial as scanned, trimmed.
        serial: String,
    },
    /// A JSON envelope with a recognized `scanType`.
    Envelope {
        /// Requested action.
        scan_type: ScanType,
        /// The envelope, re-serialized.
        json: String,
    },
}

impl ScanPayload {
    /// Classifies a raw scanned string.
    ///
    /// # Errors
    /// `InvalidScanPayload` for empty input, malformed JSON, an envelope without a string
    /// `scanType`, or an unrecognized `scanType`.
    pub fn parse(raw: &str) -> PassportResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid("payload is empty"));
        }
        if raw.starts_with('{') {
            let (scan_type, envelope) = parse_envelope(raw)?;
            return Ok(Self::Envelope {
                scan_type,
                json: Value::Object(envelope).to_string(),
            });
        }
        // Serials may be bare hex of any length; only a `0x` prefix marks an address.
        if let Some(address) = raw
            .starts_with("0x")
            .then(|| Address::parse_from_ffi(raw, "payload").ok())
            .flatten()
        {
            return Ok(Self::Address {
                address: format!("0x{}", hex::encode(address)),
            });
        }
        Ok(Self::Serial {
            serial: raw.to_string(),
        })
    }
}

/// A validated envelope ready to be posted to the passport backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedScan {
    /// Requested action.
    pub scan_type: ScanType,
    /// Backend path, relative to the passport base URL.
    pub path: String,
    /// Request body: the envelope without `scanType`.
    pub body: Map<String, Value>,
}

/// Validates a JSON scan envelope and resolves its backend route.
///
/// Performs no I/O, so an unknown `scanType` is rejected before anything touches the network.
///
/// # Errors
/// `InvalidScanPayload` for anything that is not a known envelope, `MissingParameters` when a
/// field required by the `scanType` is absent or empty.
pub fn route(raw: &str, chain_id: u64) -> PassportResult<RoutedScan> {
    let raw = raw.trim();
    if !raw.starts_with('{') {
        return Err(invalid("expected a JSON scan envelope"));
    }
    let (scan_type, mut body) = parse_envelope(raw)?;
    body.remove("scanType");

    for field in scan_type.required_fields() {
        let present = match body.get(*field) {
            None | Some(Value::Null) => false,
            Some(Value::String(value)) => !value.trim().is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(PassportError::MissingParameters {
                parameter: (*field).to_string(),
            });
        }
    }

    Ok(RoutedScan {
        scan_type,
        path: scan_type.path(chain_id),
        body,
    })
}

fn parse_envelope(raw: &str) -> PassportResult<(ScanType, Map<String, Value>)> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| invalid(&format!("malformed JSON: {e}")))?;
    let Value::Object(envelope) = value else {
        return Err(invalid("envelope must be a JSON object"));
    };
    let scan_type = envelope
        .get("scanType")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("envelope has no scanType"))?;
    let scan_type: ScanType = scan_type
        .parse()
        .map_err(|_| invalid(&format!("unknown scanType {scan_type}")))?;
    Ok((scan_type, envelope))
}

fn invalid(reason: &str) -> PassportError {
    PassportError::InvalidScanPayload {
        reason: reason.to_string(),
    }
}
