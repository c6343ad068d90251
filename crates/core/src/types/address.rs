//! EVM account address type.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing an [`EvmAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The input string is empty.
    #[error("address cannot be empty")]
    Empty,
    /// The input does not hold exactly 40 hex digits.
    #[error("address must be 40 hex digits (got {len})")]
    InvalidLength {
        /// Number of hex digits found after the optional `0x` prefix.
        len: usize,
    },
    /// The input contains a non-hex character.
    #[error("address must be hexadecimal")]
    InvalidHex,
}

/// A 20-byte EVM account address.
///
/// Attestor, allocator and validator identities in both proof services are
/// plain Ethereum addresses. Parsing ignores EIP-55 checksum casing, so a
/// checksummed address and its lowercase form compare equal.
///
/// ## Examples
///
/// ```
/// use zkcart_core::EvmAddress;
///
/// let a = EvmAddress::parse("0x19a567b3b212a5b35bA0E3B600FbEd5c2eE9083d").unwrap();
/// let b = EvmAddress::parse("0x19a567b3b212a5b35ba0e3b600fbed5c2ee9083d").unwrap();
/// assert_eq!(a, b);
///
/// assert!(EvmAddress::parse("").is_err());
/// assert!(EvmAddress::parse("0x1234").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    /// Length of an address in bytes.
    pub const LEN: usize = 20;

    /// Parse an address from a hex string, with or without the `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, is not 40 hex digits long, or
    /// contains non-hex characters.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != Self::LEN * 2 {
            return Err(AddressError::InvalidLength { len: digits.len() });
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Create an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the lowercase `0x`-prefixed hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({self})")
    }
}

impl std::str::FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for EvmAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for EvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
