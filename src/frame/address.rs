//! Node link addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::ADDRESS_SIZE;

/// Errors parsing a textual node address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    /// Wrong number of octets.
    #[error("expected 6 octets, got {0}")]
    OctetCount(usize),

    /// An octet is not two hex digits.
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

/// 48-bit link address identifying a node.
///
/// Textual form is six hex octets separated by `-` (`DE-AD-BE-EF-10-01`);
/// `:` is accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddress([u8; ADDRESS_SIZE]);

impl NodeAddress {
    /// Create an address from raw octets.
    pub const fn new(octets: [u8; ADDRESS_SIZE]) -> Self {
        Self(octets)
    }

    /// Raw octets.
    pub const fn octets(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Address as a 48-bit integer (big-endian octet order).
    pub fn as_u64(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

impl From<[u8; ADDRESS_SIZE]> for NodeAddress {
    fn from(octets: [u8; ADDRESS_SIZE]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}-{b:02X}-{c:02X}-{d:02X}-{e:02X}-{g:02X}")
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(['-', ':']).collect();
        if parts.len() != ADDRESS_SIZE {
            return Err(AddressParseError::OctetCount(parts.len()));
        }

        let mut octets = [0u8; ADDRESS_SIZE];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(AddressParseError::InvalidOctet(part.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidOctet(part.to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl Serialize for NodeAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
