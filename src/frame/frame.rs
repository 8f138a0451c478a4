//! POLL and RESPONSE frames and their wire encoding.
//!
//! Wire format (25 bytes):
//! ```text
//! +--------+-------------+-------------+------------------+----------------+
//! | Kind   | Source      | Destination | Sequence         | Size (bits)    |
//! | 1 byte | 6 bytes     | 6 bytes     | 8 bytes (LE64)   | 4 bytes (LE32) |
//! +--------+-------------+-------------+------------------+----------------+
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::address::NodeAddress;
use crate::core::{ADDRESS_SIZE, FRAME_SIZE_BITS, FRAME_WIRE_SIZE};

/// Ranging round identifier carried by every frame.
pub type SequenceNumber = u64;

/// Frame decoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than a frame.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },

    /// Unknown kind byte.
    #[error("invalid frame kind: 0x{0:02x}")]
    InvalidKind(u8),
}

/// The closed set of ranging frame variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameKind {
    /// Sent by the Initiator to open a round.
    Poll = 0x01,
    /// Sent by a Responder to close a round.
    Response = 0x02,
}

impl FrameKind {
    /// Parse frame kind from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Poll),
            0x02 => Some(Self::Response),
            _ => None,
        }
    }

    /// Convert frame kind to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Poll => f.write_str("POLL"),
            FrameKind::Response => f.write_str("RESPONSE"),
        }
    }
}

/// A ranging frame.
///
/// Deliberately not `Copy`: handing a frame to
/// [`crate::core::Transport::send`] moves it out of the role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Variant tag.
    pub kind: FrameKind,
    /// Sender address.
    pub source: NodeAddress,
    /// Receiver address.
    pub destination: NodeAddress,
    /// Round this frame belongs to.
    pub sequence: SequenceNumber,
    /// On-air size in bits.
    pub size_bits: u32,
}

impl Frame {
    /// Create a POLL frame of the protocol's fixed size.
    pub fn poll(source: NodeAddress, destination: NodeAddress, sequence: SequenceNumber) -> Self {
        Self {
            kind: FrameKind::Poll,
            source,
            destination,
            sequence,
            size_bits: FRAME_SIZE_BITS,
        }
    }

    /// Create a RESPONSE frame of the protocol's fixed size.
    pub fn response(
        source: NodeAddress,
        destination: NodeAddress,
        sequence: SequenceNumber,
    ) -> Self {
        Self {
            kind: FrameKind::Response,
            source,
            destination,
            sequence,
            size_bits: FRAME_SIZE_BITS,
        }
    }

    /// Override the on-air size.
    pub fn with_size_bits(mut self, size_bits: u32) -> Self {
        self.size_bits = size_bits;
        self
    }

    /// Check whether this is a POLL.
    pub fn is_poll(&self) -> bool {
        self.kind == FrameKind::Poll
    }

    /// Check whether this is a RESPONSE.
    pub fn is_response(&self) -> bool {
        self.kind == FrameKind::Response
    }

    /// Serialize frame to bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_WIRE_SIZE] {
        let mut buf = [0u8; FRAME_WIRE_SIZE];
        let dst_at = 1 + ADDRESS_SIZE;
        let seq_at = dst_at + ADDRESS_SIZE;
        let size_at = seq_at + 8;

        buf[0] = self.kind.as_byte();
        buf[1..dst_at].copy_from_slice(self.source.octets());
        buf[dst_at..seq_at].copy_from_slice(self.destination.octets());
        buf[seq_at..size_at].copy_from_slice(&self.sequence.to_le_bytes());
        buf[size_at..].copy_from_slice(&self.size_bits.to_le_bytes());
        buf
    }

    /// Parse frame from bytes. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_WIRE_SIZE {
            return Err(FrameError::TooShort {
                expected: FRAME_WIRE_SIZE,
                actual: bytes.len(),
            });
        }

        let kind = FrameKind::from_byte(bytes[0]).ok_or(FrameError::InvalidKind(bytes[0]))?;

        let dst_at = 1 + ADDRESS_SIZE;
        let seq_at = dst_at + ADDRESS_SIZE;
        let size_at = seq_at + 8;

        let mut source = [0u8; ADDRESS_SIZE];
        source.copy_from_slice(&bytes[1..dst_at]);
        let mut destination = [0u8; ADDRESS_SIZE];
        destination.copy_from_slice(&bytes[dst_at..seq_at]);
        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&bytes[seq_at..size_at]);
        let mut size_bits = [0u8; 4];
        size_bits.copy_from_slice(&bytes[size_at..FRAME_WIRE_SIZE]);

        Ok(Self {
            kind,
            source: NodeAddress::new(source),
            destination: NodeAddress::new(destination),
            sequence: u64::from_le_bytes(sequence),
            size_bits: u32::from_le_bytes(size_bits),
        })
    }

    /// Time this frame occupies the air at `bitrate` bits per second.
    pub fn airtime(&self, bitrate: u64) -> Duration {
        airtime(self.size_bits, bitrate)
    }
}

/// Time `size_bits` occupy the air at `bitrate` bits per second.
///
/// A zero bitrate is treated as 1 bit/s.
pub fn airtime(size_bits: u32, bitrate: u64) -> Duration {
    let nanos = u128::from(size_bits) * 1_000_000_000 / u128::from(bitrate.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
