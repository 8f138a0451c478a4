//! Protocol constants for SS-TWR ranging.
//!
//! Defaults follow the reference protocol. Hosts override the durations
//! through [`crate::config::RangingConfig`]; the frame size and round size are
//! policy constants rather than computed values.

use std::time::Duration;

use crate::frame::NodeAddress;

// =============================================================================
// FRAMES
// =============================================================================

/// Size of a POLL or RESPONSE frame on air, in bits.
pub const FRAME_SIZE_BITS: u32 = 10;

/// Length of a node address (48-bit link address).
pub const ADDRESS_SIZE: usize = 6;

/// Encoded frame length: kind + source + destination + sequence + size.
pub const FRAME_WIRE_SIZE: usize = 1 + ADDRESS_SIZE + ADDRESS_SIZE + 8 + 4;

// =============================================================================
// TIMING
// =============================================================================

/// Responder's fixed POLL -> RESPONSE processing time.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(5);

/// Initiator's wait bound for a RESPONSE.
pub const DEFAULT_RX_TIMEOUT: Duration = Duration::from_millis(20);

/// Gap between a received RESPONSE and the next POLL.
///
/// Keeps back-to-back rounds from colliding on the channel.
pub const INTER_ROUND_GAP: Duration = Duration::from_millis(5);

// =============================================================================
// SEQUENCING
// =============================================================================

/// Number of consecutive rounds grouped together (one per anchor in a
/// three-anchor fix). Sequence numbers realign to this boundary after a loss.
pub const ROUND_SIZE: u64 = 3;

/// Anchor addresses used when no rotation is configured.
pub const DEFAULT_ANCHORS: [NodeAddress; 4] = [
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x01]),
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x02]),
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x03]),
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x04]),
];

// =============================================================================
// PHYSICS
// =============================================================================

/// Default radio bitrate, bits per second (UWB 6.8 Mbit/s mode).
pub const DEFAULT_BITRATE: u64 = 6_800_000;

/// Speed of light in vacuum, meters per second.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
