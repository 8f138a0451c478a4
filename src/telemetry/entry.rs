//! Telemetry records.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::core::Timestamp;
use crate::frame::{CompletionEvent, NodeAddress, SequenceNumber};

/// True position of a node, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`, meters.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Check if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Direction of a logged frame operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Frame transmitted by the logging node.
    Tx,
    /// Frame received by the logging node.
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => f.write_str("TX"),
            Direction::Rx => f.write_str("RX"),
        }
    }
}

/// Node description logged once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    /// Node address.
    pub address: NodeAddress,
    /// True position, if the host knows it.
    pub position: Option<Position>,
    /// Responder processing delay (anchors only).
    pub processing_delay: Option<Duration>,
}

/// One completed POLL/RESPONSE operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    /// Node that observed the operation.
    pub node: NodeAddress,
    /// Transmit or receive.
    pub direction: Direction,
    /// Operation begin timestamp.
    pub begin: Timestamp,
    /// Completion timestamp (host clock at delivery).
    pub end: Timestamp,
    /// Frame source.
    pub source: NodeAddress,
    /// Frame destination.
    pub destination: NodeAddress,
    /// Frame sequence number.
    pub sequence: SequenceNumber,
}

impl FrameRecord {
    /// Build a record from a completion event observed by `node` at `end`.
    pub fn from_completion(
        node: NodeAddress,
        direction: Direction,
        event: &CompletionEvent,
        end: Timestamp,
    ) -> Self {
        Self {
            node,
            direction,
            begin: event.operation_begin,
            end,
            source: event.frame.source,
            destination: event.frame.destination,
            sequence: event.frame.sequence,
        }
    }
}

/// A telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TelemetryEntry {
    /// Node description.
    Node(NodeRecord),
    /// Frame operation.
    Frame(FrameRecord),
}

impl TelemetryEntry {
    /// The frame record, if this is one.
    pub fn as_frame(&self) -> Option<&FrameRecord> {
        match self {
            TelemetryEntry::Frame(record) => Some(record),
            TelemetryEntry::Node(_) => None,
        }
    }

    /// The node record, if this is one.
    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            TelemetryEntry::Node(record) => Some(record),
            TelemetryEntry::Frame(_) => None,
        }
    }
}
