//! Error types for SS-TWR ranging.
//!
//! Only protocol violations surface from the role state machines. Round
//! timeouts and stray frames are absorbed inside the Initiator and never
//! reach a caller.

use std::fmt;

use thiserror::Error;

use crate::frame::{FrameKind, NodeAddress};

/// Completion path on which a frame was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionPath {
    /// Receive-completion notification.
    Receive,
    /// Transmit-completion notification.
    Transmit,
}

impl fmt::Display for CompletionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionPath::Receive => f.write_str("RX"),
            CompletionPath::Transmit => f.write_str("TX"),
        }
    }
}

/// Errors raised by a ranging role.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangingError {
    /// A completion event carried a frame variant the handler on that path
    /// never accepts. Indicates a transport or addressing bug.
    #[error("protocol violation on {node}: {path} completion for {actual} frame, expected {expected}")]
    ProtocolViolation {
        /// Node that observed the violation.
        node: NodeAddress,
        /// Path the event was delivered on.
        path: CompletionPath,
        /// Variant the handler expects on this path.
        expected: FrameKind,
        /// Variant actually delivered.
        actual: FrameKind,
    },

    /// The node already hit a protocol violation and stopped processing.
    #[error("node {node} terminated after a protocol violation")]
    NodeTerminated {
        /// Terminated node.
        node: NodeAddress,
    },
}

impl RangingError {
    /// Check if this error is a frame-tag mismatch.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, RangingError::ProtocolViolation { .. })
    }

    /// Check if this error ends the node's processing.
    ///
    /// Every ranging error is fatal; recoverable conditions never become
    /// errors in the first place.
    pub fn is_fatal(&self) -> bool {
        match self {
            RangingError::ProtocolViolation { .. } | RangingError::NodeTerminated { .. } => true,
        }
    }

    /// Node the error belongs to.
    pub fn node(&self) -> NodeAddress {
        match self {
            RangingError::ProtocolViolation { node, .. } | RangingError::NodeTerminated { node } => {
                *node
            }
        }
    }
}

/// Result type for role callbacks.
pub type RangingResult<T> = Result<T, RangingError>;
