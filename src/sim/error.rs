//! Simulator errors.

use thiserror::Error;

use crate::core::RangingError;
use crate::frame::NodeAddress;

/// Errors raised while building or running a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Two nodes share an address.
    #[error("duplicate node address {0}")]
    DuplicateAddress(NodeAddress),

    /// Drop probability outside `[0, 1]`.
    #[error("drop probability must be within [0, 1], got {0}")]
    InvalidDropProbability(f64),

    /// Bitrate of zero.
    #[error("channel bitrate must be greater than zero")]
    ZeroBitrate,

    /// Node placed at a NaN or infinite coordinate.
    #[error("node {0} has a non-finite position")]
    NonFinitePosition(NodeAddress),

    /// No node with this address.
    #[error("unknown node {0}")]
    UnknownNode(NodeAddress),

    /// A role failed; the run halts.
    #[error("node {address} failed: {source}")]
    Node {
        /// Failing node.
        address: NodeAddress,
        /// Role error.
        #[source]
        source: RangingError,
    },
}

impl SimError {
    /// Check if a role failure halted the run.
    pub fn is_node_failure(&self) -> bool {
        matches!(self, SimError::Node { .. })
    }
}
