//! Runtime host errors.

use thiserror::Error;

use crate::core::RangingError;
use crate::frame::NodeAddress;

/// Errors raised by the tokio host.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Address already attached to the medium.
    #[error("address {0} already attached to the medium")]
    DuplicateAddress(NodeAddress),

    /// Bitrate of zero.
    #[error("medium bitrate must be greater than zero")]
    ZeroBitrate,

    /// The role failed; its task ended.
    #[error("node {address} failed: {source}")]
    Role {
        /// Failing node.
        address: NodeAddress,
        /// Role error.
        #[source]
        source: RangingError,
    },

    /// The node task panicked or was aborted.
    #[error("node task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RuntimeError {
    /// The role error, if the node itself failed.
    pub fn role_error(&self) -> Option<&RangingError> {
        match self {
            RuntimeError::Role { source, .. } => Some(source),
            _ => None,
        }
    }
}
