//! Round-robin anchor rotation.

use std::collections::VecDeque;

use crate::config::ConfigError;
use crate::frame::NodeAddress;

/// Ordered, cyclically rotated list of anchor addresses.
///
/// The set of addresses is fixed at construction; only the order changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRotation {
    anchors: VecDeque<NodeAddress>,
}

impl AnchorRotation {
    /// Create a rotation starting at the first address.
    ///
    /// Fails with [`ConfigError::EmptyRotation`] if `anchors` is empty.
    pub fn new(anchors: impl IntoIterator<Item = NodeAddress>) -> Result<Self, ConfigError> {
        let anchors: VecDeque<NodeAddress> = anchors.into_iter().collect();
        if anchors.is_empty() {
            return Err(ConfigError::EmptyRotation);
        }
        Ok(Self { anchors })
    }

    /// Anchor addressed by the next round.
    pub fn current(&self) -> NodeAddress {
        // Non-empty by construction.
        self.anchors[0]
    }

    /// Rotate left by one: the head becomes the tail.
    pub fn advance(&mut self) {
        self.anchors.rotate_left(1);
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Check whether the rotation is empty. Never true after construction.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Check whether `address` is one of the anchors.
    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.anchors.contains(address)
    }

    /// Anchors in addressing order, head first.
    pub fn iter(&self) -> impl Iterator<Item = &NodeAddress> {
        self.anchors.iter()
    }
}
