//! In-process loopback radio.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::error::RuntimeError;
use crate::core::{DEFAULT_BITRATE, Timestamp};
use crate::frame::{CompletionEvent, Frame, NodeAddress};

/// A frame arriving at a node.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Receive completion to deliver.
    pub event: CompletionEvent,
    /// When the last bit arrives.
    pub complete_at: Timestamp,
}

#[derive(Debug)]
struct Shared {
    epoch: Instant,
    bitrate: u64,
    nodes: Mutex<HashMap<NodeAddress, mpsc::UnboundedSender<Inbound>>>,
}

/// Shared radio medium for nodes in one process.
///
/// Unicast and lossless, with zero propagation delay. Cloning yields another
/// handle to the same medium.
#[derive(Debug, Clone)]
pub struct LoopbackMedium {
    shared: Arc<Shared>,
}

impl LoopbackMedium {
    /// Create a medium at the default bitrate. Its epoch is now.
    pub fn new() -> Self {
        Self::build(DEFAULT_BITRATE)
    }

    /// Create a medium at `bitrate` bits per second.
    pub fn with_bitrate(bitrate: u64) -> Result<Self, RuntimeError> {
        if bitrate == 0 {
            return Err(RuntimeError::ZeroBitrate);
        }
        Ok(Self::build(bitrate))
    }

    fn build(bitrate: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                epoch: Instant::now(),
                bitrate,
                nodes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Attach a node, returning its endpoint.
    pub fn attach(&self, address: NodeAddress) -> Result<Endpoint, RuntimeError> {
        let mut nodes = self.nodes();
        if nodes.contains_key(&address) {
            return Err(RuntimeError::DuplicateAddress(address));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        nodes.insert(address, tx);

        tracing::debug!(node = %address, "attached to loopback medium");
        Ok(Endpoint {
            address,
            medium: self.clone(),
            inbound: rx,
        })
    }

    /// Time since the medium's epoch.
    pub fn now(&self) -> Timestamp {
        Timestamp::from_elapsed(self.shared.epoch.elapsed())
    }

    /// Tokio instant corresponding to `at`.
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.shared.epoch + at.elapsed()
    }

    /// Bits per second.
    pub fn bitrate(&self) -> u64 {
        self.shared.bitrate
    }

    /// Airtime of `frame` on this medium.
    pub fn airtime(&self, frame: &Frame) -> Duration {
        frame.airtime(self.shared.bitrate)
    }

    /// Put `frame` on air starting at `begin`.
    ///
    /// Returns `false` if the destination is not attached or has gone away.
    pub fn transmit(&self, frame: Frame, begin: Timestamp) -> bool {
        let complete_at = begin + self.airtime(&frame);
        let destination = frame.destination;
        let nodes = self.nodes();
        let Some(tx) = nodes.get(&destination) else {
            tracing::trace!(destination = %destination, "frame to unknown node");
            return false;
        };
        let inbound = Inbound {
            event: CompletionEvent::new(frame, begin),
            complete_at,
        };
        tx.send(inbound).is_ok()
    }

    fn detach(&self, address: NodeAddress) {
        self.nodes().remove(&address);
    }

    fn nodes(&self) -> MutexGuard<'_, HashMap<NodeAddress, mpsc::UnboundedSender<Inbound>>> {
        match self.shared.nodes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for LoopbackMedium {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's attachment to a [`LoopbackMedium`].
///
/// Dropping the endpoint detaches the node.
#[derive(Debug)]
pub struct Endpoint {
    address: NodeAddress,
    medium: LoopbackMedium,
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl Endpoint {
    /// Attached address.
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    /// The medium this endpoint is attached to.
    pub fn medium(&self) -> &LoopbackMedium {
        &self.medium
    }

    /// Wait for the next inbound frame. `None` once detached.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.medium.detach(self.address);
    }
}
