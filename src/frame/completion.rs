//! Completion event contract.

use super::frame::Frame;
use crate::core::Timestamp;

/// Notification that a transmit or receive operation finished.
///
/// Delivered exactly once per operation, at completion time; the completion
/// instant itself is the host clock read during delivery
/// ([`crate::core::Transport::now`]). On the receive path the frame belongs
/// to the handler for the duration of the call only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    /// The frame that was sent or received.
    pub frame: Frame,
    /// When the operation began (first bit on air / first bit received).
    pub operation_begin: Timestamp,
}

impl CompletionEvent {
    /// Create a completion event.
    pub fn new(frame: Frame, operation_begin: Timestamp) -> Self {
        Self {
            frame,
            operation_begin,
        }
    }
}
