//! Core traits for SS-TWR hosts and roles.
//!
//! A host (scheduler plus radio) implements [`Transport`] and drives any
//! [`RangingRole`] by delivering the three stimuli one at a time:
//! frame received, frame transmit completed, timer fired.

use std::time::Duration;

use super::error::RangingResult;
use super::time::{TimerHandle, Timestamp};
use crate::frame::{CompletionEvent, Frame, NodeAddress};

/// Services a host offers to a role while one of its callbacks runs.
///
/// Implementations must never call back into the role from inside these
/// methods; the resulting events are delivered later, one at a time.
pub trait Transport {
    /// Current host time (the ambient clock).
    fn now(&self) -> Timestamp;

    /// Hand `frame` to the radio for transmission after `delay`.
    ///
    /// The frame is consumed; the role keeps no handle to it. Exactly one
    /// transmit-completion event follows for every sent frame.
    fn send(&mut self, frame: Frame, delay: Duration);

    /// Arm a timer that fires at `at` (or immediately if `at` is in the past).
    fn schedule_timer(&mut self, at: Timestamp) -> TimerHandle;

    /// Disarm a timer. Cancelling an already-fired or unknown handle is a
    /// no-op.
    fn cancel_timer(&mut self, handle: TimerHandle);
}

/// Capability interface shared by the Initiator and the Responder.
///
/// Every callback either completes the transition or returns a fatal
/// [`crate::core::RangingError`]; after an error the role refuses all further
/// events.
pub trait RangingRole {
    /// Link address of this node.
    fn address(&self) -> NodeAddress;

    /// Whether the role stopped after a protocol violation.
    fn is_terminated(&self) -> bool;

    /// Initialize the role once the host is ready to deliver events.
    fn on_start(&mut self, io: &mut dyn Transport) -> RangingResult<()>;

    /// A frame addressed to this node finished arriving.
    fn on_receive(&mut self, event: CompletionEvent, io: &mut dyn Transport) -> RangingResult<()>;

    /// A frame this node sent finished transmitting.
    fn on_transmit_complete(
        &mut self,
        event: CompletionEvent,
        io: &mut dyn Transport,
    ) -> RangingResult<()>;

    /// A timer armed through [`Transport::schedule_timer`] fired.
    fn on_timer(&mut self, handle: TimerHandle, io: &mut dyn Transport) -> RangingResult<()>;
}
