//! Responder (anchor) state machine.
//!
//! Answers every POLL with a RESPONSE after a fixed processing delay. The
//! RESPONSE is handed to the transport as a delayed send, so the anchor
//! needs no timers of its own.

use std::time::Duration;

use crate::config::{ConfigError, ResponderConfig};
use crate::core::{
    CompletionPath, RangingError, RangingResult, RangingRole, TimerHandle, Timestamp, Transport,
};
use crate::frame::{CompletionEvent, Frame, FrameKind, NodeAddress, SequenceNumber};
use crate::telemetry::{
    Direction, FrameRecord, NodeRecord, NullSink, Position, TelemetryEntry, TelemetrySink,
};

/// Responder lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderPhase {
    /// Waiting for a POLL.
    Idle,
    /// RESPONSE scheduled, waiting for its transmit completion.
    AwaitingLocalProcessing,
    /// Stopped after a protocol violation.
    Terminated,
}

/// RESPONSE scheduled but not yet transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingResponse {
    /// Sequence number echoed from the POLL.
    pub sequence: SequenceNumber,
    /// Mobile node the RESPONSE is addressed to.
    pub mobile: NodeAddress,
    /// When the POLL started arriving.
    pub poll_rx_begin: Timestamp,
    /// When the RESPONSE is due on air.
    pub ready_at: Timestamp,
}

/// The anchor role.
///
/// Keeps no state across rounds; a POLL arriving while a RESPONSE is pending
/// replaces the pending one.
#[derive(Debug)]
pub struct Responder<S: TelemetrySink = NullSink> {
    address: NodeAddress,
    position: Option<Position>,
    processing_delay: Duration,
    frame_size_bits: u32,
    phase: ResponderPhase,
    pending: Option<PendingResponse>,
    responses_sent: u64,
    sink: S,
}

impl<S: TelemetrySink> Responder<S> {
    /// Create a Responder.
    pub fn new(address: NodeAddress, config: ResponderConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            address,
            position: None,
            processing_delay: config.processing_delay,
            frame_size_bits: config.frame_size_bits,
            phase: ResponderPhase::Idle,
            pending: None,
            responses_sent: 0,
            sink,
        })
    }

    /// Report `position` in the start-up node record.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Current phase.
    pub fn phase(&self) -> ResponderPhase {
        self.phase
    }

    /// RESPONSE awaiting transmission, if any.
    pub fn pending(&self) -> Option<&PendingResponse> {
        self.pending.as_ref()
    }

    /// Fixed POLL -> RESPONSE processing time.
    pub fn processing_delay(&self) -> Duration {
        self.processing_delay
    }

    /// RESPONSEs whose transmission completed.
    pub fn responses_sent(&self) -> u64 {
        self.responses_sent
    }

    /// Telemetry sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the role, returning its telemetry sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn handle_poll(&mut self, event: &CompletionEvent, io: &mut dyn Transport) {
        let now = io.now();
        let ready_at = now + self.processing_delay;
        let poll = &event.frame;

        self.record_frame(Direction::Rx, event, now);

        if let Some(previous) = self.pending {
            tracing::debug!(
                node = %self.address,
                replaced = previous.sequence,
                sequence = poll.sequence,
                "poll replaces pending response"
            );
        }
        self.pending = Some(PendingResponse {
            sequence: poll.sequence,
            mobile: poll.source,
            poll_rx_begin: event.operation_begin,
            ready_at,
        });
        self.phase = ResponderPhase::AwaitingLocalProcessing;

        let response = Frame::response(self.address, poll.source, poll.sequence)
            .with_size_bits(self.frame_size_bits);
        let delay = ready_at.saturating_duration_since(io.now());
        io.send(response, delay);

        tracing::debug!(
            node = %self.address,
            mobile = %poll.source,
            sequence = poll.sequence,
            delay = ?delay,
            "response scheduled"
        );
    }

    fn handle_response_sent(&mut self, event: &CompletionEvent, io: &mut dyn Transport) {
        self.record_frame(Direction::Tx, event, io.now());
        self.responses_sent += 1;

        let answered = self
            .pending
            .is_some_and(|pending| pending.sequence == event.frame.sequence);
        if answered {
            self.pending = None;
            self.phase = ResponderPhase::Idle;
        }

        tracing::debug!(
            node = %self.address,
            mobile = %event.frame.destination,
            sequence = event.frame.sequence,
            "response transmitted"
        );
    }

    fn record_frame(&mut self, direction: Direction, event: &CompletionEvent, end: Timestamp) {
        let record = FrameRecord::from_completion(self.address, direction, event, end);
        self.sink.append(TelemetryEntry::Frame(record));
    }

    fn ensure_running(&self) -> RangingResult<()> {
        if self.phase == ResponderPhase::Terminated {
            return Err(RangingError::NodeTerminated { node: self.address });
        }
        Ok(())
    }

    fn violation(&mut self, path: CompletionPath, expected: FrameKind, actual: FrameKind) -> RangingError {
        self.phase = ResponderPhase::Terminated;
        self.pending = None;

        let err = RangingError::ProtocolViolation {
            node: self.address,
            path,
            expected,
            actual,
        };
        tracing::error!(node = %self.address, error = %err, "responder terminated");
        err
    }
}

impl<S: TelemetrySink> RangingRole for Responder<S> {
    fn address(&self) -> NodeAddress {
        self.address
    }

    fn is_terminated(&self) -> bool {
        self.phase == ResponderPhase::Terminated
    }

    fn on_start(&mut self, _io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        self.sink.append(TelemetryEntry::Node(NodeRecord {
            address: self.address,
            position: self.position,
            processing_delay: Some(self.processing_delay),
        }));

        tracing::debug!(
            node = %self.address,
            processing_delay = ?self.processing_delay,
            "responder started"
        );
        Ok(())
    }

    fn on_receive(&mut self, event: CompletionEvent, io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        match event.frame.kind {
            FrameKind::Poll => {
                self.handle_poll(&event, io);
                Ok(())
            }
            FrameKind::Response => Err(self.violation(
                CompletionPath::Receive,
                FrameKind::Poll,
                FrameKind::Response,
            )),
        }
    }

    fn on_transmit_complete(
        &mut self,
        event: CompletionEvent,
        io: &mut dyn Transport,
    ) -> RangingResult<()> {
        self.ensure_running()?;

        match event.frame.kind {
            FrameKind::Response => {
                self.handle_response_sent(&event, io);
                Ok(())
            }
            FrameKind::Poll => Err(self.violation(
                CompletionPath::Transmit,
                FrameKind::Response,
                FrameKind::Poll,
            )),
        }
    }

    fn on_timer(&mut self, handle: TimerHandle, _io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;
        tracing::trace!(node = %self.address, timer = handle.raw(), "ignoring stale timer");
        Ok(())
    }
}
