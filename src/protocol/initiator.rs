//! Initiator (mobile node) state machine.
//!
//! Drives ranging rounds back to back:
//!
//! ```text
//! Idle ──start──▶ PollSent ──RESPONSE──▶ ResponseReceived ──gap──▶ PollSent ...
//!                    │
//!                    └──rx timeout──▶ TimedOut ──▶ PollSent (next anchor)
//! ```

use std::time::Duration;

use super::policy::{InboundPolicy, SequencePolicy};
use super::rotation::AnchorRotation;
use crate::config::{ConfigError, InitiatorConfig};
use crate::core::{
    CompletionPath, RangingError, RangingResult, RangingRole, TimerHandle, Timestamp, Transport,
};
use crate::frame::{CompletionEvent, Frame, FrameKind, NodeAddress, SequenceNumber};
use crate::telemetry::{
    Direction, FrameRecord, NodeRecord, NullSink, Position, TelemetryEntry, TelemetrySink,
};

/// Initiator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorPhase {
    /// No round outstanding; the next one starts on the start timer.
    Idle,
    /// POLL handed to the transport, waiting for the RESPONSE.
    PollSent,
    /// Round completed; waiting out the inter-round gap.
    ResponseReceived,
    /// Receive timeout fired; the next round starts immediately.
    TimedOut,
    /// Stopped after a protocol violation.
    Terminated,
}

/// Transient state of one ranging round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangingRound {
    /// Sequence number carried by the round's POLL.
    pub sequence: SequenceNumber,
    /// Anchor the POLL was addressed to.
    pub anchor: NodeAddress,
    /// When the POLL started transmitting. `None` until its TX completion.
    pub poll_tx_begin: Option<Timestamp>,
    /// When the RESPONSE started arriving. `None` until it is received.
    pub response_rx_begin: Option<Timestamp>,
}

impl RangingRound {
    fn new(sequence: SequenceNumber, anchor: NodeAddress) -> Self {
        Self {
            sequence,
            anchor,
            poll_tx_begin: None,
            response_rx_begin: None,
        }
    }

    /// Time from POLL transmission begin to RESPONSE reception begin.
    ///
    /// Includes the anchor's processing delay.
    pub fn round_trip(&self) -> Option<Duration> {
        match (self.poll_tx_begin, self.response_rx_begin) {
            (Some(tx), Some(rx)) => Some(rx.saturating_duration_since(tx)),
            _ => None,
        }
    }

    /// Check whether both timestamps are captured.
    pub fn is_complete(&self) -> bool {
        self.round_trip().is_some()
    }
}

/// Counters over the Initiator's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangingStats {
    /// POLLs handed to the transport.
    pub rounds_started: u64,
    /// Matching RESPONSEs received.
    pub responses: u64,
    /// Rounds abandoned on receive timeout.
    pub timeouts: u64,
    /// Received frames that did not answer the outstanding round.
    pub stray_frames: u64,
}

/// The mobile-node role.
///
/// Owns the anchor rotation and the sequence counter. Absorbs round timeouts
/// and stray frames; only protocol violations escape as errors.
#[derive(Debug)]
pub struct Initiator<S: TelemetrySink = NullSink> {
    address: NodeAddress,
    position: Option<Position>,
    rx_timeout: Duration,
    inter_round_gap: Duration,
    frame_size_bits: u32,
    sequence_policy: SequencePolicy,
    inbound_policy: InboundPolicy,
    rotation: AnchorRotation,
    next_sequence: SequenceNumber,
    phase: InitiatorPhase,
    round: Option<RangingRound>,
    rx_timeout_timer: Option<TimerHandle>,
    start_timer: Option<TimerHandle>,
    stats: RangingStats,
    sink: S,
}

impl<S: TelemetrySink> Initiator<S> {
    /// Create an Initiator.
    ///
    /// Fails if the configuration is invalid (empty rotation, zero timeout).
    pub fn new(address: NodeAddress, config: InitiatorConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let rotation = AnchorRotation::new(config.anchors)?;

        Ok(Self {
            address,
            position: None,
            rx_timeout: config.rx_timeout,
            inter_round_gap: config.inter_round_gap,
            frame_size_bits: config.frame_size_bits,
            sequence_policy: config.sequence_policy,
            inbound_policy: config.inbound_policy,
            rotation,
            next_sequence: config.initial_sequence,
            phase: InitiatorPhase::Idle,
            round: None,
            rx_timeout_timer: None,
            start_timer: None,
            stats: RangingStats::default(),
            sink,
        })
    }

    /// Report `position` in the start-up node record.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Current phase.
    pub fn phase(&self) -> InitiatorPhase {
        self.phase
    }

    /// The round in flight, or the last one if none is.
    pub fn current_round(&self) -> Option<&RangingRound> {
        self.round.as_ref()
    }

    /// Sequence number the next POLL will carry.
    pub fn next_sequence(&self) -> SequenceNumber {
        self.next_sequence
    }

    /// Anchor rotation; its head is the next anchor addressed.
    pub fn rotation(&self) -> &AnchorRotation {
        &self.rotation
    }

    /// Lifetime counters.
    pub fn stats(&self) -> RangingStats {
        self.stats
    }

    /// Telemetry sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the role, returning its telemetry sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Open a new round against the head of the rotation.
    ///
    /// Sends the POLL with no delay, re-arms the receive timeout and resets
    /// the round's timestamps. The sequence counter and the rotation advance
    /// after the frame is built.
    pub fn start_ranging(&mut self, io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        if let Some(handle) = self.start_timer.take() {
            io.cancel_timer(handle);
        }

        let anchor = self.rotation.current();
        let sequence = self.next_sequence;
        let poll = Frame::poll(self.address, anchor, sequence).with_size_bits(self.frame_size_bits);
        io.send(poll, Duration::ZERO);

        self.arm_rx_timeout(io);
        self.round = Some(RangingRound::new(sequence, anchor));
        self.next_sequence = sequence.saturating_add(1);
        self.rotation.advance();
        self.phase = InitiatorPhase::PollSent;
        self.stats.rounds_started += 1;

        tracing::debug!(node = %self.address, anchor = %anchor, sequence, "ranging round started");
        Ok(())
    }

    fn arm_rx_timeout(&mut self, io: &mut dyn Transport) {
        if let Some(handle) = self.rx_timeout_timer.take() {
            io.cancel_timer(handle);
        }
        let at = io.now() + self.rx_timeout;
        self.rx_timeout_timer = Some(io.schedule_timer(at));
    }

    fn cancel_rx_timeout(&mut self, io: &mut dyn Transport) {
        if let Some(handle) = self.rx_timeout_timer.take() {
            io.cancel_timer(handle);
        }
    }

    /// Arm the single start timer for `now + inter_round_gap`.
    fn defer_next_round(&mut self, io: &mut dyn Transport) {
        if let Some(handle) = self.start_timer.take() {
            io.cancel_timer(handle);
        }
        let at = io.now() + self.inter_round_gap;
        self.start_timer = Some(io.schedule_timer(at));
    }

    /// Whether `frame` answers the round in flight.
    ///
    /// A round stays answerable until its RESPONSE is captured, even after
    /// stray frames have deferred the next round.
    fn answers_current_round(&self, frame: &Frame) -> bool {
        match &self.round {
            Some(round) => {
                frame.is_response()
                    && round.response_rx_begin.is_none()
                    && frame.sequence == round.sequence
                    && frame.source == round.anchor
            }
            None => false,
        }
    }

    fn handle_response(&mut self, event: &CompletionEvent, io: &mut dyn Transport) {
        if let Some(round) = self.round.as_mut() {
            round.response_rx_begin = Some(event.operation_begin);
        }
        self.record_frame(Direction::Rx, event, io.now());
        self.stats.responses += 1;
        self.cancel_rx_timeout(io);
        self.defer_next_round(io);
        self.phase = InitiatorPhase::ResponseReceived;

        tracing::debug!(
            node = %self.address,
            anchor = %event.frame.source,
            sequence = event.frame.sequence,
            "response received"
        );
    }

    /// Channel busy: retry after the gap. The round in flight keeps its
    /// timestamps and can still be answered.
    fn handle_stray(&mut self, event: &CompletionEvent, io: &mut dyn Transport) {
        self.record_frame(Direction::Rx, event, io.now());
        self.stats.stray_frames += 1;
        self.cancel_rx_timeout(io);
        self.defer_next_round(io);

        tracing::warn!(
            node = %self.address,
            kind = %event.frame.kind,
            source = %event.frame.source,
            sequence = event.frame.sequence,
            "stray frame, deferring next round"
        );
    }

    fn handle_rx_timeout(&mut self, io: &mut dyn Transport) -> RangingResult<()> {
        self.rx_timeout_timer = None;
        self.stats.timeouts += 1;
        self.phase = InitiatorPhase::TimedOut;

        if let Some(round) = &self.round {
            self.next_sequence = self.sequence_policy.next_after_timeout(round.sequence);
            tracing::warn!(
                node = %self.address,
                anchor = %round.anchor,
                sequence = round.sequence,
                next_sequence = self.next_sequence,
                "ranging round timed out"
            );
        }

        self.start_ranging(io)
    }

    fn record_frame(&mut self, direction: Direction, event: &CompletionEvent, end: Timestamp) {
        let record = FrameRecord::from_completion(self.address, direction, event, end);
        self.sink.append(TelemetryEntry::Frame(record));
    }

    fn ensure_running(&self) -> RangingResult<()> {
        if self.phase == InitiatorPhase::Terminated {
            return Err(RangingError::NodeTerminated { node: self.address });
        }
        Ok(())
    }

    fn violation(
        &mut self,
        path: CompletionPath,
        expected: FrameKind,
        actual: FrameKind,
        io: &mut dyn Transport,
    ) -> RangingError {
        self.cancel_rx_timeout(io);
        if let Some(handle) = self.start_timer.take() {
            io.cancel_timer(handle);
        }
        self.phase = InitiatorPhase::Terminated;

        let err = RangingError::ProtocolViolation {
            node: self.address,
            path,
            expected,
            actual,
        };
        tracing::error!(node = %self.address, error = %err, "initiator terminated");
        err
    }
}

impl<S: TelemetrySink> RangingRole for Initiator<S> {
    fn address(&self) -> NodeAddress {
        self.address
    }

    fn is_terminated(&self) -> bool {
        self.phase == InitiatorPhase::Terminated
    }

    fn on_start(&mut self, io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        self.sink.append(TelemetryEntry::Node(NodeRecord {
            address: self.address,
            position: self.position,
            processing_delay: None,
        }));

        if let Some(handle) = self.start_timer.take() {
            io.cancel_timer(handle);
        }
        self.start_timer = Some(io.schedule_timer(io.now()));

        tracing::debug!(node = %self.address, anchors = self.rotation.len(), "initiator started");
        Ok(())
    }

    fn on_receive(&mut self, event: CompletionEvent, io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        match (event.frame.kind, self.inbound_policy) {
            (FrameKind::Poll, InboundPolicy::Strict) => Err(self.violation(
                CompletionPath::Receive,
                FrameKind::Response,
                FrameKind::Poll,
                io,
            )),
            (FrameKind::Poll, InboundPolicy::Permissive) => {
                self.handle_stray(&event, io);
                Ok(())
            }
            (FrameKind::Response, _) => {
                if self.answers_current_round(&event.frame) {
                    self.handle_response(&event, io);
                } else {
                    self.handle_stray(&event, io);
                }
                Ok(())
            }
        }
    }

    fn on_transmit_complete(
        &mut self,
        event: CompletionEvent,
        io: &mut dyn Transport,
    ) -> RangingResult<()> {
        self.ensure_running()?;

        match event.frame.kind {
            FrameKind::Poll => {
                if let Some(round) = self.round.as_mut() {
                    if round.sequence == event.frame.sequence && round.poll_tx_begin.is_none() {
                        round.poll_tx_begin = Some(event.operation_begin);
                    }
                }
                self.record_frame(Direction::Tx, &event, io.now());

                tracing::debug!(
                    node = %self.address,
                    anchor = %event.frame.destination,
                    sequence = event.frame.sequence,
                    "poll transmitted"
                );
                Ok(())
            }
            FrameKind::Response => Err(self.violation(
                CompletionPath::Transmit,
                FrameKind::Poll,
                FrameKind::Response,
                io,
            )),
        }
    }

    fn on_timer(&mut self, handle: TimerHandle, io: &mut dyn Transport) -> RangingResult<()> {
        self.ensure_running()?;

        if self.rx_timeout_timer == Some(handle) {
            self.handle_rx_timeout(io)
        } else if self.start_timer == Some(handle) {
            self.start_timer = None;
            self.start_ranging(io)
        } else {
            tracing::trace!(node = %self.address, timer = handle.raw(), "ignoring stale timer");
            Ok(())
        }
    }
}
