//! # SS-TWR
//!
//! **S**ingle-**S**ided **T**wo-**W**ay **R**anging
//!
//! Node-side logic of the SS-TWR protocol: a mobile **Initiator** measures
//! round-trip timing against several **Responder** anchors with a two-frame
//! handshake (POLL → RESPONSE), recording transmit and receive timestamps.
//! It provides:
//!
//! - **State machines**: sans-IO Initiator and Responder roles reacting to
//!   frame received, frame transmitted and timer fired
//! - **Timing discipline**: single-instance receive timeout, inter-round gap,
//!   fixed responder processing delay
//! - **Recovery**: timed-out rounds restart on the next anchor with realigned
//!   sequence numbers; stray frames defer the next round
//! - **Telemetry**: per-frame and per-node records for offline positioning
//!
//! Distances and positions are not computed here; the crate produces
//! timestamps and sequence numbers only.
//!
//! ## Feature Flags
//!
//! - `sim` (default): deterministic discrete-event simulator
//! - `runtime` (default): tokio host with an in-process loopback medium
//!
//! ## Modules
//!
//! - [`core`]: constants, error types, clock, [`Transport`] and [`RangingRole`]
//! - [`frame`]: addresses, frames, wire codec, completion events
//! - [`protocol`]: anchor rotation, policies, [`Initiator`], [`Responder`]
//! - [`telemetry`]: records and sinks
//! - [`config`]: TOML configuration
//! - [`sim`]: simulator (requires `sim` feature)
//! - [`runtime`]: tokio host (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use ss_twr::prelude::*;
//!
//! struct Host {
//!     now: Timestamp,
//!     sent: Vec<(Frame, Duration)>,
//!     timers: u64,
//! }
//!
//! impl Transport for Host {
//!     fn now(&self) -> Timestamp {
//!         self.now
//!     }
//!     fn send(&mut self, frame: Frame, delay: Duration) {
//!         self.sent.push((frame, delay));
//!     }
//!     fn schedule_timer(&mut self, _at: Timestamp) -> TimerHandle {
//!         self.timers += 1;
//!         TimerHandle::from_raw(self.timers)
//!     }
//!     fn cancel_timer(&mut self, _handle: TimerHandle) {}
//! }
//!
//! let anchor: NodeAddress = "DE-AD-BE-EF-10-01".parse().unwrap();
//! let mobile: NodeAddress = "DE-AD-BE-EF-20-01".parse().unwrap();
//! let mut host = Host { now: Timestamp::ZERO, sent: Vec::new(), timers: 0 };
//!
//! let mut initiator =
//!     Initiator::new(mobile, InitiatorConfig::with_anchors([anchor]), NullSink).unwrap();
//! initiator.start_ranging(&mut host).unwrap();
//!
//! let (poll, _) = host.sent.pop().unwrap();
//! assert_eq!(poll.kind, FrameKind::Poll);
//! assert_eq!(poll.destination, anchor);
//! assert_eq!(poll.sequence, 0);
//!
//! let mut responder = Responder::new(anchor, ResponderConfig::default(), NullSink).unwrap();
//! host.now = Timestamp::from_millis(1);
//! responder
//!     .on_receive(CompletionEvent::new(poll, Timestamp::ZERO), &mut host)
//!     .unwrap();
//!
//! let (response, delay) = host.sent.pop().unwrap();
//! assert_eq!(response.kind, FrameKind::Response);
//! assert_eq!(response.sequence, 0);
//! assert_eq!(delay, Duration::from_millis(5));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod config;
pub mod frame;
pub mod protocol;
pub mod telemetry;

// Simulator (feature-gated)
#[cfg(feature = "sim")]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;

// Tokio host (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::config::{ConfigError, InitiatorConfig, RangingConfig, ResponderConfig};
    pub use crate::frame::{CompletionEvent, Frame, FrameKind, NodeAddress, SequenceNumber};
    pub use crate::protocol::{
        AnchorRotation, InboundPolicy, Initiator, InitiatorPhase, RangingRound, RangingStats,
        Responder, ResponderPhase, SequencePolicy,
    };
    pub use crate::telemetry::{
        CsvSink, Direction, FrameRecord, MemorySink, NodeRecord, NullSink, Position,
        TelemetryEntry, TelemetrySink,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{RangingError, RangingResult, RangingRole, TimerHandle, Timestamp, Transport};
pub use crate::frame::{CompletionEvent, Frame, FrameKind, NodeAddress};
pub use crate::protocol::{Initiator, Responder};
