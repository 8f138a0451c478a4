//! SS-TWR - Telemetry.
//!
//! Roles report what happened on air as fixed-field records; where the
//! records go is the sink's concern. The records mirror the frame and node
//! logs consumed by offline positioning tools:
//!
//! - [`TelemetryEntry::Node`]: one line per node at start-up
//! - [`TelemetryEntry::Frame`]: one line per logged POLL/RESPONSE completion
//!
//! Sinks never fail the protocol: a sink that cannot persist an entry keeps
//! its own error count.

mod entry;
mod sink;

pub use entry::*;
pub use sink::*;
