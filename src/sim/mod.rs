//! SS-TWR - Deterministic discrete-event simulator.
//!
//! Stands in for the scheduler and the radio: nodes are boxed
//! [`crate::core::RangingRole`]s placed in space, events are processed in
//! (time, insertion) order, and an ideal unicast channel turns sends into
//! transmit and receive completions.
//!
//! ```text
//! send(frame, delay) ──▶ TX begin ──airtime──▶ TX completion (sender)
//!                            │
//!                            └─propagation──▶ RX begin ──airtime──▶ RX completion (destination)
//! ```
//!
//! Runs are reproducible: the only randomness is the seeded frame-drop
//! decision.

mod channel;
mod error;
mod simulator;

pub use channel::*;
pub use error::*;
pub use simulator::*;
