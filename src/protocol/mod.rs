//! SS-TWR - Ranging role state machines.
//!
//! - **Rotation**: [`AnchorRotation`], the round-robin list of anchors
//! - **Policies**: [`SequencePolicy`] for numbering after a lost round,
//!   [`InboundPolicy`] for screening received frames
//! - **Initiator**: [`Initiator`], the mobile node driving rounds
//! - **Responder**: [`Responder`], the anchor answering POLLs
//!
//! Both roles implement [`crate::core::RangingRole`] and are sans-IO: every
//! side effect goes through the [`crate::core::Transport`] handed to each
//! callback.

mod initiator;
mod policy;
mod responder;
mod rotation;

#[cfg(test)]
pub(crate) mod testing;

pub use initiator::*;
pub use policy::*;
pub use responder::*;
pub use rotation::*;
