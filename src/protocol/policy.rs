//! Initiator policies for lost rounds and unexpected frames.

use serde::{Deserialize, Serialize};

use crate::core::ROUND_SIZE;
use crate::frame::SequenceNumber;

/// Sequence numbering after a timed-out round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SequencePolicy {
    /// Jump to the smallest multiple of `round_size` strictly greater than
    /// the lost sequence, so a lost round abandons the rest of its group.
    AlignToRound {
        /// Rounds per group. Must be at least 1.
        round_size: u64,
    },
    /// Continue with the next sequence number.
    Increment,
}

impl Default for SequencePolicy {
    fn default() -> Self {
        SequencePolicy::AlignToRound {
            round_size: ROUND_SIZE,
        }
    }
}

impl SequencePolicy {
    /// Sequence number for the round after `timed_out` was lost.
    pub fn next_after_timeout(&self, timed_out: SequenceNumber) -> SequenceNumber {
        match *self {
            SequencePolicy::AlignToRound { round_size } => {
                let round_size = round_size.max(1);
                (timed_out / round_size)
                    .saturating_add(1)
                    .saturating_mul(round_size)
            }
            SequencePolicy::Increment => timed_out.saturating_add(1),
        }
    }
}

/// How strictly the Initiator screens received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundPolicy {
    /// A POLL on the receive path is a protocol violation. A RESPONSE that
    /// does not answer the outstanding round is a stray frame.
    #[default]
    Strict,
    /// Any received frame, whatever its kind, counts as channel activity.
    /// Only a RESPONSE answering the outstanding round records timestamps.
    Permissive,
}
