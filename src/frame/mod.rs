//! SS-TWR - Frame model.
//!
//! - **Addressing**: [`NodeAddress`], the 48-bit link address of a node
//! - **Frames**: [`Frame`] and its closed variant set [`FrameKind`]
//! - **Wire format**: 25-byte encoding via [`Frame::to_bytes`] / [`Frame::from_bytes`]
//! - **Completions**: [`CompletionEvent`], what a host delivers when a
//!   transmit or receive operation finishes

mod address;
mod completion;
#[allow(clippy::module_inception)]
mod frame;

pub use address::*;
pub use completion::*;
pub use frame::*;
