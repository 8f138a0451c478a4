//! SS-TWR - Tokio runtime host.
//!
//! Runs roles in real time, one task per node:
//!
//! - [`LoopbackMedium`]: in-process radio shared by all nodes, with a common
//!   epoch for timestamps
//! - [`Endpoint`]: one node's attachment to the medium
//! - [`run_node`] / [`spawn_node`]: the per-node event loop
//!
//! Roles stay synchronous. Each callback runs against a command-collecting
//! [`crate::core::Transport`]; the loop applies the collected sends and
//! timers once the callback returns.

mod error;
mod medium;
mod node;

pub use error::*;
pub use medium::*;
pub use node::*;
