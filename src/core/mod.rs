//! SS-TWR - Core traits, types, and constants.
//!
//! This module provides the foundational abstractions shared by both ranging
//! roles: the clock type, timer handles, the transport contract a host must
//! implement, and the capability interface every role exposes to its host.

mod constants;
mod error;
mod time;
mod traits;

pub use constants::*;
pub use error::*;
pub use time::*;
pub use traits::*;
