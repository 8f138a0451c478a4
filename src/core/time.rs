//! Clock and timer primitives.
//!
//! Time is host-provided: a simulator advances it discretely, a real-time
//! host derives it from a monotonic clock. The roles only ever compare and
//! offset timestamps, so a single duration-since-epoch representation serves
//! both.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point in host time, measured from the host's epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The host epoch.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Create a timestamp at `elapsed` past the epoch.
    pub const fn from_elapsed(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Create a timestamp from milliseconds past the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Time elapsed since the epoch.
    pub const fn elapsed(self) -> Duration {
        self.0
    }

    /// Picoseconds since the epoch (the unit used by telemetry output).
    pub fn as_picos(self) -> u128 {
        self.0.as_nanos() * 1000
    }

    /// Duration from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0 + rhs)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Opaque handle for a scheduled timer.
///
/// Minted by the host in [`crate::core::Transport::schedule_timer`] and
/// handed back in [`crate::core::RangingRole::on_timer`]. Roles only compare
/// handles for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Create a handle from a host-assigned identifier.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Host-assigned identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}
