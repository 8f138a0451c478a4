//! Test doubles for driving roles by hand.

use std::time::Duration;

use crate::core::{TimerHandle, Timestamp, Transport};
use crate::frame::{Frame, NodeAddress};

pub(crate) fn anchor(n: u8) -> NodeAddress {
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, n])
}

pub(crate) fn mobile() -> NodeAddress {
    NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x20, 0x01])
}

/// Transport that records every call and never delivers anything.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    pub now: Timestamp,
    pub sent: Vec<(Frame, Duration)>,
    pub scheduled: Vec<(TimerHandle, Timestamp)>,
    pub cancelled: Vec<TimerHandle>,
    pub fired: Vec<TimerHandle>,
    next_timer: u64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers scheduled and neither cancelled nor fired.
    pub fn armed(&self) -> Vec<(TimerHandle, Timestamp)> {
        self.scheduled
            .iter()
            .filter(|(handle, _)| !self.cancelled.contains(handle) && !self.fired.contains(handle))
            .copied()
            .collect()
    }

    pub fn last_handle(&self) -> TimerHandle {
        self.scheduled
            .last()
            .map(|(handle, _)| *handle)
            .unwrap_or(TimerHandle::from_raw(u64::MAX))
    }

    /// Mark the most recent timer as fired and return its handle.
    pub fn fire_last(&mut self) -> TimerHandle {
        let handle = self.last_handle();
        self.fired.push(handle);
        handle
    }
}

impl Transport for RecordingTransport {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn send(&mut self, frame: Frame, delay: Duration) {
        self.sent.push((frame, delay));
    }

    fn schedule_timer(&mut self, at: Timestamp) -> TimerHandle {
        self.next_timer += 1;
        let handle = TimerHandle::from_raw(self.next_timer);
        self.scheduled.push((handle, at));
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        self.cancelled.push(handle);
    }
}
