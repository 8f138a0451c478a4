//! Event scheduler and node host.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::channel::{ChannelConfig, propagation_delay};
use super::error::SimError;
use crate::core::{RangingError, RangingRole, TimerHandle, Timestamp, Transport};
use crate::frame::{CompletionEvent, Frame, NodeAddress};
use crate::telemetry::Position;

/// Something that happens to one node at one instant.
#[derive(Debug, Clone)]
enum Event {
    Timer(TimerHandle),
    TxBegin(Frame),
    TxComplete(CompletionEvent),
    RxComplete(CompletionEvent),
}

#[derive(Debug)]
struct Scheduled {
    at: Timestamp,
    order: u64,
    node: usize,
    event: Event,
}

// Min-heap on (at, order).
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Frames that started transmitting.
    pub frames_sent: u64,
    /// Receive completions delivered.
    pub frames_delivered: u64,
    /// Frames lost to drop probability or muting.
    pub frames_dropped: u64,
    /// Frames addressed to no known node.
    pub frames_unroutable: u64,
    /// Timer events delivered.
    pub timers_fired: u64,
}

/// Event queue and timer bookkeeping shared by all nodes.
#[derive(Debug)]
struct Kernel {
    now: Timestamp,
    queue: BinaryHeap<Scheduled>,
    next_order: u64,
    next_timer: u64,
    live_timers: HashSet<TimerHandle>,
}

impl Kernel {
    fn push(&mut self, at: Timestamp, node: usize, event: Event) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Scheduled {
            at: at.max(self.now),
            order,
            node,
            event,
        });
    }
}

/// The [`Transport`] a node sees while one of its callbacks runs.
struct NodeIo<'a> {
    node: usize,
    kernel: &'a mut Kernel,
}

impl Transport for NodeIo<'_> {
    fn now(&self) -> Timestamp {
        self.kernel.now
    }

    fn send(&mut self, frame: Frame, delay: Duration) {
        let at = self.kernel.now + delay;
        self.kernel.push(at, self.node, Event::TxBegin(frame));
    }

    fn schedule_timer(&mut self, at: Timestamp) -> TimerHandle {
        self.kernel.next_timer += 1;
        let handle = TimerHandle::from_raw(self.kernel.next_timer);
        self.kernel.live_timers.insert(handle);
        self.kernel.push(at, self.node, Event::Timer(handle));
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        self.kernel.live_timers.remove(&handle);
    }
}

struct SimNode {
    role: Box<dyn RangingRole>,
    position: Position,
    muted: bool,
}

/// Discrete-event simulation of SS-TWR nodes on an ideal channel.
///
/// ```rust
/// use std::time::Duration;
/// use ss_twr::prelude::*;
/// use ss_twr::sim::{ChannelConfig, Simulator};
///
/// let anchor = NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x01]);
/// let mobile = NodeAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x20, 0x01]);
///
/// let mut sim = Simulator::new(ChannelConfig::default()).unwrap();
/// let responder = Responder::new(anchor, ResponderConfig::default(), NullSink).unwrap();
/// let initiator = Initiator::new(mobile, InitiatorConfig::with_anchors([anchor]), NullSink).unwrap();
/// sim.add_node(responder, Position::new(0.0, 0.0, 0.0)).unwrap();
/// sim.add_node(initiator, Position::new(3.0, 4.0, 0.0)).unwrap();
///
/// sim.start().unwrap();
/// sim.run_for(Duration::from_millis(100)).unwrap();
/// assert!(sim.stats().frames_delivered > 0);
/// ```
pub struct Simulator {
    kernel: Kernel,
    nodes: Vec<SimNode>,
    index: HashMap<NodeAddress, usize>,
    channel: ChannelConfig,
    rng: StdRng,
    stats: SimStats,
}

impl Simulator {
    /// Create an empty simulation at time zero.
    pub fn new(channel: ChannelConfig) -> Result<Self, SimError> {
        channel.validate()?;

        Ok(Self {
            kernel: Kernel {
                now: Timestamp::ZERO,
                queue: BinaryHeap::new(),
                next_order: 0,
                next_timer: 0,
                live_timers: HashSet::new(),
            },
            nodes: Vec::new(),
            index: HashMap::new(),
            rng: StdRng::seed_from_u64(channel.seed),
            channel,
            stats: SimStats::default(),
        })
    }

    /// Place a role at `position`.
    pub fn add_node<R>(&mut self, role: R, position: Position) -> Result<(), SimError>
    where
        R: RangingRole + 'static,
    {
        let address = role.address();
        if self.index.contains_key(&address) {
            return Err(SimError::DuplicateAddress(address));
        }
        if !position.is_finite() {
            return Err(SimError::NonFinitePosition(address));
        }
        self.index.insert(address, self.nodes.len());
        self.nodes.push(SimNode {
            role: Box::new(role),
            position,
            muted: false,
        });
        Ok(())
    }

    /// Mute or unmute a node's radio. A muted node neither hears nor is
    /// heard; its own transmit completions still arrive.
    pub fn set_muted(&mut self, address: NodeAddress, muted: bool) -> Result<(), SimError> {
        let idx = self.node_index(address)?;
        self.nodes[idx].muted = muted;
        tracing::debug!(node = %address, muted, "radio mute changed");
        Ok(())
    }

    /// Call [`RangingRole::on_start`] on every node, in insertion order.
    pub fn start(&mut self) -> Result<(), SimError> {
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let mut io = NodeIo {
                node: idx,
                kernel: &mut self.kernel,
            };
            let address = node.role.address();
            node.role
                .on_start(&mut io)
                .map_err(|source| SimError::Node { address, source })?;
        }
        Ok(())
    }

    /// Current simulation time.
    pub fn now(&self) -> Timestamp {
        self.kernel.now
    }

    /// Delivery counters.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Receive completions delivered so far.
    pub fn frames_delivered(&self) -> u64 {
        self.stats.frames_delivered
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a node's role.
    pub fn node(&self, address: NodeAddress) -> Option<&dyn RangingRole> {
        self.index
            .get(&address)
            .map(|&idx| self.nodes[idx].role.as_ref())
    }

    /// Check if no events remain.
    pub fn is_idle(&self) -> bool {
        self.kernel.queue.is_empty()
    }

    /// Process the next event. Returns `false` if the queue was empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(scheduled) = self.kernel.queue.pop() else {
            return Ok(false);
        };
        self.kernel.now = scheduled.at;
        self.dispatch(scheduled.node, scheduled.event)?;
        Ok(true)
    }

    /// Process every event scheduled at or before `until`, then set the
    /// clock to `until`.
    pub fn run_until(&mut self, until: Timestamp) -> Result<(), SimError> {
        while self
            .kernel
            .queue
            .peek()
            .is_some_and(|next| next.at <= until)
        {
            self.step()?;
        }
        self.kernel.now = self.kernel.now.max(until);
        Ok(())
    }

    /// Run for `duration` past the current time.
    pub fn run_for(&mut self, duration: Duration) -> Result<(), SimError> {
        let until = self.kernel.now + duration;
        self.run_until(until)
    }

    fn node_index(&self, address: NodeAddress) -> Result<usize, SimError> {
        self.index
            .get(&address)
            .copied()
            .ok_or(SimError::UnknownNode(address))
    }

    fn dispatch(&mut self, idx: usize, event: Event) -> Result<(), SimError> {
        match event {
            Event::TxBegin(frame) => {
                self.begin_transmission(idx, frame);
                Ok(())
            }
            Event::Timer(handle) => {
                if !self.kernel.live_timers.remove(&handle) {
                    return Ok(());
                }
                self.stats.timers_fired += 1;
                self.deliver(idx, |role, io| role.on_timer(handle, io))
            }
            Event::TxComplete(completion) => {
                self.deliver(idx, |role, io| role.on_transmit_complete(completion, io))
            }
            Event::RxComplete(completion) => {
                self.stats.frames_delivered += 1;
                self.deliver(idx, |role, io| role.on_receive(completion, io))
            }
        }
    }

    fn deliver<F>(&mut self, idx: usize, callback: F) -> Result<(), SimError>
    where
        F: FnOnce(&mut dyn RangingRole, &mut dyn Transport) -> Result<(), RangingError>,
    {
        let node = &mut self.nodes[idx];
        let address = node.role.address();
        let mut io = NodeIo {
            node: idx,
            kernel: &mut self.kernel,
        };
        callback(node.role.as_mut(), &mut io).map_err(|source| {
            tracing::error!(node = %address, error = %source, "node failed, halting simulation");
            SimError::Node { address, source }
        })
    }

    fn begin_transmission(&mut self, sender: usize, frame: Frame) {
        let begin = self.kernel.now;
        let airtime = self.channel.airtime(frame.size_bits);
        self.stats.frames_sent += 1;

        match self.index.get(&frame.destination).copied() {
            Some(receiver) => {
                if self.lost(sender, receiver) {
                    self.stats.frames_dropped += 1;
                    tracing::debug!(
                        source = %frame.source,
                        destination = %frame.destination,
                        sequence = frame.sequence,
                        kind = %frame.kind,
                        "frame dropped"
                    );
                } else {
                    let delay = propagation_delay(
                        &self.nodes[sender].position,
                        &self.nodes[receiver].position,
                    );
                    let rx_begin = begin + delay;
                    let completion = CompletionEvent::new(frame.clone(), rx_begin);
                    self.kernel
                        .push(rx_begin + airtime, receiver, Event::RxComplete(completion));
                }
            }
            None => {
                self.stats.frames_unroutable += 1;
                tracing::trace!(destination = %frame.destination, "frame to unknown node");
            }
        }

        let completion = CompletionEvent::new(frame, begin);
        self.kernel
            .push(begin + airtime, sender, Event::TxComplete(completion));
    }

    fn lost(&mut self, sender: usize, receiver: usize) -> bool {
        if self.nodes[sender].muted || self.nodes[receiver].muted {
            return true;
        }
        let p = self.channel.drop_probability;
        p > 0.0 && self.rng.gen_bool(p)
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("now", &self.kernel.now)
            .field("nodes", &self.nodes.len())
            .field("pending_events", &self.kernel.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}
