//! Per-node event loop.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::RuntimeError;
use super::medium::{Endpoint, Inbound};
use crate::core::{RangingError, RangingRole, TimerHandle, Timestamp, Transport};
use crate::frame::{CompletionEvent, Frame, NodeAddress};

/// Side effect requested by a role during one callback.
#[derive(Debug)]
enum Command {
    Send { frame: Frame, delay: Duration },
    Schedule { handle: TimerHandle, at: Timestamp },
    Cancel(TimerHandle),
}

/// [`Transport`] that records requests instead of performing them.
///
/// Timer handles are minted on the spot so the role can store them.
struct CommandBuffer<'a> {
    now: Timestamp,
    next_timer: &'a mut u64,
    commands: Vec<Command>,
}

impl Transport for CommandBuffer<'_> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn send(&mut self, frame: Frame, delay: Duration) {
        self.commands.push(Command::Send { frame, delay });
    }

    fn schedule_timer(&mut self, at: Timestamp) -> TimerHandle {
        *self.next_timer += 1;
        let handle = TimerHandle::from_raw(*self.next_timer);
        self.commands.push(Command::Schedule { handle, at });
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        self.commands.push(Command::Cancel(handle));
    }
}

#[derive(Debug)]
enum Action {
    Timer(TimerHandle),
    TxBegin(Frame),
    TxComplete(CompletionEvent),
    RxComplete(CompletionEvent),
}

#[derive(Debug)]
struct Due {
    at: Timestamp,
    order: u64,
    action: Action,
}

// Min-heap on (at, order).
impl Ord for Due {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Due {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Due {}

/// Pending local work for one node.
#[derive(Debug, Default)]
struct Agenda {
    queue: BinaryHeap<Due>,
    next_order: u64,
    next_timer: u64,
    live_timers: HashSet<TimerHandle>,
}

impl Agenda {
    fn push(&mut self, at: Timestamp, action: Action) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Due { at, order, action });
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.peek().map(|due| due.at)
    }

    fn pop_due(&mut self, now: Timestamp) -> Option<Due> {
        if self.queue.peek().is_some_and(|due| due.at <= now) {
            self.queue.pop()
        } else {
            None
        }
    }

    fn apply(&mut self, now: Timestamp, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Send { frame, delay } => self.push(now + delay, Action::TxBegin(frame)),
                Command::Schedule { handle, at } => {
                    self.live_timers.insert(handle);
                    self.push(at, Action::Timer(handle));
                }
                Command::Cancel(handle) => {
                    self.live_timers.remove(&handle);
                }
            }
        }
    }
}

/// Drives `role` on `endpoint` until `shutdown` fires or the role fails.
///
/// Returns the role on clean shutdown so callers can inspect it.
pub async fn run_node<R>(
    mut role: R,
    mut endpoint: Endpoint,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<R, RuntimeError>
where
    R: RangingRole,
{
    let address = role.address();
    let medium = endpoint.medium().clone();
    let mut agenda = Agenda::default();

    invoke(&mut role, &mut agenda, medium.now(), |role, io| role.on_start(io))?;
    tracing::debug!(node = %address, "node task started");

    loop {
        let wake = agenda.next_deadline().map(|at| medium.instant_at(at));

        tokio::select! {
            _ = &mut shutdown => break,
            inbound = endpoint.recv() => match inbound {
                Some(Inbound { event, complete_at }) => {
                    agenda.push(complete_at, Action::RxComplete(event));
                }
                None => break,
            },
            _ = sleep_until(wake) => {
                let now = medium.now();
                while let Some(due) = agenda.pop_due(now) {
                    match due.action {
                        Action::Timer(handle) => {
                            if agenda.live_timers.remove(&handle) {
                                invoke(&mut role, &mut agenda, now, |role, io| role.on_timer(handle, io))?;
                            }
                        }
                        Action::TxBegin(frame) => {
                            let done = due.at + medium.airtime(&frame);
                            medium.transmit(frame.clone(), due.at);
                            agenda.push(done, Action::TxComplete(CompletionEvent::new(frame, due.at)));
                        }
                        Action::TxComplete(event) => {
                            invoke(&mut role, &mut agenda, now, |role, io| role.on_transmit_complete(event, io))?;
                        }
                        Action::RxComplete(event) => {
                            invoke(&mut role, &mut agenda, now, |role, io| role.on_receive(event, io))?;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(node = %address, "node task stopped");
    Ok(role)
}

fn invoke<R, F>(role: &mut R, agenda: &mut Agenda, now: Timestamp, callback: F) -> Result<(), RuntimeError>
where
    R: RangingRole,
    F: FnOnce(&mut R, &mut dyn Transport) -> Result<(), RangingError>,
{
    let mut io = CommandBuffer {
        now,
        next_timer: &mut agenda.next_timer,
        commands: Vec::new(),
    };
    let result = callback(role, &mut io);
    let commands = io.commands;
    agenda.apply(now, commands);

    result.map_err(|source| {
        let address = role.address();
        tracing::error!(node = %address, error = %source, "node failed, stopping task");
        RuntimeError::Role { address, source }
    })
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// A spawned node task.
///
/// Dropping the handle signals shutdown without waiting for the task.
#[derive(Debug)]
pub struct NodeHandle<R> {
    address: NodeAddress,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<R, RuntimeError>>,
}

/// Spawn `role` on the current tokio runtime.
pub fn spawn_node<R>(role: R, endpoint: Endpoint) -> NodeHandle<R>
where
    R: RangingRole + Send + 'static,
{
    let address = role.address();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_node(role, endpoint, shutdown_rx));

    NodeHandle {
        address,
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

impl<R> NodeHandle<R> {
    /// Node address.
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    /// Whether the task has ended (shutdown or failure).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and return the role.
    pub async fn shutdown(mut self) -> Result<R, RuntimeError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await?
    }
}

impl<R> Drop for NodeHandle<R> {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
