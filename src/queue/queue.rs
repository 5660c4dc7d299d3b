//! Command queue
//!
//! Serializes outbound commands onto the single half-duplex link.
//!
//! ## Concurrency Model: Single In-Flight Slot
//!
//! - One worker thread owns the send side. It pops the head of `pending`,
//!   moves it into `in_flight`, arms the timeout and calls the send function
//!   outside the lock.
//! - `on_response()` and `clear()` run on any thread. Both take the
//!   in-flight slot under the lock and wake the worker, which sees its
//!   command gone and moves on. The timeout belongs to the worker's wait for
//!   one command id, so it can never fire for a later command.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel;
use parking_lot::{Condvar, Mutex};
use tracing::Span;

use crate::error::{Result, TowerError};
use crate::protocol::Packet;
use super::command::{Command, CommandHandle, CommandKind, CommandOutcome, Completion};

/// Transport-send function invoked for each command, one at a time
pub type SendFn = Arc<dyn Fn(&Command) -> Result<()> + Send + Sync>;

/// Identity of the in-flight command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightCommand {
    pub id: u64,
    pub kind: CommandKind,
    pub description: String,
    pub sent_at: Instant,
}

/// Diagnostic snapshot of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    /// Commands waiting behind the in-flight one
    pub queue_length: usize,
    pub is_processing: bool,
    pub current_command: Option<InFlightCommand>,
}

struct InFlight {
    info: InFlightCommand,
    completion: Completion,
}

struct QueueState {
    pending: VecDeque<Command>,
    in_flight: Option<InFlight>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
    send: SendFn,
    timeout: Duration,
    next_id: AtomicU64,
    span: Span,
}

/// FIFO command queue with a single in-flight slot
pub struct CommandQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Start a queue whose worker calls `send` for each command
    pub fn new(send: SendFn, timeout: Duration, span: Span) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            send,
            timeout,
            next_id: AtomicU64::new(1),
            span,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("darktower-queue".to_string())
            .spawn(move || run_worker(worker_shared))
            .ok();

        if worker.is_none() {
            tracing::error!(parent: &shared.span, "Failed to spawn command queue worker");
            shared.state.lock().shutdown = true;
        }

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Append a command; the handle resolves once it leaves the in-flight
    /// slot
    pub fn enqueue(
        &self,
        kind: CommandKind,
        packet: Packet,
        description: Option<&str>,
    ) -> CommandHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(1);
        let command = Command {
            id,
            kind,
            packet,
            description: description
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} command", kind)),
            created_at: Instant::now(),
            completion: tx,
        };

        let mut state = self.shared.state.lock();
        if state.shutdown {
            command.complete(Err(TowerError::QueueShutdown));
        } else {
            tracing::debug!(
                parent: &self.shared.span,
                "Queued command {} ({}), {} waiting",
                id,
                command.description,
                state.pending.len()
            );
            state.pending.push_back(command);
            self.shared.wake.notify_all();
        }

        CommandHandle::new(id, rx)
    }

    /// Signal that a relevant response arrived
    ///
    /// Resolves the in-flight command as acknowledged. Returns false if
    /// nothing was in flight.
    pub fn on_response(&self) -> bool {
        let mut state = self.shared.state.lock();
        match state.in_flight.take() {
            Some(in_flight) => {
                tracing::debug!(
                    parent: &self.shared.span,
                    "Command {} acknowledged after {:?}",
                    in_flight.info.id,
                    in_flight.info.sent_at.elapsed()
                );
                let _ = in_flight.completion.send(Ok(CommandOutcome::Acknowledged));
                self.shared.wake.notify_all();
                true
            }
            None => false,
        }
    }

    /// Fail every queued command and forget the in-flight one
    ///
    /// Safe to call at any time; the queue stays usable afterwards.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        let dropped = state.pending.len();
        for command in state.pending.drain(..) {
            command.complete(Err(TowerError::QueueCleared));
        }
        let had_in_flight = state.in_flight.take().is_some();
        self.shared.wake.notify_all();

        if dropped > 0 || had_in_flight {
            tracing::info!(
                parent: &self.shared.span,
                "Command queue cleared: {} queued, in flight: {}",
                dropped,
                had_in_flight
            );
        }
    }

    /// Diagnostic snapshot; does not change anything
    pub fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock();
        QueueStatus {
            queue_length: state.pending.len(),
            is_processing: state.in_flight.is_some(),
            current_command: state.in_flight.as_ref().map(|f| f.info.clone()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Stop the worker, failing anything still queued
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            for command in state.pending.drain(..) {
                command.complete(Err(TowerError::QueueShutdown));
            }
            state.in_flight = None;
            self.shared.wake.notify_all();
        }

        if let Some(worker) = self.worker.lock().take() {
            // dropped from inside the send function: the worker exits on its own
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!(parent: &self.shared.span, "Command queue worker panicked");
            }
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Worker
// =============================================================================

fn run_worker(shared: Arc<Shared>) {
    loop {
        let Some((command, deadline)) = next_command(&shared) else {
            return;
        };
        let id = command.id;

        tracing::debug!(
            parent: &shared.span,
            "Sending command {} ({})",
            id,
            command.description
        );

        match (shared.send)(&command) {
            Ok(()) => await_response(&shared, id, deadline),
            Err(e) => {
                let mut state = shared.state.lock();
                if state.in_flight.as_ref().map(|f| f.info.id) == Some(id) {
                    if let Some(in_flight) = state.in_flight.take() {
                        tracing::error!(
                            parent: &shared.span,
                            "Command {} ({}) failed: {}",
                            id,
                            in_flight.info.description,
                            e
                        );
                        let _ = in_flight.completion.send(Err(e));
                    }
                }
            }
        }
    }
}

/// Block until a command can go in flight; `None` on shutdown
fn next_command(shared: &Shared) -> Option<(Command, Instant)> {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return None;
        }
        if state.in_flight.is_none() {
            if let Some(command) = state.pending.pop_front() {
                let sent_at = Instant::now();
                state.in_flight = Some(InFlight {
                    info: InFlightCommand {
                        id: command.id,
                        kind: command.kind,
                        description: command.description.clone(),
                        sent_at,
                    },
                    completion: command.completion.clone(),
                });
                return Some((command, sent_at + shared.timeout));
            }
        }
        shared.wake.wait(&mut state);
    }
}

/// Wait until command `id` is acknowledged, cleared, or times out
fn await_response(shared: &Shared, id: u64, deadline: Instant) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown || state.in_flight.as_ref().map(|f| f.info.id) != Some(id) {
            return;
        }
        if shared.wake.wait_until(&mut state, deadline).timed_out() {
            if state.in_flight.as_ref().map(|f| f.info.id) == Some(id) {
                if let Some(in_flight) = state.in_flight.take() {
                    tracing::warn!(
                        parent: &shared.span,
                        "Command {} ({}) timed out after {:?}, continuing",
                        id,
                        in_flight.info.description,
                        shared.timeout
                    );
                    let _ = in_flight.completion.send(Ok(CommandOutcome::TimedOut));
                }
            }
            return;
        }
    }
}
