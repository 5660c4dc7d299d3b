//! Queued commands and their completion handles

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{Result, TowerError};
use crate::protocol::Packet;

/// What a command does, for logs and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Rotate,
    Sound,
    Lights,
    LightOverride,
    Multi,
    Stateful,
    Calibration,
    ResetCounter,
    UnjamDrums,
    DoorReset,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a command left the in-flight slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A relevant response arrived
    Acknowledged,
    /// No response within the command timeout; the queue moved on anyway
    TimedOut,
}

pub(crate) type Completion = Sender<Result<CommandOutcome>>;

/// A command waiting in, or taken from, the queue
pub struct Command {
    pub id: u64,
    pub kind: CommandKind,
    pub packet: Packet,
    pub description: String,
    pub created_at: Instant,
    pub(crate) completion: Completion,
}

impl Command {
    /// Resolve this command; a dropped handle is not an error
    pub(crate) fn complete(self, result: Result<CommandOutcome>) {
        let _ = self.completion.send(result);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish()
    }
}

/// Caller's side of a queued command
#[derive(Debug)]
pub struct CommandHandle {
    id: u64,
    receiver: Receiver<Result<CommandOutcome>>,
}

impl CommandHandle {
    pub(crate) fn new(id: u64, receiver: Receiver<Result<CommandOutcome>>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the command is acknowledged, times out, or fails
    ///
    /// A command whose bookkeeping was dropped by `clear()` while in flight
    /// reports `QueueCleared`.
    pub fn wait(self) -> Result<CommandOutcome> {
        self.receiver.recv().unwrap_or(Err(TowerError::QueueCleared))
    }

    /// Like [`wait`](Self::wait) with an upper bound; `None` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<CommandOutcome>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TowerError::QueueCleared)),
        }
    }

    /// Non-blocking check; `None` if still pending
    pub fn try_result(&self) -> Option<Result<CommandOutcome>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TowerError::QueueCleared)),
        }
    }
}
