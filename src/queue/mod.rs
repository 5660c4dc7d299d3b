//! Command Queue Module
//!
//! Delivers commands to the tower one at a time.
//!
//! ## Responsibilities
//! - FIFO ordering with exactly one command in flight
//! - Timeout-based completion (a timeout resolves, it does not fail)
//! - Failing queued commands on teardown
//! - Resending failed writes with linear backoff
//!
//! ## Command Lifecycle
//! ```text
//! enqueue ──► pending ──► in flight ──┬── on_response ──► Acknowledged
//!                                     ├── timeout ──────► TimedOut
//!                                     ├── send error ───► Err(Transport)
//!                                     └── clear ────────► Err(QueueCleared)
//! ```

mod command;
mod queue;
mod retry;

pub use command::{Command, CommandHandle, CommandKind, CommandOutcome};
pub use queue::{CommandQueue, InFlightCommand, QueueStatus, SendFn};
pub use retry::{FailureKind, RetryDecision, RetryPolicy};
