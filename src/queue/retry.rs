//! Retry policy
//!
//! Decides what happens when the transport rejects a write.
//!
//! ## Attempt Model
//! The initial write is not counted. Each resend gets an attempt number
//! `1..=max_retries`; resend `n` waits `n * backoff_step`. After resend
//! `max_retries` fails the error is surfaced, so a command is written at most
//! `max_retries + 1` times.

use std::thread;
use std::time::Duration;

use tracing::Span;

use crate::config::RetryConfig;
use crate::error::{Result, TowerError, TransportError};

/// What a write failure message says about the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The write was cancelled (by the user or the platform)
    Cancelled,
    /// Another radio operation is still running
    InProgress,
    /// The link is gone
    Disconnected,
    Generic,
}

impl FailureKind {
    /// Classify by the transport's message text
    pub fn of(error: &TransportError) -> Self {
        let message = error.message.to_ascii_lowercase();
        if message.contains("null object")
            || message.contains("properties of null")
            || message.contains("disconnected")
        {
            FailureKind::Disconnected
        } else if message.contains("cancelled") || message.contains("canceled") {
            FailureKind::Cancelled
        } else if message.contains("already in progress") {
            FailureKind::InProgress
        } else {
            FailureKind::Generic
        }
    }
}

/// Outcome of consulting the policy after a failed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resend as attempt `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Surface the failure
    GiveUp,
    /// Surface the failure and mark the link down
    Disconnected,
}

/// Resend policy for transport write failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    span: Span,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, span: Span) -> Self {
        Self { config, span }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Backoff before resend `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_step * attempt
    }

    /// Decide after a failure, given how many resends already happened
    pub fn decide(&self, retries_so_far: u32, error: &TransportError) -> RetryDecision {
        match FailureKind::of(error) {
            FailureKind::Disconnected => RetryDecision::Disconnected,
            FailureKind::Cancelled | FailureKind::InProgress => RetryDecision::GiveUp,
            FailureKind::Generic => {
                let attempt = retries_so_far + 1;
                if attempt <= self.config.max_retries {
                    RetryDecision::Retry {
                        attempt,
                        delay: self.backoff(attempt),
                    }
                } else {
                    RetryDecision::GiveUp
                }
            }
        }
    }

    /// Run `write` until it succeeds or the policy gives up
    ///
    /// `on_disconnect` runs once if a failure signals a lost link. Returns
    /// the number of resends used.
    pub fn execute<W, D>(&self, mut write: W, on_disconnect: D) -> Result<u32>
    where
        W: FnMut() -> std::result::Result<(), TransportError>,
        D: FnOnce(),
    {
        let mut retries = 0;
        loop {
            let error = match write() {
                Ok(()) => return Ok(retries),
                Err(e) => e,
            };

            tracing::error!(parent: &self.span, "Command send error: {}", error);

            match self.decide(retries, &error) {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::info!(
                        parent: &self.span,
                        "Retrying tower command, attempt {} of {} in {:?}",
                        attempt,
                        self.config.max_retries,
                        delay
                    );
                    thread::sleep(delay);
                    retries = attempt;
                }
                RetryDecision::GiveUp => {
                    return Err(TowerError::Transport(error));
                }
                RetryDecision::Disconnected => {
                    tracing::warn!(parent: &self.span, "Write failure indicates disconnect");
                    on_disconnect();
                    return Err(TowerError::Transport(error));
                }
            }
        }
    }
}
