//! Command Queue Tests
//!
//! These tests verify:
//! - FIFO delivery with exactly one command in flight
//! - A late acknowledgement holds back commands queued behind it
//! - Timeouts resolve a command and let the queue advance
//! - A stale timeout never resolves a later command
//! - clear() and shutdown() fail outstanding commands
//! - A failed send resolves only its own command

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use darktower::protocol::{Packet, COMMAND_PACKET_SIZE};
use darktower::queue::{Command, CommandKind, CommandOutcome, CommandQueue, SendFn};
use darktower::{Result, TowerError, TransportError};
use parking_lot::Mutex;
use tracing::Span;

// =============================================================================
// Helper Functions
// =============================================================================

/// Markers (packet byte 19) of every command handed to the send function
type Sent = Arc<Mutex<Vec<u8>>>;

fn recording_queue(timeout: Duration) -> (CommandQueue, Sent) {
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&sent);
    let send: SendFn = Arc::new(move |command: &Command| -> Result<()> {
        log.lock().push(command.packet[19]);
        Ok(())
    });
    (CommandQueue::new(send, timeout, Span::none()), sent)
}

/// Queue whose send function fails for one marker
fn failing_queue(timeout: Duration, fail_marker: u8) -> (CommandQueue, Sent) {
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&sent);
    let send: SendFn = Arc::new(move |command: &Command| -> Result<()> {
        let marker = command.packet[19];
        log.lock().push(marker);
        if marker == fail_marker {
            return Err(TransportError::new("GATT operation failed").into());
        }
        Ok(())
    });
    (CommandQueue::new(send, timeout, Span::none()), sent)
}

fn marked(marker: u8) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    packet[19] = marker;
    packet
}

/// Poll until `condition` holds; panics after two seconds
fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_fifo_delivery() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    let handles: Vec<_> = (0..3)
        .map(|i| queue.enqueue(CommandKind::Lights, marked(i), None))
        .collect();

    for i in 0..3 {
        wait_for(|| sent.lock().len() == i + 1);
        assert!(queue.on_response());
    }

    for handle in handles {
        assert_eq!(handle.wait().unwrap(), CommandOutcome::Acknowledged);
    }
    assert_eq!(*sent.lock(), vec![0, 1, 2]);
}

#[test]
fn test_single_command_in_flight() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    let first = queue.enqueue(CommandKind::Rotate, marked(1), None);
    let second = queue.enqueue(CommandKind::Sound, marked(2), None);

    wait_for(|| sent.lock().len() == 1);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sent.lock().len(), 1);

    let status = queue.status();
    assert!(status.is_processing);
    assert_eq!(status.queue_length, 1);
    let current = status.current_command.unwrap();
    assert_eq!(current.id, first.id());
    assert_eq!(current.kind, CommandKind::Rotate);

    queue.on_response();
    wait_for(|| sent.lock().len() == 2);
    queue.on_response();

    assert_eq!(first.wait().unwrap(), CommandOutcome::Acknowledged);
    assert_eq!(second.wait().unwrap(), CommandOutcome::Acknowledged);
}

#[test]
fn test_late_ack_holds_back_queued_commands() {
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&sent);
    let (release, gate) = channel::bounded::<()>(0);
    let send: SendFn = Arc::new(move |command: &Command| -> Result<()> {
        let marker = command.packet[19];
        log.lock().push(marker);
        if marker == 1 {
            let _ = gate.recv();
        }
        Ok(())
    });
    let queue = CommandQueue::new(send, Duration::from_secs(5), Span::none());

    let a = queue.enqueue(CommandKind::Lights, marked(1), None);
    wait_for(|| sent.lock().len() == 1);

    // queued while A's write is still in progress
    let b = queue.enqueue(CommandKind::Lights, marked(2), None);
    let c = queue.enqueue(CommandKind::Lights, marked(3), None);
    release.send(()).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(*sent.lock(), vec![1]);
    let status = queue.status();
    assert_eq!(status.current_command.unwrap().id, a.id());
    assert_eq!(status.queue_length, 2);

    assert!(queue.on_response());
    assert_eq!(a.wait().unwrap(), CommandOutcome::Acknowledged);
    wait_for(|| sent.lock().len() == 2);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(*sent.lock(), vec![1, 2]);

    queue.on_response();
    wait_for(|| sent.lock().len() == 3);
    queue.on_response();
    assert_eq!(b.wait().unwrap(), CommandOutcome::Acknowledged);
    assert_eq!(c.wait().unwrap(), CommandOutcome::Acknowledged);
}

#[test]
fn test_ids_increase() {
    let (queue, _sent) = recording_queue(Duration::from_millis(10));
    let a = queue.enqueue(CommandKind::Sound, marked(0), None);
    let b = queue.enqueue(CommandKind::Sound, marked(0), None);
    assert!(b.id() > a.id());
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_with_nothing_in_flight() {
    let (queue, _sent) = recording_queue(Duration::from_secs(5));
    assert!(!queue.on_response());
}

#[test]
fn test_status_descriptions() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    let _a = queue.enqueue(CommandKind::Calibration, marked(0), None);
    let _b = queue.enqueue(CommandKind::Stateful, marked(1), Some("set led Ledge[0]"));

    wait_for(|| sent.lock().len() == 1);
    let current = queue.status().current_command.unwrap();
    assert_eq!(current.description, "Calibration command");

    queue.on_response();
    wait_for(|| sent.lock().len() == 2);
    let current = queue.status().current_command.unwrap();
    assert_eq!(current.description, "set led Ledge[0]");

    queue.on_response();
    wait_for(|| !queue.status().is_processing);
    assert_eq!(queue.status().queue_length, 0);
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[test]
fn test_timeout_advances_queue() {
    let (queue, sent) = recording_queue(Duration::from_millis(50));
    let first = queue.enqueue(CommandKind::Lights, marked(1), None);
    let second = queue.enqueue(CommandKind::Lights, marked(2), None);

    assert_eq!(first.wait().unwrap(), CommandOutcome::TimedOut);
    assert_eq!(second.wait().unwrap(), CommandOutcome::TimedOut);
    assert_eq!(*sent.lock(), vec![1, 2]);
}

#[test]
fn test_stale_timeout_does_not_fire_for_next_command() {
    let timeout = Duration::from_millis(300);
    let (queue, sent) = recording_queue(timeout);

    let first = queue.enqueue(CommandKind::Sound, marked(1), None);
    wait_for(|| sent.lock().len() == 1);
    queue.on_response();
    assert_eq!(first.wait().unwrap(), CommandOutcome::Acknowledged);

    thread::sleep(Duration::from_millis(200));
    let second = queue.enqueue(CommandKind::Sound, marked(2), None);
    wait_for(|| sent.lock().len() == 2);

    // the first command's deadline passes during this wait
    assert!(second.wait_timeout(Duration::from_millis(150)).is_none());
    assert_eq!(second.wait().unwrap(), CommandOutcome::TimedOut);
}

// =============================================================================
// Send Failure Tests
// =============================================================================

#[test]
fn test_send_error_fails_only_that_command() {
    let (queue, sent) = failing_queue(Duration::from_millis(30), 2);
    let handles: Vec<_> = (1..=3)
        .map(|i| queue.enqueue(CommandKind::Rotate, marked(i), None))
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.wait()).collect();
    assert_eq!(results[0], Ok(CommandOutcome::TimedOut));
    assert!(matches!(results[1], Err(TowerError::Transport(_))));
    assert_eq!(results[2], Ok(CommandOutcome::TimedOut));
    assert_eq!(*sent.lock(), vec![1, 2, 3]);
}

// =============================================================================
// Clear / Shutdown Tests
// =============================================================================

#[test]
fn test_clear_fails_everything_outstanding() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    let handles: Vec<_> = (0..3)
        .map(|i| queue.enqueue(CommandKind::Lights, marked(i), None))
        .collect();

    wait_for(|| sent.lock().len() == 1);
    queue.clear();

    for handle in handles {
        assert_eq!(handle.wait(), Err(TowerError::QueueCleared));
    }
    let status = queue.status();
    assert!(!status.is_processing);
    assert_eq!(status.queue_length, 0);
    assert_eq!(sent.lock().len(), 1);
}

#[test]
fn test_queue_usable_after_clear() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    queue.clear();

    let handle = queue.enqueue(CommandKind::DoorReset, marked(7), None);
    wait_for(|| sent.lock().len() == 1);
    queue.on_response();
    assert_eq!(handle.wait().unwrap(), CommandOutcome::Acknowledged);
}

#[test]
fn test_shutdown_fails_pending_and_rejects_new() {
    let (queue, sent) = recording_queue(Duration::from_secs(5));
    let _first = queue.enqueue(CommandKind::Rotate, marked(1), None);
    let second = queue.enqueue(CommandKind::Rotate, marked(2), None);
    wait_for(|| sent.lock().len() == 1);

    queue.shutdown();
    assert_eq!(second.wait(), Err(TowerError::QueueShutdown));

    let late = queue.enqueue(CommandKind::Sound, marked(3), None);
    assert_eq!(late.wait(), Err(TowerError::QueueShutdown));
    assert_eq!(*sent.lock(), vec![1]);
}
