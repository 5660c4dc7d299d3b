//! Tower Module
//!
//! The engine that wires the transport, state store, classifier and command
//! queue together.
//!
//! ## Responsibilities
//! - Translate caller intents into packets and queue them
//! - Route inbound notifications through the classifier
//! - Apply decoded state and acknowledge the in-flight command
//! - Tear the session down on disconnect
//!
//! ## Data Flow
//! ```text
//! intent ──► codec (store context) ──► CommandQueue ──► RetryPolicy ──► transport
//!                                          ▲
//! transport ──► ResponseClassifier ────────┴──► store / events
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::Span;

use crate::config::TowerConfig;
use crate::error::{Result, TowerError};
use crate::event::TowerEvent;
use crate::protocol::{
    encode_basic, encode_light_override, encode_lights, encode_multi, encode_rotate,
    encode_sound, encode_stateful, CommandType, Drum, Layer, LightDescriptor, LightEffect,
    LightState, Packet, ResponseClassifier, RotateTargets, Side, StateChange, TowerState,
};
use crate::queue::{
    Command, CommandHandle, CommandKind, CommandOutcome, CommandQueue, QueueStatus, RetryPolicy,
    SendFn,
};
use crate::store::TowerStateStore;
use crate::transport::TowerTransport;

/// One tower session
///
/// High-level operations block until the command is acknowledged or times
/// out. Use [`Tower::enqueue`] for fire-and-forget submission.
pub struct Tower {
    core: Arc<TowerCore>,
    queue: Arc<CommandQueue>,
    events: Receiver<TowerEvent>,
}

/// State shared with the queue worker and transport callbacks
struct TowerCore {
    config: TowerConfig,
    transport: Arc<dyn TowerTransport>,
    store: TowerStateStore,
    classifier: Mutex<ResponseClassifier>,
    retry: RetryPolicy,

    /// Link flag; forced false when a write failure signals a lost link
    connected: AtomicBool,
    /// Set between a successful connect and the matching teardown
    session_active: AtomicBool,
    callbacks_registered: AtomicBool,
    connected_at: Mutex<Option<Instant>>,

    /// Serializes encode + enqueue so queue order matches store order
    submit_lock: Mutex<()>,

    events: Sender<TowerEvent>,
    span: Span,
}

impl Tower {
    /// Create a session with its own `tower` logging span
    pub fn new(transport: Arc<dyn TowerTransport>, config: TowerConfig) -> Result<Self> {
        let span = tracing::info_span!("tower", device = %config.device_name);
        Self::with_span(transport, config, span)
    }

    /// Create a session logging under `span`
    pub fn with_span(
        transport: Arc<dyn TowerTransport>,
        config: TowerConfig,
        span: Span,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = channel::unbounded();
        let core = Arc::new(TowerCore {
            store: TowerStateStore::new(span.clone()),
            classifier: Mutex::new(ResponseClassifier::new(&config, span.clone())),
            retry: RetryPolicy::new(config.retry, span.clone()),
            transport,
            connected: AtomicBool::new(false),
            session_active: AtomicBool::new(false),
            callbacks_registered: AtomicBool::new(false),
            connected_at: Mutex::new(None),
            submit_lock: Mutex::new(()),
            events: events_tx,
            span: span.clone(),
            config,
        });

        let send_core = Arc::clone(&core);
        let send: SendFn = Arc::new(move |command: &Command| send_core.send_command(command));
        let queue = Arc::new(CommandQueue::new(send, core.config.command_timeout, span));

        Ok(Self {
            core,
            queue,
            events: events_rx,
        })
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect through the transport and start a fresh session
    pub fn connect(&self) -> Result<()> {
        let core = &self.core;
        tracing::info!(
            parent: &core.span,
            "Connecting to {} ({})",
            core.config.device_name,
            core.config.service_uuid
        );
        core.transport
            .connect(&core.config.device_name, &core.config.service_uuid)?;

        if !core.callbacks_registered.swap(true, Ordering::SeqCst) {
            self.register_callbacks();
        }

        core.store.reset();
        core.classifier.lock().reset();
        *core.connected_at.lock() = Some(Instant::now());
        core.connected.store(true, Ordering::SeqCst);
        core.session_active.store(true, Ordering::SeqCst);

        tracing::info!(parent: &core.span, "Tower connected");
        let _ = core.events.send(TowerEvent::Connected);
        Ok(())
    }

    /// Disconnect and tear the session down
    pub fn disconnect(&self) -> Result<()> {
        let result = self.core.transport.disconnect();
        self.core.teardown(&self.queue);
        result.map_err(TowerError::from)
    }

    fn register_callbacks(&self) {
        let transport = &self.core.transport;

        let core = Arc::downgrade(&self.core);
        let queue = Arc::downgrade(&self.queue);
        transport.on_characteristic_value_changed(Box::new(move |data: Bytes| {
            if let Some((core, queue)) = upgrade(&core, &queue) {
                core.handle_notification(&data, &queue);
            }
        }));

        let core = Arc::downgrade(&self.core);
        let queue = Arc::downgrade(&self.queue);
        transport.on_disconnect(Box::new(move || {
            if let Some((core, queue)) = upgrade(&core, &queue) {
                tracing::warn!(parent: &core.span, "Transport reported disconnect");
                core.teardown(&queue);
            }
        }));

        let core = Arc::downgrade(&self.core);
        transport.on_availability_changed(Box::new(move |available| {
            if let Some(core) = core.upgrade() {
                tracing::info!(parent: &core.span, "Radio availability changed: {}", available);
                let _ = core.events.send(TowerEvent::AvailabilityChanged(available));
            }
        }));
    }

    pub fn is_connected(&self) -> bool {
        self.core.connected.load(Ordering::SeqCst) && self.core.transport.is_connected()
    }

    /// False when connected but no battery reading arrived within the
    /// heartbeat window
    pub fn connection_healthy(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        let window = self.core.config.battery_heartbeat_timeout;
        let last_seen = self
            .core
            .classifier
            .lock()
            .last_battery_reading()
            .or(*self.core.connected_at.lock());
        last_seen.map_or(false, |at| at.elapsed() <= window)
    }

    /// Feed one inbound packet as if the transport delivered it
    pub fn handle_notification(&self, data: &[u8]) {
        self.core.handle_notification(data, &self.queue);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Event stream; every clone receives a share of the events
    pub fn events(&self) -> Receiver<TowerEvent> {
        self.events.clone()
    }

    /// Last known device state
    pub fn state(&self) -> TowerState {
        self.core.store.state()
    }

    /// True after a calibration completed this session, or when the device
    /// reports every drum calibrated
    pub fn is_calibrated(&self) -> bool {
        self.core.classifier.lock().is_calibrated() || self.core.store.state().is_calibrated()
    }

    pub fn battery_percentage(&self) -> Option<u8> {
        self.core.classifier.lock().last_battery_percentage()
    }

    pub fn battery_millivolts(&self) -> Option<u32> {
        self.core.classifier.lock().last_battery_millivolts()
    }

    pub fn skull_drop_count(&self) -> u8 {
        self.core.classifier.lock().last_skull_count()
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    pub fn config(&self) -> &TowerConfig {
        &self.core.config
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Queue a raw packet without waiting for it
    pub fn enqueue(
        &self,
        kind: CommandKind,
        packet: Packet,
        description: Option<&str>,
    ) -> Result<CommandHandle> {
        self.ensure_connected()?;
        Ok(self.queue.enqueue(kind, packet, description))
    }

    fn submit(&self, kind: CommandKind, packet: Packet, description: &str) -> Result<CommandOutcome> {
        self.enqueue(kind, packet, Some(description))?.wait()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.core.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TowerError::NotConnected)
        }
    }

    /// Encode against the store and enqueue under the submit lock
    fn submit_with<F>(&self, kind: CommandKind, description: &str, encode: F) -> Result<CommandOutcome>
    where
        F: FnOnce(&TowerStateStore) -> Result<Packet>,
    {
        self.ensure_connected()?;
        let handle = {
            let _guard = self.core.submit_lock.lock();
            let packet = encode(&self.core.store)?;
            self.queue.enqueue(kind, packet, Some(description))
        };
        handle.wait()
    }

    // =========================================================================
    // Basic Commands
    // =========================================================================

    /// Start the drum calibration sequence
    ///
    /// The next state reply after the command is sent completes it.
    pub fn calibrate(&self) -> Result<CommandOutcome> {
        self.submit(
            CommandKind::Calibration,
            encode_basic(CommandType::Calibration),
            "calibrate",
        )
    }

    /// Zero the skull-drop counter (the resulting 0 is not a drop)
    pub fn reset_skull_count(&self) -> Result<CommandOutcome> {
        self.submit(
            CommandKind::ResetCounter,
            encode_basic(CommandType::ResetCounter),
            "reset skull count",
        )
    }

    pub fn unjam_drums(&self) -> Result<CommandOutcome> {
        self.submit(
            CommandKind::UnjamDrums,
            encode_basic(CommandType::UnjamDrums),
            "unjam drums",
        )
    }

    pub fn reset_doors(&self) -> Result<CommandOutcome> {
        self.submit(
            CommandKind::DoorReset,
            encode_basic(CommandType::DoorReset),
            "reset doors",
        )
    }

    // =========================================================================
    // Effect Commands
    // =========================================================================

    /// Turn all three drums, optionally with a sound
    pub fn rotate(&self, targets: RotateTargets, sound: Option<u8>) -> Result<CommandOutcome> {
        let description = format!("rotate {}", targets);
        self.submit_with(CommandKind::Rotate, &description, |store| {
            store.record_rotation(&targets);
            Ok(encode_rotate(&targets, sound))
        })
    }

    pub fn play_sound(&self, sound: u8) -> Result<CommandOutcome> {
        let description = format!("play sound {}", sound);
        self.submit_with(CommandKind::Sound, &description, |store| {
            Ok(encode_sound(sound, store.drum_bytes()))
        })
    }

    pub fn lights(&self, lights: &[LightDescriptor]) -> Result<CommandOutcome> {
        let description = format!("lights x{}", lights.len());
        self.submit_with(CommandKind::Lights, &description, |store| {
            Ok(encode_lights(lights, store.drum_bytes()))
        })
    }

    pub fn light_override(&self, sequence: u8, sound: Option<u8>) -> Result<CommandOutcome> {
        let description = format!("light override 0x{:02x}", sequence);
        self.submit_with(CommandKind::LightOverride, &description, |store| {
            Ok(encode_light_override(sequence, sound, store.drum_bytes()))
        })
    }

    /// Rotate, lights and sound in one packet
    pub fn multi_command(
        &self,
        rotate: Option<RotateTargets>,
        lights: &[LightDescriptor],
        sound: Option<u8>,
    ) -> Result<CommandOutcome> {
        let description = match &rotate {
            Some(targets) => format!("multi rotate {} lights x{}", targets, lights.len()),
            None => format!("multi lights x{}", lights.len()),
        };
        self.submit_with(CommandKind::Multi, &description, |store| {
            let packet = encode_multi(rotate.as_ref(), lights, sound, store.drum_bytes());
            if let Some(targets) = &rotate {
                store.record_rotation(targets);
            }
            Ok(packet)
        })
    }

    // =========================================================================
    // Stateful Commands
    // =========================================================================

    /// Apply a delta to the live state and push the whole state
    ///
    /// The merge is undone if the command fails, unless the state has moved on
    /// since.
    pub fn apply_change(&self, change: StateChange) -> Result<CommandOutcome> {
        let description = change.describe();
        let mut checkpoint = None;
        let result = self.submit_with(CommandKind::Stateful, &description, |store| {
            let (packet, taken) = store.merge(|state| {
                let command = encode_stateful(state, &change)?;
                *state = command.next_state;
                Ok(command.packet)
            })?;
            checkpoint = Some(taken);
            Ok(packet)
        });

        if let (Err(e), Some(checkpoint)) = (&result, checkpoint) {
            if self.core.store.rollback(checkpoint) {
                tracing::debug!(
                    parent: &self.core.span,
                    "Reverted {} after failure: {}",
                    description,
                    e
                );
            }
        }
        result
    }

    pub fn set_led(
        &self,
        layer: Layer,
        position: usize,
        effect: LightEffect,
        looping: bool,
    ) -> Result<CommandOutcome> {
        self.apply_change(StateChange::Led {
            layer,
            position,
            effect,
            looping,
        })
    }

    pub fn set_layer(&self, layer: Layer, lights: [LightState; 4]) -> Result<CommandOutcome> {
        self.apply_change(StateChange::Layer { layer, lights })
    }

    /// Turn a single drum, leaving the others where they are
    pub fn rotate_drum(&self, drum: Drum, side: Side, play_sound: bool) -> Result<CommandOutcome> {
        self.apply_change(StateChange::Drum {
            drum,
            side,
            play_sound,
        })
    }

    pub fn play_sound_stateful(&self, sample: u8, looping: bool, volume: u8) -> Result<CommandOutcome> {
        self.apply_change(StateChange::Audio {
            sample,
            looping,
            volume,
        })
    }

    pub fn set_led_sequence(&self, sequence: u8) -> Result<CommandOutcome> {
        self.apply_change(StateChange::LedSequence(sequence))
    }

    /// Push a complete state
    pub fn send_tower_state(&self, state: TowerState) -> Result<CommandOutcome> {
        self.apply_change(StateChange::Replace(state))
    }
}

fn upgrade(
    core: &Weak<TowerCore>,
    queue: &Weak<CommandQueue>,
) -> Option<(Arc<TowerCore>, Arc<CommandQueue>)> {
    Some((core.upgrade()?, queue.upgrade()?))
}

impl TowerCore {
    /// Queue worker's send function
    fn send_command(&self, command: &Command) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TowerError::NotConnected);
        }

        // armed before the write: the reply may arrive before it returns
        let began_calibration =
            command.kind == CommandKind::Calibration && self.classifier.lock().begin_calibration();
        if command.kind == CommandKind::Calibration && !began_calibration {
            tracing::debug!(parent: &self.span, "Calibration already in progress");
        }

        let result = self.retry.execute(
            || self.transport.write_characteristic(&command.packet),
            || self.connected.store(false, Ordering::SeqCst),
        );

        if result.is_err() && began_calibration {
            self.classifier.lock().abort_calibration();
        }
        result.map(|_| ())
    }

    fn handle_notification(&self, data: &[u8], queue: &CommandQueue) {
        let classification = self.classifier.lock().handle(data);

        if let Some(state) = classification.state {
            self.store.replace_authoritative(state);
        }
        if classification.acknowledges {
            queue.on_response();
        }
        for event in classification.events {
            let _ = self.events.send(event);
        }
    }

    /// Clear the queue and forget the session; idempotent
    fn teardown(&self, queue: &CommandQueue) {
        self.connected.store(false, Ordering::SeqCst);
        queue.clear();
        self.store.reset();
        self.classifier.lock().reset();
        *self.connected_at.lock() = None;

        if self.session_active.swap(false, Ordering::SeqCst) {
            tracing::info!(parent: &self.span, "Tower disconnected");
            let _ = self.events.send(TowerEvent::Disconnected);
        }
    }
}
