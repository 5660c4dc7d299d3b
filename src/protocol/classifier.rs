//! Response classifier
//!
//! Turns raw inbound packets into typed outcomes: a decoded state, whether
//! the in-flight command is acknowledged, and the events to surface.
//!
//! ## Responsibilities
//! - Map the first byte to a message kind (unknown codes are "unmapped")
//! - Complete an outstanding calibration on the next state reply
//! - Report skull drops, ignoring counter resets
//! - Decode and rate-limit battery notifications
//!
//! Nothing here fails: malformed packets are logged and skipped.

use std::time::{Duration, Instant};

use tracing::Span;

use crate::config::{ResponseLogging, TowerConfig};
use crate::event::TowerEvent;
use super::battery::{millivolts_from_response, millivolts_to_percentage};
use super::constants::{SKULL_DROP_COUNT_POS, STATE_DATA_OFFSET};
use super::response::{Response, ResponseKind};
use super::state::{unpack_state, TowerState};

/// Calibration progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    Idle,
    /// Calibration command sent; the next state reply completes it
    AwaitingCalibration,
}

/// What the engine should do with one inbound packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// `None` for unmapped or empty packets
    pub kind: Option<ResponseKind>,

    /// Authoritative state decoded from a state reply
    pub state: Option<TowerState>,

    /// The in-flight command may be considered acknowledged
    pub acknowledges: bool,

    pub events: Vec<TowerEvent>,
}

/// Battery notification settings
#[derive(Debug, Clone, Copy)]
struct BatteryPolicy {
    notify_frequency: Duration,
    on_value_change_only: bool,
}

/// Stateful classifier for one tower session
pub struct ResponseClassifier {
    span: Span,
    logging: ResponseLogging,
    battery_policy: BatteryPolicy,

    calibration: CalibrationState,
    calibrated: bool,
    /// `calibrated` as it was when the outstanding request began
    calibrated_before_request: bool,

    last_skull_count: u8,

    last_battery_percentage: Option<u8>,
    last_battery_millivolts: Option<u32>,
    last_battery_notification: Option<Instant>,
    last_battery_reading: Option<Instant>,
}

impl ResponseClassifier {
    pub fn new(config: &TowerConfig, span: Span) -> Self {
        Self {
            span,
            logging: config.response_logging,
            battery_policy: BatteryPolicy {
                notify_frequency: config.battery_notify_frequency,
                on_value_change_only: config.battery_notify_on_value_change_only,
            },
            calibration: CalibrationState::Idle,
            calibrated: false,
            calibrated_before_request: false,
            last_skull_count: 0,
            last_battery_percentage: None,
            last_battery_millivolts: None,
            last_battery_notification: None,
            last_battery_reading: None,
        }
    }

    // =========================================================================
    // Calibration
    // =========================================================================

    /// Enter `AwaitingCalibration`
    ///
    /// Returns false if a calibration was already outstanding; the state does
    /// not change in that case.
    pub fn begin_calibration(&mut self) -> bool {
        match self.calibration {
            CalibrationState::AwaitingCalibration => false,
            CalibrationState::Idle => {
                self.calibration = CalibrationState::AwaitingCalibration;
                self.calibrated_before_request = self.calibrated;
                self.calibrated = false;
                true
            }
        }
    }

    /// Withdraw an outstanding calibration request that never reached the
    /// tower, restoring the previous calibrated flag
    pub fn abort_calibration(&mut self) {
        if self.calibration == CalibrationState::AwaitingCalibration {
            self.calibration = CalibrationState::Idle;
            self.calibrated = self.calibrated_before_request;
            tracing::debug!(parent: &self.span, "Calibration request withdrawn");
        }
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration
    }

    /// True once a calibration has completed this session
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn last_skull_count(&self) -> u8 {
        self.last_skull_count
    }

    pub fn last_battery_millivolts(&self) -> Option<u32> {
        self.last_battery_millivolts
    }

    pub fn last_battery_percentage(&self) -> Option<u8> {
        self.last_battery_percentage
    }

    /// When the last battery reply arrived
    pub fn last_battery_reading(&self) -> Option<Instant> {
        self.last_battery_reading
    }

    /// Forget everything learned this session (used on disconnect)
    pub fn reset(&mut self) {
        self.calibration = CalibrationState::Idle;
        self.calibrated = false;
        self.calibrated_before_request = false;
        self.last_skull_count = 0;
        self.last_battery_percentage = None;
        self.last_battery_millivolts = None;
        self.last_battery_notification = None;
        self.last_battery_reading = None;
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify a packet received now
    pub fn handle(&mut self, data: &[u8]) -> Classification {
        self.handle_at(data, Instant::now())
    }

    /// Classify a packet received at `now`
    pub fn handle_at(&mut self, data: &[u8], now: Instant) -> Classification {
        let mut out = Classification::default();

        let (kind, data) = match Response::classify(data) {
            Response::Empty => {
                tracing::debug!(parent: &self.span, "Ignoring empty notification");
                return out;
            }
            Response::Unmapped { code, data } => {
                tracing::warn!(
                    parent: &self.span,
                    "Unmapped response 0x{:02x}: {:02x?}",
                    code,
                    data
                );
                return out;
            }
            Response::Known { kind, data } => (kind, data),
        };

        out.kind = Some(kind);
        self.log_response(kind, &data);

        match kind {
            ResponseKind::TowerState => self.handle_state_reply(&data, &mut out),
            ResponseKind::BatteryReading => self.handle_battery_reply(&data, now, &mut out),
            kind if kind.is_critical() => {
                out.events.push(TowerEvent::CriticalResponse { kind });
            }
            _ => {}
        }

        out
    }

    fn handle_state_reply(&mut self, data: &[u8], out: &mut Classification) {
        out.acknowledges = true;

        match unpack_state(&data[STATE_DATA_OFFSET..]) {
            Ok(state) => out.state = Some(state),
            Err(e) => {
                tracing::warn!(parent: &self.span, "Malformed tower state reply: {}", e);
            }
        }

        if self.calibration == CalibrationState::AwaitingCalibration {
            self.calibration = CalibrationState::Idle;
            self.calibrated = true;
            tracing::info!(parent: &self.span, "Tower calibration complete");
            out.events.push(TowerEvent::CalibrationComplete);
        }

        if let Some(&count) = data.get(SKULL_DROP_COUNT_POS) {
            if count != self.last_skull_count {
                if count != 0 {
                    tracing::info!(parent: &self.span, "Skull drop detected: count {}", count);
                    out.events.push(TowerEvent::SkullDrop { count });
                } else {
                    tracing::debug!(parent: &self.span, "Skull drop counter reset");
                }
                self.last_skull_count = count;
            }
        }
    }

    fn handle_battery_reply(&mut self, data: &[u8], now: Instant, out: &mut Classification) {
        let Some(millivolts) = millivolts_from_response(data) else {
            tracing::warn!(
                parent: &self.span,
                "Battery reply too short: {} bytes",
                data.len()
            );
            return;
        };
        let percentage = millivolts_to_percentage(millivolts);

        self.last_battery_reading = Some(now);
        self.last_battery_millivolts = Some(millivolts);

        let notify = if self.battery_policy.on_value_change_only {
            self.last_battery_percentage != Some(percentage)
        } else {
            self.last_battery_notification
                .map_or(true, |last| {
                    now.saturating_duration_since(last) >= self.battery_policy.notify_frequency
                })
        };

        self.last_battery_percentage = Some(percentage);

        if notify {
            self.last_battery_notification = Some(now);
            out.events.push(TowerEvent::Battery {
                millivolts,
                percentage,
            });
        }
    }

    fn log_response(&self, kind: ResponseKind, data: &[u8]) {
        let logging = &self.logging;
        if !logging.enabled {
            return;
        }

        match kind {
            ResponseKind::TowerState if logging.tower_state => {
                tracing::debug!(parent: &self.span, "{}: {:02x?}", kind.name(), data);
            }
            ResponseKind::BatteryReading if logging.battery => {
                tracing::debug!(parent: &self.span, "{}: {:02x?}", kind.name(), data);
            }
            kind if kind.is_critical() && logging.critical => {
                tracing::error!(parent: &self.span, "{}: {:02x?}", kind.name(), data);
            }
            ResponseKind::JiggleTriggered
            | ResponseKind::MechanismDuration
            | ResponseKind::UnexpectedTrigger
            | ResponseKind::DifferentialReadings
            | ResponseKind::CalibrationFinished
                if logging.mechanism =>
            {
                tracing::info!(parent: &self.span, "{}: {:02x?}", kind.name(), data);
            }
            _ => {}
        }
    }
}
