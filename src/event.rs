//! Upward notifications
//!
//! Events the tower reports to its owner through the channel returned by
//! [`Tower::events`](crate::Tower::events).

use crate::protocol::ResponseKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TowerEvent {
    /// Transport connected and callbacks registered
    Connected,

    /// Transport dropped or `disconnect()` was called
    Disconnected,

    /// Transport reports the radio became available or unavailable
    AvailabilityChanged(bool),

    /// A state reply arrived while a calibration was outstanding
    CalibrationComplete,

    /// The skull-drop counter advanced to `count`
    SkullDrop { count: u8 },

    /// Battery reading passed the notification filter
    Battery { millivolts: u32, percentage: u8 },

    /// Invalid state or hardware failure reported by the tower
    CriticalResponse { kind: ResponseKind },
}
