//! Response definitions
//!
//! Message kinds the tower sends back, keyed by the first byte of every
//! inbound packet.

/// Inbound message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseKind {
    TowerState = 0x00,
    InvalidState = 0x01,
    HardwareFailure = 0x02,
    JiggleTriggered = 0x03,
    MechanismDuration = 0x04,
    UnexpectedTrigger = 0x05,
    DifferentialReadings = 0x06,
    BatteryReading = 0x07,
    CalibrationFinished = 0x08,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 9] = [
        ResponseKind::TowerState,
        ResponseKind::InvalidState,
        ResponseKind::HardwareFailure,
        ResponseKind::JiggleTriggered,
        ResponseKind::MechanismDuration,
        ResponseKind::UnexpectedTrigger,
        ResponseKind::DifferentialReadings,
        ResponseKind::BatteryReading,
        ResponseKind::CalibrationFinished,
    ];

    /// Look up a message kind; `None` means unmapped
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseKind::TowerState => "Tower State",
            ResponseKind::InvalidState => "Invalid State",
            ResponseKind::HardwareFailure => "Hardware Failure",
            ResponseKind::JiggleTriggered => "Unjam Jiggle Triggered",
            ResponseKind::MechanismDuration => "Rotation Duration",
            ResponseKind::UnexpectedTrigger => "Unexpected Trigger",
            ResponseKind::DifferentialReadings => "Diff Voltage Readings",
            ResponseKind::BatteryReading => "Battery Level",
            ResponseKind::CalibrationFinished => "Calibration Finished",
        }
    }

    /// Critical kinds indicate the tower needs attention
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            ResponseKind::InvalidState | ResponseKind::HardwareFailure
        )
    }
}

/// Result of classifying one inbound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Known kind with its raw packet
    Known { kind: ResponseKind, data: Vec<u8> },

    /// First byte not in the message table
    Unmapped { code: u8, data: Vec<u8> },

    /// Zero-length notification
    Empty,
}

impl Response {
    /// Classify a raw packet by its first byte
    pub fn classify(data: &[u8]) -> Self {
        match data.first() {
            None => Response::Empty,
            Some(&code) => match ResponseKind::from_code(code) {
                Some(kind) => Response::Known {
                    kind,
                    data: data.to_vec(),
                },
                None => Response::Unmapped {
                    code,
                    data: data.to_vec(),
                },
            },
        }
    }

    pub fn kind(&self) -> Option<ResponseKind> {
        match self {
            Response::Known { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
