//! Protocol Module
//!
//! Defines the wire protocol spoken with the tower.
//!
//! ## Outbound (20 bytes)
//! ```text
//! ┌──────────┬─────────────────────────────────────────────┐
//! │ Type (1) │        State image / effect bytes (19)      │
//! └──────────┴─────────────────────────────────────────────┘
//! ```
//!
//! ### Command Types
//! - 0x00: TOWER_STATE   - effect command or full state image
//! - 0x01: DOOR_RESET
//! - 0x02: UNJAM_DRUMS
//! - 0x03: RESET_COUNTER - zero the skull-drop counter
//! - 0x04: CALIBRATION
//!
//! ## Inbound
//! ```text
//! ┌──────────┬─────────────────────────────────────────────┐
//! │ Kind (1) │                 Payload                     │
//! └──────────┴─────────────────────────────────────────────┘
//! ```
//!
//! ### Message Kinds
//! - 0x00: TOWER_STATE (19-byte state image)
//! - 0x01: INVALID_STATE (critical)
//! - 0x02: HARDWARE_FAILURE (critical)
//! - 0x03..0x06: mechanism diagnostics
//! - 0x07: BATTERY_READING
//! - 0x08: CALIBRATION_FINISHED

pub mod constants;
mod types;
mod state;
mod command;
mod codec;
mod response;
mod battery;
mod classifier;

pub use types::{Corner, Drum, Layer, LightEffect, Side};
pub use state::{
    is_calibrated, pack_state, pack_state_into, unpack_state, AudioState, BeamState, DrumState,
    LayerState, LightState, TowerState,
};
pub use command::{CommandType, LightDescriptor, RotateTargets, StateChange};
pub use codec::{
    drum_bytes, drum_position_bytes, encode_basic, encode_light_override, encode_lights,
    encode_multi, encode_rotate, encode_sound, encode_state, encode_stateful, light_position,
    merge_into, stamp_drum_positions, LightPosition, Packet, StatefulCommand, LIGHT_POSITIONS,
};
pub use response::{Response, ResponseKind};
pub use battery::{millivolts_from_response, millivolts_to_percentage};
pub use classifier::{CalibrationState, Classification, ResponseClassifier};
pub use constants::{COMMAND_PACKET_SIZE, STATE_DATA_LENGTH};
