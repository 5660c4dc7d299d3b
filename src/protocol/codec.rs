//! Packet codec
//!
//! Builds the fixed 20-byte outbound packets.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬────────────┬──────────┬────────────┬───────┬──────┬─────────┬──────────┐
//! │ Type (1) │ TopMid (1) │ Bot (1)  │ Lights (12)│ Sound │ Beam │ Flags   │ Override │
//! │    0     │     1      │    2     │   3..15    │  15   │16..17│   18    │    19    │
//! └──────────┴────────────┴──────────┴────────────┴───────┴──────┴─────────┴──────────┘
//! ```
//!
//! Effect commands (rotate, sound, lights, override) write only the bytes
//! they own. Every effect command that is not a rotate is re-stamped with the
//! last known drum bytes so it never resets drum orientation. Stateful
//! commands serialize the whole [`TowerState`] instead.

use crate::error::Result;
use super::command::{CommandType, LightDescriptor, RotateTargets, StateChange};
use super::constants::{
    AUDIO_COMMAND_POS, COMMAND_PACKET_SIZE, COMMAND_TYPE_POS, DRUM_BOTTOM_PATTERNS,
    DRUM_BOTTOM_POS, DRUM_MIDDLE_PATTERNS, DRUM_TOP_MIDDLE_POS, DRUM_TOP_PATTERNS,
    LIGHT_OVERRIDE_POS, STATE_DATA_LENGTH, STATE_DATA_OFFSET,
};
use super::state::{pack_state_into, TowerState};

/// One outbound packet
pub type Packet = [u8; COMMAND_PACKET_SIZE];

/// Where an effect-command light lives in the packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightPosition {
    pub offset: usize,
    /// The upper light of a wired pair takes the high nibble
    pub upper: bool,
}

const fn lp(offset: usize, upper: bool) -> LightPosition {
    LightPosition { offset, upper }
}

/// Packet position of every light, indexed `[layer][position]`
pub const LIGHT_POSITIONS: [[LightPosition; 4]; 6] = [
    // top ring: N E S W
    [lp(3, true), lp(3, false), lp(4, true), lp(4, false)],
    // middle ring
    [lp(5, true), lp(5, false), lp(6, true), lp(6, false)],
    // bottom ring
    [lp(7, true), lp(7, false), lp(8, true), lp(8, false)],
    // ledge: NE SE SW NW
    [lp(10, true), lp(9, true), lp(9, false), lp(10, false)],
    // base 1
    [lp(12, true), lp(11, true), lp(11, false), lp(12, false)],
    // base 2
    [lp(14, true), lp(13, true), lp(13, false), lp(14, false)],
];

// =============================================================================
// Drum Bytes
// =============================================================================

/// Drum bytes for a rotate to the given targets
pub fn drum_bytes(targets: &RotateTargets) -> [u8; 2] {
    [
        DRUM_TOP_PATTERNS[targets.top.position() as usize]
            | DRUM_MIDDLE_PATTERNS[targets.middle.position() as usize],
        DRUM_BOTTOM_PATTERNS[targets.bottom.position() as usize],
    ]
}

/// Drum bytes matching the drum positions of a known state
pub fn drum_position_bytes(state: &TowerState) -> [u8; 2] {
    let pattern = |table: &[u8; 4], drum: usize| table[(state.drums[drum].position & 0b11) as usize];
    [
        pattern(&DRUM_TOP_PATTERNS, 0) | pattern(&DRUM_MIDDLE_PATTERNS, 1),
        pattern(&DRUM_BOTTOM_PATTERNS, 2),
    ]
}

/// Overwrite the drum bytes of a packet
pub fn stamp_drum_positions(packet: &mut Packet, drums: [u8; 2]) {
    packet[DRUM_TOP_MIDDLE_POS] = drums[0];
    packet[DRUM_BOTTOM_POS] = drums[1];
}

// =============================================================================
// Effect Commands
// =============================================================================

/// Rotate all three drums, optionally with a sound
pub fn encode_rotate(targets: &RotateTargets, sound: Option<u8>) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    stamp_drum_positions(&mut packet, drum_bytes(targets));
    if let Some(sound) = sound {
        packet[AUDIO_COMMAND_POS] = sound;
    }
    packet
}

/// Play one sound
pub fn encode_sound(sound: u8, drums: [u8; 2]) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    packet[AUDIO_COMMAND_POS] = sound;
    stamp_drum_positions(&mut packet, drums);
    packet
}

/// Packet position of a light descriptor
pub fn light_position(light: &LightDescriptor) -> LightPosition {
    let (layer, position) = light.slot();
    LIGHT_POSITIONS[layer.index()][position]
}

/// Light bytes only, drum bytes left zero
fn light_bytes(lights: &[LightDescriptor]) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    for light in lights {
        let position = light_position(light);
        let nibble = light.effect().nibble();
        let value = if position.upper { nibble << 4 } else { nibble };
        // lights sharing a byte accumulate
        packet[position.offset] |= value;
    }
    packet
}

/// Set any number of lights
pub fn encode_lights(lights: &[LightDescriptor], drums: [u8; 2]) -> Packet {
    let mut packet = light_bytes(lights);
    stamp_drum_positions(&mut packet, drums);
    packet
}

/// Trigger a canned light sequence, optionally with a sound
pub fn encode_light_override(sequence: u8, sound: Option<u8>, drums: [u8; 2]) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    packet[LIGHT_OVERRIDE_POS] = sequence;
    if let Some(sound) = sound {
        packet[AUDIO_COMMAND_POS] = sound;
    }
    stamp_drum_positions(&mut packet, drums);
    packet
}

/// Merge independently built effect packets into one
///
/// Rotate, light and sound bytes occupy disjoint ranges (1..3, 3..15 and 15),
/// so OR-ing them loses nothing. Without a rotate the last known drum bytes
/// are stamped in.
pub fn encode_multi(
    rotate: Option<&RotateTargets>,
    lights: &[LightDescriptor],
    sound: Option<u8>,
    drums: [u8; 2],
) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    if let Some(targets) = rotate {
        merge_into(&mut packet, &encode_rotate(targets, None));
    }
    merge_into(&mut packet, &light_bytes(lights));
    if rotate.is_none() {
        stamp_drum_positions(&mut packet, drums);
    }
    if let Some(sound) = sound {
        packet[AUDIO_COMMAND_POS] |= sound;
    }
    packet
}

/// Bitwise-OR `other` into `packet`
pub fn merge_into(packet: &mut Packet, other: &Packet) {
    for (byte, extra) in packet.iter_mut().zip(other.iter()) {
        *byte |= *extra;
    }
}

/// Packet for the commands carried by the type byte alone
pub fn encode_basic(command_type: CommandType) -> Packet {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    packet[COMMAND_TYPE_POS] = command_type as u8;
    packet
}

// =============================================================================
// Stateful Commands
// =============================================================================

/// Serialize a whole state into a tower-state packet
pub fn encode_state(state: &TowerState) -> Result<Packet> {
    let mut packet = [0u8; COMMAND_PACKET_SIZE];
    packet[COMMAND_TYPE_POS] = CommandType::TowerState as u8;
    pack_state_into(
        state,
        &mut packet[STATE_DATA_OFFSET..STATE_DATA_OFFSET + STATE_DATA_LENGTH],
    )?;
    Ok(packet)
}

/// Encoded stateful command plus the state to record once it is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatefulCommand {
    pub packet: Packet,
    /// The applied state with audio cleared, so a later push does not replay
    /// the sound
    pub next_state: TowerState,
}

/// Apply a delta to the current state and serialize the result
pub fn encode_stateful(current: &TowerState, change: &StateChange) -> Result<StatefulCommand> {
    let mut next_state = *current;
    change.apply(&mut next_state)?;
    let packet = encode_state(&next_state)?;

    next_state.audio.sample = 0;
    next_state.audio.looping = false;

    Ok(StatefulCommand { packet, next_state })
}
