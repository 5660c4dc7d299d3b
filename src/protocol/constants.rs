//! Wire constants
//!
//! Offsets and tables shared with the tower firmware. These are a fixed
//! contract and must stay bit-exact.

// ============================================================================
// Packet Sizes
// ============================================================================

/// Every outbound command packet is exactly this long.
pub const COMMAND_PACKET_SIZE: usize = 20;

/// Length of the state image carried by state replies and stateful commands.
pub const STATE_DATA_LENGTH: usize = 19;

/// Offset of the state image inside a 20-byte packet (after the type byte).
pub const STATE_DATA_OFFSET: usize = 1;

// ============================================================================
// Outbound Packet Offsets
// ============================================================================

/// Command type byte.
pub const COMMAND_TYPE_POS: usize = 0;
/// Top and middle drum targets share this byte.
pub const DRUM_TOP_MIDDLE_POS: usize = 1;
/// Bottom drum target.
pub const DRUM_BOTTOM_POS: usize = 2;
/// First byte of the LED block (24 channels, two per byte).
pub const LIGHTS_START_POS: usize = 3;
/// One past the last byte of the LED block.
pub const LIGHTS_END_POS: usize = 15;
/// Sound index for effect commands, audio sample in state packets.
pub const AUDIO_COMMAND_POS: usize = 15;
/// Skull-drop count echo (low byte of the beam counter).
pub const SKULL_DROP_COUNT_POS: usize = 17;
/// Light override / LED sequence.
pub const LIGHT_OVERRIDE_POS: usize = 19;

// ============================================================================
// State Image Offsets (relative to the 19-byte image)
// ============================================================================

pub const STATE_DRUM_BYTE_0: usize = 0;
pub const STATE_DRUM_BYTE_1: usize = 1;
pub const STATE_LED_START: usize = 2;
pub const STATE_AUDIO_POS: usize = 14;
pub const STATE_BEAM_HIGH_POS: usize = 15;
pub const STATE_BEAM_LOW_POS: usize = 16;
pub const STATE_FLAGS_POS: usize = 17;
pub const STATE_LED_SEQUENCE_POS: usize = 18;

// ============================================================================
// Field Widths
// ============================================================================

pub const MAX_DRUM_POSITION: u8 = 0b11;
pub const MAX_VOLUME: u8 = 0b1111;
/// Highest effect code with a named [`LightEffect`](crate::protocol::LightEffect)
pub const MAX_LIGHT_EFFECT: u8 = 5;
pub const MAX_AUDIO_SAMPLE: u8 = 0x7f;

// ============================================================================
// Inbound Battery Reply
// ============================================================================

/// Low byte of the millivolt reading.
pub const BATTERY_MV_LOW_POS: usize = 4;
/// High byte of the millivolt reading.
pub const BATTERY_MV_HIGH_POS: usize = 2;

/// Single-cell millivolt thresholds, highest first. Each threshold met is
/// worth 5%.
pub const VOLTAGE_LEVELS: [u32; 20] = [
    1500, 1390, 1350, 1320, 1295, 1270, 1245, 1225, 1205, 1180, 1175, 1166, 1150, 1133, 1125,
    1107, 1095, 1066, 1033, 1000,
];

/// The tower runs on a 3-cell pack.
pub const BATTERY_CELL_COUNT: u32 = 3;

pub const BATTERY_PERCENT_STEP: u8 = 5;

// ============================================================================
// LED Channel Wiring
// ============================================================================

/// Physical LED driver channel for each logical `layer * 4 + position`.
///
/// Rings are ordered north, east, south, west. Ledge and base layers are
/// ordered north-east, south-east, south-west, north-west.
pub const LED_CHANNEL_LOOKUP: [u8; 24] = [
    // top ring
    0, 1, 2, 3,
    // middle ring
    4, 5, 6, 7,
    // bottom ring
    8, 9, 10, 11,
    // ledge
    14, 12, 13, 15,
    // base 1
    18, 16, 17, 19,
    // base 2
    22, 20, 21, 23,
];

// ============================================================================
// Drum Rotation Patterns
// ============================================================================

/// Drum byte patterns indexed by target side (north, east, south, west).
/// Top and middle patterns live in the same byte and are OR'd together.
pub const DRUM_TOP_PATTERNS: [u8; 4] = [0b0001_0000, 0b0001_0010, 0b0001_0100, 0b0001_0110];
pub const DRUM_MIDDLE_PATTERNS: [u8; 4] = [0b0000_0000, 0b0100_0000, 0b1000_0000, 0b1100_0000];
pub const DRUM_BOTTOM_PATTERNS: [u8; 4] = [0b1000_0010, 0b1000_1010, 0b1001_0010, 0b1001_1010];
