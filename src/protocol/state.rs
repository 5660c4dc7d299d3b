//! Tower state image
//!
//! The structured mirror of the device state and the codec converting it to
//! and from the 19-byte image carried by state replies and stateful commands.
//!
//! ## Image Layout
//! ```text
//! byte 0   │ d1.pos(7-6) │ d1.snd(5) │ d0.cal(4) │ d0.jam(3) │ d0.pos(2-1) │ d0.snd(0) │
//! byte 1   │ d2.cal(7) │ d2.jam(6) │ -(5) │ d2.pos(4-3) │ d2.snd(2) │ d1.cal(1) │ d1.jam(0) │
//! 2..14    │ 24 LED channels, even channel in the high nibble: effect(3) loop(1)
//! byte 14  │ audio loop(7) │ audio sample(6-0) │
//! 15..=16  │ beam count, big-endian
//! byte 17  │ volume(7-4) │ beam fault(3) │ drum reverse(2-0) │
//! byte 18  │ led sequence
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TowerError};
use super::constants::{
    LED_CHANNEL_LOOKUP, MAX_AUDIO_SAMPLE, MAX_DRUM_POSITION, MAX_LIGHT_EFFECT, MAX_VOLUME,
    STATE_AUDIO_POS, STATE_BEAM_HIGH_POS, STATE_BEAM_LOW_POS, STATE_DATA_LENGTH,
    STATE_DRUM_BYTE_0, STATE_DRUM_BYTE_1, STATE_FLAGS_POS, STATE_LED_SEQUENCE_POS,
    STATE_LED_START,
};

// =============================================================================
// State Types
// =============================================================================

/// One rotating drum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumState {
    pub jammed: bool,
    pub calibrated: bool,
    /// 2-bit orientation: north, east, south, west
    pub position: u8,
    pub play_sound: bool,
    pub reverse: bool,
}

/// One light slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    /// 3-bit effect code, see [`LightEffect`](super::LightEffect)
    pub effect: u8,
    pub looping: bool,
}

/// Four light slots of one layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerState {
    pub lights: [LightState; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioState {
    /// 7-bit sample index
    pub sample: u8,
    pub looping: bool,
    /// 4-bit volume
    pub volume: u8,
}

/// Skull-drop beam sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamState {
    pub count: u16,
    pub fault: bool,
}

/// Canonical mirror of the device state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerState {
    /// Top, middle, bottom
    pub drums: [DrumState; 3],
    /// Top/middle/bottom ring, ledge, base 1, base 2
    pub layers: [LayerState; 6],
    pub audio: AudioState,
    pub beam: BeamState,
    pub led_sequence: u8,
}

impl TowerState {
    /// True iff all three drums report calibrated
    pub fn is_calibrated(&self) -> bool {
        is_calibrated(self)
    }

    /// Validate every fixed-width field
    pub fn validate(&self) -> Result<()> {
        for drum in &self.drums {
            check_range("drum.position", drum.position, MAX_DRUM_POSITION)?;
        }
        for layer in &self.layers {
            for light in &layer.lights {
                check_range("light.effect", light.effect, MAX_LIGHT_EFFECT)?;
            }
        }
        check_range("audio.sample", self.audio.sample, MAX_AUDIO_SAMPLE)?;
        check_range("audio.volume", self.audio.volume, MAX_VOLUME)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u8, max: u8) -> Result<()> {
    if value > max {
        return Err(TowerError::FieldOutOfRange {
            field,
            value: value as u32,
            max: max as u32,
        });
    }
    Ok(())
}

// =============================================================================
// Bit Helpers
// =============================================================================

#[inline]
fn bit(byte: u8, n: u8) -> bool {
    byte & (1 << n) != 0
}

#[inline]
fn flag(value: bool, n: u8) -> u8 {
    (value as u8) << n
}

/// Byte and shift holding an LED channel's nibble
#[inline]
fn channel_slot(channel: u8) -> (usize, u8) {
    let byte = STATE_LED_START + (channel / 2) as usize;
    let shift = if channel % 2 == 0 { 4 } else { 0 };
    (byte, shift)
}

// =============================================================================
// Unpack / Pack
// =============================================================================

/// Decode a 19-byte state image
pub fn unpack_state(data: &[u8]) -> Result<TowerState> {
    if data.len() < STATE_DATA_LENGTH {
        return Err(TowerError::BufferTooShort {
            expected: STATE_DATA_LENGTH,
            actual: data.len(),
        });
    }

    let mut state = TowerState::default();
    let b0 = data[STATE_DRUM_BYTE_0];
    let b1 = data[STATE_DRUM_BYTE_1];
    let flags = data[STATE_FLAGS_POS];

    state.drums[0] = DrumState {
        play_sound: bit(b0, 0),
        position: (b0 >> 1) & 0b11,
        jammed: bit(b0, 3),
        calibrated: bit(b0, 4),
        reverse: bit(flags, 0),
    };
    state.drums[1] = DrumState {
        play_sound: bit(b0, 5),
        position: (b0 >> 6) & 0b11,
        jammed: bit(b1, 0),
        calibrated: bit(b1, 1),
        reverse: bit(flags, 1),
    };
    state.drums[2] = DrumState {
        play_sound: bit(b1, 2),
        position: (b1 >> 3) & 0b11,
        jammed: bit(b1, 6),
        calibrated: bit(b1, 7),
        reverse: bit(flags, 2),
    };

    for (i, &channel) in LED_CHANNEL_LOOKUP.iter().enumerate() {
        let (byte, shift) = channel_slot(channel);
        let nibble = (data[byte] >> shift) & 0x0f;
        state.layers[i / 4].lights[i % 4] = LightState {
            effect: nibble >> 1,
            looping: nibble & 1 != 0,
        };
    }

    let audio = data[STATE_AUDIO_POS];
    state.audio = AudioState {
        sample: audio & 0x7f,
        looping: bit(audio, 7),
        volume: flags >> 4,
    };

    state.beam = BeamState {
        count: u16::from_be_bytes([data[STATE_BEAM_HIGH_POS], data[STATE_BEAM_LOW_POS]]),
        fault: bit(flags, 3),
    };

    state.led_sequence = data[STATE_LED_SEQUENCE_POS];

    Ok(state)
}

/// Encode a state into `out`
///
/// Fails without touching `out` if it is shorter than 19 bytes or a
/// fixed-width field is out of range. Bytes past the image are left as-is.
pub fn pack_state_into(state: &TowerState, out: &mut [u8]) -> Result<()> {
    if out.len() < STATE_DATA_LENGTH {
        return Err(TowerError::BufferTooShort {
            expected: STATE_DATA_LENGTH,
            actual: out.len(),
        });
    }
    state.validate()?;

    let [d0, d1, d2] = state.drums;
    let mut image = [0u8; STATE_DATA_LENGTH];

    image[STATE_DRUM_BYTE_0] = flag(d0.play_sound, 0)
        | (d0.position << 1)
        | flag(d0.jammed, 3)
        | flag(d0.calibrated, 4)
        | flag(d1.play_sound, 5)
        | (d1.position << 6);
    image[STATE_DRUM_BYTE_1] = flag(d1.jammed, 0)
        | flag(d1.calibrated, 1)
        | flag(d2.play_sound, 2)
        | (d2.position << 3)
        | flag(d2.jammed, 6)
        | flag(d2.calibrated, 7);

    for (i, &channel) in LED_CHANNEL_LOOKUP.iter().enumerate() {
        let light = state.layers[i / 4].lights[i % 4];
        let (byte, shift) = channel_slot(channel);
        let nibble = (light.effect << 1) | light.looping as u8;
        image[byte] |= nibble << shift;
    }

    image[STATE_AUDIO_POS] = state.audio.sample | flag(state.audio.looping, 7);

    let [high, low] = state.beam.count.to_be_bytes();
    image[STATE_BEAM_HIGH_POS] = high;
    image[STATE_BEAM_LOW_POS] = low;

    image[STATE_FLAGS_POS] = flag(d0.reverse, 0)
        | flag(d1.reverse, 1)
        | flag(d2.reverse, 2)
        | flag(state.beam.fault, 3)
        | (state.audio.volume << 4);

    image[STATE_LED_SEQUENCE_POS] = state.led_sequence;

    out[..STATE_DATA_LENGTH].copy_from_slice(&image);
    Ok(())
}

/// Encode a state into a fresh 19-byte image
pub fn pack_state(state: &TowerState) -> Result<[u8; STATE_DATA_LENGTH]> {
    let mut image = [0u8; STATE_DATA_LENGTH];
    pack_state_into(state, &mut image)?;
    Ok(image)
}

/// True iff all three drums report calibrated
pub fn is_calibrated(state: &TowerState) -> bool {
    state.drums.iter().all(|drum| drum.calibrated)
}
