//! Command definitions
//!
//! Represents the intents a caller can send to the tower.

use std::fmt;

use crate::error::{Result, TowerError};
use super::state::{LightState, TowerState};
use super::types::{Corner, Drum, Layer, LightEffect, Side};

/// Command type byte (offset 0 of every outbound packet)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    /// State image or effect command
    TowerState = 0x00,
    DoorReset = 0x01,
    UnjamDrums = 0x02,
    ResetCounter = 0x03,
    Calibration = 0x04,
}

/// Target side for each drum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateTargets {
    pub top: Side,
    pub middle: Side,
    pub bottom: Side,
}

impl RotateTargets {
    pub fn new(top: Side, middle: Side, bottom: Side) -> Self {
        Self { top, middle, bottom }
    }

    pub fn side(&self, drum: Drum) -> Side {
        match drum {
            Drum::Top => self.top,
            Drum::Middle => self.middle,
            Drum::Bottom => self.bottom,
        }
    }
}

impl fmt::Display for RotateTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top:{} middle:{} bottom:{}",
            self.top, self.middle, self.bottom
        )
    }
}

/// A light addressed by an effect command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightDescriptor {
    /// Doorway light of a drum level
    Doorway {
        level: Drum,
        side: Side,
        effect: LightEffect,
    },
    Ledge {
        corner: Corner,
        effect: LightEffect,
    },
    /// `section` 0 is the upper base ring, 1 the lower
    Base {
        section: u8,
        corner: Corner,
        effect: LightEffect,
    },
}

impl LightDescriptor {
    pub fn effect(&self) -> LightEffect {
        match *self {
            LightDescriptor::Doorway { effect, .. }
            | LightDescriptor::Ledge { effect, .. }
            | LightDescriptor::Base { effect, .. } => effect,
        }
    }

    /// Logical layer and position index this light occupies
    pub fn slot(&self) -> (Layer, usize) {
        match *self {
            LightDescriptor::Doorway { level, side, .. } => {
                (Layer::ring(level), side.position() as usize)
            }
            LightDescriptor::Ledge { corner, .. } => (Layer::Ledge, corner.index()),
            LightDescriptor::Base {
                section, corner, ..
            } => {
                let layer = if section == 0 { Layer::Base1 } else { Layer::Base2 };
                (layer, corner.index())
            }
        }
    }
}

/// A delta applied to the live [`TowerState`] by a stateful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// Set one light slot
    Led {
        layer: Layer,
        position: usize,
        effect: LightEffect,
        looping: bool,
    },
    /// Replace all four slots of a layer
    Layer {
        layer: Layer,
        lights: [LightState; 4],
    },
    /// Turn one drum to a side
    Drum {
        drum: Drum,
        side: Side,
        play_sound: bool,
    },
    /// Trigger an audio sample
    Audio {
        sample: u8,
        looping: bool,
        volume: u8,
    },
    LedSequence(u8),
    /// Push a complete state
    Replace(TowerState),
}

impl StateChange {
    /// Apply this delta, leaving every other field untouched
    pub fn apply(&self, state: &mut TowerState) -> Result<()> {
        match self {
            StateChange::Led {
                layer,
                position,
                effect,
                looping,
            } => {
                if *position > 3 {
                    return Err(TowerError::InvalidArgument(format!(
                        "light position {} out of range",
                        position
                    )));
                }
                state.layers[layer.index()].lights[*position] = LightState {
                    effect: effect.code(),
                    looping: *looping,
                };
            }
            StateChange::Layer { layer, lights } => {
                state.layers[layer.index()].lights = *lights;
            }
            StateChange::Drum {
                drum,
                side,
                play_sound,
            } => {
                let target = &mut state.drums[drum.index()];
                target.position = side.position();
                target.play_sound = *play_sound;
            }
            StateChange::Audio {
                sample,
                looping,
                volume,
            } => {
                state.audio.sample = *sample;
                state.audio.looping = *looping;
                state.audio.volume = *volume;
            }
            StateChange::LedSequence(sequence) => {
                state.led_sequence = *sequence;
            }
            StateChange::Replace(next) => {
                *state = *next;
            }
        }
        Ok(())
    }

    /// Short human description for logs and queue diagnostics
    pub fn describe(&self) -> String {
        match self {
            StateChange::Led {
                layer,
                position,
                effect,
                looping,
            } => format!(
                "set led {:?}[{}] {:?}{}",
                layer,
                position,
                effect,
                if *looping { " loop" } else { "" }
            ),
            StateChange::Layer { layer, .. } => format!("set layer {:?}", layer),
            StateChange::Drum { drum, side, .. } => format!("rotate {} to {}", drum, side),
            StateChange::Audio { sample, volume, .. } => {
                format!("play sample {} at volume {}", sample, volume)
            }
            StateChange::LedSequence(sequence) => format!("led sequence 0x{:02x}", sequence),
            StateChange::Replace(_) => "send tower state".to_string(),
        }
    }
}
