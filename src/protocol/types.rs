//! Tower vocabulary
//!
//! Sides, drums, layers and light effects used by the codecs and the
//! high-level tower API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TowerError;

/// Cardinal direction a drum can face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// Decode a 2-bit drum position
    pub fn from_position(position: u8) -> Option<Self> {
        Self::ALL.get(position as usize).copied()
    }

    pub fn position(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::North => "north",
            Side::East => "east",
            Side::South => "south",
            Side::West => "west",
        }
    }
}

/// One of the three rotating drums (also the three doorway levels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Drum {
    Top = 0,
    Middle = 1,
    Bottom = 2,
}

impl Drum {
    pub const ALL: [Drum; 3] = [Drum::Top, Drum::Middle, Drum::Bottom];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Drum::Top => "top",
            Drum::Middle => "middle",
            Drum::Bottom => "bottom",
        }
    }
}

/// One of the six LED-bearing sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Layer {
    TopRing = 0,
    MiddleRing = 1,
    BottomRing = 2,
    Ledge = 3,
    Base1 = 4,
    Base2 = 5,
}

impl Layer {
    pub const ALL: [Layer; 6] = [
        Layer::TopRing,
        Layer::MiddleRing,
        Layer::BottomRing,
        Layer::Ledge,
        Layer::Base1,
        Layer::Base2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The doorway ring belonging to a drum level
    pub fn ring(drum: Drum) -> Self {
        match drum {
            Drum::Top => Layer::TopRing,
            Drum::Middle => Layer::MiddleRing,
            Drum::Bottom => Layer::BottomRing,
        }
    }

    /// Rings use cardinal positions, the ledge and base layers ordinal ones
    pub fn is_ring(self) -> bool {
        matches!(self, Layer::TopRing | Layer::MiddleRing | Layer::BottomRing)
    }
}

/// Ordinal light position on the ledge and base layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Corner {
    NorthEast = 0,
    SouthEast = 1,
    SouthWest = 2,
    NorthWest = 3,
}

impl Corner {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Light animation
///
/// The numeric value is the 3-bit effect code carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LightEffect {
    Off = 0,
    On = 1,
    Breathe = 2,
    BreatheFast = 3,
    Breathe50Percent = 4,
    Flicker = 5,
}

impl LightEffect {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LightEffect::Off),
            1 => Some(LightEffect::On),
            2 => Some(LightEffect::Breathe),
            3 => Some(LightEffect::BreatheFast),
            4 => Some(LightEffect::Breathe50Percent),
            5 => Some(LightEffect::Flicker),
            _ => None,
        }
    }

    /// Nibble used by effect commands: effect code with the loop bit set,
    /// or zero for off
    pub fn nibble(self) -> u8 {
        match self {
            LightEffect::Off => 0,
            effect => (effect.code() << 1) | 1,
        }
    }
}

// =============================================================================
// Display / FromStr
// =============================================================================

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Drum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Side {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Side::North),
            "east" | "e" => Ok(Side::East),
            "south" | "s" => Ok(Side::South),
            "west" | "w" => Ok(Side::West),
            _ => Err(TowerError::InvalidArgument(format!("unknown side: {}", s))),
        }
    }
}

impl FromStr for Drum {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Drum::Top),
            "middle" => Ok(Drum::Middle),
            "bottom" => Ok(Drum::Bottom),
            _ => Err(TowerError::InvalidArgument(format!("unknown drum: {}", s))),
        }
    }
}

impl FromStr for Corner {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "northeast" | "ne" => Ok(Corner::NorthEast),
            "southeast" | "se" => Ok(Corner::SouthEast),
            "southwest" | "sw" => Ok(Corner::SouthWest),
            "northwest" | "nw" => Ok(Corner::NorthWest),
            _ => Err(TowerError::InvalidArgument(format!("unknown corner: {}", s))),
        }
    }
}

impl FromStr for LightEffect {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LightEffect::Off),
            "on" => Ok(LightEffect::On),
            "breathe" => Ok(LightEffect::Breathe),
            "breathe-fast" | "breathefast" => Ok(LightEffect::BreatheFast),
            "breathe-50" | "breathe50percent" => Ok(LightEffect::Breathe50Percent),
            "flicker" => Ok(LightEffect::Flicker),
            _ => Err(TowerError::InvalidArgument(format!("unknown light effect: {}", s))),
        }
    }
}
