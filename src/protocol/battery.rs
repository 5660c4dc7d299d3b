//! Battery reply decoding

use super::constants::{
    BATTERY_CELL_COUNT, BATTERY_MV_HIGH_POS, BATTERY_MV_LOW_POS, BATTERY_PERCENT_STEP,
    VOLTAGE_LEVELS,
};

/// Millivolts reported by a battery reply, or `None` if the packet is too
/// short to carry them
pub fn millivolts_from_response(data: &[u8]) -> Option<u32> {
    let low = *data.get(BATTERY_MV_LOW_POS)?;
    let high = *data.get(BATTERY_MV_HIGH_POS)?;
    Some(u32::from_le_bytes([low, high, 0, 0]))
}

/// Convert a pack reading to a percentage in 5% steps
///
/// The reading is normalized to a single cell, then every threshold it meets
/// or exceeds adds 5%.
pub fn millivolts_to_percentage(millivolts: u32) -> u8 {
    let cell = millivolts / BATTERY_CELL_COUNT;
    let met = VOLTAGE_LEVELS.iter().filter(|&&level| cell >= level).count();
    met as u8 * BATTERY_PERCENT_STEP
}
