//! Packet Codec Tests
//!
//! These tests verify:
//! - Exact wire bytes of every effect command
//! - Drum bytes are carried by non-rotate commands
//! - Stateful commands only touch the fields they change
//! - Effect-command light positions agree with the state image

use darktower::protocol::{
    drum_bytes, drum_position_bytes, encode_basic, encode_light_override, encode_lights,
    encode_multi, encode_rotate, encode_sound, encode_state, encode_stateful, light_position,
    unpack_state, AudioState, CommandType, Corner, Drum, Layer, LightDescriptor, LightEffect,
    LightState, RotateTargets, Side, StateChange, TowerState, COMMAND_PACKET_SIZE,
};
use darktower::TowerError;

// =============================================================================
// Helper Functions
// =============================================================================

const NORTH_DRUMS: [u8; 2] = [0x10, 0x82];

fn targets(top: Side, middle: Side, bottom: Side) -> RotateTargets {
    RotateTargets::new(top, middle, bottom)
}

fn every_light(effect: LightEffect) -> Vec<LightDescriptor> {
    let mut lights = Vec::new();
    for level in Drum::ALL {
        for side in Side::ALL {
            lights.push(LightDescriptor::Doorway { level, side, effect });
        }
    }
    for corner in [Corner::NorthEast, Corner::SouthEast, Corner::SouthWest, Corner::NorthWest] {
        lights.push(LightDescriptor::Ledge { corner, effect });
        for section in 0..2 {
            lights.push(LightDescriptor::Base {
                section,
                corner,
                effect,
            });
        }
    }
    lights
}

/// Indices at which two packets differ
fn diff(a: &[u8], b: &[u8]) -> Vec<usize> {
    a.iter()
        .zip(b.iter())
        .enumerate()
        .filter(|(_, (x, y))| x != y)
        .map(|(i, _)| i)
        .collect()
}

fn calibrated_state() -> TowerState {
    let mut state = TowerState::default();
    for drum in state.drums.iter_mut() {
        drum.calibrated = true;
    }
    state.drums[0].position = 1;
    state.drums[1].position = 2;
    state.drums[2].position = 3;
    state.layers[1].lights[2] = LightState {
        effect: LightEffect::Breathe.code(),
        looping: true,
    };
    state.layers[4].lights[0] = LightState {
        effect: LightEffect::Flicker.code(),
        looping: false,
    };
    state.audio.volume = 9;
    state.beam.count = 4;
    state.led_sequence = 2;
    state
}

// =============================================================================
// Rotate / Sound Tests
// =============================================================================

#[test]
fn test_rotate_all_north() {
    let packet = encode_rotate(&targets(Side::North, Side::North, Side::North), None);

    let mut expected = [0u8; COMMAND_PACKET_SIZE];
    expected[1] = 0x10;
    expected[2] = 0x82;
    assert_eq!(packet, expected);
}

#[test]
fn test_rotate_mixed_with_sound() {
    let packet = encode_rotate(&targets(Side::East, Side::South, Side::West), Some(0x21));

    assert_eq!(packet[0], CommandType::TowerState as u8);
    assert_eq!(packet[1], 0b1001_0010);
    assert_eq!(packet[2], 0b1001_1010);
    assert_eq!(packet[15], 0x21);
    assert_eq!(diff(&packet, &[0u8; COMMAND_PACKET_SIZE]), vec![1, 2, 15]);
}

#[test]
fn test_drum_bytes_follow_state_positions() {
    assert_eq!(drum_position_bytes(&TowerState::default()), NORTH_DRUMS);

    let state = calibrated_state();
    assert_eq!(
        drum_position_bytes(&state),
        drum_bytes(&targets(Side::East, Side::South, Side::West))
    );
}

#[test]
fn test_sound_carries_drum_bytes() {
    let drums = drum_bytes(&targets(Side::West, Side::East, Side::South));
    let packet = encode_sound(0x0a, drums);

    assert_eq!(packet[1], drums[0]);
    assert_eq!(packet[2], drums[1]);
    assert_eq!(packet[15], 0x0a);
    assert_eq!(diff(&packet, &[0u8; COMMAND_PACKET_SIZE]), vec![1, 2, 15]);
}

// =============================================================================
// Light Tests
// =============================================================================

#[test]
fn test_lights_sharing_a_byte_accumulate() {
    let lights = [
        LightDescriptor::Doorway {
            level: Drum::Top,
            side: Side::North,
            effect: LightEffect::Breathe,
        },
        LightDescriptor::Doorway {
            level: Drum::Top,
            side: Side::East,
            effect: LightEffect::On,
        },
    ];
    let packet = encode_lights(&lights, NORTH_DRUMS);

    assert_eq!(packet[3], 0x53);
    assert_eq!(packet[1], 0x10);
    assert_eq!(packet[2], 0x82);
}

#[test]
fn test_light_off_sets_nothing() {
    let packet = encode_lights(&every_light(LightEffect::Off), NORTH_DRUMS);
    assert!(packet[3..15].iter().all(|&b| b == 0));
}

#[test]
fn test_all_lights_fill_light_bytes_only() {
    let packet = encode_lights(&every_light(LightEffect::On), NORTH_DRUMS);
    assert!(packet[3..15].iter().all(|&b| b == 0x33));
    assert_eq!(packet[0], 0);
    assert_eq!(&packet[15..], &[0u8; 5]);
}

#[test]
fn test_ledge_and_base_positions() {
    let ledge = LightDescriptor::Ledge {
        corner: Corner::SouthEast,
        effect: LightEffect::On,
    };
    let base = LightDescriptor::Base {
        section: 1,
        corner: Corner::NorthWest,
        effect: LightEffect::On,
    };

    let ledge_pos = light_position(&ledge);
    assert_eq!((ledge_pos.offset, ledge_pos.upper), (9, true));
    let base_pos = light_position(&base);
    assert_eq!((base_pos.offset, base_pos.upper), (14, false));
}

#[test]
fn test_effect_and_stateful_lights_agree() {
    // an effect-command light lands on the same nibble as the matching state image slot
    for effect in [LightEffect::On, LightEffect::BreatheFast, LightEffect::Flicker] {
        for light in every_light(effect) {
            let effect_packet = encode_lights(&[light], NORTH_DRUMS);

            let (layer, position) = light.slot();
            let stateful = encode_stateful(
                &TowerState::default(),
                &StateChange::Led {
                    layer,
                    position,
                    effect,
                    looping: true,
                },
            )
            .unwrap();

            assert_eq!(
                &effect_packet[3..15],
                &stateful.packet[3..15],
                "{:?}",
                light
            );
        }
    }
}

#[test]
fn test_light_override() {
    let packet = encode_light_override(0x0c, Some(0x40), NORTH_DRUMS);

    assert_eq!(packet[19], 0x0c);
    assert_eq!(packet[15], 0x40);
    assert_eq!(diff(&packet, &[0u8; COMMAND_PACKET_SIZE]), vec![1, 2, 15, 19]);
}

// =============================================================================
// Multi-Command Tests
// =============================================================================

#[test]
fn test_multi_is_union_of_parts() {
    let rotate = targets(Side::South, Side::West, Side::East);
    let lights = [
        LightDescriptor::Ledge {
            corner: Corner::NorthEast,
            effect: LightEffect::Breathe,
        },
        LightDescriptor::Doorway {
            level: Drum::Bottom,
            side: Side::West,
            effect: LightEffect::Flicker,
        },
    ];
    let packet = encode_multi(Some(&rotate), &lights, Some(0x33), NORTH_DRUMS);

    let rotate_only = encode_rotate(&rotate, None);
    let lights_only = encode_lights(&lights, NORTH_DRUMS);

    assert_eq!(&packet[1..3], &rotate_only[1..3]);
    assert_eq!(&packet[3..15], &lights_only[3..15]);
    assert_eq!(packet[15], 0x33);
    assert_eq!(packet[0], 0);
    assert_eq!(&packet[16..], &[0u8; 4]);
}

#[test]
fn test_multi_without_rotate_keeps_drums() {
    let drums = drum_bytes(&targets(Side::West, Side::West, Side::West));
    let packet = encode_multi(None, &every_light(LightEffect::On), None, drums);

    assert_eq!([packet[1], packet[2]], drums);
    assert_eq!(packet[15], 0);
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_basic_commands_carry_only_type() {
    let cases = [
        (CommandType::DoorReset, 0x01),
        (CommandType::UnjamDrums, 0x02),
        (CommandType::ResetCounter, 0x03),
        (CommandType::Calibration, 0x04),
    ];
    for (command_type, code) in cases {
        let packet = encode_basic(command_type);
        assert_eq!(packet[0], code);
        assert!(packet[1..].iter().all(|&b| b == 0));
    }
}

// =============================================================================
// Stateful Command Tests
// =============================================================================

#[test]
fn test_encode_state_embeds_image() {
    let state = calibrated_state();
    let packet = encode_state(&state).unwrap();

    assert_eq!(packet[0], 0);
    assert_eq!(unpack_state(&packet[1..]).unwrap(), state);
}

#[test]
fn test_stateful_rotate_touches_only_drum_bytes() {
    let current = calibrated_state();
    let before = encode_state(&current).unwrap();

    for drum in Drum::ALL {
        for side in Side::ALL {
            let change = StateChange::Drum {
                drum,
                side,
                play_sound: false,
            };
            let out = encode_stateful(&current, &change).unwrap();

            for i in diff(&before, &out.packet) {
                assert!(i == 1 || i == 2, "{:?} changed byte {}", change, i);
            }
            assert_eq!(out.next_state.drums[drum.index()].position, side.position());
            assert_eq!(out.next_state.layers, current.layers);
            assert_eq!(out.next_state.beam, current.beam);
        }
    }
}

#[test]
fn test_stateful_led_touches_one_byte() {
    let current = calibrated_state();
    let before = encode_state(&current).unwrap();

    let out = encode_stateful(
        &current,
        &StateChange::Led {
            layer: Layer::Ledge,
            position: 0,
            effect: LightEffect::BreatheFast,
            looping: false,
        },
    )
    .unwrap();

    assert_eq!(diff(&before, &out.packet), vec![10]);
    assert_eq!(out.packet[10] >> 4, 0b0110);
}

#[test]
fn test_stateful_audio_is_sent_once() {
    let current = calibrated_state();
    let out = encode_stateful(
        &current,
        &StateChange::Audio {
            sample: 0x09,
            looping: true,
            volume: 7,
        },
    )
    .unwrap();

    assert_eq!(out.packet[15], 0x89);
    assert_eq!(
        out.next_state.audio,
        AudioState {
            sample: 0,
            looping: false,
            volume: 7
        }
    );

    // pushing the recorded state again must not replay the sample
    let replay = encode_state(&out.next_state).unwrap();
    assert_eq!(replay[15], 0);
}

#[test]
fn test_stateful_led_sequence() {
    let out = encode_stateful(&TowerState::default(), &StateChange::LedSequence(0x0f)).unwrap();
    assert_eq!(out.packet[19], 0x0f);
    assert_eq!(out.next_state.led_sequence, 0x0f);
}

#[test]
fn test_stateful_rejects_bad_input() {
    let bad_position = encode_stateful(
        &TowerState::default(),
        &StateChange::Led {
            layer: Layer::TopRing,
            position: 4,
            effect: LightEffect::On,
            looping: false,
        },
    );
    assert!(matches!(bad_position, Err(TowerError::InvalidArgument(_))));

    let bad_volume = encode_stateful(
        &TowerState::default(),
        &StateChange::Audio {
            sample: 1,
            looping: false,
            volume: 16,
        },
    );
    assert!(matches!(bad_volume, Err(TowerError::FieldOutOfRange { .. })));
}

// =============================================================================
// Vocabulary Tests
// =============================================================================

#[test]
fn test_side_positions_and_parsing() {
    for side in Side::ALL {
        assert_eq!(Side::from_position(side.position()), Some(side));
        assert_eq!(side.name().parse::<Side>().unwrap(), side);
    }
    assert_eq!(Side::from_position(4), None);
    assert_eq!("W".parse::<Side>().unwrap(), Side::West);
    assert!(matches!("up".parse::<Side>(), Err(TowerError::InvalidArgument(_))));
}

#[test]
fn test_layer_rings() {
    for drum in Drum::ALL {
        assert!(Layer::ring(drum).is_ring());
        assert_eq!(Layer::ring(drum).index(), drum.index());
    }
    assert!(!Layer::Ledge.is_ring());
    assert!(!Layer::Base2.is_ring());
}

#[test]
fn test_light_effect_codes() {
    for code in 0..6 {
        let effect = LightEffect::from_code(code).unwrap();
        assert_eq!(effect.code(), code);
    }
    assert_eq!(LightEffect::from_code(6), None);
    assert_eq!("breathe-fast".parse::<LightEffect>().unwrap(), LightEffect::BreatheFast);
    assert_eq!("nw".parse::<Corner>().unwrap(), Corner::NorthWest);
    assert_eq!(LightEffect::Off.nibble(), 0);
    assert_eq!(LightEffect::Breathe50Percent.nibble(), 0b1001);
}
