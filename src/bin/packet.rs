//! DarkTower Packet Tool
//!
//! Encodes command packets and decodes tower replies offline, for checking
//! captures against the codec.

use clap::{Args as ClapArgs, Parser, Subcommand};
use darktower::protocol::{
    drum_bytes, encode_light_override, encode_rotate, encode_sound, unpack_state, Packet,
    ResponseClassifier, RotateTargets, Side, COMMAND_PACKET_SIZE,
};
use darktower::{TowerConfig, TowerError};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// DarkTower packet tool
#[derive(Parser, Debug)]
#[command(name = "darktower-packet")]
#[command(about = "Encode and decode Return to Dark Tower packets")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Drum context stamped into non-rotate commands
#[derive(ClapArgs, Debug)]
struct DrumArgs {
    #[arg(long, default_value = "north")]
    top: Side,

    #[arg(long, default_value = "north")]
    middle: Side,

    #[arg(long, default_value = "north")]
    bottom: Side,
}

impl DrumArgs {
    fn bytes(&self) -> [u8; 2] {
        drum_bytes(&RotateTargets::new(self.top, self.middle, self.bottom))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a 19-byte state image or a 20-byte state packet
    DecodeState {
        /// Hex bytes, separators allowed
        hex: String,

        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode a rotate of all three drums
    Rotate {
        top: Side,
        middle: Side,
        bottom: Side,

        /// Sound to play with the rotate
        #[arg(short, long)]
        sound: Option<u8>,
    },

    /// Encode a sound command
    Sound {
        sound: u8,

        #[command(flatten)]
        drums: DrumArgs,
    },

    /// Encode a light sequence override
    Override {
        sequence: u8,

        #[arg(short, long)]
        sound: Option<u8>,

        #[command(flatten)]
        drums: DrumArgs,
    },

    /// Classify an inbound packet
    Classify {
        /// Hex bytes, separators allowed
        hex: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,darktower=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Errors surfaced by the packet tool
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Tower(#[from] TowerError),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::DecodeState { hex, json } => {
            let bytes = parse_hex(&hex)?;
            let image = match bytes.len() {
                COMMAND_PACKET_SIZE => &bytes[1..],
                _ => &bytes[..],
            };
            let state = unpack_state(image)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{:#?}", state);
                println!("calibrated: {}", state.is_calibrated());
            }
        }
        Commands::Rotate {
            top,
            middle,
            bottom,
            sound,
        } => {
            print_packet(&encode_rotate(&RotateTargets::new(top, middle, bottom), sound));
        }
        Commands::Sound { sound, drums } => {
            print_packet(&encode_sound(sound, drums.bytes()));
        }
        Commands::Override {
            sequence,
            sound,
            drums,
        } => {
            print_packet(&encode_light_override(sequence, sound, drums.bytes()));
        }
        Commands::Classify { hex } => {
            let bytes = parse_hex(&hex)?;
            let mut classifier =
                ResponseClassifier::new(&TowerConfig::default(), tracing::info_span!("classify"));
            let out = classifier.handle(&bytes);

            match out.kind {
                Some(kind) => println!("kind: {} (0x{:02x})", kind.name(), kind.code()),
                None => println!("kind: unmapped"),
            }
            println!("acknowledges: {}", out.acknowledges);
            for event in &out.events {
                println!("event: {:?}", event);
            }
            if let Some(state) = out.state {
                println!("{:#?}", state);
            }
            if let Some(mv) = classifier.last_battery_millivolts() {
                println!(
                    "battery: {} mV ({}%)",
                    mv,
                    classifier.last_battery_percentage().unwrap_or(0)
                );
            }
        }
    }
    Ok(())
}

fn print_packet(packet: &Packet) {
    println!("{}", hex::encode(packet));
}

/// Parse hex digits, ignoring whitespace, `:` and `-`
fn parse_hex(input: &str) -> Result<Vec<u8>, TowerError> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    hex::decode(&digits).map_err(|e| TowerError::InvalidArgument(format!("invalid hex: {}", e)))
}
