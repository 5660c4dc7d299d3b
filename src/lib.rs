//! # DarkTower
//!
//! Protocol engine for the Return to Dark Tower device:
//! - Fixed 20-byte command packets and a 19-byte state image codec
//! - FIFO command queue with a single in-flight slot and timeouts
//! - Write retries with linear backoff
//! - Classification of inbound replies into typed events
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Tower                               │
//! │                 (caller intents, events)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │ PacketCodec │◄─────────│  StateStore  │
//!   │ StateCodec  │          │   (Mutex)    │
//!   └──────┬──────┘          └──────▲───────┘
//!          │                        │
//!          ▼                        │
//!   ┌─────────────┐          ┌──────┴───────┐
//!   │CommandQueue │◄─────────│  Classifier  │
//!   │ + Retry     │   ack    │              │
//!   └──────┬──────┘          └──────▲───────┘
//!          │                        │
//!          ▼                        │
//!   ┌─────────────────────────────────────┐
//!   │        TowerTransport (external)    │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod event;

pub mod protocol;
pub mod store;
pub mod queue;
pub mod transport;
pub mod tower;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TowerError, TransportError};
pub use config::TowerConfig;
pub use event::TowerEvent;
pub use tower::Tower;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DarkTower
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
