//! Configuration for DarkTower
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, TowerError};

/// Main configuration for a tower session
#[derive(Debug, Clone)]
pub struct TowerConfig {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Advertised device name passed to the transport as a discovery filter
    pub device_name: String,

    /// GATT service passed to the transport as a discovery filter
    pub service_uuid: String,

    // -------------------------------------------------------------------------
    // Command Queue Configuration
    // -------------------------------------------------------------------------
    /// How long an in-flight command waits for a response before the queue
    /// moves on
    pub command_timeout: Duration,

    /// Resend behavior for failed transport writes
    pub retry: RetryConfig,

    // -------------------------------------------------------------------------
    // Battery Configuration
    // -------------------------------------------------------------------------
    /// Minimum interval between battery notifications
    pub battery_notify_frequency: Duration,

    /// Notify only when the battery percentage changes
    pub battery_notify_on_value_change_only: bool,

    /// A connected tower that has not reported its battery within this
    /// window is considered unhealthy
    pub battery_heartbeat_timeout: Duration,

    // -------------------------------------------------------------------------
    // Logging Configuration
    // -------------------------------------------------------------------------
    pub response_logging: ResponseLogging,
}

/// Resend configuration for transport write failures
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Number of resends allowed after the initial write
    pub max_retries: u32,

    /// Backoff unit; resend `n` waits `n * backoff_step`
    pub backoff_step: Duration,
}

/// Which inbound responses get logged
///
/// Unmapped message kinds are always logged regardless of these switches.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLogging {
    /// Master switch
    pub enabled: bool,
    pub tower_state: bool,
    pub battery: bool,
    /// Invalid state, hardware failure and other critical kinds
    pub critical: bool,
    /// Jiggle, duration, unexpected trigger, differential readings,
    /// calibration finished
    pub mechanism: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_step: Duration::from_millis(250),
        }
    }
}

impl Default for ResponseLogging {
    fn default() -> Self {
        Self {
            enabled: true,
            tower_state: true,
            battery: false,
            critical: true,
            mechanism: true,
        }
    }
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            device_name: "ReturnToDarkTower".to_string(),
            service_uuid: "6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
            command_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            battery_notify_frequency: Duration::from_secs(15),
            battery_notify_on_value_change_only: false,
            battery_heartbeat_timeout: Duration::from_secs(30),
            response_logging: ResponseLogging::default(),
        }
    }
}

impl TowerConfig {
    /// Create a new config builder
    pub fn builder() -> TowerConfigBuilder {
        TowerConfigBuilder::default()
    }

    /// Reject settings the queue and retry policy cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout.is_zero() {
            return Err(TowerError::Config(
                "command_timeout must be greater than zero".to_string(),
            ));
        }
        if self.retry.backoff_step.is_zero() {
            return Err(TowerError::Config(
                "retry backoff_step must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for TowerConfig
#[derive(Default)]
pub struct TowerConfigBuilder {
    config: TowerConfig,
}

impl TowerConfigBuilder {
    /// Set the device name filter
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    /// Set the service filter
    pub fn service_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.config.service_uuid = uuid.into();
        self
    }

    /// Set the per-command response timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the maximum number of resends for a failed write
    pub fn max_retries(mut self, count: u32) -> Self {
        self.config.retry.max_retries = count;
        self
    }

    /// Set the resend backoff unit
    pub fn retry_backoff_step(mut self, step: Duration) -> Self {
        self.config.retry.backoff_step = step;
        self
    }

    /// Set the minimum battery notification interval
    pub fn battery_notify_frequency(mut self, frequency: Duration) -> Self {
        self.config.battery_notify_frequency = frequency;
        self
    }

    /// Notify on battery percentage change only
    pub fn battery_notify_on_value_change_only(mut self, enabled: bool) -> Self {
        self.config.battery_notify_on_value_change_only = enabled;
        self
    }

    /// Set the battery heartbeat window
    pub fn battery_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config.battery_heartbeat_timeout = timeout;
        self
    }

    /// Set which responses get logged
    pub fn response_logging(mut self, logging: ResponseLogging) -> Self {
        self.config.response_logging = logging;
        self
    }

    pub fn build(self) -> TowerConfig {
        self.config
    }
}
