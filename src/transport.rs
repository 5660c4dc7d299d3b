//! Transport adapter contract
//!
//! The radio link is provided by the embedding application. The engine only
//! talks to it through [`TowerTransport`].

use bytes::Bytes;

use crate::error::TransportError;

/// Called with every characteristic notification from the tower
pub type NotificationCallback = Box<dyn Fn(Bytes) + Send + Sync>;

/// Called when the link drops
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

/// Called when the radio becomes available or unavailable
pub type AvailabilityCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Characteristic-level access to one tower
pub trait TowerTransport: Send + Sync {
    /// Find and connect to a device matching the filters
    fn connect(&self, device_name: &str, service_uuid: &str) -> Result<(), TransportError>;

    fn disconnect(&self) -> Result<(), TransportError>;

    /// Write one packet to the tower's receive characteristic
    fn write_characteristic(&self, data: &[u8]) -> Result<(), TransportError>;

    fn on_characteristic_value_changed(&self, callback: NotificationCallback);

    fn on_disconnect(&self, callback: DisconnectCallback);

    fn on_availability_changed(&self, callback: AvailabilityCallback);

    fn is_connected(&self) -> bool;
}
