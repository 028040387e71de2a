//! Wireless transport interface

use crate::hardware::LinkResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked by the transport for every notification payload
pub type NotificationCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Peripheral seen during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl DeviceHandle {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Addresses compare case-insensitively
    pub fn matches(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

/// Discovery, connection and notification primitives of a wireless stack.
///
/// Implementations own pairing and attribute mechanics. Every method may be
/// cancelled at an await point, and callers additionally bound `discover`
/// and `connect` with their own timeouts.
pub trait WirelessTransport: Send + 'static {
    /// Live connection to one peripheral
    type Connection: Send + Sync + 'static;

    /// Scan for nearby peripherals for at most `timeout`
    fn discover(&mut self, timeout: Duration) -> impl Future<Output = LinkResult<Vec<DeviceHandle>>> + Send;

    /// Open a connection to a discovered peripheral
    fn connect(
        &mut self,
        device: &DeviceHandle,
        timeout: Duration,
    ) -> impl Future<Output = LinkResult<Self::Connection>> + Send;

    /// Deliver notifications from `channel` to `on_message` until disconnect
    fn subscribe(
        &mut self,
        connection: &Self::Connection,
        channel: &str,
        on_message: NotificationCallback,
    ) -> impl Future<Output = LinkResult<()>> + Send;

    /// Check whether the peer is still reachable
    fn is_connected(&mut self, connection: &Self::Connection) -> impl Future<Output = bool> + Send;

    /// Best-effort teardown; failures are swallowed. The caller drops the
    /// handle only once this completes.
    fn disconnect(&mut self, connection: &Self::Connection) -> impl Future<Output = ()> + Send;
}
