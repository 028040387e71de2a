//! Wireless link state machine
//!
//! Keeps one weight sensor connected for as long as the process runs:
//!
//! ```text
//! Scanning -> Connecting -> Connected -> Disconnected -> Scanning
//!     ^  |                                    ^
//!     +--+ device not found (backoff)         | any other failure
//! ```
//!
//! Every failure is a `LinkError` whose recovery strategy picks the edge to
//! follow. Nothing here gives up; only the shutdown signal ends the task.
//! The machine is the only writer of the shared balance slot.

use crate::api::types::{LinkStats, NotificationCounters, ShutdownSignal};
use crate::hardware::{
    DeviceHandle, LinkError, LinkResult, NotificationCallback, RecoveryStrategy, WirelessTransport,
};
use crate::processing::{parse_balance, SharedBalance};
use crate::utils::LinkConfig;
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Phase of the link to the weight sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Scanning,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Scanning => "scanning",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Discovers, connects to and supervises the weight sensor
pub struct LinkStateMachine<T: WirelessTransport> {
    transport: T,
    config: LinkConfig,
    balance: SharedBalance,
    state: LinkState,
    target: Option<DeviceHandle>,
    connection: Option<T::Connection>,
    stats: LinkStats,
    counters: Arc<NotificationCounters>,
}

impl<T: WirelessTransport> LinkStateMachine<T> {
    pub fn new(transport: T, config: LinkConfig, balance: SharedBalance) -> Self {
        Self {
            transport,
            config,
            balance,
            state: LinkState::Scanning,
            target: None,
            connection: None,
            stats: LinkStats::default(),
            counters: NotificationCounters::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            notifications_applied: self.counters.applied(),
            notifications_ignored: self.counters.ignored(),
            ..self.stats
        }
    }

    /// Drive the machine until `shutdown` fires, then tear the link down.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> LinkStats {
        info!(address = %self.config.target_address, "link task started");

        while !shutdown.is_triggered() {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = self.advance() => {}
            }
        }

        self.teardown().await;
        let stats = self.stats();
        info!(connections = stats.connections, "link task stopped");
        stats
    }

    /// Execute the current state once and move to the next one
    pub async fn advance(&mut self) -> LinkState {
        let outcome = match self.state {
            LinkState::Scanning => self.scan().await,
            LinkState::Connecting => self.connect().await,
            LinkState::Connected => self.supervise().await,
            LinkState::Disconnected => self.recover().await,
        };
        let next = match outcome {
            Ok(next) => next,
            Err(error) => self.handle_failure(error).await,
        };
        self.transition(next);
        next
    }

    async fn scan(&mut self) -> LinkResult<LinkState> {
        self.stats.scans += 1;
        let scan_timeout = self.config.discovery_timeout();
        info!(address = %self.config.target_address, "scanning for weight sensor");

        let devices = match timeout(scan_timeout, self.transport.discover(scan_timeout)).await {
            Ok(result) => result?,
            Err(_) => return Err(LinkError::DiscoveryTimeout { timeout: scan_timeout }),
        };

        let address = &self.config.target_address;
        match devices.into_iter().find(|device| device.matches(address)) {
            Some(device) => {
                info!(address = %device.address, rssi = ?device.rssi, "weight sensor found");
                self.target = Some(device);
                Ok(LinkState::Connecting)
            }
            None => Err(LinkError::DeviceNotFound {
                address: address.clone(),
            }),
        }
    }

    async fn connect(&mut self) -> LinkResult<LinkState> {
        let Some(device) = self.target.clone() else {
            return Ok(LinkState::Scanning);
        };
        self.stats.connect_attempts += 1;
        let connect_timeout = self.config.connect_timeout();

        let connection = match timeout(connect_timeout, self.transport.connect(&device, connect_timeout)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LinkError::ConnectTimeout {
                    address: device.address,
                    timeout: connect_timeout,
                })
            }
        };

        self.connection = Some(connection);
        self.stats.connections += 1;
        info!(address = %device.address, "connected to weight sensor");
        Ok(LinkState::Connected)
    }

    /// Subscribe, then poll connectivity until the peer goes away
    async fn supervise(&mut self) -> LinkResult<LinkState> {
        let address = self.config.target_address.clone();
        let on_message = self.notification_handler();
        let Some(connection) = self.connection.as_ref() else {
            return Err(LinkError::ConnectionLost { address });
        };

        let channel = self.config.notification_channel.as_str();
        match timeout(
            self.config.connect_timeout(),
            self.transport.subscribe(connection, channel, on_message),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(LinkError::SubscribeFailed {
                    channel: channel.to_string(),
                    details: "timed out".to_string(),
                })
            }
        }
        debug!(channel, "subscribed to balance notifications");

        let poll = self.config.poll_interval();
        loop {
            sleep(poll).await;
            if !self.transport.is_connected(connection).await {
                return Err(LinkError::ConnectionLost { address });
            }
        }
    }

    /// Tear down what is left of the connection, then back off.
    /// The handle stays in place until the disconnect completes, so a stop
    /// arriving mid-disconnect leaves it to `teardown`.
    async fn recover(&mut self) -> LinkResult<LinkState> {
        if let Some(connection) = self.connection.as_ref() {
            self.transport.disconnect(connection).await;
            self.connection = None;
            self.stats.disconnections += 1;
        }
        // A notification may have landed between the failure and teardown
        self.balance.reset();
        sleep(self.config.backoff()).await;
        Ok(LinkState::Scanning)
    }

    async fn handle_failure(&mut self, error: LinkError) -> LinkState {
        match error.recovery_strategy() {
            RecoveryStrategy::Rescan => {
                info!(%error, backoff_ms = self.config.backoff_ms, "weight sensor not found, retrying");
                sleep(self.config.backoff()).await;
                LinkState::Scanning
            }
            RecoveryStrategy::ResetAndRetry => {
                warn!(%error, state = %self.state, "link failure");
                LinkState::Disconnected
            }
        }
    }

    fn transition(&mut self, next: LinkState) {
        if next != self.state {
            debug!(from = %self.state, to = %next, "link state changed");
        }
        if next == LinkState::Disconnected {
            self.balance.reset();
        }
        self.state = next;
    }

    async fn teardown(&mut self) {
        if let Some(connection) = self.connection.as_ref() {
            let bound = self.config.connect_timeout();
            if timeout(bound, self.transport.disconnect(connection)).await.is_err() {
                warn!("disconnect did not complete during shutdown");
            }
            self.connection = None;
            self.stats.disconnections += 1;
        }
        self.transition(LinkState::Disconnected);
    }

    fn notification_handler(&self) -> NotificationCallback {
        let balance = self.balance.clone();
        let counters = Arc::clone(&self.counters);
        Arc::new(move |payload: &[u8]| match parse_balance(payload) {
            Ok(state) => {
                counters.record_applied();
                let previous = balance.swap(state);
                if previous != state {
                    info!(%state, "balance changed");
                } else {
                    debug!(%state, "balance notification");
                }
            }
            Err(error) => {
                counters.record_ignored();
                debug!(%error, "ignoring notification");
            }
        })
    }
}
