//! Mock collaborators for testing and development
//!
//! A scripted wireless peripheral, a scripted camera, a scripted pose model,
//! a synthetic pose model for demos, and an indicator bank that records what
//! it was told to show.

use crate::core::{IndicatorRole, IndicatorVector, LandmarkPoint, LandmarkRole, LandmarkSet};
use crate::hardware::{
    Capture, DeviceHandle, Frame, FrameError, FrameResult, FrameSource, IndicatorOutputs,
    LandmarkExtractor, LinkError, LinkResult, NotificationCallback, WirelessTransport,
};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct PeripheralState {
    address: String,
    channel: String,
    advertising: bool,
    connected: bool,
    session: u64,
    hang_discovery: bool,
    failed_discovers: u32,
    hang_connects: bool,
    disconnect_delay: Duration,
    rejected_connects: u32,
    simulate_errors: bool,
    error_probability: f32,
    subscribers: Vec<NotificationCallback>,
    discover_calls: u32,
    connect_calls: u32,
    disconnect_calls: u32,
}

/// Simulated weight sensor shared between a `MockTransport` and test code
#[derive(Clone)]
pub struct MockPeripheral {
    state: Arc<Mutex<PeripheralState>>,
}

impl MockPeripheral {
    /// Create an advertising peripheral exposing one notification channel
    pub fn new(address: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PeripheralState {
                address: address.into(),
                channel: channel.into(),
                advertising: true,
                connected: false,
                session: 0,
                hang_discovery: false,
                failed_discovers: 0,
                hang_connects: false,
                disconnect_delay: Duration::ZERO,
                rejected_connects: 0,
                simulate_errors: false,
                error_probability: 0.0,
                subscribers: Vec::new(),
                discover_calls: 0,
                connect_calls: 0,
                disconnect_calls: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PeripheralState> {
        // A panicking test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Toggle whether discovery reports this peripheral
    pub fn set_advertising(&self, advertising: bool) {
        self.lock().advertising = advertising;
    }

    /// Make discovery scans never complete
    pub fn hang_discovery(&self, hang: bool) {
        self.lock().hang_discovery = hang;
    }

    /// Fail the next `count` discovery scans with a radio error
    pub fn fail_next_discovers(&self, count: u32) {
        self.lock().failed_discovers = count;
    }

    /// Reject the next `count` connection attempts
    pub fn reject_next_connects(&self, count: u32) {
        self.lock().rejected_connects = count;
    }

    /// Make connection attempts never complete
    pub fn hang_connects(&self, hang: bool) {
        self.lock().hang_connects = hang;
    }

    /// Let every disconnect take `delay` before it reaches the peripheral
    pub fn slow_disconnects(&self, delay: Duration) {
        self.lock().disconnect_delay = delay;
    }

    /// Fail connection attempts at random with given probability (0.0 to 1.0)
    pub fn simulate_errors(&self, enable: bool, probability: f32) {
        let mut state = self.lock();
        state.simulate_errors = enable;
        state.error_probability = probability.clamp(0.0, 1.0);
    }

    /// Deliver a payload to every subscriber. Returns whether anyone got it.
    pub fn notify(&self, payload: &[u8]) -> bool {
        let subscribers = {
            let state = self.lock();
            if !state.connected {
                return false;
            }
            state.subscribers.clone()
        };
        for callback in &subscribers {
            callback(payload);
        }
        !subscribers.is_empty()
    }

    /// Simulate the peer going out of range
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.subscribers.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn discover_calls(&self) -> u32 {
        self.lock().discover_calls
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.lock().disconnect_calls
    }

    /// Cycle through `payloads`, one every `interval`, until the task is dropped
    pub async fn run_feed(self, payloads: Vec<Vec<u8>>, interval: Duration) {
        if payloads.is_empty() {
            return;
        }
        for payload in payloads.iter().cycle() {
            tokio::time::sleep(interval).await;
            self.notify(payload);
        }
    }
}

/// Connection handed out by `MockTransport`
#[derive(Debug)]
pub struct MockConnection {
    address: String,
    session: u64,
}

/// Wireless transport backed by one `MockPeripheral`
pub struct MockTransport {
    peripheral: MockPeripheral,
    bystanders: Vec<DeviceHandle>,
}

impl MockTransport {
    pub fn new(peripheral: MockPeripheral) -> Self {
        Self {
            peripheral,
            bystanders: Vec::new(),
        }
    }

    /// Add an unrelated device that discovery also reports
    pub fn with_bystander(mut self, device: DeviceHandle) -> Self {
        self.bystanders.push(device);
        self
    }
}

impl WirelessTransport for MockTransport {
    type Connection = MockConnection;

    async fn discover(&mut self, _timeout: Duration) -> LinkResult<Vec<DeviceHandle>> {
        let hang = {
            let mut state = self.peripheral.lock();
            state.discover_calls += 1;
            state.hang_discovery
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let mut devices = self.bystanders.clone();
        let mut state = self.peripheral.lock();
        if state.failed_discovers > 0 {
            state.failed_discovers -= 1;
            return Err(LinkError::DiscoveryFailed {
                details: "adapter busy".to_string(),
            });
        }
        if state.advertising {
            devices.push(
                DeviceHandle::new(state.address.to_lowercase())
                    .with_name("weight-sensor")
                    .with_rssi(-60),
            );
        }
        Ok(devices)
    }

    async fn connect(&mut self, device: &DeviceHandle, _timeout: Duration) -> LinkResult<MockConnection> {
        let hang = {
            let mut state = self.peripheral.lock();
            state.connect_calls += 1;
            state.hang_connects
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let roll: f32 = rand::thread_rng().gen();
        let mut state = self.peripheral.lock();
        let refuse = |details: &str| LinkError::ConnectFailed {
            address: device.address.clone(),
            details: details.to_string(),
        };

        if !device.matches(&state.address) || !state.advertising {
            return Err(refuse("peripheral not reachable"));
        }
        if state.rejected_connects > 0 {
            state.rejected_connects -= 1;
            return Err(refuse("connection rejected"));
        }
        if state.simulate_errors && roll < state.error_probability {
            return Err(refuse("simulated radio failure"));
        }

        state.connected = true;
        state.session += 1;
        Ok(MockConnection {
            address: state.address.clone(),
            session: state.session,
        })
    }

    async fn subscribe(
        &mut self,
        connection: &MockConnection,
        channel: &str,
        on_message: NotificationCallback,
    ) -> LinkResult<()> {
        let mut state = self.peripheral.lock();
        if !state.connected || state.session != connection.session {
            return Err(LinkError::ConnectionLost {
                address: connection.address.clone(),
            });
        }
        if !state.channel.eq_ignore_ascii_case(channel) {
            return Err(LinkError::SubscribeFailed {
                channel: channel.to_string(),
                details: "unknown characteristic".to_string(),
            });
        }
        state.subscribers.push(on_message);
        Ok(())
    }

    async fn is_connected(&mut self, connection: &MockConnection) -> bool {
        let state = self.peripheral.lock();
        state.connected && state.session == connection.session
    }

    async fn disconnect(&mut self, connection: &MockConnection) {
        let delay = self.peripheral.lock().disconnect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.peripheral.lock();
        state.disconnect_calls += 1;
        if state.session == connection.session {
            state.connected = false;
            state.subscribers.clear();
        }
    }
}

/// What a `ScriptedFrameSource` does once its script runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEnd {
    Exhausted,
    Quit,
    /// Keep producing blank frames
    Repeat,
}

/// Camera that replays a fixed sequence of acquisition results
pub struct ScriptedFrameSource {
    script: VecDeque<FrameResult<Capture>>,
    when_empty: ScriptEnd,
    interval: Duration,
    limit: Option<u64>,
    width: u32,
    height: u32,
    produced: u64,
}

impl ScriptedFrameSource {
    pub fn new(script: Vec<FrameResult<Capture>>, when_empty: ScriptEnd) -> Self {
        Self {
            script: script.into(),
            when_empty,
            interval: Duration::ZERO,
            limit: None,
            width: 640,
            height: 480,
            produced: 0,
        }
    }

    /// Endless blank frames, one per `interval`
    pub fn repeating(interval: Duration) -> Self {
        Self::new(Vec::new(), ScriptEnd::Repeat).with_interval(interval)
    }

    /// Pace acquisitions like a real camera
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Request quit after `frames` acquisitions
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl FrameSource for ScriptedFrameSource {
    async fn acquire(&mut self) -> FrameResult<Capture> {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(Capture::Quit);
        }
        self.produced += 1;

        if let Some(next) = self.script.pop_front() {
            return next;
        }
        match self.when_empty {
            ScriptEnd::Exhausted => Err(FrameError::Exhausted),
            ScriptEnd::Quit => Ok(Capture::Quit),
            ScriptEnd::Repeat => Ok(Capture::Frame(
                Frame::new(self.width, self.height).with_sequence(self.produced),
            )),
        }
    }
}

/// Pose model that replays fixed results, then repeats a fallback
pub struct ScriptedExtractor {
    script: VecDeque<Option<LandmarkSet>>,
    fallback: Option<LandmarkSet>,
    calls: Arc<Mutex<u64>>,
}

impl ScriptedExtractor {
    pub fn new(script: Vec<Option<LandmarkSet>>, fallback: Option<LandmarkSet>) -> Self {
        Self {
            script: script.into(),
            fallback,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Always return the same landmarks
    pub fn constant(landmarks: Option<LandmarkSet>) -> Self {
        Self::new(Vec::new(), landmarks)
    }

    /// Shared counter of `extract` calls
    pub fn call_counter(&self) -> Arc<Mutex<u64>> {
        Arc::clone(&self.calls)
    }
}

impl LandmarkExtractor for ScriptedExtractor {
    fn extract(&mut self, _frame: &Frame) -> Option<LandmarkSet> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        match self.script.pop_front() {
            Some(next) => next,
            None => self.fallback.clone(),
        }
    }
}

/// Pose model producing a person who slowly slouches and straightens.
///
/// The neck angle sweeps roughly 35..75 degrees and the shoulder tilt
/// roughly 0..12 degrees over `period` frames, with a little noise.
/// Every `gap_every`-th frame nobody is detected.
pub struct SyntheticPoseModel {
    period: u64,
    gap_every: u64,
    noise_deg: f64,
}

impl SyntheticPoseModel {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(2),
            gap_every: 0,
            noise_deg: 0.5,
        }
    }

    pub fn with_gaps(mut self, every: u64) -> Self {
        self.gap_every = every;
        self
    }

    pub fn with_noise(mut self, noise_deg: f64) -> Self {
        self.noise_deg = noise_deg.abs();
        self
    }

    /// Landmarks for a person with the given neck angle and shoulder tilt
    pub fn pose(neck_angle_deg: f64, shoulder_tilt_deg: f64) -> LandmarkSet {
        let shoulder = LandmarkPoint::new(0.40, 0.60, 0.0);
        let reach = 0.12;
        let neck = neck_angle_deg.to_radians();
        let ear = LandmarkPoint::new(
            shoulder.x + reach * neck.cos(),
            shoulder.y - reach * neck.sin(),
            0.0,
        );

        let span = 0.20;
        let tilt = shoulder_tilt_deg.to_radians();
        let left_shoulder = LandmarkPoint::new(shoulder.x + span, shoulder.y + span * tilt.tan(), 0.0);

        LandmarkSet::default()
            .with(LandmarkRole::RightShoulder, shoulder)
            .with(LandmarkRole::LeftShoulder, left_shoulder)
            .with(LandmarkRole::RightEar, ear)
            .with(LandmarkRole::LeftEar, LandmarkPoint::new(ear.x + 0.08, ear.y, 0.0))
            .with(LandmarkRole::Nose, LandmarkPoint::new(ear.x + 0.04, ear.y + 0.02, 0.0))
    }
}

impl LandmarkExtractor for SyntheticPoseModel {
    fn extract(&mut self, frame: &Frame) -> Option<LandmarkSet> {
        if self.gap_every > 0 && frame.sequence % self.gap_every == 0 {
            return None;
        }
        let phase = (frame.sequence % self.period) as f64 / self.period as f64;
        let wave = (phase * std::f64::consts::TAU).sin();

        let mut rng = rand::thread_rng();
        let jitter = if self.noise_deg > 0.0 {
            rng.gen_range(-self.noise_deg..=self.noise_deg)
        } else {
            0.0
        };

        let neck = 55.0 + 20.0 * wave + jitter;
        let tilt = 6.0 + 6.0 * wave + jitter;
        Some(Self::pose(neck, tilt))
    }
}

#[derive(Debug, Default)]
struct Recording {
    current: IndicatorVector,
    applied: Vec<IndicatorVector>,
    changes: u64,
}

/// Indicator bank that remembers every state it was driven to
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicators {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Present output levels
    pub fn current(&self) -> IndicatorVector {
        self.lock().current
    }

    /// Every vector applied, in order
    pub fn applied(&self) -> Vec<IndicatorVector> {
        self.lock().applied.clone()
    }

    /// Number of `set` calls that actually changed an output
    pub fn changes(&self) -> u64 {
        self.lock().changes
    }
}

impl IndicatorOutputs for RecordingIndicators {
    fn set(&mut self, role: IndicatorRole, on: bool) {
        let mut recording = self.lock();
        let slot = match role {
            IndicatorRole::Neck => &mut recording.current.neck,
            IndicatorRole::Shoulder => &mut recording.current.shoulder,
            IndicatorRole::WeightLeft => &mut recording.current.weight_left,
            IndicatorRole::WeightRight => &mut recording.current.weight_right,
        };
        if *slot != on {
            *slot = on;
            recording.changes += 1;
        }
    }

    fn apply(&mut self, vector: &IndicatorVector) {
        for role in IndicatorRole::ALL {
            self.set(role, vector.get(role));
        }
        self.lock().applied.push(*vector);
    }
}
