//! Hardware abstraction layer for the monitor's collaborators
//!
//! This module defines the boundaries to the camera, the pose model, the
//! indicator outputs and the wireless transport to the weight sensor, plus
//! mock implementations of each for testing and development.

pub mod camera;
pub mod error;
pub mod indicators;
pub mod mock;
pub mod transport;

pub use camera::{Capture, Frame, FrameSource, LandmarkExtractor};
pub use error::{FrameError, FrameResult, LinkError, LinkResult, RecoveryStrategy};
pub use indicators::{IndicatorOutputs, LoggingIndicators};
pub use mock::{
    MockConnection, MockPeripheral, MockTransport, RecordingIndicators, ScriptEnd,
    ScriptedExtractor, ScriptedFrameSource, SyntheticPoseModel,
};
pub use transport::{DeviceHandle, NotificationCallback, WirelessTransport};
