//! Posture Monitor
//!
//! Watches a person's posture through a camera while listening to a wireless
//! weight sensor, and drives four indicator outputs: forward head, shoulder
//! imbalance, and weight shifted left or right.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use crate::core::{
    BalanceState, IndicatorRole, IndicatorVector, LandmarkRole, LandmarkSet, Landmarks, PostureClassification,
    PostureMetrics, PostureThresholds, ShoulderSide,
};
pub use crate::algorithms::{classify, compute_neck_angle, compute_shoulder_tilt, evaluate, higher_shoulder};
pub use crate::processing::{parse_balance, ParseError, SharedBalance};
pub use crate::hardware::{
    Capture, Frame, FrameError, FrameSource, IndicatorOutputs, LandmarkExtractor, LinkError, WirelessTransport,
};
pub use crate::api::{
    shutdown_channel, LinkState, LinkStateMachine, Orchestrator, PostureSensingLoop, RunReport, ShutdownSignal,
    ShutdownTrigger,
};
pub use crate::utils::{ConfigError, LinkConfig, MonitorConfig};
