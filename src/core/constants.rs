//! Fixed thresholds, link parameters and landmark indexing

/// Neck angle below which the head is considered pushed forward (degrees)
pub const NECK_THRESHOLD_DEG: f64 = 53.0;

/// Shoulder tilt above which the shoulders are considered imbalanced (degrees)
pub const SHOULDER_TILT_THRESHOLD_DEG: f64 = 8.0;

/// Substitute for a zero horizontal shoulder distance
pub const TILT_EPSILON: f64 = 1e-6;

/// Vertical shoulder offset (pixels) before a higher side is reported
pub const SHOULDER_LEVEL_TOLERANCE_PX: f64 = 20.0;

/// Address of the weight sensor peripheral
pub const TARGET_DEVICE_ADDRESS: &str = "40:4C:CA:41:4E:0E";

/// Characteristic carrying balance notifications
pub const NOTIFICATION_CHANNEL: &str = "abcd1234-1234-1234-1234-abcdef123456";

pub const DISCOVERY_TIMEOUT_MS: u64 = 10_000;
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const BACKOFF_INTERVAL_MS: u64 = 3_000;
pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Number of points produced by the pose model per frame
pub const LANDMARK_COUNT: usize = 33;

// BlazePose landmark indices
pub const NOSE_INDEX: usize = 0;
pub const LEFT_EAR_INDEX: usize = 7;
pub const RIGHT_EAR_INDEX: usize = 8;
pub const LEFT_SHOULDER_INDEX: usize = 11;
pub const RIGHT_SHOULDER_INDEX: usize = 12;
