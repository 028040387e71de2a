//! Core data types shared by the sensing and link layers

use crate::core::constants::*;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Landmark coordinate in normalized image space
pub type LandmarkPoint = Point3<f64>;

/// Body landmarks the posture evaluation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkRole {
    Nose,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
}

impl LandmarkRole {
    /// Position of this landmark in the pose model's output
    pub fn index(self) -> usize {
        match self {
            LandmarkRole::Nose => NOSE_INDEX,
            LandmarkRole::LeftEar => LEFT_EAR_INDEX,
            LandmarkRole::RightEar => RIGHT_EAR_INDEX,
            LandmarkRole::LeftShoulder => LEFT_SHOULDER_INDEX,
            LandmarkRole::RightShoulder => RIGHT_SHOULDER_INDEX,
        }
    }
}

/// Read access to landmarks by role, independent of model indexing
pub trait Landmarks {
    fn get(&self, role: LandmarkRole) -> LandmarkPoint;
}

/// All landmarks detected in a single frame
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [LandmarkPoint; LANDMARK_COUNT],
}

impl LandmarkSet {
    /// Build from raw `[x, y, z]` triples in model order.
    /// Returns `None` when fewer than `LANDMARK_COUNT` points are supplied.
    pub fn from_raw(raw: &[[f64; 3]]) -> Option<Self> {
        if raw.len() < LANDMARK_COUNT {
            return None;
        }
        let mut points = [LandmarkPoint::origin(); LANDMARK_COUNT];
        for (slot, p) in points.iter_mut().zip(raw.iter()) {
            *slot = LandmarkPoint::new(p[0], p[1], p[2]);
        }
        Some(Self { points })
    }

    /// Overwrite the point for one role
    pub fn with(mut self, role: LandmarkRole, point: LandmarkPoint) -> Self {
        self.points[role.index()] = point;
        self
    }
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            points: [LandmarkPoint::origin(); LANDMARK_COUNT],
        }
    }
}

impl Landmarks for LandmarkSet {
    fn get(&self, role: LandmarkRole) -> LandmarkPoint {
        self.points[role.index()]
    }
}

/// Angles derived from one landmark set (degrees, non-negative)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureMetrics {
    pub neck_angle_deg: f64,
    pub shoulder_tilt_deg: f64,
}

/// Threshold verdicts for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostureClassification {
    pub forward_head: bool,
    pub shoulder_imbalance: bool,
}

/// Classification limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureThresholds {
    /// Neck angle below this is a forward head (degrees)
    pub neck_angle_deg: f64,
    /// Shoulder tilt above this is an imbalance (degrees)
    pub shoulder_tilt_deg: f64,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            neck_angle_deg: NECK_THRESHOLD_DEG,
            shoulder_tilt_deg: SHOULDER_TILT_THRESHOLD_DEG,
        }
    }
}

/// Which shoulder sits higher in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShoulderSide {
    Left,
    Right,
}

/// Weight distribution reported by the remote sensor
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BalanceState {
    Left = 0,
    Right = 1,
    #[default]
    Balanced = 2,
}

impl BalanceState {
    /// Wire token for this state
    pub fn as_str(self) -> &'static str {
        match self {
            BalanceState::Left => "LEFT",
            BalanceState::Right => "RIGHT",
            BalanceState::Balanced => "BALANCED",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BalanceState::Left,
            1 => BalanceState::Right,
            _ => BalanceState::Balanced,
        }
    }
}

impl fmt::Display for BalanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical indicator outputs, addressed by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorRole {
    Neck,
    Shoulder,
    WeightLeft,
    WeightRight,
}

impl IndicatorRole {
    pub const ALL: [IndicatorRole; 4] = [
        IndicatorRole::Neck,
        IndicatorRole::Shoulder,
        IndicatorRole::WeightLeft,
        IndicatorRole::WeightRight,
    ];
}

/// Desired state of all four indicators for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorVector {
    pub neck: bool,
    pub shoulder: bool,
    pub weight_left: bool,
    pub weight_right: bool,
}

impl IndicatorVector {
    /// Merge a posture verdict with the current balance reading
    pub fn assemble(classification: Option<PostureClassification>, balance: BalanceState) -> Self {
        let posture = classification.unwrap_or_default();
        Self {
            neck: posture.forward_head,
            shoulder: posture.shoulder_imbalance,
            weight_left: balance == BalanceState::Left,
            weight_right: balance == BalanceState::Right,
        }
    }

    pub fn get(&self, role: IndicatorRole) -> bool {
        match role {
            IndicatorRole::Neck => self.neck,
            IndicatorRole::Shoulder => self.shoulder,
            IndicatorRole::WeightLeft => self.weight_left,
            IndicatorRole::WeightRight => self.weight_right,
        }
    }

    pub fn is_all_off(&self) -> bool {
        IndicatorRole::ALL.iter().all(|role| !self.get(*role))
    }
}
