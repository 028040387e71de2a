//! Posture geometry algorithms

pub mod geometry;

pub use geometry::{
    classify, compute_neck_angle, compute_shoulder_tilt, evaluate, higher_shoulder,
};
