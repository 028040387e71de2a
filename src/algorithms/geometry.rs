//! Posture geometry evaluation
//!
//! Pure functions turning pose landmarks into the neck-forward angle and the
//! shoulder-tilt angle, and classifying both against fixed thresholds. Every
//! evaluation is stateless: there is no smoothing or hysteresis, so a value
//! sitting on a threshold may flicker between frames.

use crate::core::{
    LandmarkRole, Landmarks, PostureClassification, PostureMetrics, PostureThresholds,
    ShoulderSide, SHOULDER_LEVEL_TOLERANCE_PX, TILT_EPSILON,
};

/// Angle of the ear above the shoulder, measured from the horizontal plane.
///
/// Uses the right ear and right shoulder. The horizontal component combines
/// image x and depth z, so leaning toward the camera lowers the angle.
/// Returns 90 degrees when the ear is straight above (or on) the shoulder.
pub fn compute_neck_angle(landmarks: &impl Landmarks) -> f64 {
    let ear = landmarks.get(LandmarkRole::RightEar);
    let shoulder = landmarks.get(LandmarkRole::RightShoulder);
    let d = ear - shoulder;

    let horizontal = d.x.hypot(d.z);
    if horizontal == 0.0 {
        return 90.0;
    }
    d.y.atan2(horizontal).to_degrees().abs()
}

/// Angle of the line between both shoulders against the image x axis
pub fn compute_shoulder_tilt(landmarks: &impl Landmarks) -> f64 {
    let left = landmarks.get(LandmarkRole::LeftShoulder);
    let right = landmarks.get(LandmarkRole::RightShoulder);

    let dy = left.y - right.y;
    let mut dx = left.x - right.x;
    if dx == 0.0 {
        dx = TILT_EPSILON;
    }
    dy.atan2(dx).to_degrees().abs()
}

/// Compare metrics against thresholds. Both comparisons are strict.
pub fn classify(metrics: &PostureMetrics, thresholds: &PostureThresholds) -> PostureClassification {
    PostureClassification {
        forward_head: metrics.neck_angle_deg < thresholds.neck_angle_deg,
        shoulder_imbalance: metrics.shoulder_tilt_deg > thresholds.shoulder_tilt_deg,
    }
}

/// Compute metrics and classify them in one pass
pub fn evaluate(
    landmarks: &impl Landmarks,
    thresholds: &PostureThresholds,
) -> (PostureMetrics, PostureClassification) {
    let metrics = PostureMetrics {
        neck_angle_deg: compute_neck_angle(landmarks),
        shoulder_tilt_deg: compute_shoulder_tilt(landmarks),
    };
    let classification = classify(&metrics, thresholds);
    (metrics, classification)
}

/// Report the visibly higher shoulder, if the vertical offset in pixels
/// exceeds the tolerance. Image y grows downward, so a positive
/// `left.y - right.y` means the right shoulder is higher.
pub fn higher_shoulder(landmarks: &impl Landmarks, frame_height_px: u32) -> Option<ShoulderSide> {
    let left = landmarks.get(LandmarkRole::LeftShoulder);
    let right = landmarks.get(LandmarkRole::RightShoulder);
    let offset_px = (left.y - right.y) * f64::from(frame_height_px);

    if offset_px.abs() <= SHOULDER_LEVEL_TOLERANCE_PX {
        None
    } else if offset_px > 0.0 {
        Some(ShoulderSide::Right)
    } else {
        Some(ShoulderSide::Left)
    }
}
