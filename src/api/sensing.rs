//! Posture sensing loop
//!
//! One iteration per camera frame: extract landmarks, evaluate posture,
//! merge with the latest balance reading and drive the indicators. The loop
//! never waits on the wireless link; it only reads the shared balance slot.

use crate::algorithms::{evaluate, higher_shoulder};
use crate::api::types::{SensingExit, SensingSummary, ShutdownSignal};
use crate::core::{IndicatorVector, PostureClassification, PostureThresholds};
use crate::hardware::{Capture, Frame, FrameSource, IndicatorOutputs, LandmarkExtractor};
use crate::processing::SharedBalance;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, trace, warn};

/// Switches every indicator off when dropped, including during unwinding
struct OutputsOffGuard<A: IndicatorOutputs> {
    outputs: A,
}

impl<A: IndicatorOutputs> Deref for OutputsOffGuard<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.outputs
    }
}

impl<A: IndicatorOutputs> DerefMut for OutputsOffGuard<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.outputs
    }
}

impl<A: IndicatorOutputs> Drop for OutputsOffGuard<A> {
    fn drop(&mut self) {
        self.outputs.all_off();
    }
}

/// Camera-driven posture evaluation feeding the indicator outputs
pub struct PostureSensingLoop<F, E, A> {
    frames: F,
    extractor: E,
    outputs: A,
    balance: SharedBalance,
    thresholds: PostureThresholds,
}

impl<F, E, A> PostureSensingLoop<F, E, A>
where
    F: FrameSource,
    E: LandmarkExtractor,
    A: IndicatorOutputs,
{
    pub fn new(frames: F, extractor: E, outputs: A, balance: SharedBalance, thresholds: PostureThresholds) -> Self {
        Self {
            frames,
            extractor,
            outputs,
            balance,
            thresholds,
        }
    }

    /// Run until shutdown, a quit request or a terminal frame failure.
    /// All indicators are off when this returns.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> SensingSummary {
        let Self {
            mut frames,
            mut extractor,
            outputs,
            balance,
            thresholds,
        } = self;
        let mut outputs = OutputsOffGuard { outputs };
        let mut summary = SensingSummary::default();
        let mut last = IndicatorVector::default();

        info!(
            neck_threshold = thresholds.neck_angle_deg,
            tilt_threshold = thresholds.shoulder_tilt_deg,
            "sensing loop started"
        );

        let exit = loop {
            if shutdown.is_triggered() {
                break SensingExit::Stopped;
            }
            let acquired = tokio::select! {
                biased;
                _ = shutdown.triggered() => None,
                capture = frames.acquire() => Some(capture),
            };
            let Some(acquired) = acquired else {
                break SensingExit::Stopped;
            };

            match acquired {
                Ok(Capture::Frame(frame)) => {
                    let posture = assess(&mut extractor, &frame, &thresholds, &mut summary);
                    let vector = IndicatorVector::assemble(posture, balance.load());
                    outputs.apply(&vector);
                    if vector != last {
                        debug!(
                            neck = vector.neck,
                            shoulder = vector.shoulder,
                            weight_left = vector.weight_left,
                            weight_right = vector.weight_right,
                            "indicators updated"
                        );
                        last = vector;
                    }
                }
                Ok(Capture::Quit) => {
                    info!("quit requested");
                    break SensingExit::QuitRequested;
                }
                Err(error) if error.is_recoverable() => {
                    summary.frames_skipped += 1;
                    debug!(%error, "skipping frame");
                }
                Err(error) => {
                    warn!(%error, "frame source failed");
                    break SensingExit::SourceFailed(error);
                }
            }

            tokio::task::yield_now().await;
        };

        drop(outputs);
        summary.exit = exit;
        info!(frames = summary.frames_processed, exit = ?summary.exit, "sensing loop stopped");
        summary
    }
}

/// Evaluate one frame. `None` means no person was detected.
fn assess<E: LandmarkExtractor>(
    extractor: &mut E,
    frame: &Frame,
    thresholds: &PostureThresholds,
    summary: &mut SensingSummary,
) -> Option<PostureClassification> {
    summary.frames_processed += 1;

    let Some(landmarks) = extractor.extract(frame) else {
        summary.frames_without_landmarks += 1;
        trace!(sequence = frame.sequence, "no person detected");
        return None;
    };

    let (metrics, classification) = evaluate(&landmarks, thresholds);
    trace!(
        sequence = frame.sequence,
        neck_angle = metrics.neck_angle_deg,
        shoulder_tilt = metrics.shoulder_tilt_deg,
        "posture evaluated"
    );

    if classification.forward_head {
        summary.forward_head_frames += 1;
    }
    if classification.shoulder_imbalance {
        summary.shoulder_imbalance_frames += 1;
        if let Some(side) = higher_shoulder(&landmarks, frame.height) {
            trace!(?side, "higher shoulder");
        }
    }

    Some(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::shutdown_channel;
    use crate::core::BalanceState;
    use crate::hardware::{
        FrameError, FrameResult, RecordingIndicators, ScriptEnd, ScriptedExtractor, ScriptedFrameSource,
        SyntheticPoseModel,
    };
    use std::collections::VecDeque;
    use std::time::Duration;

    fn frames(count: usize) -> Vec<Result<Capture, FrameError>> {
        (0..count)
            .map(|i| Ok(Capture::Frame(Frame::new(640, 480).with_sequence(i as u64))))
            .collect()
    }

    fn sensing(
        source: ScriptedFrameSource,
        extractor: ScriptedExtractor,
        balance: &SharedBalance,
    ) -> (RecordingIndicators, PostureSensingLoop<ScriptedFrameSource, ScriptedExtractor, RecordingIndicators>) {
        let indicators = RecordingIndicators::new();
        let sensing = PostureSensingLoop::new(
            source,
            extractor,
            indicators.clone(),
            balance.clone(),
            PostureThresholds::default(),
        );
        (indicators, sensing)
    }

    #[tokio::test]
    async fn test_forward_head_lights_neck() {
        let balance = SharedBalance::new();
        let source = ScriptedFrameSource::new(frames(1), ScriptEnd::Quit);
        let extractor = ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(40.0, 3.0)));
        let (indicators, sensing) = sensing(source, extractor, &balance);
        let (_trigger, signal) = shutdown_channel();

        let summary = sensing.run(signal).await;

        let applied = indicators.applied();
        assert_eq!(
            applied[0],
            IndicatorVector {
                neck: true,
                shoulder: false,
                weight_left: false,
                weight_right: false,
            }
        );
        assert_eq!(summary.exit, SensingExit::QuitRequested);
        assert_eq!(summary.forward_head_frames, 1);
        assert_eq!(summary.shoulder_imbalance_frames, 0);
        assert!(indicators.current().is_all_off());
    }

    #[tokio::test]
    async fn test_balance_drives_weight_outputs() {
        let balance = SharedBalance::new();
        balance.store(BalanceState::Right);
        let source = ScriptedFrameSource::new(frames(1), ScriptEnd::Quit);
        let extractor = ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(70.0, 12.0)));
        let (indicators, sensing) = sensing(source, extractor, &balance);
        let (_trigger, signal) = shutdown_channel();

        sensing.run(signal).await;

        let first = indicators.applied()[0];
        assert!(first.weight_right);
        assert!(!first.weight_left);
        assert!(!first.neck);
        assert!(first.shoulder);
    }

    #[tokio::test]
    async fn test_missing_landmarks_keep_balance_outputs() {
        let balance = SharedBalance::new();
        balance.store(BalanceState::Left);
        let source = ScriptedFrameSource::new(frames(2), ScriptEnd::Exhausted);
        let extractor = ScriptedExtractor::new(vec![None, Some(SyntheticPoseModel::pose(30.0, 20.0))], None);
        let (indicators, sensing) = sensing(source, extractor, &balance);
        let (_trigger, signal) = shutdown_channel();

        let summary = sensing.run(signal).await;

        let applied = indicators.applied();
        assert_eq!(
            applied[0],
            IndicatorVector {
                neck: false,
                shoulder: false,
                weight_left: true,
                weight_right: false,
            }
        );
        assert!(applied[1].neck && applied[1].shoulder && applied[1].weight_left);
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_without_landmarks, 1);
        assert_eq!(summary.exit, SensingExit::SourceFailed(FrameError::Exhausted));
        assert!(indicators.current().is_all_off());
    }

    #[tokio::test]
    async fn test_unavailable_frames_are_skipped() {
        let balance = SharedBalance::new();
        let script = vec![
            Err(FrameError::Unavailable { details: "sensor busy".to_string() }),
            Ok(Capture::Frame(Frame::new(640, 480))),
        ];
        let source = ScriptedFrameSource::new(script, ScriptEnd::Quit);
        let extractor = ScriptedExtractor::constant(None);
        let calls = extractor.call_counter();
        let (indicators, sensing) = sensing(source, extractor, &balance);
        let (_trigger, signal) = shutdown_channel();

        let summary = sensing.run(signal).await;

        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.frames_processed, 1);
        assert_eq!(*calls.lock().unwrap(), 1);
        // One iteration plus the final reset
        assert_eq!(indicators.applied().len(), 2);
        assert_eq!(summary.exit, SensingExit::QuitRequested);
    }

    /// Commits a new balance reading right before handing out each frame
    struct BalanceFlippingSource {
        balance: SharedBalance,
        readings: VecDeque<BalanceState>,
    }

    impl FrameSource for BalanceFlippingSource {
        async fn acquire(&mut self) -> FrameResult<Capture> {
            match self.readings.pop_front() {
                Some(reading) => {
                    self.balance.store(reading);
                    Ok(Capture::Frame(Frame::new(640, 480)))
                }
                None => Ok(Capture::Quit),
            }
        }
    }

    #[tokio::test]
    async fn test_balance_read_every_iteration() {
        let balance = SharedBalance::new();
        let source = BalanceFlippingSource {
            balance: balance.clone(),
            readings: VecDeque::from([BalanceState::Left, BalanceState::Right, BalanceState::Balanced]),
        };
        let indicators = RecordingIndicators::new();
        let sensing = PostureSensingLoop::new(
            source,
            ScriptedExtractor::constant(None),
            indicators.clone(),
            balance,
            PostureThresholds::default(),
        );
        let (_trigger, signal) = shutdown_channel();

        let summary = sensing.run(signal).await;

        let applied = indicators.applied();
        assert_eq!(summary.frames_processed, 3);
        assert!(applied[0].weight_left && !applied[0].weight_right);
        assert!(!applied[1].weight_left && applied[1].weight_right);
        assert!(!applied[2].weight_left && !applied[2].weight_right);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_turns_everything_off() {
        let balance = SharedBalance::new();
        balance.store(BalanceState::Left);
        let source = ScriptedFrameSource::repeating(Duration::from_millis(33));
        let extractor = ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(30.0, 15.0)));
        let (indicators, sensing) = sensing(source, extractor, &balance);
        let (trigger, signal) = shutdown_channel();

        let task = tokio::spawn(sensing.run(signal));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let lit = indicators.current();
        assert!(lit.neck && lit.shoulder && lit.weight_left);

        trigger.trigger();
        let summary = task.await.unwrap();
        assert_eq!(summary.exit, SensingExit::Stopped);
        assert!(summary.frames_processed >= 10);
        assert!(indicators.current().is_all_off());
    }

    struct PanickingExtractor;

    impl LandmarkExtractor for PanickingExtractor {
        fn extract(&mut self, _frame: &Frame) -> Option<crate::core::LandmarkSet> {
            panic!("model crashed");
        }
    }

    #[tokio::test]
    async fn test_outputs_reset_when_loop_panics() {
        let balance = SharedBalance::new();
        balance.store(BalanceState::Right);
        let indicators = RecordingIndicators::new();
        let mut warm = indicators.clone();
        warm.apply(&IndicatorVector {
            neck: true,
            shoulder: true,
            weight_left: false,
            weight_right: true,
        });

        let source = ScriptedFrameSource::new(frames(1), ScriptEnd::Quit);
        let sensing = PostureSensingLoop::new(
            source,
            PanickingExtractor,
            indicators.clone(),
            balance,
            PostureThresholds::default(),
        );
        let (_trigger, signal) = shutdown_channel();

        let result = tokio::spawn(sensing.run(signal)).await;
        assert!(result.is_err());
        assert!(indicators.current().is_all_off());
    }
}
