//! Orchestrator: runs the link task and the sensing loop side by side
//!
//! Both units share one `SharedBalance` and nothing else. The run ends on an
//! external shutdown request or when the sensing loop stops on its own; the
//! link task is then told to stop and both are joined. Nothing is restarted.

use crate::api::link::LinkStateMachine;
use crate::api::sensing::PostureSensingLoop;
use crate::api::types::{shutdown_channel, RunReport, ShutdownSignal, ShutdownTrigger};
use crate::hardware::{FrameSource, IndicatorOutputs, LandmarkExtractor, WirelessTransport};
use crate::processing::SharedBalance;
use crate::utils::MonitorConfig;
use anyhow::Context;
use tokio::task::JoinError;
use tracing::{error, info};

/// Fires the internal stop when dropped, so abandoning a run still winds
/// both tasks down
struct StopOnDrop(ShutdownTrigger);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

/// Owns the configuration and the lifetime of one monitoring run
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: MonitorConfig,
}

impl Orchestrator {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Start both units and wait until `shutdown` fires or sensing ends.
    ///
    /// On return every indicator is off and the balance slot is back at its
    /// default. A panicking task shows up as a `None` entry in the report.
    /// Dropping the returned future stops both tasks without waiting for
    /// them.
    pub async fn run<T, F, E, A>(
        &self,
        transport: T,
        frames: F,
        extractor: E,
        outputs: A,
        mut shutdown: ShutdownSignal,
    ) -> anyhow::Result<RunReport>
    where
        T: WirelessTransport,
        F: FrameSource,
        E: LandmarkExtractor,
        A: IndicatorOutputs,
    {
        self.config.validate().context("invalid monitor configuration")?;

        let balance = SharedBalance::new();
        let (stop, stop_signal) = shutdown_channel();
        let stop = StopOnDrop(stop);

        let link = LinkStateMachine::new(transport, self.config.link.clone(), balance.clone());
        let mut link_task = tokio::spawn(link.run(stop.0.signal()));

        let sensing = PostureSensingLoop::new(frames, extractor, outputs, balance.clone(), self.config.thresholds);
        let mut sensing_task = tokio::spawn(sensing.run(stop_signal));

        info!(address = %self.config.link.target_address, "monitor running");

        let mut link_outcome = None;
        let sensing_outcome = loop {
            tokio::select! {
                _ = shutdown.triggered() => {
                    info!("shutdown requested");
                    break None;
                }
                joined = &mut sensing_task => break Some(joined),
                joined = &mut link_task, if link_outcome.is_none() => {
                    // The link task only returns after a stop, so this is a panic
                    error!("link task ended before shutdown");
                    balance.reset();
                    link_outcome = Some(joined);
                }
            }
        };

        stop.0.trigger();
        let sensing_outcome = match sensing_outcome {
            Some(joined) => joined,
            None => sensing_task.await,
        };
        let link_outcome = match link_outcome {
            Some(joined) => joined,
            None => link_task.await,
        };
        balance.reset();

        let report = RunReport {
            link: finished("link", link_outcome),
            sensing: finished("sensing", sensing_outcome),
        };
        info!("monitor stopped");
        Ok(report)
    }
}

fn finished<R>(task: &str, outcome: Result<R, JoinError>) -> Option<R> {
    match outcome {
        Ok(result) => Some(result),
        Err(join_error) => {
            error!(task, error = %join_error, "task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SensingExit;
    use crate::core::{IndicatorVector, NOTIFICATION_CHANNEL, TARGET_DEVICE_ADDRESS};
    use crate::hardware::{
        DeviceHandle, LinkResult, MockPeripheral, MockTransport, NotificationCallback, RecordingIndicators,
        ScriptEnd, ScriptedExtractor, ScriptedFrameSource, SyntheticPoseModel,
    };
    use std::time::Duration;
    use tokio::time::sleep;

    const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    fn sensor() -> MockPeripheral {
        MockPeripheral::new(TARGET_DEVICE_ADDRESS, NOTIFICATION_CHANNEL)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1_000 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_right_notification_reaches_weight_outputs() {
        let sensor = sensor();
        let indicators = RecordingIndicators::new();
        let (trigger, signal) = shutdown_channel();
        let orchestrator = Orchestrator::new(MonitorConfig::default());

        let run = {
            let sensor = sensor.clone();
            let indicators = indicators.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(
                        MockTransport::new(sensor),
                        ScriptedFrameSource::repeating(FRAME_INTERVAL),
                        ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(70.0, 2.0))),
                        indicators,
                        signal,
                    )
                    .await
            })
        };

        wait_until(|| sensor.subscriber_count() == 1).await;
        sensor.notify(b"RIGHT");
        let changes = indicators.changes();
        wait_until(|| indicators.changes() > changes).await;
        assert_eq!(
            indicators.current(),
            IndicatorVector {
                neck: false,
                shoulder: false,
                weight_left: false,
                weight_right: true,
            }
        );

        trigger.trigger();
        let report = run.await.unwrap().unwrap();
        assert!(indicators.current().is_all_off());
        assert_eq!(report.link.unwrap().notifications_applied, 1);
        assert_eq!(report.sensing.unwrap().exit, SensingExit::Stopped);
        assert!(!sensor.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_turns_outputs_off() {
        let sensor = sensor();
        let indicators = RecordingIndicators::new();
        let (trigger, signal) = shutdown_channel();
        let orchestrator = Orchestrator::new(MonitorConfig::default());

        let run = {
            let sensor = sensor.clone();
            let indicators = indicators.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(
                        MockTransport::new(sensor),
                        ScriptedFrameSource::repeating(FRAME_INTERVAL),
                        ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(30.0, 15.0))),
                        indicators,
                        signal,
                    )
                    .await
            })
        };

        wait_until(|| sensor.subscriber_count() == 1).await;
        sensor.notify(b"LEFT");
        wait_until(|| indicators.current().weight_left).await;
        assert!(indicators.current().neck);

        trigger.trigger();
        let report = run.await.unwrap().unwrap();
        assert!(indicators.current().is_all_off());
        assert!(report.link.is_some());
        assert!(report.sensing.unwrap().frames_processed > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_stops_link_task() {
        let sensor = sensor();
        sensor.set_advertising(false);
        let indicators = RecordingIndicators::new();
        let (_trigger, signal) = shutdown_channel();

        let report = Orchestrator::new(MonitorConfig::default())
            .run(
                MockTransport::new(sensor.clone()),
                ScriptedFrameSource::repeating(FRAME_INTERVAL).with_limit(20),
                ScriptedExtractor::constant(None),
                indicators.clone(),
                signal,
            )
            .await
            .unwrap();

        assert!(!report.source_failed());
        let sensing = report.sensing.unwrap();
        assert_eq!(sensing.exit, SensingExit::QuitRequested);
        assert_eq!(sensing.frames_processed, 20);
        assert_eq!(sensing.frames_without_landmarks, 20);
        assert!(report.link.unwrap().scans >= 1);
        assert!(indicators.current().is_all_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_is_reported() {
        let indicators = RecordingIndicators::new();
        let (_trigger, signal) = shutdown_channel();

        let report = Orchestrator::new(MonitorConfig::default())
            .run(
                MockTransport::new(sensor()),
                ScriptedFrameSource::new(Vec::new(), ScriptEnd::Exhausted),
                ScriptedExtractor::constant(None),
                indicators.clone(),
                signal,
            )
            .await
            .unwrap();

        assert!(report.source_failed());
        assert!(report.link.is_some());
        assert!(indicators.current().is_all_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_stops_both_tasks() {
        let sensor = sensor();
        let indicators = RecordingIndicators::new();
        let (_trigger, signal) = shutdown_channel();
        let orchestrator = Orchestrator::new(MonitorConfig::default());

        let run = orchestrator.run(
            MockTransport::new(sensor.clone()),
            ScriptedFrameSource::repeating(FRAME_INTERVAL),
            ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(30.0, 15.0))),
            indicators.clone(),
            signal,
        );
        let abandoned = tokio::time::timeout(Duration::from_secs(2), run).await;
        assert!(abandoned.is_err());

        wait_until(|| indicators.current().is_all_off() && !sensor.is_connected()).await;
        let applied = indicators.applied().len();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(indicators.applied().len(), applied);
        assert_eq!(sensor.subscriber_count(), 0);
    }

    /// Transport whose discovery crashes the link task
    struct CrashingTransport;

    impl WirelessTransport for CrashingTransport {
        type Connection = ();

        async fn discover(&mut self, _timeout: Duration) -> LinkResult<Vec<DeviceHandle>> {
            panic!("radio driver crashed");
        }

        async fn connect(&mut self, _device: &DeviceHandle, _timeout: Duration) -> LinkResult<()> {
            Ok(())
        }

        async fn subscribe(&mut self, _connection: &(), _channel: &str, _on_message: NotificationCallback) -> LinkResult<()> {
            Ok(())
        }

        async fn is_connected(&mut self, _connection: &()) -> bool {
            false
        }

        async fn disconnect(&mut self, _connection: &()) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_panic_keeps_sensing_running() {
        let indicators = RecordingIndicators::new();
        let (_trigger, signal) = shutdown_channel();

        let report = Orchestrator::new(MonitorConfig::default())
            .run(
                CrashingTransport,
                ScriptedFrameSource::repeating(FRAME_INTERVAL).with_limit(30),
                ScriptedExtractor::constant(Some(SyntheticPoseModel::pose(30.0, 2.0))),
                indicators.clone(),
                signal,
            )
            .await
            .unwrap();

        assert!(report.link.is_none());
        let sensing = report.sensing.unwrap();
        assert_eq!(sensing.exit, SensingExit::QuitRequested);
        assert_eq!(sensing.frames_processed, 30);
        assert_eq!(sensing.forward_head_frames, 30);

        let applied = indicators.applied();
        assert!(applied.iter().all(|vector| !vector.weight_left && !vector.weight_right));
        assert!(applied[..30].iter().all(|vector| vector.neck));
        assert!(indicators.current().is_all_off());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = MonitorConfig::default();
        config.link.backoff_ms = 0;
        let (_trigger, signal) = shutdown_channel();

        let result = Orchestrator::new(config)
            .run(
                MockTransport::new(sensor()),
                ScriptedFrameSource::repeating(FRAME_INTERVAL),
                ScriptedExtractor::constant(None),
                RecordingIndicators::new(),
                signal,
            )
            .await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("invalid monitor configuration"));
    }
}
