//! Common runtime types: shutdown signalling, statistics and run reports

use crate::hardware::FrameError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Create a connected shutdown trigger and signal
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, ShutdownSignal { rx })
}

/// Requests a stop of every task holding a matching `ShutdownSignal`
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this trigger
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }
}

/// Observes a `ShutdownTrigger`
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop has been requested. If every trigger is dropped
    /// without firing, no stop can arrive and this never resolves.
    pub async fn triggered(&mut self) {
        let fired = self.rx.wait_for(|stop| *stop).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Counters kept by the link task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub scans: u64,
    pub connect_attempts: u64,
    pub connections: u64,
    pub disconnections: u64,
    pub notifications_applied: u64,
    pub notifications_ignored: u64,
}

/// Notification counters updated from the transport's callback context
#[derive(Debug, Default)]
pub(crate) struct NotificationCounters {
    applied: AtomicU64,
    ignored: AtomicU64,
}

impl NotificationCounters {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub(crate) fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}

/// Why the sensing loop stopped
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SensingExit {
    /// Stop signal observed
    #[default]
    Stopped,
    /// The viewer asked to quit
    QuitRequested,
    /// The frame source failed for good
    SourceFailed(FrameError),
}

/// Counters kept by the sensing loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensingSummary {
    pub frames_processed: u64,
    pub frames_without_landmarks: u64,
    pub frames_skipped: u64,
    pub forward_head_frames: u64,
    pub shoulder_imbalance_frames: u64,
    pub exit: SensingExit,
}

/// Outcome of one orchestrated run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// `None` if the link task panicked
    pub link: Option<LinkStats>,
    /// `None` if the sensing task panicked
    pub sensing: Option<SensingSummary>,
}

impl RunReport {
    /// True when the sensing loop ended because the camera failed
    pub fn source_failed(&self) -> bool {
        matches!(
            self.sensing,
            Some(SensingSummary {
                exit: SensingExit::SourceFailed(_),
                ..
            })
        )
    }

    pub fn log_summary(&self) {
        if let Some(link) = &self.link {
            info!(
                scans = link.scans,
                connections = link.connections,
                disconnections = link.disconnections,
                notifications = link.notifications_applied,
                ignored = link.notifications_ignored,
                "link summary"
            );
        }
        if let Some(sensing) = &self.sensing {
            info!(
                frames = sensing.frames_processed,
                no_person = sensing.frames_without_landmarks,
                skipped = sensing.frames_skipped,
                forward_head = sensing.forward_head_frames,
                shoulder_imbalance = sensing.shoulder_imbalance_frames,
                exit = ?sensing.exit,
                "sensing summary"
            );
        }
    }
}
