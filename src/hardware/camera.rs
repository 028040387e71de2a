//! Frame acquisition and landmark extraction interfaces

use crate::core::LandmarkSet;
use crate::hardware::FrameResult;
use std::future::Future;

/// One captured image
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Vec::new(),
            width,
            height,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Outcome of one acquisition
#[derive(Debug, Clone)]
pub enum Capture {
    Frame(Frame),
    /// The viewer asked to stop monitoring
    Quit,
}

/// Pull-based camera
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame. `FrameError::Unavailable` means skip this
    /// iteration; other errors end sensing.
    fn acquire(&mut self) -> impl Future<Output = FrameResult<Capture>> + Send;
}

/// Pose model turning a frame into landmarks
pub trait LandmarkExtractor: Send + 'static {
    /// Returns `None` when no person is detected
    fn extract(&mut self, frame: &Frame) -> Option<LandmarkSet>;
}
