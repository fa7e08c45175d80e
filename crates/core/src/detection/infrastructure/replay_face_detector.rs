use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Replays scripted detection results by frame index.
///
/// Frames without an entry detect nothing. Every call is recorded so runs
/// can be checked against the scheduling they were supposed to follow.
pub struct ReplayFaceDetector {
    script: Arc<HashMap<usize, Vec<FaceBox>>>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl ReplayFaceDetector {
    pub fn new(script: HashMap<usize, Vec<FaceBox>>) -> Self {
        Self {
            script: Arc::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the frame indices `detect` has been called with.
    pub fn call_log(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.calls)
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        self.calls
            .lock()
            .map_err(|_| "replay call log poisoned")?
            .push(frame.index());
        Ok(self.script.get(&frame.index()).cloned().unwrap_or_default())
    }
}
