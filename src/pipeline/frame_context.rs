// src/pipeline/frame_context.rs
//
// Single source of truth for one frame while it moves through the stages.
// Every stage reads the same tracks, analytics and groups instead of
// reaching back into another component's state.

use crate::analysis::behavior::FrameAnalytics;
use crate::analysis::group_detector::Group;
use crate::analysis::person_tracker::TrackerEvents;
use crate::types::{DetectionFrame, TrackId};
use std::time::Instant;

#[derive(Debug)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp: f64,
    pub detection_count: usize,
    /// Tracks matched or created on this frame
    pub seen: Vec<TrackId>,
    pub tracker_events: TrackerEvents,
    pub analytics: Option<FrameAnalytics>,
    pub groups: Vec<Group>,
    started_at: Instant,
}

impl FrameContext {
    pub fn new(frame: &DetectionFrame) -> Self {
        Self {
            frame_id: frame.frame_id,
            timestamp: frame.timestamp,
            detection_count: frame.detections.len(),
            seen: Vec::new(),
            tracker_events: TrackerEvents::default(),
            analytics: None,
            groups: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.started_at.elapsed().as_micros() as u64
    }
}
