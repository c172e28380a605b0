// src/pipeline/ingest.rs
//
// Bounded frame queue between the detector bridge and the frame loop.
// Under backpressure the OLDEST queued frame is dropped: recency matters
// more than completeness for live counts.

use crate::types::DetectionFrame;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub queue_capacity: usize,
    /// JSONL detector output, one frame per line
    pub input_path: String,
    /// File replay waits for queue space instead of dropping frames
    pub lossless_replay: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            input_path: "detections.jsonl".to_string(),
            lossless_replay: true,
        }
    }
}

struct QueueState {
    frames: VecDeque<DetectionFrame>,
    closed: bool,
}

pub struct FrameQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    /// `dropped` is shared with pipeline metrics.
    pub fn new(capacity: usize, dropped: Arc<AtomicU64>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue a frame. Returns false when the queue is closed.
    pub fn push(&self, frame: DetectionFrame) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            if state.frames.len() >= self.capacity {
                if let Some(old) = state.frames.pop_front() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Ingest queue full ({}), dropping frame {}",
                        self.capacity, old.frame_id
                    );
                }
            }
            state.frames.push_back(frame);
        }
        self.notify.notify_one();
        true
    }

    /// No more frames will arrive; the consumer drains what is queued.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Next frame, waiting if needed. `None` once closed and drained.
    pub async fn pop(&self) -> Option<DetectionFrame> {
        loop {
            {
                let mut state = self.lock();
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Frames waiting for the frame loop.
    pub fn depth(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_full(&self) -> bool {
        self.depth() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u64) -> DetectionFrame {
        DetectionFrame {
            frame_id: id,
            timestamp: id as f64,
            detections: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_drops_oldest_when_full() {
        let dropped = Arc::new(AtomicU64::new(0));
        let q = FrameQueue::new(2, Arc::clone(&dropped));
        q.push(frame(1));
        q.push(frame(2));
        assert!(q.is_full());
        q.push(frame(3));
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
        assert_eq!(q.depth(), 2);
        assert_eq!(q.pop().await.unwrap().frame_id, 2);
        assert_eq!(q.pop().await.unwrap().frame_id, 3);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let q = FrameQueue::new(4, Arc::new(AtomicU64::new(0)));
        q.push(frame(1));
        q.close();
        assert!(!q.push(frame(2)));
        assert_eq!(q.pop().await.unwrap().frame_id, 1);
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_pop_waits_for_producer() {
        let q = Arc::new(FrameQueue::new(4, Arc::new(AtomicU64::new(0))));
        let producer = Arc::clone(&q);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            producer.push(frame(9));
            producer.close();
        });
        assert_eq!(q.pop().await.unwrap().frame_id, 9);
        assert!(q.pop().await.is_none());
        handle.await.unwrap();
    }
}
