use std::sync::{Arc, RwLock};

use crate::shared::frame::Frame;

/// Single-slot handoff between the refresh loop and readers.
///
/// Holds the most recent frame only; no history, no queue. The decode/fetch
/// work happens before `publish` is called, so the critical section is just
/// the pointer swap. Readers clone the `Arc` under the read lock and never
/// observe a torn frame; the previous occupant is released when its last
/// reader drops.
#[derive(Default)]
pub struct FrameStore {
    slot: RwLock<Option<Arc<Frame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Replaces the current frame. Exclusive with other publishes and with
    /// in-flight reads.
    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(frame));
    }

    /// Returns the most recent frame, or `None` before the first publish.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Drops the held frame. Used on close.
    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}
