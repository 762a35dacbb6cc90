//! Single-element latest-wins hand-off between capture and inference

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::models::Frame;

/// Holds zero or one frame.
///
/// Every operation is a single atomic pointer swap, so a reader never sees
/// a partially published frame and no lock is shared between the capture
/// path and the inference path.
#[derive(Debug, Default)]
pub struct FrameSlot {
    current: ArcSwapOption<Frame>,
    published: AtomicU64,
    overwritten: AtomicU64,
    taken: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    /// Frames replaced before any tick consumed them.
    pub overwritten: u64,
    pub taken: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, discarding any unconsumed predecessor.
    ///
    /// Returns `true` when a previous frame was overwritten.
    pub fn publish(&self, frame: Arc<Frame>) -> bool {
        self.published.fetch_add(1, Ordering::Relaxed);
        let previous = self.current.swap(Some(frame));
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove and return the latest frame, leaving the slot empty.
    pub fn take(&self) -> Option<Arc<Frame>> {
        let frame = self.current.swap(None);
        if frame.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Look at the latest frame without consuming it.
    pub fn peek(&self) -> Option<Arc<Frame>> {
        self.current.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }

    pub fn stats(&self) -> SlotStats {
        SlotStats {
            published: self.published.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(value: u8) -> Arc<Frame> {
        Arc::new(Frame::from_rgb(1, 1, vec![value; 3], Utc::now()).unwrap())
    }

    #[test]
    fn latest_publication_wins() {
        let slot = FrameSlot::new();
        let first = frame(1);
        let second = frame(2);
        assert!(!slot.publish(Arc::clone(&first)));
        assert!(slot.publish(Arc::clone(&second)));

        let taken = slot.take().unwrap();
        assert_eq!(taken.id(), second.id());
        assert!(slot.take().is_none());
        assert_eq!(
            slot.stats(),
            SlotStats {
                published: 2,
                overwritten: 1,
                taken: 1
            }
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let slot = FrameSlot::new();
        assert!(slot.is_empty());
        slot.publish(frame(9));
        assert!(slot.peek().is_some());
        assert!(!slot.is_empty());
        assert!(slot.take().is_some());
        assert!(slot.is_empty());
    }

    #[test]
    fn concurrent_publishers_never_exceed_one_frame() {
        let slot = Arc::new(FrameSlot::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    for i in 0..250u32 {
                        slot.publish(frame((worker * 10 + i % 10) as u8));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = slot.stats();
        assert_eq!(stats.published, 1000);
        // exactly one survivor: everything else was overwritten
        assert_eq!(stats.overwritten, 999);
        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
    }
}
