//! Resize notifications handed from the event thread to the render thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use invert_core::Extent;

/// Single-slot resize mailbox.
///
/// The extent is packed into one atomic word so a reader never sees the
/// width of one event paired with the height of another. Repeated
/// notifications before the render thread consumes the slot coalesce into
/// one, carrying the latest extent.
#[derive(Debug)]
pub struct PendingResize {
    extent: AtomicU64,
    pending: AtomicBool,
}

impl PendingResize {
    pub fn new(initial: Extent) -> Self {
        Self {
            extent: AtomicU64::new(initial.pack()),
            pending: AtomicBool::new(false),
        }
    }

    /// Record a new drawable extent.
    ///
    /// Returns `true` if this raised a new notification, `false` if one was
    /// already waiting (its extent is replaced).
    pub fn notify(&self, extent: Extent) -> bool {
        self.extent.store(extent.pack(), Ordering::Release);
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Consume the pending notification, if any.
    pub fn take(&self) -> Option<Extent> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(self.latest())
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Most recently notified extent, pending or not.
    pub fn latest(&self) -> Extent {
        Extent::unpack(self.extent.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn notifications_coalesce_to_latest() {
        let resize = PendingResize::new(Extent::new(800, 600));
        assert!(resize.notify(Extent::new(1024, 768)));
        assert!(!resize.notify(Extent::new(1280, 720)));

        assert_eq!(resize.take(), Some(Extent::new(1280, 720)));
        assert_eq!(resize.take(), None);
    }

    #[test]
    fn latest_survives_take() {
        let resize = PendingResize::new(Extent::new(800, 600));
        assert_eq!(resize.latest(), Extent::new(800, 600));
        assert!(!resize.is_pending());

        resize.notify(Extent::new(0, 0));
        assert!(resize.is_pending());
        resize.take();
        assert_eq!(resize.latest(), Extent::new(0, 0));
    }

    #[test]
    fn concurrent_notifications_never_tear() {
        let resize = Arc::new(PendingResize::new(Extent::new(1, 1)));
        let writer = {
            let resize = Arc::clone(&resize);
            std::thread::spawn(move || {
                for i in 1..2000u32 {
                    resize.notify(Extent::new(i, i));
                }
            })
        };

        for _ in 0..2000 {
            if let Some(extent) = resize.take() {
                assert_eq!(extent.width, extent.height);
            }
        }
        writer.join().unwrap();
        assert_eq!(resize.latest(), Extent::new(1999, 1999));
    }
}
