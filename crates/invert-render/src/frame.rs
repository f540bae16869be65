//! Frame-in-flight ring.

/// Tracks which frame slot and which acquire semaphore the next frame uses.
///
/// The two indices wrap independently: frame slots by the frames-in-flight
/// count, semaphores by the swapchain image count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRing {
    frames_in_flight: usize,
    semaphore_count: usize,
    current_frame: usize,
    semaphore_index: usize,
}

impl FrameRing {
    /// Both counts are clamped to at least one.
    pub fn new(frames_in_flight: usize, semaphore_count: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            semaphore_count: semaphore_count.max(1),
            current_frame: 0,
            semaphore_index: 0,
        }
    }

    pub const fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub const fn semaphore_count(&self) -> usize {
        self.semaphore_count
    }

    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub const fn semaphore_index(&self) -> usize {
        self.semaphore_index
    }

    /// Step both indices to the next slot.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        self.semaphore_index = (self.semaphore_index + 1) % self.semaphore_count;
    }

    /// Adopt a new semaphore count after the swapchain was rebuilt.
    pub fn set_semaphore_count(&mut self, count: usize) {
        self.semaphore_count = count.max(1);
        self.semaphore_index %= self.semaphore_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_wrap_independently() {
        let mut ring = FrameRing::new(2, 3);
        for k in 1..=12 {
            ring.advance();
            assert_eq!(ring.current_frame(), k % 2);
            assert_eq!(ring.semaphore_index(), k % 3);
        }
    }

    #[test]
    fn semaphore_index_rewraps_when_count_shrinks() {
        let mut ring = FrameRing::new(2, 4);
        ring.advance();
        ring.advance();
        ring.advance();
        assert_eq!(ring.semaphore_index(), 3);

        ring.set_semaphore_count(2);
        assert_eq!(ring.semaphore_index(), 1);
        assert_eq!(ring.current_frame(), 1);

        ring.advance();
        assert_eq!(ring.semaphore_index(), 0);
    }

    #[test]
    fn zero_counts_are_clamped() {
        let mut ring = FrameRing::new(0, 0);
        assert_eq!(ring.frames_in_flight(), 1);
        assert_eq!(ring.semaphore_count(), 1);
        ring.advance();
        assert_eq!(ring.current_frame(), 0);
        ring.set_semaphore_count(0);
        assert_eq!(ring.semaphore_count(), 1);
    }
}
