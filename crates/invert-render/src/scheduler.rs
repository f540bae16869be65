//! Per-frame state machine.
//!
//! [`FrameScheduler`] drives one frame at a time through fence wait, image
//! acquisition, recording, submission and presentation, and folds swapchain
//! invalidation (out-of-date, suboptimal, window resize) into recreation.
//! Everything that touches Vulkan sits behind [`FrameBackend`], so the
//! ordering rules are testable without a GPU.

use std::sync::Arc;

use invert_core::Extent;
use invert_gpu::{AcquireOutcome, PresentOutcome};

use crate::error::Result;
use crate::frame::FrameRing;
use crate::resize::PendingResize;
use crate::shutdown::ShutdownSignal;

/// GPU side of a frame.
///
/// `frame` indexes the frames-in-flight slot (command buffer, fence,
/// uniforms). `semaphore_index` indexes the acquire semaphores, which are
/// sized by the swapchain image count.
pub trait FrameBackend {
    /// Block until the slot's previous submission has finished.
    fn wait_for_fence(&mut self, frame: usize) -> Result<()>;

    fn acquire(&mut self, semaphore_index: usize) -> Result<AcquireOutcome>;

    fn reset_fence(&mut self, frame: usize) -> Result<()>;

    /// Write per-frame data (uniforms) for the slot.
    fn update(&mut self, frame: usize, frame_number: u64) -> Result<()>;

    fn record(&mut self, frame: usize, image_index: u32) -> Result<()>;

    fn submit(&mut self, frame: usize, image_index: u32, semaphore_index: usize) -> Result<()>;

    fn present(&mut self, image_index: u32) -> PresentOutcome;

    /// Rebuild the swapchain and anything sized by it.
    ///
    /// `drawable` yields the latest drawable extent on every attempt.
    /// Returns `Ok(false)` if `cancel` interrupted the retries.
    fn recreate(
        &mut self,
        drawable: &dyn Fn() -> Extent,
        cancel: &dyn Fn() -> bool,
    ) -> Result<bool>;

    /// Number of frame slots (command buffer, fence, uniforms).
    fn frames_in_flight(&self) -> usize;

    /// Current swapchain image count.
    fn image_count(&self) -> usize;

    fn wait_idle(&mut self) -> Result<()>;
}

/// What happened to one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The swapchain was rebuilt during this iteration.
    Recreated,
    /// Nothing reached the screen (failed present, cancelled recreation).
    Skipped,
}

pub struct FrameScheduler<B: FrameBackend> {
    backend: B,
    ring: FrameRing,
    resize: Arc<PendingResize>,
    shutdown: Arc<ShutdownSignal>,
    frame_number: u64,
    needs_recreate: bool,
    /// Slot whose unfenced submission waits on each acquire semaphore.
    semaphore_owner: Vec<Option<usize>>,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Schedule frames over the backend's slots and swapchain images.
    pub fn new(backend: B, resize: Arc<PendingResize>, shutdown: Arc<ShutdownSignal>) -> Self {
        let ring = FrameRing::new(backend.frames_in_flight(), backend.image_count());
        Self {
            semaphore_owner: vec![None; ring.semaphore_count()],
            backend,
            ring,
            resize,
            shutdown,
            frame_number: 0,
            needs_recreate: false,
        }
    }

    pub const fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Number of frames submitted so far.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Run one iteration. The ring advances exactly once.
    pub fn run_frame(&mut self) -> Result<FrameOutcome> {
        let outcome = self.step();
        self.ring.advance();
        outcome
    }

    fn step(&mut self) -> Result<FrameOutcome> {
        let frame = self.ring.current_frame();
        self.wait_for_fence(frame)?;

        if self.needs_recreate && !self.recreate()? {
            return Ok(FrameOutcome::Skipped);
        }

        // Read after any recreation, which may re-wrap the index.
        let semaphore_index = self.ring.semaphore_index();

        // With more slots than images the semaphore may belong to a
        // submission from another slot that has not been fenced yet.
        if let Some(owner) = self.semaphore_owner[semaphore_index] {
            self.wait_for_fence(owner)?;
        }

        let (image_index, suboptimal) = match self.backend.acquire(semaphore_index)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                tracing::debug!("Swapchain out of date on acquire");
                return self.recreate_outcome();
            }
        };

        // The fence is only reset once a submission is certain to follow.
        self.backend.reset_fence(frame)?;
        self.backend.update(frame, self.frame_number)?;
        self.backend.record(frame, image_index)?;
        self.backend.submit(frame, image_index, semaphore_index)?;
        self.semaphore_owner[semaphore_index] = Some(frame);
        self.frame_number += 1;
        tracing::trace!(frame, image_index, semaphore_index, "Frame submitted");

        let stale = match self.backend.present(image_index) {
            PresentOutcome::Presented => suboptimal,
            PresentOutcome::Stale => true,
            PresentOutcome::Failed(result) => {
                tracing::warn!(?result, "Present failed");
                return Ok(FrameOutcome::Skipped);
            }
        };

        if stale || self.resize.is_pending() {
            return self.recreate_outcome();
        }
        Ok(FrameOutcome::Presented)
    }

    /// Wait on a slot's fence, releasing the semaphores its submission used.
    fn wait_for_fence(&mut self, frame: usize) -> Result<()> {
        self.backend.wait_for_fence(frame)?;
        for owner in &mut self.semaphore_owner {
            if *owner == Some(frame) {
                *owner = None;
            }
        }
        Ok(())
    }

    fn recreate_outcome(&mut self) -> Result<FrameOutcome> {
        if self.recreate()? {
            Ok(FrameOutcome::Recreated)
        } else {
            Ok(FrameOutcome::Skipped)
        }
    }

    fn recreate(&mut self) -> Result<bool> {
        let resize = Arc::clone(&self.resize);
        let shutdown = Arc::clone(&self.shutdown);
        let drawable = move || {
            resize.take();
            resize.latest()
        };
        let cancel = move || shutdown.should_stop();

        let recreated = self.backend.recreate(&drawable, &cancel)?;
        self.needs_recreate = !recreated;
        if recreated {
            // Recreation idles the device and replaces every semaphore.
            let images = self.backend.image_count();
            self.ring.set_semaphore_count(images);
            self.semaphore_owner = vec![None; self.ring.semaphore_count()];
        }
        Ok(recreated)
    }

    /// Loop until a stop is requested, then idle the device and acknowledge.
    ///
    /// A frame already in progress always completes. The acknowledgment is
    /// sent on error too, so the owning thread never waits forever. Returns
    /// the number of frames submitted.
    pub fn run(&mut self) -> Result<u64> {
        let mut result = Ok(());
        while !self.shutdown.should_stop() {
            if let Err(e) = self.run_frame() {
                result = Err(e);
                break;
            }
        }

        let idle = self.backend.wait_idle();
        self.shutdown.acknowledge();
        tracing::info!(frames = self.frame_number, "Render loop stopped");

        result?;
        idle?;
        Ok(self.frame_number)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ash::vk;
    use invert_gpu::{SwapchainLifecycle, SwapchainState};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        WaitFence(usize),
        Acquire(usize),
        ResetFence(usize),
        Update(usize, u64),
        Record(usize, u32),
        Submit(usize, u32, usize),
        Present(u32),
        Recreate(Extent),
        WaitIdle,
    }

    struct MockBackend {
        events: Vec<Event>,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentOutcome>,
        recreate_script: VecDeque<bool>,
        frames_in_flight: usize,
        image_count: usize,
        image_count_after_recreate: Option<usize>,
        next_image: u32,
        lifecycle: SwapchainLifecycle,
        states: Vec<SwapchainState>,
        stop_after: Option<(u64, Arc<ShutdownSignal>)>,
        presents: u64,
    }

    impl MockBackend {
        fn new(image_count: usize) -> Self {
            let mut lifecycle = SwapchainLifecycle::new();
            lifecycle.created().unwrap();
            Self {
                events: Vec::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                recreate_script: VecDeque::new(),
                frames_in_flight: 2,
                image_count,
                image_count_after_recreate: None,
                next_image: 0,
                lifecycle,
                states: vec![SwapchainState::Live],
                stop_after: None,
                presents: 0,
            }
        }

        fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
            self.events.iter().filter(|e| pred(e)).count()
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_fence(&mut self, frame: usize) -> Result<()> {
            self.events.push(Event::WaitFence(frame));
            Ok(())
        }

        fn acquire(&mut self, semaphore_index: usize) -> Result<AcquireOutcome> {
            self.events.push(Event::Acquire(semaphore_index));
            Ok(self.acquire_script.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count as u32;
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal: false,
                }
            }))
        }

        fn reset_fence(&mut self, frame: usize) -> Result<()> {
            self.events.push(Event::ResetFence(frame));
            Ok(())
        }

        fn update(&mut self, frame: usize, frame_number: u64) -> Result<()> {
            self.events.push(Event::Update(frame, frame_number));
            Ok(())
        }

        fn record(&mut self, frame: usize, image_index: u32) -> Result<()> {
            self.events.push(Event::Record(frame, image_index));
            Ok(())
        }

        fn submit(&mut self, frame: usize, image_index: u32, semaphore_index: usize) -> Result<()> {
            self.events
                .push(Event::Submit(frame, image_index, semaphore_index));
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> PresentOutcome {
            self.events.push(Event::Present(image_index));
            self.presents += 1;
            if let Some((limit, shutdown)) = &self.stop_after {
                if self.presents >= *limit {
                    shutdown.request_stop();
                }
            }
            self.present_script
                .pop_front()
                .unwrap_or(PresentOutcome::Presented)
        }

        fn recreate(
            &mut self,
            drawable: &dyn Fn() -> Extent,
            cancel: &dyn Fn() -> bool,
        ) -> Result<bool> {
            self.states.push(self.lifecycle.begin_recreate()?);
            self.events.push(Event::Recreate(drawable()));

            let succeeded = self.recreate_script.pop_front().unwrap_or(true);
            if !succeeded {
                assert!(cancel());
                self.states.push(self.lifecycle.cancelled()?);
                return Ok(false);
            }

            self.states.push(self.lifecycle.created()?);
            if let Some(count) = self.image_count_after_recreate.take() {
                self.image_count = count;
                self.next_image = 0;
            }
            Ok(true)
        }

        fn frames_in_flight(&self) -> usize {
            self.frames_in_flight
        }

        fn image_count(&self) -> usize {
            self.image_count
        }

        fn wait_idle(&mut self) -> Result<()> {
            self.events.push(Event::WaitIdle);
            Ok(())
        }
    }

    fn scheduler(
        mut backend: MockBackend,
        frames_in_flight: usize,
    ) -> FrameScheduler<MockBackend> {
        backend.frames_in_flight = frames_in_flight;
        FrameScheduler::new(
            backend,
            Arc::new(PendingResize::new(Extent::new(800, 600))),
            Arc::new(ShutdownSignal::new()),
        )
    }

    /// A slot's fence is waited on before it is reset or recorded into again,
    /// and it is only reset directly after a successful acquire.
    fn assert_fence_discipline(events: &[Event], frames_in_flight: usize) {
        let mut waited = vec![false; frames_in_flight];
        for (i, event) in events.iter().enumerate() {
            match *event {
                Event::WaitFence(f) => waited[f] = true,
                Event::ResetFence(f) => {
                    assert!(waited[f], "fence {f} reset before wait at {i}");
                    assert!(matches!(events[i - 1], Event::Acquire(_)));
                }
                Event::Record(f, _) => assert!(waited[f], "slot {f} recorded before wait at {i}"),
                Event::Submit(f, _, _) => {
                    assert!(waited[f]);
                    waited[f] = false;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn steady_state_respects_fence_discipline() {
        let mut scheduler = scheduler(MockBackend::new(3), 2);
        for _ in 0..10 {
            assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);
        }

        let events = &scheduler.backend().events;
        assert_fence_discipline(events, 2);
        assert_eq!(scheduler.frame_number(), 10);
        assert_eq!(scheduler.ring().current_frame(), 0);
        assert_eq!(scheduler.ring().semaphore_index(), 10 % 3);

        // Frame 4 runs in slot 0 with semaphore 1 on image 1.
        assert!(events.contains(&Event::Update(0, 4)));
        assert!(events.contains(&Event::Submit(0, 1, 1)));
    }

    /// Before a semaphore is handed to acquire again, the fence of the last
    /// submission that waited on it has been waited on.
    fn assert_acquire_semaphores_released(events: &[Event]) {
        let mut pending: Vec<(usize, usize, usize)> = Vec::new();
        for (i, event) in events.iter().enumerate() {
            match *event {
                Event::Submit(f, _, s) => pending.push((s, f, i)),
                Event::WaitFence(f) => pending.retain(|&(_, owner, _)| owner != f),
                Event::Acquire(s) => {
                    if let Some(&(_, owner, at)) = pending.iter().find(|&&(p, _, _)| p == s) {
                        panic!(
                            "semaphore {s} acquired at {i} before slot {owner} \
                             (submit at {at}) was fenced"
                        );
                    }
                }
                Event::Recreate(_) => pending.clear(),
                _ => {}
            }
        }
    }

    #[test]
    fn more_slots_than_images_never_reuse_an_unfenced_semaphore() {
        let mut scheduler = scheduler(MockBackend::new(2), 3);
        for _ in 0..6 {
            assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);
        }

        let events = &scheduler.backend().events;
        assert_acquire_semaphores_released(events);
        assert_fence_discipline(events, 3);
        assert_eq!(scheduler.frame_number(), 6);

        // Frame 2 runs in slot 2 but reuses semaphore 0 from slot 0.
        let acquire = events.iter().position(|e| *e == Event::Acquire(0)).unwrap();
        let second = events[acquire + 1..]
            .iter()
            .position(|e| *e == Event::Acquire(0))
            .unwrap()
            + acquire
            + 1;
        assert_eq!(events[second - 1], Event::WaitFence(0));
        assert_eq!(events[second - 2], Event::WaitFence(2));
    }

    #[test]
    fn steady_state_waits_only_on_the_current_slot() {
        let mut scheduler = scheduler(MockBackend::new(3), 2);
        for _ in 0..10 {
            scheduler.run_frame().unwrap();
        }
        let events = &scheduler.backend().events;
        assert_acquire_semaphores_released(events);
        let waits = events
            .iter()
            .filter(|e| matches!(e, Event::WaitFence(_)))
            .count();
        assert_eq!(waits, 10);
    }

    #[test]
    fn stale_present_recreates_and_advances_once() {
        let mut backend = MockBackend::new(3);
        backend.present_script.push_back(PresentOutcome::Stale);
        let mut scheduler = scheduler(backend, 2);

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Recreated);

        let backend = scheduler.backend();
        assert_eq!(
            backend.states,
            vec![
                SwapchainState::Live,
                SwapchainState::Recreating,
                SwapchainState::Live
            ]
        );
        assert_eq!(backend.count(|e| matches!(e, Event::Recreate(_))), 1);
        assert_eq!(scheduler.ring().current_frame(), 1);
        assert_eq!(scheduler.ring().semaphore_index(), 1);
    }

    #[test]
    fn out_of_date_acquire_skips_submission() {
        let mut backend = MockBackend::new(3);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut scheduler = scheduler(backend, 2);

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Recreated);
        assert_eq!(
            scheduler.backend().events,
            vec![
                Event::WaitFence(0),
                Event::Acquire(0),
                Event::Recreate(Extent::new(800, 600)),
            ]
        );
        assert_eq!(scheduler.frame_number(), 0);

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);
        assert_fence_discipline(&scheduler.backend().events, 2);
        assert_eq!(scheduler.frame_number(), 1);
    }

    #[test]
    fn suboptimal_acquire_recreates_after_present() {
        let mut backend = MockBackend::new(3);
        backend.acquire_script.push_back(AcquireOutcome::Acquired {
            image_index: 2,
            suboptimal: true,
        });
        let mut scheduler = scheduler(backend, 2);

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Recreated);
        let events = &scheduler.backend().events;
        let present = events.iter().position(|e| *e == Event::Present(2)).unwrap();
        let recreate = events
            .iter()
            .position(|e| matches!(e, Event::Recreate(_)))
            .unwrap();
        assert!(present < recreate);
    }

    #[test]
    fn resize_notifications_coalesce_into_one_recreation() {
        let mut scheduler = scheduler(MockBackend::new(3), 2);
        scheduler.resize.notify(Extent::new(1024, 768));
        scheduler.resize.notify(Extent::new(1280, 720));

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Recreated);
        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);

        let recreations: Vec<_> = scheduler
            .backend()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Recreate(_)))
            .cloned()
            .collect();
        assert_eq!(recreations, vec![Event::Recreate(Extent::new(1280, 720))]);
        assert!(!scheduler.resize.is_pending());
    }

    #[test]
    fn recreation_adopts_new_image_count() {
        let mut backend = MockBackend::new(4);
        backend.image_count_after_recreate = Some(2);
        let mut scheduler = scheduler(backend, 2);

        for _ in 0..3 {
            scheduler.run_frame().unwrap();
        }
        assert_eq!(scheduler.ring().semaphore_index(), 3);

        scheduler.resize.notify(Extent::new(640, 480));
        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Recreated);
        assert_eq!(scheduler.ring().semaphore_count(), 2);
        // Re-wrapped from 3 to 1, then advanced.
        assert_eq!(scheduler.ring().semaphore_index(), 0);
    }

    #[test]
    fn failed_present_is_skipped_without_recreation() {
        let mut backend = MockBackend::new(3);
        backend
            .present_script
            .push_back(PresentOutcome::Failed(vk::Result::ERROR_DEVICE_LOST));
        let mut scheduler = scheduler(backend, 2);

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Skipped);
        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(
            scheduler
                .backend()
                .count(|e| matches!(e, Event::Recreate(_))),
            0
        );
    }

    #[test]
    fn cancelled_recreation_is_retried_next_frame() {
        let mut backend = MockBackend::new(3);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        backend.recreate_script.push_back(false);
        let mut scheduler = scheduler(backend, 2);
        scheduler.shutdown.request_stop();

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Skipped);
        assert_eq!(
            scheduler.backend().states.last(),
            Some(&SwapchainState::Destroyed)
        );

        assert_eq!(scheduler.run_frame().unwrap(), FrameOutcome::Presented);
        let events = &scheduler.backend().events;
        assert_eq!(events[3], Event::WaitFence(1));
        assert!(matches!(events[4], Event::Recreate(_)));
        assert_eq!(events[5], Event::Acquire(1));
    }

    #[test]
    fn run_stops_idles_then_acknowledges() {
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut backend = MockBackend::new(3);
        backend.stop_after = Some((3, Arc::clone(&shutdown)));

        let mut scheduler = FrameScheduler::new(
            backend,
            Arc::new(PendingResize::new(Extent::new(800, 600))),
            Arc::clone(&shutdown),
        );

        assert_eq!(scheduler.run().unwrap(), 3);
        assert!(shutdown.is_acknowledged());
        assert_eq!(scheduler.backend().events.last(), Some(&Event::WaitIdle));
        assert_fence_discipline(&scheduler.backend().events, 2);
    }
}
