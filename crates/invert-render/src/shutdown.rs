//! Stop request and acknowledgment between the event and render threads.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

/// Two-phase shutdown handshake.
///
/// The owning thread requests a stop and blocks until the render thread
/// acknowledges that the device is idle; only then may the window go away.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stop: AtomicBool,
    stopped: Mutex<bool>,
    acknowledged: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Called by the render thread once it has stopped touching the GPU.
    pub fn acknowledge(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.acknowledged.notify_all();
    }

    pub fn is_acknowledged(&self) -> bool {
        *self.stopped.lock()
    }

    /// Block until the render thread has acknowledged.
    pub fn wait_acknowledged(&self) {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            self.acknowledged.wait(&mut stopped);
        }
    }

    pub fn request_stop_and_wait(&self) {
        self.request_stop();
        self.wait_acknowledged();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn stop_flag_is_sticky() {
        let signal = ShutdownSignal::new();
        assert!(!signal.should_stop());
        signal.request_stop();
        signal.request_stop();
        assert!(signal.should_stop());
        assert!(!signal.is_acknowledged());
    }

    #[test]
    fn request_blocks_until_acknowledged() {
        let signal = Arc::new(ShutdownSignal::new());
        let worker = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                while !signal.should_stop() {
                    std::thread::yield_now();
                }
                signal.acknowledge();
            })
        };

        signal.request_stop_and_wait();
        assert!(signal.is_acknowledged());
        worker.join().unwrap();
    }

    #[test]
    fn early_acknowledgment_does_not_block() {
        let signal = ShutdownSignal::new();
        signal.acknowledge();
        signal.request_stop_and_wait();
        assert!(signal.should_stop());
    }
}
