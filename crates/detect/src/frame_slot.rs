use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tabletop_core::PointCloud;

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<PointCloud>,
    pending: bool,
    taken: u64,
}

/// Latest-frame slot shared by one producer and the aggregating consumer.
///
/// The producer overwrites the frame; a consumer takes it at most once. The
/// lock is held only to move a frame in or out and never across a wait.
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the latest frame and marks it pending. An unconsumed frame is
    /// dropped.
    pub fn publish(&self, frame: PointCloud) {
        {
            let mut state = self.state.lock();
            state.latest = Some(frame);
            state.pending = true;
        }
        self.ready.notify_all();
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Number of frames handed to consumers so far.
    pub fn taken(&self) -> u64 {
        self.state.lock().taken
    }

    /// Drops the pending frame, if any. Returns whether one was dropped.
    pub fn discard_pending(&self) -> bool {
        let mut state = self.state.lock();
        let had = state.pending;
        state.pending = false;
        state.latest = None;
        had
    }

    /// Takes the pending frame without waiting.
    pub fn try_take(&self) -> Option<PointCloud> {
        let mut state = self.state.lock();
        Self::take_locked(&mut state)
    }

    /// Waits up to `timeout` for a pending frame and takes it.
    pub fn wait_take(&self, timeout: Duration) -> Option<PointCloud> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.pending {
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        Self::take_locked(&mut state)
    }

    fn take_locked(state: &mut SlotState) -> Option<PointCloud> {
        if !state.pending {
            return None;
        }
        state.pending = false;
        let frame = state.latest.take();
        if frame.is_some() {
            state.taken += 1;
        }
        frame
    }
}
