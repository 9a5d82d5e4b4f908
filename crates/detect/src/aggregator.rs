use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tabletop_core::PointCloud;

use crate::cancel::CancelToken;
use crate::config::AggregationSection;
use crate::error::{DetectError, Result};
use crate::frame_slot::FrameSlot;

/// Concatenates consecutive frames from a [`FrameSlot`] into one cloud.
#[derive(Debug, Clone)]
pub struct FrameAggregator {
    slot: Arc<FrameSlot>,
    frame_timeout: Duration,
    poll_interval: Duration,
}

impl FrameAggregator {
    pub fn new(slot: Arc<FrameSlot>, frame_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            slot,
            frame_timeout,
            poll_interval,
        }
    }

    pub fn from_config(slot: Arc<FrameSlot>, section: &AggregationSection) -> Self {
        Self::new(slot, section.frame_timeout(), section.poll_interval())
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Collects `k` frames produced after this call started.
    ///
    /// Points are appended in arrival order and the aggregate takes the frame
    /// tag of the last frame. Fails with `ProducerStalled` when any single
    /// frame takes longer than the frame timeout, and with `Cancelled` as soon
    /// as `cancel` fires.
    pub fn collect(&self, k: usize, cancel: &CancelToken) -> Result<PointCloud> {
        if k == 0 {
            return Err(DetectError::InvalidFrameCount);
        }
        if self.slot.discard_pending() {
            debug!("aggregate: dropped stale frame");
        }

        let mut aggregate = PointCloud::new();
        for collected in 0..k {
            let frame = self.next_frame(collected, k, cancel)?;
            aggregate.extend_from(&frame);
            aggregate.frame_id = frame.frame_id;
        }

        debug!("aggregate: {} frames, {} points", k, aggregate.len());
        Ok(aggregate)
    }

    fn next_frame(&self, collected: usize, expected: usize, cancel: &CancelToken) -> Result<PointCloud> {
        let start = Instant::now();
        loop {
            cancel.check()?;
            let waited = start.elapsed();
            if waited >= self.frame_timeout {
                warn!(
                    "aggregate: no frame for {:?} ({} of {} collected)",
                    waited, collected, expected
                );
                return Err(DetectError::ProducerStalled {
                    collected,
                    expected,
                    waited,
                });
            }
            let slice = self.poll_interval.min(self.frame_timeout - waited);
            if let Some(frame) = self.slot.wait_take(slice) {
                return Ok(frame);
            }
        }
    }
}
