//! Fire-and-forget debug output of intermediate clouds.

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender};
use tabletop_core::PointCloud;

/// Pipeline stage an intermediate cloud comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugStage {
    /// Everything that is not the support plane
    Foreground,
    /// Accepted clusters merged into one cloud
    AcceptedClusters,
}

impl fmt::Display for DebugStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugStage::Foreground => f.write_str("foreground"),
            DebugStage::AcceptedClusters => f.write_str("accepted_clusters"),
        }
    }
}

/// Receiver of intermediate clouds. Errors are logged by the caller and
/// never fail a request.
pub trait DebugSink: Send + Sync {
    fn publish(&self, stage: DebugStage, cloud: &PointCloud) -> Result<(), String>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn publish(&self, _stage: DebugStage, _cloud: &PointCloud) -> Result<(), String> {
        Ok(())
    }
}

/// Forwards clouds over a bounded channel without blocking.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<(DebugStage, PointCloud)>,
}

impl ChannelSink {
    pub fn new(tx: Sender<(DebugStage, PointCloud)>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of a channel holding `capacity` clouds.
    pub fn bounded(capacity: usize) -> (Self, Receiver<(DebugStage, PointCloud)>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }
}

impl DebugSink for ChannelSink {
    fn publish(&self, stage: DebugStage, cloud: &PointCloud) -> Result<(), String> {
        self.tx
            .try_send((stage, cloud.clone()))
            .map_err(|e| format!("{stage}: {e}"))
    }
}
