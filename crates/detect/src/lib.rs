//! Tabletop object detection: aggregates sensor frames, fits the support
//! plane and returns the clusters resting on it.

#![forbid(unsafe_code)]

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod debug;
pub mod detector;
pub mod error;
pub mod frame_slot;

pub use aggregator::FrameAggregator;
pub use cancel::CancelToken;
pub use config::{
    AcceptanceSection, AggregationSection, ClusterSection, DetectorConfig, FilterSection,
    PlaneSection,
};
pub use debug::{ChannelSink, DebugSink, DebugStage, NullSink};
pub use detector::{DetectionResult, ObjectDetector, PreFilter};
pub use error::{ConfigError, DetectError, Result};
pub use frame_slot::FrameSlot;
