//! Tabletop object detection from aggregated RGB-D point clouds.
//!
//! Umbrella crate re-exporting the workspace members so integration tests
//! and benches can depend on a single package.

#![forbid(unsafe_code)]

pub use tabletop_core as core;
pub use tabletop_detect as detect;
pub use tabletop_filters as filters;
pub use tabletop_io as io;
pub use tabletop_segmentation as segmentation;
pub use tabletop_spatial as spatial;
