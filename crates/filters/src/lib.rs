#![forbid(unsafe_code)]

pub mod crop_box;
pub mod passthrough;
pub mod voxel_downsample;

pub use crop_box::crop_box;
pub use passthrough::{passthrough_filter, Axis};
pub use voxel_downsample::voxel_downsample;
