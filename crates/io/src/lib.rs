#![forbid(unsafe_code)]

pub mod pcd;

pub use pcd::{pack_rgb, read_pcd, unpack_rgb, write_pcd, write_pcd_binary};
