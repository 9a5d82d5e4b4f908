//! Replays PCD frames through the detector and writes the detections.
//!
//! Usage:
//!   tabletop-detect --config detector.yaml --output out/ frame_000.pcd frame_001.pcd
//!
//! Enable per-stage logging with RUST_LOG=debug.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::info;
use tabletop_core::PointCloud;
use tabletop_detect::{CancelToken, DetectorConfig, FrameSlot, ObjectDetector};
use tabletop_io::{read_pcd, write_pcd_binary};

/// Detect objects resting on a plane in replayed point cloud frames
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for plane.pcd and cluster_<i>.pcd
    #[arg(short, long, default_value = "./detections")]
    output: PathBuf,

    /// Delay between replayed frames in milliseconds
    #[arg(long, default_value = "10")]
    frame_interval_ms: u64,

    /// Frames to replay, looped until the request completes
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };

    let frames = args
        .frames
        .iter()
        .map(|path| {
            let mut cloud = read_pcd(path)?;
            cloud.frame_id = frame_tag(path);
            Ok(cloud)
        })
        .collect::<std::io::Result<Vec<PointCloud>>>()?;
    info!("loaded {} frames", frames.len());

    let slot = Arc::new(FrameSlot::new());
    let detector = ObjectDetector::new(config, Arc::clone(&slot))?;

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let slot = Arc::clone(&slot);
        let done = Arc::clone(&done);
        let interval = Duration::from_millis(args.frame_interval_ms);
        thread::spawn(move || {
            for frame in frames.iter().cycle() {
                if done.load(Ordering::Acquire) {
                    break;
                }
                slot.publish(frame.clone());
                thread::sleep(interval);
            }
        })
    };

    let result = detector.detect(&CancelToken::new());
    done.store(true, Ordering::Release);
    if producer.join().is_err() {
        log::warn!("replay thread panicked");
    }
    let result = result?;

    std::fs::create_dir_all(&args.output)?;
    if result.plane_found {
        write_pcd_binary(args.output.join("plane.pcd"), &result.plane_cloud)?;
        for (i, cluster) in result.clusters.iter().enumerate() {
            write_pcd_binary(args.output.join(format!("cluster_{i}.pcd")), cluster)?;
        }
    }

    println!("plane found: {}", result.plane_found);
    if result.plane_found {
        let [a, b, c, d] = result.plane_coefficients;
        println!("plane: {a:.4} x + {b:.4} y + {c:.4} z + {d:.4} = 0");
        println!("plane cloud: {} points", result.plane_cloud.len());
    }
    println!("clusters: {}", result.clusters.len());
    for (i, cluster) in result.clusters.iter().enumerate() {
        let aabb = cluster.aabb();
        println!(
            "  cluster {}: {} points, bounds {:?} .. {:?}",
            i,
            cluster.len(),
            aabb.min,
            aabb.max
        );
    }
    println!("output: {}", args.output.display());
    Ok(())
}

fn frame_tag(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
