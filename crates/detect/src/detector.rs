use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tabletop_core::PointCloud;
use tabletop_filters::{crop_box, passthrough_filter, voxel_downsample, Axis};
use tabletop_segmentation::{
    evaluate_cluster, segment_plane, AdjustedPlane, PlaneEstimator, PlaneModel,
    RansacPlaneEstimator, SpatialClusterer,
};

use crate::aggregator::FrameAggregator;
use crate::cancel::CancelToken;
use crate::config::{DetectorConfig, FilterSection};
use crate::debug::{DebugSink, DebugStage, NullSink};
use crate::error::{ConfigError, Result};
use crate::frame_slot::FrameSlot;

/// Response of one detection request.
///
/// With `plane_found == false` every other field is empty or zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    pub plane_found: bool,
    /// Filtered cloud cropped to the adjusted-plane box
    pub plane_cloud: PointCloud,
    /// Fitted plane `(a, b, c, d)` with unit `(a, b, c)`, before offsets
    pub plane_coefficients: [f32; 4],
    /// Accepted clusters in evaluation order
    pub clusters: Vec<PointCloud>,
}

impl DetectionResult {
    pub fn no_plane() -> Self {
        Self::default()
    }

    /// Packages a found plane and its accepted clusters.
    ///
    /// The plane cloud is `filtered` cropped to the box from the origin to
    /// the first three adjusted coefficients.
    pub fn assemble(
        filtered: &PointCloud,
        model: &PlaneModel,
        adjusted: &AdjustedPlane,
        clusters: Vec<PointCloud>,
    ) -> Self {
        let (min, max) = adjusted.crop_bounds();
        Self {
            plane_found: true,
            plane_cloud: crop_box(filtered, min, max),
            plane_coefficients: model.coefficients(),
            clusters,
        }
    }
}

/// Range filter followed by voxel downsampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreFilter {
    pub axis: Axis,
    pub min: f32,
    pub max: f32,
    pub voxel_size: f32,
}

impl PreFilter {
    pub fn from_config(section: &FilterSection) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            axis: section.axis()?,
            min: section.min,
            max: section.max,
            voxel_size: section.voxel_size,
        })
    }

    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        let ranged = passthrough_filter(cloud, self.axis, self.min, self.max);
        let filtered = voxel_downsample(&ranged, self.voxel_size);
        debug!(
            "filter: {} points, {} in {} range [{}, {}], {} after voxel grid",
            cloud.len(),
            ranged.len(),
            self.axis,
            self.min,
            self.max,
            filtered.len()
        );
        filtered
    }
}

/// Tabletop object detection over frames published into a [`FrameSlot`].
///
/// One request runs at a time; concurrent callers of [`detect`](Self::detect)
/// queue on an internal lock.
pub struct ObjectDetector {
    config: DetectorConfig,
    aggregator: FrameAggregator,
    prefilter: PreFilter,
    estimator: Box<dyn PlaneEstimator>,
    clusterer: Box<dyn SpatialClusterer>,
    debug_sink: Box<dyn DebugSink>,
    request: Mutex<()>,
}

impl ObjectDetector {
    /// Validates `config` and wires the default RANSAC and Euclidean
    /// clustering backends.
    pub fn new(config: DetectorConfig, slot: Arc<FrameSlot>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            aggregator: FrameAggregator::from_config(slot, &config.aggregation),
            prefilter: PreFilter::from_config(&config.filter)?,
            estimator: Box::new(RansacPlaneEstimator::new(config.plane.to_ransac_params())),
            clusterer: Box::new(config.cluster.to_clusterer()),
            debug_sink: Box::new(NullSink),
            request: Mutex::new(()),
            config,
        })
    }

    pub fn with_plane_estimator(mut self, estimator: impl PlaneEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn with_clusterer(mut self, clusterer: impl SpatialClusterer + 'static) -> Self {
        self.clusterer = Box::new(clusterer);
        self
    }

    pub fn with_debug_sink(mut self, sink: impl DebugSink + 'static) -> Self {
        self.debug_sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        self.aggregator.slot()
    }

    /// Aggregates fresh frames and runs the pipeline on them.
    pub fn detect(&self, cancel: &CancelToken) -> Result<DetectionResult> {
        let _request = self.request.lock();
        let aggregate = self
            .aggregator
            .collect(self.config.aggregation.frame_count, cancel)?;
        self.run(&aggregate, cancel)
    }

    /// Runs the pipeline on an already aggregated cloud.
    pub fn process(&self, aggregate: &PointCloud, cancel: &CancelToken) -> Result<DetectionResult> {
        let _request = self.request.lock();
        self.run(aggregate, cancel)
    }

    fn run(&self, aggregate: &PointCloud, cancel: &CancelToken) -> Result<DetectionResult> {
        cancel.check()?;
        let filtered = self.prefilter.apply(aggregate);

        cancel.check()?;
        let segmentation = segment_plane(&filtered, self.estimator.as_ref());
        if !segmentation.found {
            info!("detect: no plane in {} filtered points", filtered.len());
            return Ok(DetectionResult::no_plane());
        }
        self.publish(DebugStage::Foreground, &segmentation.foreground);

        cancel.check()?;
        let candidates = self.clusterer.extract(&segmentation.foreground);
        debug!("cluster: {} candidates", candidates.len());

        let adjusted = segmentation.model.adjusted(self.config.acceptance.offsets);
        let tolerance = self.config.acceptance.tolerance;
        let mut accepted = Vec::new();
        let mut merged = PointCloud::new().with_frame_id(filtered.frame_id.clone());
        for (i, indices) in candidates.iter().enumerate() {
            cancel.check()?;
            let cluster = segmentation.foreground.select(indices);
            match evaluate_cluster(&cluster, &adjusted, tolerance) {
                Some(verdict) if verdict.accepted => {
                    debug!(
                        "cluster {}: {} points, distance min {:.4} max {:.4}, mean color {:?}",
                        i,
                        cluster.len(),
                        verdict.min_distance,
                        verdict.max_distance,
                        cluster.mean_color()
                    );
                    merged.extend_from(&cluster);
                    accepted.push(cluster);
                }
                Some(verdict) => debug!(
                    "cluster {}: rejected, min distance {:.4} > {}",
                    i, verdict.min_distance, tolerance
                ),
                None => debug!("cluster {}: empty, rejected", i),
            }
        }
        debug!("cluster: {} on plane", accepted.len());
        self.publish(DebugStage::AcceptedClusters, &merged);

        let result = DetectionResult::assemble(&filtered, &segmentation.model, &adjusted, accepted);
        info!(
            "detect: plane {:?}, {} plane inliers, {} in crop box, {} clusters",
            result.plane_coefficients,
            segmentation.plane.len(),
            result.plane_cloud.len(),
            result.clusters.len()
        );
        Ok(result)
    }

    fn publish(&self, stage: DebugStage, cloud: &PointCloud) {
        if let Err(e) = self.debug_sink.publish(stage, cloud) {
            warn!("debug publish failed: {}", e);
        }
    }
}
