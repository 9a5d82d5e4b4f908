//! Detector configuration loaded from YAML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabletop_filters::Axis;
use tabletop_segmentation::{EuclideanClusterer, RansacParams, DEFAULT_PLANE_OFFSETS};

use crate::error::ConfigError;

/// Full detector configuration. Every section and field is optional in YAML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub aggregation: AggregationSection,

    #[serde(default)]
    pub filter: FilterSection,

    #[serde(default)]
    pub plane: PlaneSection,

    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub acceptance: AcceptanceSection,
}

/// Frame aggregation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSection {
    /// Frames merged per request
    pub frame_count: usize,
    /// Maximum wait for each frame before the producer counts as stalled
    pub frame_timeout_ms: u64,
    /// How often a waiting request re-checks its cancel token
    pub poll_interval_ms: u64,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            frame_count: 15,
            frame_timeout_ms: 5000,
            poll_interval_ms: 33,
        }
    }
}

impl AggregationSection {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Range filter and voxel grid settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// Range-filtered axis: "x", "y" or "z"
    pub axis: String,
    pub min: f32,
    pub max: f32,
    /// Voxel edge length
    pub voxel_size: f32,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            axis: "z".to_string(),
            min: 0.0,
            max: 1.0,
            voxel_size: 0.005,
        }
    }
}

impl FilterSection {
    pub fn axis(&self) -> Result<Axis, ConfigError> {
        self.axis.parse().map_err(ConfigError::Invalid)
    }
}

/// RANSAC plane fit settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneSection {
    pub max_iterations: usize,
    pub distance_threshold: f32,
    pub optimize_coefficients: bool,
    /// Fixed RNG seed; a fresh seed per request when absent
    pub seed: Option<u64>,
}

impl Default for PlaneSection {
    fn default() -> Self {
        let params = RansacParams::default();
        Self {
            max_iterations: params.max_iterations,
            distance_threshold: params.distance_threshold,
            optimize_coefficients: params.optimize_coefficients,
            seed: params.seed,
        }
    }
}

impl PlaneSection {
    pub fn to_ransac_params(&self) -> RansacParams {
        RansacParams {
            distance_threshold: self.distance_threshold,
            max_iterations: self.max_iterations,
            optimize_coefficients: self.optimize_coefficients,
            seed: self.seed,
        }
    }
}

/// Euclidean clustering settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    pub tolerance: f32,
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for ClusterSection {
    fn default() -> Self {
        let c = EuclideanClusterer::default();
        Self {
            tolerance: c.tolerance,
            min_size: c.min_size,
            max_size: c.max_size,
        }
    }
}

impl ClusterSection {
    pub fn to_clusterer(&self) -> EuclideanClusterer {
        EuclideanClusterer {
            tolerance: self.tolerance,
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }
}

/// Cluster acceptance against the adjusted plane
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceSection {
    /// Largest allowed minimum distance between a cluster and the adjusted plane
    pub tolerance: f32,
    /// Added to the fitted (a, b, c, d); mount-specific
    pub offsets: [f32; 4],
}

impl Default for AcceptanceSection {
    fn default() -> Self {
        Self {
            tolerance: 0.09,
            offsets: DEFAULT_PLANE_OFFSETS,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let agg = &self.aggregation;
        if agg.frame_count == 0 {
            return Err(ConfigError::invalid("aggregation.frame_count must be at least 1"));
        }
        if agg.frame_timeout_ms == 0 || agg.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "aggregation timeouts must be positive",
            ));
        }

        let filter = &self.filter;
        filter.axis()?;
        if !(filter.min <= filter.max) {
            return Err(ConfigError::invalid(format!(
                "filter range [{}, {}] is inverted",
                filter.min, filter.max
            )));
        }
        positive("filter.voxel_size", filter.voxel_size)?;

        positive("plane.distance_threshold", self.plane.distance_threshold)?;
        positive("cluster.tolerance", self.cluster.tolerance)?;
        if self.cluster.min_size == 0 || self.cluster.min_size > self.cluster.max_size {
            return Err(ConfigError::invalid(format!(
                "cluster size bounds [{}, {}] are invalid",
                self.cluster.min_size, self.cluster.max_size
            )));
        }

        let acc = &self.acceptance;
        if !(acc.tolerance >= 0.0) {
            return Err(ConfigError::invalid("acceptance.tolerance must be non-negative"));
        }
        if acc.offsets.iter().any(|o| !o.is_finite()) {
            return Err(ConfigError::invalid("acceptance.offsets must be finite"));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(format!("{name} must be positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.aggregation.frame_count, 15);
        assert_eq!(config.filter.axis().unwrap(), Axis::Z);
        assert_eq!((config.filter.min, config.filter.max), (0.0, 1.0));
        assert_eq!(config.filter.voxel_size, 0.005);
        assert_eq!(config.plane.max_iterations, 1000);
        assert_eq!(config.plane.distance_threshold, 0.02);
        assert!(config.plane.optimize_coefficients);
        assert_eq!(config.cluster.tolerance, 0.04);
        assert_eq!((config.cluster.min_size, config.cluster.max_size), (50, 25_000));
        assert_eq!(config.acceptance.tolerance, 0.09);
        assert_eq!(config.acceptance.offsets, [0.1, 0.5, 0.1, 0.0]);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
aggregation:
  frame_count: 3
filter:
  axis: y
  max: 2.5
plane:
  seed: 42
";
        let config = DetectorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.aggregation.frame_count, 3);
        assert_eq!(config.aggregation.frame_timeout_ms, 5000);
        assert_eq!(config.filter.axis().unwrap(), Axis::Y);
        assert_eq!(config.filter.max, 2.5);
        assert_eq!(config.filter.voxel_size, 0.005);
        assert_eq!(config.plane.seed, Some(42));
        assert_eq!(config.plane.max_iterations, 1000);
        assert_eq!(config.cluster, ClusterSection::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = DetectorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(DetectorConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cluster:\n  min_size: 5").unwrap();
        let config = DetectorConfig::load(file.path()).unwrap();
        assert_eq!(config.cluster.min_size, 5);

        let missing = DetectorConfig::load(Path::new("/nonexistent/detector.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<fn(&mut DetectorConfig)> = vec![
            |c| c.aggregation.frame_count = 0,
            |c| c.aggregation.poll_interval_ms = 0,
            |c| c.filter.axis = "w".into(),
            |c| c.filter.min = 2.0,
            |c| c.filter.voxel_size = 0.0,
            |c| c.filter.voxel_size = f32::NAN,
            |c| c.plane.distance_threshold = -0.1,
            |c| c.cluster.tolerance = 0.0,
            |c| c.cluster.min_size = 0,
            |c| c.cluster.min_size = 30_000,
            |c| c.acceptance.tolerance = -1.0,
        ];
        for (i, mutate) in cases.into_iter().enumerate() {
            let mut config = DetectorConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn test_sections_convert() {
        let config = DetectorConfig::default();
        let params = config.plane.to_ransac_params();
        assert_eq!(params.max_iterations, 1000);
        assert_eq!(config.cluster.to_clusterer(), EuclideanClusterer::default());
    }

    proptest! {
        #[test]
        fn valid_configs_survive_yaml(
            frame_count in 1usize..100,
            voxel_size in 0.001f32..0.1,
            tolerance in 0.001f32..0.5,
            min_size in 1usize..100,
            extra in 0usize..1000,
            seed in proptest::option::of(any::<u64>()),
        ) {
            let mut config = DetectorConfig::default();
            config.aggregation.frame_count = frame_count;
            config.filter.voxel_size = voxel_size;
            config.cluster.tolerance = tolerance;
            config.cluster.min_size = min_size;
            config.cluster.max_size = min_size + extra;
            config.plane.seed = seed;
            prop_assert!(config.validate().is_ok());

            let yaml = serde_yaml::to_string(&config).unwrap();
            prop_assert_eq!(DetectorConfig::from_yaml(&yaml).unwrap(), config);
        }
    }
}
