use std::fmt;
use std::str::FromStr;

use tabletop_core::PointCloud;

/// Coordinate axis selected by the range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    #[inline]
    fn values(self, cloud: &PointCloud) -> &[f32] {
        match self {
            Axis::X => &cloud.x,
            Axis::Y => &cloud.y,
            Axis::Z => &cloud.z,
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(format!("axis must be one of x/y/z, got {other:?}")),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// Keeps the points whose `axis` coordinate lies in `[min, max]`.
///
/// Non-finite coordinates never pass. Retained points keep their order,
/// colors and the frame tag.
pub fn passthrough_filter(cloud: &PointCloud, axis: Axis, min: f32, max: f32) -> PointCloud {
    let keep: Vec<usize> = axis
        .values(cloud)
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && **v >= min && **v <= max)
        .map(|(i, _)| i)
        .collect();

    cloud.select(&keep)
}
