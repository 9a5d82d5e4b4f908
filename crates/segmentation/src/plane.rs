/// Offsets added to the fitted `(a, b, c, d)` to build the acceptance and
/// crop heuristic. Calibrated for one camera mount; see [`AdjustedPlane`].
pub const DEFAULT_PLANE_OFFSETS: [f32; 4] = [0.1, 0.5, 0.1, 0.0];

/// A 3D plane model in the form `n . x + d = 0`, where `n` is a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneModel {
    pub normal: [f32; 3],
    pub d: f32,
}

impl PlaneModel {
    /// Builds a model from implicit coefficients, normalizing `(a, b, c)`.
    ///
    /// Returns `None` when the normal is degenerate.
    pub fn from_coefficients(coefficients: [f32; 4]) -> Option<Self> {
        let [a, b, c, d] = coefficients;
        let len = (a * a + b * b + c * c).sqrt();
        if !len.is_finite() || len < 1e-10 {
            return None;
        }
        Some(Self {
            normal: [a / len, b / len, c / len],
            d: d / len,
        })
    }

    /// The implicit coefficients `[a, b, c, d]`.
    pub fn coefficients(&self) -> [f32; 4] {
        [self.normal[0], self.normal[1], self.normal[2], self.d]
    }

    #[inline]
    pub fn signed_distance(&self, point: &[f32; 3]) -> f32 {
        self.normal[0] * point[0] + self.normal[1] * point[1] + self.normal[2] * point[2] + self.d
    }

    /// Computes the absolute distance from a point to this plane.
    /// Assumes `normal` is a unit vector.
    #[inline]
    pub fn distance_to_point(&self, point: &[f32; 3]) -> f32 {
        self.signed_distance(point).abs()
    }

    /// Flips the model so that the normal points away from the origin
    /// (`d <= 0`). Fitted planes are always returned in this form, which for
    /// a table in front of the camera gives `c > 0` and a crop box that
    /// extends into positive depth.
    pub fn oriented_away_from_origin(self) -> Self {
        if self.d > 0.0 {
            Self {
                normal: [-self.normal[0], -self.normal[1], -self.normal[2]],
                d: -self.d,
            }
        } else {
            self
        }
    }

    /// Adds `offsets` component-wise to the coefficients without
    /// renormalizing.
    pub fn adjusted(&self, offsets: [f32; 4]) -> AdjustedPlane {
        let c = self.coefficients();
        AdjustedPlane {
            coefficients: [
                c[0] + offsets[0],
                c[1] + offsets[1],
                c[2] + offsets[2],
                c[3] + offsets[3],
            ],
        }
    }
}

impl Default for PlaneModel {
    fn default() -> Self {
        Self {
            normal: [0.0, 0.0, 1.0],
            d: 0.0,
        }
    }
}

/// Fitted coefficients shifted by empirical offsets.
///
/// This is not a geometric plane: `(a, b, c)` is not unit length and the
/// distance below is the raw residual `|a x + b y + c z + d|`. It serves two
/// heuristics, the cluster acceptance test and the plane crop box whose
/// upper corner is `(a, b, c)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedPlane {
    pub coefficients: [f32; 4],
}

impl AdjustedPlane {
    #[inline]
    pub fn distance_to_point(&self, point: &[f32; 3]) -> f32 {
        let [a, b, c, d] = self.coefficients;
        (a * point[0] + b * point[1] + c * point[2] + d).abs()
    }

    /// Crop box `(min, max)`: the origin and the first three coefficients.
    pub fn crop_bounds(&self) -> ([f32; 3], [f32; 3]) {
        let [a, b, c, _] = self.coefficients;
        ([0.0; 3], [a, b, c])
    }
}
