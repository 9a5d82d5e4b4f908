use crate::{Aabb, PointXYZRGB};

/// Structure-of-arrays point cloud with optional per-point color.
///
/// `frame_id` is an opaque frame-of-reference tag carried through every
/// operation that derives a new cloud; nothing in the workspace interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub colors: Option<Colors>,
    pub frame_id: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Colors {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl Colors {
    fn with_capacity(n: usize) -> Self {
        Self {
            r: Vec::with_capacity(n),
            g: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
        }
    }

    fn len(&self) -> usize {
        self.r.len()
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            colors: None,
            frame_id: String::new(),
        }
    }

    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        Self {
            x,
            y,
            z,
            colors: None,
            frame_id: String::new(),
        }
    }

    /// Builds a colored cloud from a slice of points.
    pub fn from_points(points: &[PointXYZRGB]) -> Self {
        let mut cloud = Self {
            x: Vec::with_capacity(points.len()),
            y: Vec::with_capacity(points.len()),
            z: Vec::with_capacity(points.len()),
            colors: Some(Colors::with_capacity(points.len())),
            frame_id: String::new(),
        };
        for p in points {
            cloud.push(*p);
        }
        cloud
    }

    pub fn with_colors(mut self, colors: Colors) -> Self {
        assert_eq!(colors.len(), self.len(), "colors must match point count");
        assert_eq!(colors.r.len(), colors.g.len(), "r and g must have same length");
        assert_eq!(colors.r.len(), colors.b.len(), "r and b must have same length");
        self.colors = Some(colors);
        self
    }

    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = frame_id.into();
        self
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_xyz(&self.x, &self.y, &self.z)
    }

    pub fn point(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Color of point `i`, or black when the cloud carries no colors.
    pub fn color(&self, i: usize) -> [u8; 3] {
        match &self.colors {
            Some(c) => [c.r[i], c.g[i], c.b[i]],
            None => [0, 0, 0],
        }
    }

    pub fn point_rgb(&self, i: usize) -> PointXYZRGB {
        let [r, g, b] = self.color(i);
        PointXYZRGB {
            x: self.x[i],
            y: self.y[i],
            z: self.z[i],
            r,
            g,
            b,
        }
    }

    pub fn iter_points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Appends a point. On an empty uncolored cloud the first push decides
    /// that the cloud is colored.
    pub fn push(&mut self, p: PointXYZRGB) {
        if self.is_empty() && self.colors.is_none() {
            self.colors = Some(Colors::default());
        }
        self.x.push(p.x);
        self.y.push(p.y);
        self.z.push(p.z);
        if let Some(c) = self.colors.as_mut() {
            c.r.push(p.r);
            c.g.push(p.g);
            c.b.push(p.b);
        }
    }

    /// Appends all points of `other` after the points of `self`.
    ///
    /// Colors survive only when both clouds are colored; an empty uncolored
    /// cloud adopts the color layout of `other`. The frame tag is untouched.
    pub fn extend_from(&mut self, other: &PointCloud) {
        if self.is_empty() {
            self.colors = other.colors.as_ref().map(|_| Colors::default());
        }

        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);

        match (self.colors.as_mut(), other.colors.as_ref()) {
            (Some(c), Some(o)) => {
                c.r.extend_from_slice(&o.r);
                c.g.extend_from_slice(&o.g);
                c.b.extend_from_slice(&o.b);
            }
            (Some(_), None) => self.colors = None,
            _ => {}
        }
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        let mut x = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        let mut z = Vec::with_capacity(indices.len());

        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            x.push(self.x[idx]);
            y.push(self.y[idx]);
            z.push(self.z[idx]);
        }

        let colors = self.colors.as_ref().map(|c| Colors {
            r: indices.iter().map(|&idx| c.r[idx]).collect(),
            g: indices.iter().map(|&idx| c.g[idx]).collect(),
            b: indices.iter().map(|&idx| c.b[idx]).collect(),
        });

        Self {
            x,
            y,
            z,
            colors,
            frame_id: self.frame_id.clone(),
        }
    }

    /// Select all points NOT in the given index set.
    ///
    /// This is the complement of [`select`](Self::select). The returned cloud
    /// preserves the relative order of the retained points.
    ///
    /// # Panics
    ///
    /// Panics if any index in `indices` is out of bounds.
    pub fn select_inverse(&self, indices: &[usize]) -> Self {
        let n = self.len();
        let mut exclude = vec![false; n];
        for &idx in indices {
            assert!(idx < n, "index out of bounds in select_inverse");
            exclude[idx] = true;
        }

        let kept: Vec<usize> = (0..n).filter(|&i| !exclude[i]).collect();
        self.select(&kept)
    }

    /// Per-channel mean color, or `None` for an empty or uncolored cloud.
    pub fn mean_color(&self) -> Option<[f32; 3]> {
        let c = self.colors.as_ref()?;
        if c.r.is_empty() {
            return None;
        }
        let n = c.r.len() as f64;
        let mean = |ch: &[u8]| (ch.iter().map(|&v| v as f64).sum::<f64>() / n) as f32;
        Some([mean(&c.r), mean(&c.g), mean(&c.b)])
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}
