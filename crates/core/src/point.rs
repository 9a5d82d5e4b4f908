/// A single colored measurement as delivered by an RGB-D sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXYZRGB {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PointXYZRGB {
    pub fn new(position: [f32; 3], color: [u8; 3]) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            r: color[0],
            g: color[1],
            b: color[2],
        }
    }

    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
