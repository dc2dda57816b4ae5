use serde::{Deserialize, Serialize};

use crate::models::identity::Uid;

/// Width × height of a slice in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major grid of signed density values (Hounsfield-like units)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    dimensions: Dimensions,
    values: Vec<i16>,
}

impl PixelGrid {
    /// Grid filled with a single value
    pub fn filled(dimensions: Dimensions, value: i16) -> Self {
        Self {
            dimensions,
            values: vec![value; dimensions.pixel_count()],
        }
    }

    /// Wraps existing values. The length is not checked here; the encoder
    /// rejects grids whose length disagrees with their declared dimensions.
    pub fn from_values(dimensions: Dimensions, values: Vec<i16>) -> Self {
        Self { dimensions, values }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn values(&self) -> &[i16] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> Option<i16> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        self.values
            .get(y as usize * self.dimensions.width as usize + x as usize)
            .copied()
    }

    pub fn set(&mut self, x: u32, y: u32, value: i16) {
        if x < self.dimensions.width && y < self.dimensions.height {
            let idx = y as usize * self.dimensions.width as usize + x as usize;
            if let Some(slot) = self.values.get_mut(idx) {
                *slot = value;
            }
        }
    }

    /// Lowest and highest value, `None` for an empty grid
    pub fn value_range(&self) -> Option<(i16, i16)> {
        let min = *self.values.iter().min()?;
        let max = *self.values.iter().max()?;
        Some((min, max))
    }
}

/// Where a slice sits in patient space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialMetadata {
    /// Image Position (Patient) of the first transmitted pixel (mm)
    pub position: [f64; 3],
    /// Row and column direction cosines
    pub orientation: [[f64; 3]; 2],
    /// Row spacing, column spacing (mm)
    pub pixel_spacing: [f64; 2],
    pub slice_thickness: f64,
}

impl SpatialMetadata {
    /// Signed distance of the position along `normal`
    pub fn location_along(&self, normal: [f64; 3]) -> f64 {
        self.position[0] * normal[0] + self.position[1] * normal[1] + self.position[2] * normal[2]
    }
}

/// One synthesized cross-section, consumed once by the encoder
#[derive(Debug, Clone)]
pub struct Slice {
    pub instance_uid: Uid,
    /// Position in the sub-series, 1-based
    pub ordinal: u32,
    pub pixels: PixelGrid,
    pub spatial: SpatialMetadata,
}
