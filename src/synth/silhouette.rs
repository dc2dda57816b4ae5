use crate::config::{DensityBand, SynthesisConfig};
use crate::models::slice::Dimensions;

/// Tissue class of a pixel, decided purely by distance thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Background,
    Inner,
    Outer,
    Structure,
}

impl Region {
    pub fn band(&self, config: &SynthesisConfig) -> DensityBand {
        match self {
            Region::Background => config.background,
            Region::Inner => config.inner,
            Region::Outer => config.outer,
            Region::Structure => config.structure,
        }
    }
}

/// Body boundary radius in pixels for slice `index` of `total`.
///
/// Interpolates linearly from the base to the max radius over the series, so
/// the radius never decreases with the index. A single-slice series sits
/// halfway between the two.
pub fn boundary_radius(config: &SynthesisConfig, index: u32, total: u32, dims: Dimensions) -> f64 {
    let t = if total <= 1 {
        0.5
    } else {
        (index.saturating_sub(1)) as f64 / (total - 1) as f64
    };
    let fraction = config.base_radius_fraction
        + t.clamp(0.0, 1.0) * (config.max_radius_fraction - config.base_radius_fraction);
    half_extent(dims) * fraction
}

fn half_extent(dims: Dimensions) -> f64 {
    dims.width.min(dims.height) as f64 / 2.0
}

/// Concentric regions plus a ring of equally spaced dense disks
#[derive(Debug, Clone)]
pub struct Silhouette {
    center: (f64, f64),
    body_radius: f64,
    inner_radius: f64,
    structure_radius: f64,
    structures: Vec<(f64, f64)>,
}

impl Silhouette {
    pub fn new(config: &SynthesisConfig, index: u32, total: u32, dims: Dimensions) -> Self {
        let center = ((dims.width / 2) as f64, (dims.height / 2) as f64);
        let body_radius = boundary_radius(config, index, total, dims);
        let inner_radius = body_radius * config.inner_radius_ratio;
        let structure_radius = (half_extent(dims) * config.structure_radius_fraction).max(1.0);

        let ring = body_radius * config.structure_radial_ratio;
        let count = config.structure_count;
        let structures = (0..count)
            .map(|i| {
                let angle = i as f64 / count as f64 * std::f64::consts::TAU;
                // centres snap to whole pixels, truncating toward the centre
                (
                    center.0 + (ring * angle.cos()).trunc(),
                    center.1 + (ring * angle.sin()).trunc(),
                )
            })
            .collect();

        Self {
            center,
            body_radius,
            inner_radius,
            structure_radius,
            structures,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn body_radius(&self) -> f64 {
        self.body_radius
    }

    pub fn structure_centers(&self) -> &[(f64, f64)] {
        &self.structures
    }

    /// Structures only exist inside the body; inside it they override the
    /// inner/outer classification.
    pub fn classify(&self, x: u32, y: u32) -> Region {
        let (px, py) = (x as f64, y as f64);
        let d2 = distance_sq((px, py), self.center);
        if d2 > self.body_radius * self.body_radius {
            return Region::Background;
        }
        let r2 = self.structure_radius * self.structure_radius;
        if self
            .structures
            .iter()
            .any(|&centre| distance_sq((px, py), centre) <= r2)
        {
            return Region::Structure;
        }
        if d2 <= self.inner_radius * self.inner_radius {
            Region::Inner
        } else {
            Region::Outer
        }
    }
}

fn distance_sq(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}
