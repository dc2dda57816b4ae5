use serde::{Deserialize, Serialize};

use crate::config::config::ConfigError;
use crate::models::exam::AcquisitionGeometry;

/// A density value plus uniform integer jitter in `[jitter_low, jitter_high)`.
/// Equal bounds mean no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityBand {
    pub base: i16,
    pub jitter_low: i16,
    pub jitter_high: i16,
}

impl DensityBand {
    pub const fn new(base: i16, jitter_low: i16, jitter_high: i16) -> Self {
        Self {
            base,
            jitter_low,
            jitter_high,
        }
    }

    pub const fn constant(base: i16) -> Self {
        Self::new(base, 0, 0)
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter_high > self.jitter_low
    }

    /// Lowest value the band can produce
    pub fn min(&self) -> i32 {
        if self.has_jitter() {
            self.base as i32 + self.jitter_low as i32
        } else {
            self.base as i32
        }
    }

    /// Highest value the band can produce
    pub fn max(&self) -> i32 {
        if self.has_jitter() {
            self.base as i32 + self.jitter_high as i32 - 1
        } else {
            self.base as i32
        }
    }

    pub fn contains(&self, value: i16) -> bool {
        (self.min()..=self.max()).contains(&(value as i32))
    }
}

/// Procedural rules for the synthetic volume.
///
/// Radii are fractions of half the smaller grid extent, so the same settings
/// give the same silhouette at 64×64 and at 512×512.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Fixed seed for reproducible jitter; entropy when absent
    pub seed: Option<u64>,
    /// Outside the body boundary (air)
    pub background: DensityBand,
    /// Inner region (lung)
    pub inner: DensityBand,
    /// Ring between inner region and boundary (chest wall)
    pub outer: DensityBand,
    /// High-density disks (ribs)
    pub structure: DensityBand,
    /// Body radius at the first slice
    pub base_radius_fraction: f64,
    /// Body radius at the last slice
    pub max_radius_fraction: f64,
    /// Inner radius as a ratio of the body radius
    pub inner_radius_ratio: f64,
    pub structure_count: u32,
    /// Distance of structure centres from the grid centre, as a ratio of the body radius
    pub structure_radial_ratio: f64,
    pub structure_radius_fraction: f64,
    /// Row spacing, column spacing (mm)
    pub pixel_spacing: [f64; 2],
    pub slice_thickness: f64,
    pub slice_spacing: f64,
}

impl SynthesisConfig {
    /// Axial acquisition geometry shared by every slice of a run
    pub fn geometry(&self) -> AcquisitionGeometry {
        AcquisitionGeometry {
            orientation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            pixel_spacing: self.pixel_spacing,
            slice_thickness: self.slice_thickness,
            slice_spacing: self.slice_spacing,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSynthesis { reason };

        for (name, band) in [
            ("background", &self.background),
            ("inner", &self.inner),
            ("outer", &self.outer),
            ("structure", &self.structure),
        ] {
            if band.jitter_low > band.jitter_high {
                return Err(invalid(format!("{} jitter range is inverted", name)));
            }
            // stored samples are offset by the 1024 rescale intercept
            if band.min() < i16::MIN as i32 || band.max() > i16::MAX as i32 - 1024 {
                return Err(invalid(format!(
                    "{} band does not fit the stored sample range",
                    name
                )));
            }
        }

        if !(self.base_radius_fraction > 0.0) {
            return Err(invalid("base_radius_fraction must be positive".into()));
        }
        if self.max_radius_fraction < self.base_radius_fraction {
            return Err(invalid(
                "max_radius_fraction must not be smaller than base_radius_fraction".into(),
            ));
        }
        if !(self.inner_radius_ratio > 0.0 && self.inner_radius_ratio < 1.0) {
            return Err(invalid("inner_radius_ratio must be within (0, 1)".into()));
        }
        if !(self.structure_radial_ratio >= 0.0 && self.structure_radial_ratio <= 1.0) {
            return Err(invalid("structure_radial_ratio must be within [0, 1]".into()));
        }
        if !(self.structure_radius_fraction > 0.0) {
            return Err(invalid("structure_radius_fraction must be positive".into()));
        }
        if !(self.pixel_spacing[0] > 0.0 && self.pixel_spacing[1] > 0.0) {
            return Err(invalid("pixel_spacing must be positive".into()));
        }
        if !(self.slice_thickness > 0.0 && self.slice_spacing > 0.0) {
            return Err(invalid(
                "slice_thickness and slice_spacing must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            seed: None,
            background: DensityBand::constant(-1000),
            inner: DensityBand::new(-800, -50, 50),
            outer: DensityBand::new(50, -50, 150),
            structure: DensityBand::new(500, -100, 300),
            // 150 and 200 pixels at 512×512
            base_radius_fraction: 150.0 / 256.0,
            max_radius_fraction: 200.0 / 256.0,
            inner_radius_ratio: 0.7,
            structure_count: 6,
            structure_radial_ratio: 0.85,
            // 10 pixels at 512×512
            structure_radius_fraction: 10.0 / 256.0,
            pixel_spacing: [0.7, 0.7],
            slice_thickness: 2.0,
            slice_spacing: 2.0,
        }
    }
}
