//! Procedural volume synthesis
//!
//! Builds one axial cross-section at a time. Each slice is a disk-shaped body
//! whose radius grows with the slice index, split into an inner low-density
//! region and an outer ring, with a ring of small dense disks placed at equal
//! angles. Consecutive slices therefore stack into a flaring cylinder with
//! rib-like columns, which is enough for a viewer's 3D reconstruction to show
//! a coherent volume.

mod silhouette;

use rand::Rng;
use thiserror::Error;
use tracing::trace;

use crate::config::{DensityBand, SynthesisConfig};
use crate::models::exam::SeriesContext;
use crate::models::identity::Uid;
use crate::models::slice::{Dimensions, PixelGrid, Slice, SpatialMetadata};

pub use silhouette::{boundary_radius, Region, Silhouette};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("slice index {index} outside 1..={total}")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("slice dimensions {0} are empty")]
    EmptyDimensions(Dimensions),
}

pub struct VolumeSynthesizer {
    config: SynthesisConfig,
}

impl VolumeSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Build slice `index` (1-based) of a `total`-slice series.
    ///
    /// Pixel jitter is drawn from `rng`, one independent draw per pixel, so a
    /// seeded generator reproduces the exact same grid.
    pub fn build_slice<R: Rng + ?Sized>(
        &self,
        context: &SeriesContext,
        index: u32,
        total: u32,
        dims: Dimensions,
        rng: &mut R,
    ) -> Result<Slice, SynthesisError> {
        if index == 0 || index > total {
            return Err(SynthesisError::IndexOutOfRange { index, total });
        }
        if dims.is_empty() {
            return Err(SynthesisError::EmptyDimensions(dims));
        }

        let silhouette = Silhouette::new(&self.config, index, total, dims);
        trace!(
            index,
            total,
            radius = silhouette.body_radius(),
            center = ?silhouette.center(),
            structures = silhouette.structure_centers().len(),
            "synthesizing slice"
        );

        let mut values = Vec::with_capacity(dims.pixel_count());
        for y in 0..dims.height {
            for x in 0..dims.width {
                let band = silhouette.classify(x, y).band(&self.config);
                values.push(sample(&band, rng));
            }
        }

        Ok(Slice {
            instance_uid: Uid::generate(),
            ordinal: index,
            pixels: PixelGrid::from_values(dims, values),
            spatial: self.spatial_metadata(context, index),
        })
    }

    /// Position is `index × spacing` along the plane normal, so consecutive
    /// slices are exactly one spacing apart.
    pub fn spatial_metadata(&self, context: &SeriesContext, index: u32) -> SpatialMetadata {
        let geometry = &context.series.geometry;
        let normal = geometry.normal();
        let offset = index as f64 * geometry.slice_spacing;
        SpatialMetadata {
            position: [normal[0] * offset, normal[1] * offset, normal[2] * offset],
            orientation: geometry.orientation,
            pixel_spacing: geometry.pixel_spacing,
            slice_thickness: geometry.slice_thickness,
        }
    }
}

fn sample<R: Rng + ?Sized>(band: &DensityBand, rng: &mut R) -> i16 {
    if !band.has_jitter() {
        return band.base;
    }
    let jitter = rng.gen_range(band.jitter_low..band.jitter_high);
    // validated to fit when the configuration was loaded
    (band.base as i32 + jitter as i32) as i16
}
