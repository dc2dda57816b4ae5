use rand::rngs::StdRng;
use rand::SeedableRng;
use slicecast::config::{SeriesConfig, SynthesisConfig};
use slicecast::models::{Dimensions, SeriesContext};
use slicecast::synth::{boundary_radius, Region, Silhouette, VolumeSynthesizer};

fn context(config: &SynthesisConfig) -> SeriesContext {
    SeriesContext::create(&SeriesConfig::default(), config.geometry())
}

#[test]
fn test_positions_form_arithmetic_progression() {
    let config = SynthesisConfig::default();
    let synth = VolumeSynthesizer::new(config.clone());
    let ctx = context(&config);
    let normal = ctx.series.geometry.normal();
    let mut rng = StdRng::seed_from_u64(1);
    let dims = Dimensions::new(24, 24);

    let slices: Vec<_> = (1..=12)
        .map(|i| synth.build_slice(&ctx, i, 12, dims, &mut rng).unwrap())
        .collect();

    let locations: Vec<f64> = slices
        .iter()
        .map(|s| s.spatial.location_along(normal))
        .collect();
    assert!((locations[0] - config.slice_spacing).abs() < 1e-9);
    for pair in locations.windows(2) {
        assert!((pair[1] - pair[0] - config.slice_spacing).abs() < 1e-9);
    }

    // shared geometry across the sub-series
    for slice in &slices {
        assert_eq!(slice.pixels.dimensions(), dims);
        assert_eq!(slice.spatial.orientation, slices[0].spatial.orientation);
        assert_eq!(slice.spatial.pixel_spacing, slices[0].spatial.pixel_spacing);
        assert_eq!(slice.spatial.slice_thickness, config.slice_thickness);
    }
}

#[test]
fn test_every_pixel_is_in_its_band_across_the_volume() {
    let config = SynthesisConfig::default();
    let synth = VolumeSynthesizer::new(config.clone());
    let ctx = context(&config);
    let mut rng = StdRng::seed_from_u64(99);
    let dims = Dimensions::new(64, 64);
    let total = 5;

    for index in 1..=total {
        let slice = synth.build_slice(&ctx, index, total, dims, &mut rng).unwrap();
        let silhouette = Silhouette::new(&config, index, total, dims);
        for y in 0..dims.height {
            for x in 0..dims.width {
                let band = silhouette.classify(x, y).band(&config);
                assert!(band.contains(slice.pixels.get(x, y).unwrap()));
            }
        }
    }
}

#[test]
fn test_radius_is_monotonic_and_positive() {
    let config = SynthesisConfig::default();
    for dims in [Dimensions::new(512, 512), Dimensions::new(64, 48)] {
        let mut previous = 0.0;
        for index in 1..=40 {
            let radius = boundary_radius(&config, index, 40, dims);
            assert!(radius > 0.0);
            assert!(radius >= previous);
            previous = radius;
        }
    }
}

#[test]
fn test_single_slice_volume() {
    let config = SynthesisConfig::default();
    let synth = VolumeSynthesizer::new(config.clone());
    let ctx = context(&config);
    let slice = synth
        .build_slice(
            &ctx,
            1,
            1,
            Dimensions::new(64, 64),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

    let radius = boundary_radius(&config, 1, 1, Dimensions::new(64, 64));
    assert!(radius.is_finite() && radius > 0.0);
    assert_eq!(slice.ordinal, 1);
    assert_eq!(slice.spatial.position, [0.0, 0.0, config.slice_spacing]);
}

#[test]
fn test_silhouette_shows_every_region() {
    let config = SynthesisConfig::default();
    let dims = Dimensions::new(128, 128);
    let silhouette = Silhouette::new(&config, 1, 2, dims);
    let mut seen = std::collections::HashSet::new();
    for y in 0..dims.height {
        for x in 0..dims.width {
            seen.insert(silhouette.classify(x, y));
        }
    }
    for region in [Region::Background, Region::Inner, Region::Outer, Region::Structure] {
        assert!(seen.contains(&region), "{:?} missing", region);
    }
}

#[test]
fn test_jitter_keeps_band_means() {
    let config = SynthesisConfig::default();
    let synth = VolumeSynthesizer::new(config.clone());
    let ctx = context(&config);
    let dims = Dimensions::new(256, 256);
    let slice = synth
        .build_slice(&ctx, 1, 1, dims, &mut StdRng::seed_from_u64(7))
        .unwrap();
    let silhouette = Silhouette::new(&config, 1, 1, dims);

    let mut inner = Vec::new();
    for y in 0..dims.height {
        for x in 0..dims.width {
            if silhouette.classify(x, y) == Region::Inner {
                inner.push(slice.pixels.get(x, y).unwrap() as f64);
            }
        }
    }
    let mean = inner.iter().sum::<f64>() / inner.len() as f64;
    // jitter in [-50, 50) centres just below the base of -800
    assert!((mean - -800.5).abs() < 5.0, "mean {}", mean);
}
