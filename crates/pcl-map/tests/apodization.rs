use pcl_core::PclError;
use pcl_map::{
    build_window, disc_mask, ApodizationConfig, ApodizationKind, Map, Pixelization,
};

fn disc(nside: usize, radius_deg: f64) -> Map {
    disc_mask(Pixelization::healpix(nside).unwrap(), 0.0, 0.0, radius_deg)
}

#[test]
fn c1_window_is_one_deep_inside_and_zero_outside() {
    let mask = disc(32, 20.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::C1,
        radius_deg: 5.0,
    };
    let apodized = build_window(&mask, &config).unwrap();
    assert!(apodized.warnings.is_empty());
    let values = apodized.window.values();
    let mut interior = 0;
    for (binary, w) in mask.component(0).iter().zip(values) {
        assert!((0.0..=1.0).contains(w));
        if *binary == 0.0 {
            assert_eq!(*w, 0.0);
        }
        if *w == 1.0 {
            interior += 1;
        }
    }
    assert!(interior > 0);
    let centre = pcl_map::query_disc(
        mask.pixelization(),
        pcl_map::lonlat_to_vector(0.0, 0.0),
        2f64.to_radians(),
    );
    assert!(centre.iter().all(|pixel| values[*pixel] == 1.0));
}

#[test]
fn c2_tapers_less_aggressively_than_binary() {
    let mask = disc(16, 25.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::C2,
        radius_deg: 8.0,
    };
    let window = build_window(&mask, &config).unwrap().window;
    let binary_sum: f64 = mask.component(0).iter().sum();
    let window_sum: f64 = window.values().iter().sum();
    assert!(window_sum < binary_sum);
    assert!(window_sum > 0.2 * binary_sum);
}

#[test]
fn oversized_radius_returns_zero_window_with_warning() {
    let mask = disc(16, 10.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::C1,
        radius_deg: 20.0,
    };
    let apodized = build_window(&mask, &config).unwrap();
    assert!(apodized.window.is_zero());
    assert_eq!(apodized.warnings.len(), 1);
    assert_eq!(apodized.warnings[0].code, "apodization-exceeds-region");
}

#[test]
fn empty_mask_is_degenerate() {
    let pix = Pixelization::healpix(4).unwrap();
    let mask = Map::zeros(pix, 1).unwrap();
    let config = ApodizationConfig {
        kind: ApodizationKind::C2,
        radius_deg: 1.0,
    };
    let err = build_window(&mask, &config).unwrap_err();
    assert!(matches!(err, PclError::Degenerate(_)));
    assert_eq!(err.info().code, "empty-mask");
}

#[test]
fn rectangle_ramps_follow_patch_edges() {
    let pix = Pixelization::car(-10.0, 10.0, -5.0, 5.0, 30.0).unwrap();
    let mask = Map::from_fn(pix, |_, _| 1.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::Rectangle,
        radius_deg: 2.0,
    };
    let window = build_window(&mask, &config).unwrap().window;
    let values = window.values();
    let nx = 40;
    assert_eq!(values.len(), 20 * nx);
    assert_eq!(values[10 * nx + 20], 1.0);
    assert_eq!(values[0], 0.0);
    assert_eq!(values[10 * nx], 0.0);
    assert!(values[10 * nx + 2] > 0.0 && values[10 * nx + 2] < 1.0);
    for row in 0..20 {
        for col in 0..nx {
            let mirrored = values[row * nx + (nx - 1 - col)];
            assert!((values[row * nx + col] - mirrored).abs() < 1e-15);
        }
    }
}

#[test]
fn rectangle_wider_than_patch_warns() {
    let pix = Pixelization::car(-10.0, 10.0, -5.0, 5.0, 30.0).unwrap();
    let mask = Map::from_fn(pix, |_, _| 1.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::Rectangle,
        radius_deg: 6.0,
    };
    let apodized = build_window(&mask, &config).unwrap();
    assert!(apodized.window.is_zero());
    assert_eq!(apodized.warnings[0].code, "apodization-exceeds-region");
}

#[test]
fn rectangle_requires_car() {
    let mask = disc(8, 30.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::Rectangle,
        radius_deg: 1.0,
    };
    let err = build_window(&mask, &config).unwrap_err();
    assert!(matches!(err, PclError::Geometry(_)));
}
