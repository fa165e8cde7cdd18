use pcl_core::{PclError, RngHandle};
use pcl_kspace::{kspace_filter, KspaceFilter, KspaceMask};
use pcl_map::{Map, Pixelization};
use proptest::prelude::*;
use rand::Rng;

/// 10 x 10 degree patch at 10 arcmin: 60 x 60 pixels, lx step of about 36.
fn patch() -> Pixelization {
    Pixelization::car(-5.0, 5.0, -5.0, 5.0, 10.0).unwrap()
}

fn noise_map(seed: u64, ncomp: usize) -> Map {
    let pix = patch();
    let mut rng = RngHandle::from_seed(seed);
    let components = (0..ncomp)
        .map(|_| (0..pix.npix()).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    Map::from_components(pix, components).unwrap()
}

fn stripes(cycles_x: f64, cycles_y: f64) -> Map {
    let pix = patch();
    let Pixelization::Car(car) = pix else { unreachable!() };
    let (ny, nx) = (car.ny(), car.nx());
    let values = (0..ny * nx)
        .map(|p| {
            let (i, j) = ((p / nx) as f64, (p % nx) as f64);
            (2.0 * std::f64::consts::PI * (cycles_x * j / nx as f64 + cycles_y * i / ny as f64)).cos()
        })
        .collect();
    Map::from_components(pix, vec![values]).unwrap()
}

fn max_diff(a: &Map, b: &Map) -> f64 {
    a.components()
        .iter()
        .flatten()
        .zip(b.components().iter().flatten())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn vertical() -> KspaceMask {
    KspaceMask {
        vk_mask: Some([-90.0, 90.0]),
        hk_mask: None,
    }
}

#[test]
fn low_lx_stripes_are_removed_and_fine_ones_kept() {
    let coarse = stripes(1.0, 0.0);
    let filtered = kspace_filter(&coarse, &vertical()).unwrap();
    assert!(filtered.component(0).iter().all(|v| v.abs() < 1e-12));

    let fine = stripes(10.0, 0.0);
    let filtered = kspace_filter(&fine, &vertical()).unwrap();
    assert!(max_diff(&filtered, &fine) < 1e-12);

    // Horizontal stripes have lx = 0 and are removed by the vertical mask as well.
    let rows = stripes(0.0, 4.0);
    let filtered = kspace_filter(&rows, &vertical()).unwrap();
    assert!(filtered.component(0).iter().all(|v| v.abs() < 1e-12));
}

#[test]
fn hk_mask_acts_on_rows() {
    let mask = KspaceMask {
        vk_mask: None,
        hk_mask: Some([100.0, 200.0]),
    };
    let targeted = stripes(0.0, 4.0);
    let filtered = kspace_filter(&targeted, &mask).unwrap();
    assert!(filtered.component(0).iter().all(|v| v.abs() < 1e-12));
    let spared = stripes(3.0, 0.0);
    assert!(max_diff(&kspace_filter(&spared, &mask).unwrap(), &spared) < 1e-12);
}

#[test]
fn out_of_range_masks_are_no_ops() {
    let map = noise_map(3, 3);
    let mask = KspaceMask {
        vk_mask: Some([5_000.0, 6_000.0]),
        hk_mask: Some([10.0, -10.0]),
    };
    assert_eq!(kspace_filter(&map, &mask).unwrap(), map);
    assert_eq!(kspace_filter(&map, &KspaceMask::default()).unwrap(), map);
}

#[test]
fn mirrored_ranges_zero_the_same_modes() {
    let map = noise_map(4, 1);
    let left = KspaceMask {
        vk_mask: Some([-200.0, 50.0]),
        hk_mask: None,
    };
    let right = KspaceMask {
        vk_mask: Some([-50.0, 200.0]),
        hk_mask: None,
    };
    let a = kspace_filter(&map, &left).unwrap();
    let b = kspace_filter(&map, &right).unwrap();
    assert!(max_diff(&a, &b) < 1e-12);
}

#[test]
fn healpix_maps_are_rejected() {
    let map = Map::zeros(Pixelization::healpix(4).unwrap(), 1).unwrap();
    let err = kspace_filter(&map, &vertical()).unwrap_err();
    assert!(matches!(err, PclError::Geometry(_)));

    let filter = KspaceFilter::new(&patch(), &vertical()).unwrap();
    let other = Map::zeros(Pixelization::car(0.0, 4.0, 0.0, 4.0, 10.0).unwrap(), 1).unwrap();
    assert_eq!(filter.apply(&other).unwrap_err().info().code, "kspace-geometry");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn filtering_is_idempotent_and_linear(seed in any::<u64>(), lo in -400.0f64..0.0, width in 0.0f64..500.0) {
        let mask = KspaceMask { vk_mask: Some([lo, lo + width]), hk_mask: Some([-60.0, 60.0]) };
        let filter = KspaceFilter::new(&patch(), &mask).unwrap();
        let a = noise_map(seed, 3);
        let b = noise_map(seed.wrapping_add(1), 3);

        let once = filter.apply(&a).unwrap();
        let twice = filter.apply(&once).unwrap();
        prop_assert!(max_diff(&once, &twice) < 1e-12);

        let sum = Map::from_components(
            patch(),
            a.components().iter().zip(b.components()).map(|(x, y)| x.iter().zip(y).map(|(p, q)| p + q).collect()).collect(),
        ).unwrap();
        let filtered_sum = filter.apply(&sum).unwrap();
        let fb = filter.apply(&b).unwrap();
        let summed = Map::from_components(
            patch(),
            once.components().iter().zip(fb.components()).map(|(x, y)| x.iter().zip(y).map(|(p, q)| p + q).collect()).collect(),
        ).unwrap();
        prop_assert!(max_diff(&filtered_sum, &summed) < 1e-12);
    }
}
