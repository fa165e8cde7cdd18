#![allow(dead_code)]

use num_complex::Complex64;
use pcl_core::{PclError, RngHandle};
use pcl_map::{build_window, disc_mask, ApodizationConfig, ApodizationKind, Map, Pixelization, WindowPair};
use pcl_mcm::{BinningScheme, CouplingConfig};
use pcl_sht::{Alm, HarmonicTransform, Spin};
use rand::Rng;

pub const NSIDE: usize = 8;
pub const LMAX: usize = 12;

pub fn pixelization() -> Pixelization {
    Pixelization::healpix(NSIDE).unwrap()
}

pub fn masked_windows(lat_deg: f64) -> WindowPair {
    let mask = disc_mask(pixelization(), 0.0, lat_deg, 70.0);
    let config = ApodizationConfig {
        kind: ApodizationKind::C1,
        radius_deg: 15.0,
    };
    WindowPair::same(build_window(&mask, &config).unwrap().window)
}

pub fn binning() -> BinningScheme {
    BinningScheme::uniform(3, 4).unwrap()
}

pub fn coupling_config() -> CouplingConfig {
    let mut config = CouplingConfig::new(LMAX);
    config.l3_pad = 4;
    config
}

pub fn random_alm(lmax: usize, lmin: usize, rng: &mut RngHandle) -> Alm {
    let mut alm = Alm::zeros(lmax);
    for m in 0..=lmax {
        for l in m.max(lmin)..=lmax {
            let re = rng.gen_range(-1.0..1.0);
            let im = if m == 0 { 0.0 } else { rng.gen_range(-1.0..1.0) };
            alm.set(l, m, Complex64::new(re, im));
        }
    }
    alm
}

/// Band-limited (T, Q, U) realization.
pub fn sky(rng: &mut RngHandle) -> Result<Map, PclError> {
    let pix = pixelization();
    let sht = HarmonicTransform::new(&pix, LMAX)?;
    let t = sht.alm2map(&random_alm(LMAX, 0, rng))?;
    let [q, u] = sht.alm2map_spin(Spin::Two, &random_alm(LMAX, 2, rng), &random_alm(LMAX, 2, rng))?;
    Map::from_components(pix, vec![t, q, u])
}
