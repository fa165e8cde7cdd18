#![allow(dead_code)]

use num_complex::Complex64;
use pcl_core::RngHandle;
use pcl_sht::Alm;
use rand::Rng;

/// Uniform random coefficients for `lmin <= l <= lmax`, real at `m = 0`.
pub fn random_alm(lmax: usize, lmin: usize, seed: u64) -> Alm {
    let mut rng = RngHandle::from_seed(seed);
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

pub fn max_abs_diff(a: &Alm, b: &Alm) -> f64 {
    a.coeffs()
        .iter()
        .zip(b.coeffs())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}
