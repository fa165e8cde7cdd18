//! Window power spectra and the unbinned mode-coupling matrices.
//!
//! For pseudo multipole `ℓ1` (row) and true multipole `ℓ2` (column),
//! `M_{ℓ1ℓ2} = (2ℓ2+1)/(4π) · b_{ℓ2} · Σ_{ℓ3} (2ℓ3+1) W_{ℓ3} K(ℓ1, ℓ2, ℓ3)`
//! with rows and columns running over `ℓ = 2..=lmax`.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::Instant;

use nalgebra::DMatrix;
use pcl_core::errors::{ErrorInfo, PclError};
use pcl_map::{Window, WindowPair};
use pcl_sht::{cross_power, Alm, HarmonicTransform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CouplingConfig;
use crate::wigner::{wigner3j_family, Wigner3jFamily};

/// Cross power spectra of the window products entering each block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpectra {
    /// Band limit of the spectra.
    pub lmax: usize,
    /// Spin-0 window of field 1 x spin-0 window of field 2.
    pub w00: Vec<f64>,
    /// Spin-0 window of field 1 x spin-2 window of field 2.
    pub w02: Vec<f64>,
    /// Spin-2 window of field 1 x spin-0 window of field 2.
    pub w20: Vec<f64>,
    /// Spin-2 window of field 1 x spin-2 window of field 2.
    pub w22: Vec<f64>,
}

/// Angular cross spectra of the windows of two fields up to `lmax_w`.
pub fn window_power_spectra(
    first: &WindowPair,
    second: &WindowPair,
    lmax_w: usize,
    niter: usize,
) -> Result<WindowSpectra, PclError> {
    first.pixelization().ensure_same(second.pixelization())?;
    let sht = HarmonicTransform::new(first.pixelization(), lmax_w)?;
    let mut cache: HashMap<String, Alm> = HashMap::new();
    let mut alm_of = |window: &Window| -> Result<Alm, PclError> {
        let hash = window.content_hash();
        if let Some(alm) = cache.get(&hash) {
            return Ok(alm.clone());
        }
        let alm = sht.map2alm_iter(window.values(), niter)?;
        cache.insert(hash, alm.clone());
        Ok(alm)
    };
    let a0 = alm_of(first.spin0())?;
    let a2 = alm_of(first.spin2())?;
    let b0 = alm_of(second.spin0())?;
    let b2 = alm_of(second.spin2())?;
    Ok(WindowSpectra {
        lmax: lmax_w,
        w00: cross_power(&a0, &b0)?,
        w02: cross_power(&a0, &b2)?,
        w20: cross_power(&a2, &b0)?,
        w22: cross_power(&a2, &b2)?,
    })
}

/// Unbinned coupling blocks indexed by `ℓ - 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrices {
    /// Band limit.
    pub lmax: usize,
    /// Spin-0 x spin-0.
    pub m00: DMatrix<f64>,
    /// Spin-0 x spin-2 (TE, TB) when polarization is requested.
    pub m02: Option<DMatrix<f64>>,
    /// Spin-2 x spin-0 (ET, BT) when polarization is requested.
    pub m20: Option<DMatrix<f64>>,
    /// Spin-2 parity-even block (EE->EE, BB->BB).
    pub mpp: Option<DMatrix<f64>>,
    /// Spin-2 parity-odd block (EE<->BB mixing).
    pub mmm: Option<DMatrix<f64>>,
}

struct Families {
    f00: Wigner3jFamily,
    f22: Wigner3jFamily,
    pure: Option<(Wigner3jFamily, Wigner3jFamily)>,
}

impl Families {
    fn new(l1: usize, l2: usize, polarized: bool, pure: bool) -> Self {
        let (f22, pure) = if polarized {
            // Window derivatives enter through the spin-1 and spin-0 transforms at `ℓ1`.
            let pure =
                pure.then(|| (wigner3j_family(l2, l1, 2, -1), wigner3j_family(l2, l1, 2, 0)));
            (wigner3j_family(l1, l2, 2, -2), pure)
        } else {
            (Wigner3jFamily::empty(), None)
        };
        Self {
            f00: wigner3j_family(l1, l2, 0, 0),
            f22,
            pure,
        }
    }

    /// Spin-2 kernel at `ℓ3`, including the window-derivative terms in pure mode.
    ///
    /// The derivative terms carry the filters the purified analysis applies
    /// at the pseudo multipole `l1`.
    fn spin2(&self, l1: usize, l3: usize) -> f64 {
        let base = self.f22.get(l3);
        match &self.pure {
            None => base,
            Some((f21, f20)) => {
                let (l1f, l3f) = (l1 as f64, l3 as f64);
                let c1 = 2.0 * ((l3f + 1.0) * l3f / ((l1f + 2.0) * (l1f - 1.0))).sqrt();
                let c2 = ((l3f + 2.0) * (l3f + 1.0) * l3f * (l3f - 1.0).max(0.0)
                    / ((l1f + 2.0) * (l1f + 1.0) * l1f * (l1f - 1.0)))
                    .sqrt();
                base + c1 * f21.get(l3) + c2 * f20.get(l3)
            }
        }
    }
}

#[derive(Default)]
struct RowSums {
    s00: f64,
    s02: f64,
    s20: f64,
    spp: f64,
    smm: f64,
}

fn row_sums(l1: usize, l2: usize, spectra: &WindowSpectra, polarized: bool, pure: bool) -> RowSums {
    let families = Families::new(l1, l2, polarized, pure);
    let lo = l1.abs_diff(l2);
    let hi = (l1 + l2).min(spectra.lmax);
    let mut sums = RowSums::default();
    for l3 in lo..=hi {
        let weight = (2 * l3 + 1) as f64;
        let w000 = families.f00.get(l3);
        sums.s00 += weight * spectra.w00[l3] * w000 * w000;
        if polarized {
            let k2 = families.spin2(l1, l3);
            sums.s02 += weight * spectra.w02[l3] * w000 * k2;
            sums.s20 += weight * spectra.w20[l3] * w000 * k2;
            let k22 = weight * spectra.w22[l3] * k2 * k2;
            if (l1 + l2 + l3) % 2 == 0 {
                sums.spp += k22;
            } else {
                sums.smm += k22;
            }
        }
    }
    sums
}

/// Builds the unbinned coupling blocks from window spectra.
pub fn coupling_matrices(spectra: &WindowSpectra, config: &CouplingConfig) -> Result<CouplingMatrices, PclError> {
    config.validate()?;
    let started = Instant::now();
    let lmax = config.lmax;
    let polarized = !config.spin0_only;
    let mut needed = vec![("w00", &spectra.w00)];
    if polarized {
        needed.extend([("w02", &spectra.w02), ("w20", &spectra.w20), ("w22", &spectra.w22)]);
    }
    for (name, values) in needed {
        if values.len() <= spectra.lmax {
            return Err(PclError::Config(
                ErrorInfo::new("window-spectra-length", "window spectrum must cover 0..=lmax")
                    .with_context("spectrum", name)
                    .with_context("len", values.len())
                    .with_context("lmax", spectra.lmax),
            ));
        }
    }
    let nl = lmax - 1;
    let pure = config.mode.is_pure();
    let beam = config.beam_product();

    let rows: Vec<Vec<RowSums>> = (2..=lmax)
        .into_par_iter()
        .map(|l1| {
            // Standard kernels are symmetric in (ℓ1, ℓ2); fill the upper triangle only.
            let first = if pure { 2 } else { l1 };
            (first..=lmax)
                .map(|l2| row_sums(l1, l2, spectra, polarized, pure))
                .collect()
        })
        .collect();

    let mut m00 = DMatrix::zeros(nl, nl);
    let mut m02 = DMatrix::zeros(nl, nl);
    let mut m20 = DMatrix::zeros(nl, nl);
    let mut mpp = DMatrix::zeros(nl, nl);
    let mut mmm = DMatrix::zeros(nl, nl);
    for (i, row) in rows.iter().enumerate() {
        let l1 = i + 2;
        let first = if pure { 2 } else { l1 };
        for (k, sums) in row.iter().enumerate() {
            let l2 = first + k;
            let j = l2 - 2;
            let place = |target: &mut DMatrix<f64>, value: f64| {
                target[(i, j)] = value * (2 * l2 + 1) as f64 / (4.0 * PI) * beam[l2];
                if !pure && i != j {
                    target[(j, i)] = value * (2 * l1 + 1) as f64 / (4.0 * PI) * beam[l1];
                }
            };
            place(&mut m00, sums.s00);
            if polarized {
                place(&mut m02, sums.s02);
                place(&mut m20, sums.s20);
                place(&mut mpp, sums.spp);
                place(&mut mmm, sums.smm);
            }
        }
    }
    log::debug!(
        "coupling kernels for lmax={} (window lmax {}, {:?}) in {:?}",
        lmax,
        spectra.lmax,
        config.mode,
        started.elapsed()
    );
    Ok(CouplingMatrices {
        lmax,
        m00,
        m02: polarized.then_some(m02),
        m20: polarized.then_some(m20),
        mpp: polarized.then_some(mpp),
        mmm: polarized.then_some(mmm),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Beams;

    fn flat_sky_spectra(lmax_w: usize) -> WindowSpectra {
        // Unit full-sky window: only the monopole, W_0 = 4π.
        let mut w = vec![0.0; lmax_w + 1];
        w[0] = 4.0 * PI;
        WindowSpectra {
            lmax: lmax_w,
            w00: w.clone(),
            w02: w.clone(),
            w20: w.clone(),
            w22: w,
        }
    }

    #[test]
    fn full_sky_coupling_is_identity() {
        let mut config = CouplingConfig::new(10);
        config.l3_pad = 0;
        let matrices = coupling_matrices(&flat_sky_spectra(10), &config).unwrap();
        let identity = DMatrix::<f64>::identity(9, 9);
        assert!((&matrices.m00 - &identity).amax() < 1e-12);
        assert!((matrices.mpp.as_ref().unwrap() - &identity).amax() < 1e-12);
        assert!(matrices.mmm.as_ref().unwrap().amax() < 1e-12);
        assert!((matrices.m02.as_ref().unwrap() - &identity).amax() < 1e-12);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let spectra = flat_sky_spectra(8);
        let config = CouplingConfig::new(1);
        assert!(matches!(coupling_matrices(&spectra, &config), Err(PclError::Config(_))));

        let mut config = CouplingConfig::new(6);
        config.beams = Some(Beams {
            first: vec![1.0; 4],
            second: vec![1.0; 7],
        });
        let err = coupling_matrices(&spectra, &config).unwrap_err();
        assert_eq!(err.info().code, "beam-too-short");

        let mut short = flat_sky_spectra(8);
        short.w22.truncate(5);
        let err = coupling_matrices(&short, &CouplingConfig::new(6)).unwrap_err();
        assert_eq!(err.info().code, "window-spectra-length");
        let mut config = CouplingConfig::new(6);
        config.spin0_only = true;
        assert!(coupling_matrices(&short, &config).is_ok());
    }

    #[test]
    fn spin0_only_skips_polarization() {
        let mut config = CouplingConfig::new(6);
        config.spin0_only = true;
        let matrices = coupling_matrices(&flat_sky_spectra(8), &config).unwrap();
        assert!(matrices.m02.is_none() && matrices.mpp.is_none());
    }
}
