//! Windowed harmonic analysis of scalar and (T, Q, U) maps.

use std::time::Instant;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::labels::{AnalysisMode, Field};
use pcl_map::{Map, Window, WindowPair};
use serde::{Deserialize, Serialize};

use crate::alm::Alm;
use crate::legendre::Spin;
use crate::transform::HarmonicTransform;

fn default_niter() -> usize {
    3
}

/// Parameters of [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Band limit of the output coefficients.
    pub lmax: usize,
    /// Number of Jacobi refinement iterations (0 is the plain quadrature).
    #[serde(default = "default_niter")]
    pub niter: usize,
    /// Standard or purified spin-2 analysis.
    #[serde(default)]
    pub mode: AnalysisMode,
}

/// Harmonic coefficients of one windowed map: `[T]` or `[T, E, B]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicCoefficients {
    lmax: usize,
    mode: AnalysisMode,
    fields: Vec<Alm>,
}

impl HarmonicCoefficients {
    /// Assembles coefficients produced elsewhere (one or three fields).
    pub fn new(mode: AnalysisMode, fields: Vec<Alm>) -> Result<Self, PclError> {
        if !(fields.len() == 1 || fields.len() == 3) {
            return Err(PclError::Config(
                ErrorInfo::new("field-count", "expected T or T, E, B coefficients")
                    .with_context("fields", fields.len()),
            ));
        }
        let lmax = fields[0].lmax();
        if fields.iter().any(|alm| alm.lmax() != lmax) {
            return Err(PclError::config(
                "lmax-mismatch",
                "all fields must share the same lmax",
            ));
        }
        Ok(Self { lmax, mode, fields })
    }

    /// Band limit.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Analysis mode that produced the spin-2 fields.
    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    /// Whether E and B are present.
    pub fn is_polarized(&self) -> bool {
        self.fields.len() == 3
    }

    /// Coefficients of `field`.
    pub fn field(&self, field: Field) -> Result<&Alm, PclError> {
        self.fields.get(field.index()).ok_or_else(|| {
            PclError::Config(
                ErrorInfo::new("missing-field", "coefficients carry temperature only")
                    .with_context("field", format!("{field:?}")),
            )
        })
    }
}

/// Window derivatives used by the purified analysis.
///
/// `spin1` and `spin2` are the `(a, b)` component maps of the spin-1 and
/// spin-2 syntheses of `-sqrt((l+s)!/(l-s)!) w_lm`, i.e. the first and
/// second covariant derivatives of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinnedWindows {
    /// First-derivative components.
    pub spin1: [Vec<f64>; 2],
    /// Second-derivative components.
    pub spin2: [Vec<f64>; 2],
}

/// Computes the spin-1 and spin-2 derivatives of `window` through harmonic space.
pub fn spinned_windows(
    sht: &HarmonicTransform,
    window: &Window,
    niter: usize,
) -> Result<SpinnedWindows, PclError> {
    let wlm = sht.map2alm_iter(window.values(), niter)?;
    let zero = Alm::zeros(sht.lmax());
    let d1 = wlm.filtered(|l| -((l * (l + 1)) as f64).sqrt());
    let d2 = wlm.filtered(|l| {
        if l < 2 {
            0.0
        } else {
            -(((l + 2) * (l + 1) * l * (l - 1)) as f64).sqrt()
        }
    });
    Ok(SpinnedWindows {
        spin1: sht.alm2map_spin(Spin::One, &d1, &zero)?,
        spin2: sht.alm2map_spin(Spin::Two, &d2, &zero)?,
    })
}

fn product(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// `(a Q + b U, a U - b Q)` for a spin-weighted window `(a, b)`.
fn contract(window: &[Vec<f64>; 2], q: &[f64], u: &[f64]) -> [Vec<f64>; 2] {
    let [a, b] = window;
    let first = (0..q.len()).map(|p| a[p] * q[p] + b[p] * u[p]).collect();
    let second = (0..q.len()).map(|p| a[p] * u[p] - b[p] * q[p]).collect();
    [first, second]
}

/// E/B coefficients of `(Q, U)` with the window's boundary terms removed from B.
fn purified_eb(
    sht: &HarmonicTransform,
    window: &Window,
    q: &[f64],
    u: &[f64],
    niter: usize,
) -> Result<[Alm; 2], PclError> {
    let spinned = spinned_windows(sht, window, niter)?;
    let w = window.values();
    let [mut e, mut b] =
        sht.map2alm_spin_iter(Spin::Two, &product(w, q), &product(w, u), niter)?;

    let [p1q, p1u] = contract(&spinned.spin1, q, u);
    let [e1, b1] = sht.map2alm_spin_iter(Spin::One, &p1q, &p1u, niter)?;
    let one = |l: usize| {
        if l < 2 {
            0.0
        } else {
            2.0 / (((l + 2) * (l - 1)) as f64).sqrt()
        }
    };
    e.add_assign(&e1.filtered(one));
    b.add_assign(&b1.filtered(one));

    let [p0q, p0u] = contract(&spinned.spin2, q, u);
    let zero_spin = |l: usize| {
        if l < 2 {
            0.0
        } else {
            1.0 / (((l + 2) * (l + 1) * l * (l - 1)) as f64).sqrt()
        }
    };
    e.sub_assign(&sht.map2alm_iter(&p0q, niter)?.filtered(zero_spin));
    b.sub_assign(&sht.map2alm_iter(&p0u, niter)?.filtered(zero_spin));
    Ok([e, b])
}

/// Harmonic coefficients of a windowed map.
///
/// Temperature is weighted by the spin-0 window. For three-component maps,
/// `(Q, U)` are weighted by the spin-2 window and transformed as a spin-2
/// field, or purified when `config.mode` is [`AnalysisMode::Purified`].
pub fn analyze(
    map: &Map,
    windows: &WindowPair,
    config: &AnalysisConfig,
) -> Result<HarmonicCoefficients, PclError> {
    map.pixelization().ensure_same(windows.pixelization())?;
    let polarized = map.ncomp() == 3;
    if windows.spin0().is_zero() || (polarized && windows.spin2().is_zero()) {
        windows.ensure_nonzero()?;
    }
    let started = Instant::now();
    let sht = HarmonicTransform::new(map.pixelization(), config.lmax)?;
    let t = sht.map2alm_iter(&product(map.component(0), windows.spin0().values()), config.niter)?;
    let mut fields = vec![t];
    if polarized {
        let (q, u) = (map.component(1), map.component(2));
        let [e, b] = match config.mode {
            AnalysisMode::Standard => {
                let w = windows.spin2().values();
                sht.map2alm_spin_iter(Spin::Two, &product(q, w), &product(u, w), config.niter)?
            }
            AnalysisMode::Purified => purified_eb(&sht, windows.spin2(), q, u, config.niter)?,
        };
        fields.push(e);
        fields.push(b);
    }
    log::debug!(
        "analyzed {}-component map at lmax={} niter={} mode={:?} in {:?}",
        map.ncomp(),
        config.lmax,
        config.niter,
        config.mode,
        started.elapsed()
    );
    HarmonicCoefficients::new(config.mode, fields)
}
