//! Ring-based spherical harmonic transforms (spin 0, 1 and 2).
//!
//! Analysis integrates each iso-latitude ring with an FFT in longitude and a
//! Legendre sum in colatitude using the ring quadrature weights. Synthesis is
//! the exact inverse sum. Orders `m` are distributed over the rayon pool; the
//! per-ring FFTs are independent as well.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_complex::Complex64;
use pcl_core::errors::{ErrorInfo, PclError};
use pcl_map::{Pixelization, Ring};
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::alm::Alm;
use crate::legendre::{spin_factors, LegendreTable, Spin};

const I: Complex64 = Complex64::new(0.0, 1.0);

struct RingPlan {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

/// Precomputed transform plan for one pixelization and band limit.
///
/// Construction is the only mutation point; a plan can be shared by
/// reference across threads.
pub struct HarmonicTransform {
    pixelization: Pixelization,
    rings: Vec<Ring>,
    lmax: usize,
    legendre: LegendreTable,
    plans: BTreeMap<usize, RingPlan>,
}

impl std::fmt::Debug for HarmonicTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarmonicTransform")
            .field("pixelization", &self.pixelization.describe())
            .field("lmax", &self.lmax)
            .field("rings", &self.rings.len())
            .finish()
    }
}

impl HarmonicTransform {
    /// Plans transforms up to `lmax` on `pixelization`.
    pub fn new(pixelization: &Pixelization, lmax: usize) -> Result<Self, PclError> {
        if lmax > pixelization.lmax_limit() {
            return Err(PclError::Config(
                ErrorInfo::new("lmax-exceeds-pixelization", "lmax is above the pixelization limit")
                    .with_context("lmax", lmax)
                    .with_context("limit", pixelization.lmax_limit())
                    .with_context("pixelization", pixelization.describe()),
            ));
        }
        let rings = pixelization.rings();
        let mut planner = FftPlanner::new();
        let mut plans = BTreeMap::new();
        for ring in &rings {
            plans.entry(ring.nphi).or_insert_with(|| RingPlan {
                forward: planner.plan_fft_forward(ring.nphi),
                inverse: planner.plan_fft_inverse(ring.nphi),
            });
        }
        log::debug!(
            "planned harmonic transform lmax={} on {} ({} rings, {} fft sizes)",
            lmax,
            pixelization.describe(),
            rings.len(),
            plans.len()
        );
        Ok(Self {
            pixelization: *pixelization,
            rings,
            lmax,
            legendre: LegendreTable::new(lmax),
            plans,
        })
    }

    /// Band limit of the plan.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Pixelization the plan was built for.
    pub fn pixelization(&self) -> &Pixelization {
        &self.pixelization
    }

    fn check_field(&self, field: &[f64]) -> Result<(), PclError> {
        if field.len() != self.pixelization.npix() {
            return Err(PclError::Geometry(
                ErrorInfo::new("field-length", "field length differs from the plan's npix")
                    .with_context("expected", self.pixelization.npix())
                    .with_context("found", field.len()),
            ));
        }
        Ok(())
    }

    fn check_alm(&self, alm: &Alm) -> Result<(), PclError> {
        if alm.lmax() != self.lmax {
            return Err(PclError::Config(
                ErrorInfo::new("lmax-mismatch", "coefficients and plan use different lmax")
                    .with_context("plan", self.lmax)
                    .with_context("alm", alm.lmax()),
            ));
        }
        Ok(())
    }

    /// `Σ_j f(φ_j) e^{-imφ_j}` for every ring and `m = 0..=lmax`.
    fn ring_phases(&self, field: &[f64]) -> Vec<Vec<Complex64>> {
        self.rings
            .par_iter()
            .map(|ring| {
                let plan = &self.plans[&ring.nphi];
                let mut buffer = vec![Complex64::new(0.0, 0.0); ring.nphi];
                for (slot, value) in buffer.iter_mut().zip(&field[ring.offset..ring.offset + ring.len]) {
                    *slot = Complex64::new(*value, 0.0);
                }
                plan.forward.process(&mut buffer);
                (0..=self.lmax)
                    .map(|m| {
                        let shift = Complex64::from_polar(1.0, -(m as f64) * ring.phi0);
                        shift * buffer[m % ring.nphi]
                    })
                    .collect()
            })
            .collect()
    }

    /// Inverse of [`Self::ring_phases`]: sums `c_m e^{imφ}` plus the conjugate
    /// negative orders and samples the ring pixels.
    fn synthesize_rings(&self, coeffs: &[Vec<Complex64>]) -> Vec<f64> {
        let per_ring: Vec<Vec<f64>> = self
            .rings
            .par_iter()
            .enumerate()
            .map(|(r, ring)| {
                let plan = &self.plans[&ring.nphi];
                let n = ring.nphi;
                let mut buffer = vec![Complex64::new(0.0, 0.0); n];
                for (m, column) in coeffs.iter().enumerate() {
                    let c = column[r] * Complex64::from_polar(1.0, m as f64 * ring.phi0);
                    buffer[m % n] += c;
                    if m > 0 {
                        buffer[(n - m % n) % n] += c.conj();
                    }
                }
                plan.inverse.process(&mut buffer);
                buffer[..ring.len].iter().map(|c| c.re).collect()
            })
            .collect();
        let mut field = vec![0.0; self.pixelization.npix()];
        for (ring, values) in self.rings.iter().zip(per_ring) {
            field[ring.offset..ring.offset + ring.len].copy_from_slice(&values);
        }
        field
    }

    /// Scalar analysis of `field` by ring quadrature.
    pub fn map2alm(&self, field: &[f64]) -> Result<Alm, PclError> {
        self.check_field(field)?;
        let phases = self.ring_phases(field);
        let lmax = self.lmax;
        let columns: Vec<Vec<Complex64>> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                let mut column = vec![Complex64::new(0.0, 0.0); lmax + 1 - m];
                let mut lambda = vec![0.0; lmax + 1 - m];
                for (ring, phase) in self.rings.iter().zip(&phases) {
                    self.legendre
                        .column(m, ring.cos_theta, ring.sin_theta, &mut lambda);
                    let weighted = phase[m] * ring.weight;
                    for (acc, value) in column.iter_mut().zip(&lambda) {
                        *acc += weighted * *value;
                    }
                }
                column
            })
            .collect();
        Alm::from_coeffs(lmax, columns.into_iter().flatten().collect())
    }

    /// Scalar synthesis of `alm` on the plan's pixels.
    pub fn alm2map(&self, alm: &Alm) -> Result<Vec<f64>, PclError> {
        self.check_alm(alm)?;
        let lmax = self.lmax;
        let coeffs: Vec<Vec<Complex64>> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                let mut lambda = vec![0.0; lmax + 1 - m];
                let a = alm.column(m);
                self.rings
                    .iter()
                    .map(|ring| {
                        self.legendre
                            .column(m, ring.cos_theta, ring.sin_theta, &mut lambda);
                        a.iter()
                            .zip(&lambda)
                            .fold(Complex64::new(0.0, 0.0), |acc, (c, v)| acc + *c * *v)
                    })
                    .collect()
            })
            .collect();
        Ok(self.synthesize_rings(&coeffs))
    }

    /// Spin-`s` analysis of `(Q, U)` into `(E, B)` coefficients.
    pub fn map2alm_spin(&self, spin: Spin, q: &[f64], u: &[f64]) -> Result<[Alm; 2], PclError> {
        self.check_field(q)?;
        self.check_field(u)?;
        let q_phases = self.ring_phases(q);
        let u_phases = self.ring_phases(u);
        let lmax = self.lmax;
        let columns: Vec<(Vec<Complex64>, Vec<Complex64>)> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                let len = lmax + 1 - m;
                let mut e = vec![Complex64::new(0.0, 0.0); len];
                let mut b = vec![Complex64::new(0.0, 0.0); len];
                let mut lambda = vec![0.0; len];
                let mut plus = vec![0.0; len];
                let mut minus = vec![0.0; len];
                for ((ring, qp), up) in self.rings.iter().zip(&q_phases).zip(&u_phases) {
                    self.legendre
                        .column(m, ring.cos_theta, ring.sin_theta, &mut lambda);
                    spin_factors(
                        spin,
                        m,
                        ring.cos_theta,
                        ring.sin_theta,
                        &lambda,
                        &mut plus,
                        &mut minus,
                    );
                    let qm = qp[m] * ring.weight;
                    let um = up[m] * ring.weight;
                    for l in 0..len {
                        e[l] -= qm * plus[l] + I * um * minus[l];
                        b[l] -= um * plus[l] - I * qm * minus[l];
                    }
                }
                (e, b)
            })
            .collect();
        let (e, b): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
        Ok([
            Alm::from_coeffs(lmax, e.into_iter().flatten().collect())?,
            Alm::from_coeffs(lmax, b.into_iter().flatten().collect())?,
        ])
    }

    /// Spin-`s` synthesis of `(E, B)` coefficients into `(Q, U)` fields.
    pub fn alm2map_spin(&self, spin: Spin, e: &Alm, b: &Alm) -> Result<[Vec<f64>; 2], PclError> {
        self.check_alm(e)?;
        self.check_alm(b)?;
        let lmax = self.lmax;
        let columns: Vec<(Vec<Complex64>, Vec<Complex64>)> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                let len = lmax + 1 - m;
                let mut lambda = vec![0.0; len];
                let mut plus = vec![0.0; len];
                let mut minus = vec![0.0; len];
                let (ec, bc) = (e.column(m), b.column(m));
                let mut q = Vec::with_capacity(self.rings.len());
                let mut u = Vec::with_capacity(self.rings.len());
                for ring in &self.rings {
                    self.legendre
                        .column(m, ring.cos_theta, ring.sin_theta, &mut lambda);
                    spin_factors(
                        spin,
                        m,
                        ring.cos_theta,
                        ring.sin_theta,
                        &lambda,
                        &mut plus,
                        &mut minus,
                    );
                    let mut qm = Complex64::new(0.0, 0.0);
                    let mut um = Complex64::new(0.0, 0.0);
                    for l in 0..len {
                        qm -= ec[l] * plus[l] + I * bc[l] * minus[l];
                        um -= bc[l] * plus[l] - I * ec[l] * minus[l];
                    }
                    q.push(qm);
                    u.push(um);
                }
                (q, u)
            })
            .collect();
        let (q, u): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
        Ok([self.synthesize_rings(&q), self.synthesize_rings(&u)])
    }

    /// Scalar analysis refined by `niter` Jacobi iterations on the residual map.
    pub fn map2alm_iter(&self, field: &[f64], niter: usize) -> Result<Alm, PclError> {
        let mut alm = self.map2alm(field)?;
        for _ in 0..niter {
            let model = self.alm2map(&alm)?;
            let residual: Vec<f64> = field.iter().zip(&model).map(|(f, m)| f - m).collect();
            alm.add_assign(&self.map2alm(&residual)?);
        }
        Ok(alm)
    }

    /// Spin analysis refined by `niter` Jacobi iterations on the residual maps.
    pub fn map2alm_spin_iter(
        &self,
        spin: Spin,
        q: &[f64],
        u: &[f64],
        niter: usize,
    ) -> Result<[Alm; 2], PclError> {
        let [mut e, mut b] = self.map2alm_spin(spin, q, u)?;
        for _ in 0..niter {
            let [mq, mu] = self.alm2map_spin(spin, &e, &b)?;
            let rq: Vec<f64> = q.iter().zip(&mq).map(|(f, m)| f - m).collect();
            let ru: Vec<f64> = u.iter().zip(&mu).map(|(f, m)| f - m).collect();
            let [de, db] = self.map2alm_spin(spin, &rq, &ru)?;
            e.add_assign(&de);
            b.add_assign(&db);
        }
        Ok([e, b])
    }
}
